//! Centralized configuration constants for pdesk.
//!
//! Compile-time defaults for shells, PTY geometry and the fixed delays used
//! when driving interactive shells. Organized by component.

/// Pseudo-terminal and shell environment.
pub mod terminal {
    /// Initial PTY width before the first fit.
    pub const DEFAULT_COLS: u16 = 80;
    /// Initial PTY height before the first fit.
    pub const DEFAULT_ROWS: u16 = 24;

    /// Default scrollback buffer size in lines.
    pub const DEFAULT_SCROLLBACK_LINES: usize = 1_000;
    /// Maximum allowed scrollback buffer size in lines.
    pub const MAX_SCROLLBACK_LINES: usize = 100_000;

    /// Cell size used to turn container pixels into rows/columns.
    pub const CELL_WIDTH: f32 = 8.4;
    pub const CELL_HEIGHT: f32 = 18.2;

    /// `TERM` exported to every shell.
    pub const TERM: &str = "xterm-256color";
    /// `COLORTERM` exported to Unix shells.
    pub const COLORTERM: &str = "truecolor";
    /// Locale forced on Unix shells so multi-byte output decodes.
    pub const UTF8_LOCALE: &str = "en_US.UTF-8";

    /// Used when the parent environment has no `PATH` (GUI launches on macOS).
    pub const FALLBACK_PATH: &str =
        "/opt/homebrew/bin:/opt/homebrew/sbin:/usr/local/bin:/usr/bin:/bin:/usr/sbin:/sbin";

    /// Shell used when `$SHELL` is unset.
    pub const UNIX_SHELL: &str = "/bin/bash";
    /// Shell used on Windows unless overridden.
    pub const WINDOWS_SHELL: &str = "powershell.exe";

    /// PTY read buffer size.
    pub const READ_BUFFER_SIZE: usize = 4096;
}

/// Fixed delays. None of these wait on shell readiness.
pub mod timing {
    use std::time::Duration;

    /// Delay before an auto-command is typed into a freshly spawned shell.
    pub const AUTO_COMMAND_DELAY: Duration = Duration::from_millis(1000);
    /// Delay between the interrupt byte and the injected command.
    pub const INTERRUPT_DELAY: Duration = Duration::from_millis(300);
    /// Delay between a tab switch and the first injected byte.
    pub const TAB_SWITCH_DELAY: Duration = Duration::from_millis(100);
    /// Delay between tearing a session down and recreating it.
    pub const RESTART_DELAY: Duration = Duration::from_millis(100);
    /// Delay before the sync follow-up (`npm install`) is typed.
    pub const SYNC_FOLLOW_UP: Duration = Duration::from_secs(30);
    /// Upper bound for any configured delay.
    pub const MAX_DELAY: Duration = Duration::from_secs(600);
}

/// External assistant CLI.
pub mod assistant {
    /// Executable name looked up on `PATH`.
    pub const CLI: &str = "claude";
    /// Arguments passed before the instruction file.
    pub const ARGS: &[&str] = &["--permission-mode", "bypassPermissions"];

    /// Instruction file written into the project root when building a prompt file.
    pub const INSTRUCTION_FILE: &str = ".temp-claude-instruction.md";
    /// Instruction file for revising a prompt file's generated code.
    pub const EDIT_INSTRUCTION_FILE: &str = ".temp-claude-edit-instruction.md";
    /// Instruction file for repairing an npm script.
    pub const FIX_INSTRUCTION_FILE: &str = ".temp-claude-fix-instruction.md";
    /// Instruction file written into the project root for the sync action.
    pub const SYNC_INSTRUCTION_FILE: &str = ".temp-claude-sync-instruction.md";

    /// Substrings marking a URL as belonging to the assistant or its local
    /// dev server.
    pub const URL_HINTS: &[&str] = &[
        "claude.ai",
        "anthropic.com",
        "claude",
        "localhost:3000",
        "127.0.0.1:3000",
    ];
}

/// Settings file validation limits.
pub mod settings {
    /// Maximum settings file size in bytes (64 KB).
    pub const MAX_FILE_SIZE: u64 = 64 * 1024;

    /// Maximum length for string fields (shell paths, CLI names).
    pub const MAX_STRING_LENGTH: usize = 256;
}

#[cfg(test)]
#[allow(clippy::assertions_on_constants, clippy::const_is_empty)]
mod tests {
    use super::*;

    #[test]
    fn test_default_geometry_is_classic_vt100() {
        assert_eq!(terminal::DEFAULT_COLS, 80);
        assert_eq!(terminal::DEFAULT_ROWS, 24);
    }

    #[test]
    fn test_default_scrollback_within_limit() {
        assert!(
            terminal::DEFAULT_SCROLLBACK_LINES <= terminal::MAX_SCROLLBACK_LINES,
            "default scrollback ({}) exceeds max ({})",
            terminal::DEFAULT_SCROLLBACK_LINES,
            terminal::MAX_SCROLLBACK_LINES
        );
    }

    #[test]
    fn test_interrupt_delay_longer_than_tab_switch() {
        assert!(
            timing::INTERRUPT_DELAY > timing::TAB_SWITCH_DELAY,
            "the shell needs longer to settle after ^C than the tab does after a switch"
        );
    }

    #[test]
    fn test_delays_below_max() {
        for delay in [
            timing::AUTO_COMMAND_DELAY,
            timing::INTERRUPT_DELAY,
            timing::TAB_SWITCH_DELAY,
            timing::RESTART_DELAY,
            timing::SYNC_FOLLOW_UP,
        ] {
            assert!(delay <= timing::MAX_DELAY, "{delay:?} exceeds MAX_DELAY");
        }
    }

    #[test]
    fn test_url_hints_include_vendor_domain() {
        assert!(assistant::URL_HINTS.contains(&"anthropic.com"));
        assert!(assistant::URL_HINTS.iter().all(|hint| !hint.is_empty()));
    }

    #[test]
    fn test_max_string_length_allows_long_shell_paths() {
        let long_shell = "/nix/store/0000000000000000000000000000000-bash-interactive-5.2/bin/bash";
        assert!(settings::MAX_STRING_LENGTH >= long_shell.len());
    }
}
