//! TOML config file support.
//!
//! Config location: `~/.config/pdesk/config.toml`

use crate::constants::{assistant, settings as limits, terminal, timing};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Fixed delays used when driving shells, in config-file units.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct TimingConfig {
    pub auto_command_delay_ms: u64,
    pub interrupt_delay_ms: u64,
    pub tab_switch_delay_ms: u64,
    pub restart_delay_ms: u64,
    pub sync_follow_up_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            auto_command_delay_ms: timing::AUTO_COMMAND_DELAY.as_millis() as u64,
            interrupt_delay_ms: timing::INTERRUPT_DELAY.as_millis() as u64,
            tab_switch_delay_ms: timing::TAB_SWITCH_DELAY.as_millis() as u64,
            restart_delay_ms: timing::RESTART_DELAY.as_millis() as u64,
            sync_follow_up_secs: timing::SYNC_FOLLOW_UP.as_secs(),
        }
    }
}

impl TimingConfig {
    pub fn auto_command_delay(&self) -> Duration {
        clamp(Duration::from_millis(self.auto_command_delay_ms))
    }

    pub fn interrupt_delay(&self) -> Duration {
        clamp(Duration::from_millis(self.interrupt_delay_ms))
    }

    pub fn tab_switch_delay(&self) -> Duration {
        clamp(Duration::from_millis(self.tab_switch_delay_ms))
    }

    pub fn restart_delay(&self) -> Duration {
        clamp(Duration::from_millis(self.restart_delay_ms))
    }

    pub fn sync_follow_up(&self) -> Duration {
        clamp(Duration::from_secs(self.sync_follow_up_secs))
    }
}

fn clamp(delay: Duration) -> Duration {
    delay.min(timing::MAX_DELAY)
}

/// User-facing config parsed from TOML.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Unix shell override. Falls back to `$SHELL`, then `/bin/bash`.
    pub shell: Option<String>,
    /// Windows shell override ("powershell", "pwsh", or "cmd").
    pub windows_shell: Option<String>,
    /// Assistant CLI executable.
    pub assistant_cli: String,
    /// Arguments passed to the assistant CLI before the instruction file.
    pub assistant_args: Vec<String>,
    /// Scrollback kept by each terminal widget.
    pub scrollback_lines: usize,
    /// Fixed delays.
    pub timing: TimingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shell: None,
            windows_shell: None,
            assistant_cli: assistant::CLI.to_string(),
            assistant_args: assistant::ARGS.iter().map(|arg| arg.to_string()).collect(),
            scrollback_lines: terminal::DEFAULT_SCROLLBACK_LINES,
            timing: TimingConfig::default(),
        }
    }
}

impl Config {
    /// Drop values that would break shell spawning or rendering.
    fn sanitized(mut self) -> Self {
        let defaults = Config::default();

        if self
            .shell
            .as_ref()
            .is_some_and(|shell| shell.trim().is_empty() || shell.len() > limits::MAX_STRING_LENGTH)
        {
            tracing::warn!("Ignoring invalid shell override");
            self.shell = None;
        }
        if self.assistant_cli.trim().is_empty()
            || self.assistant_cli.len() > limits::MAX_STRING_LENGTH
        {
            tracing::warn!("Ignoring invalid assistant-cli, using {:?}", defaults.assistant_cli);
            self.assistant_cli = defaults.assistant_cli;
        }
        self.scrollback_lines = self.scrollback_lines.min(terminal::MAX_SCROLLBACK_LINES);
        self
    }

    /// The configured shell program for this platform.
    pub fn shell_program(&self) -> String {
        if cfg!(target_os = "windows") {
            return match self.windows_shell.as_deref() {
                Some("pwsh") => "pwsh.exe".to_string(),
                Some("cmd") => "cmd.exe".to_string(),
                _ => terminal::WINDOWS_SHELL.to_string(),
            };
        }
        self.shell
            .clone()
            .or_else(|| std::env::var("SHELL").ok().filter(|shell| !shell.is_empty()))
            .unwrap_or_else(|| terminal::UNIX_SHELL.to_string())
    }

    /// `assistant-cli` followed by `assistant-args`, space-joined.
    pub fn assistant_invocation(&self) -> String {
        std::iter::once(self.assistant_cli.as_str())
            .chain(self.assistant_args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Default config file content with comments (generated on first launch).
const DEFAULT_CONFIG: &str = r#"# pdesk configuration
# Restart pdesk after editing this file.

# Unix shell used for every terminal tab (defaults to $SHELL, then /bin/bash)
# shell = "/bin/zsh"

# Windows shell: "powershell", "pwsh", or "cmd"
# windows-shell = "powershell"

# Assistant CLI and the arguments placed before the instruction file
assistant-cli = "claude"
assistant-args = ["--permission-mode", "bypassPermissions"]

# Scrollback kept by each terminal tab (lines)
scrollback-lines = 1000

# Fixed delays. The shell is never asked whether it is ready; these are
# best-effort waits.
[timing]
auto-command-delay-ms = 1000
interrupt-delay-ms = 300
tab-switch-delay-ms = 100
restart-delay-ms = 100
sync-follow-up-secs = 30
"#;

/// Return the config file path.
pub fn config_path() -> PathBuf {
    pdesk_paths::config_file()
}

/// Ensure the config file exists, creating a default if missing.
/// Returns the path to the config file.
pub fn ensure_config_file() -> Option<PathBuf> {
    let path = config_path();
    if !path.exists() {
        let parent = path.parent()?;
        std::fs::create_dir_all(parent).ok()?;
        std::fs::write(&path, DEFAULT_CONFIG).ok()?;
        tracing::info!("Created default config at {:?}", path);
    }
    Some(path)
}

/// Load and parse the config file. Returns default on any error.
pub fn load_config() -> Config {
    load_config_from(&config_path())
}

/// Load and parse a config file at `path`. Returns default on any error.
pub fn load_config_from(path: &Path) -> Config {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to read config: {}", e);
            }
            return Config::default();
        }
    };

    // Size guard
    if content.len() > limits::MAX_FILE_SIZE as usize {
        tracing::warn!(
            "Config file too large ({} bytes), using defaults",
            content.len()
        );
        return Config::default();
    }

    match toml::from_str::<Config>(&content) {
        Ok(cfg) => cfg.sanitized(),
        Err(e) => {
            tracing::warn!("Failed to parse config.toml: {}", e);
            Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use test_case::test_case;

    #[test]
    fn default_config_has_sane_values() {
        let cfg = Config::default();
        assert_eq!(cfg.assistant_cli, "claude");
        assert_eq!(
            cfg.assistant_args,
            vec!["--permission-mode".to_string(), "bypassPermissions".to_string()]
        );
        assert_eq!(cfg.scrollback_lines, 1000);
        assert!(cfg.shell.is_none());
        assert_eq!(cfg.timing.interrupt_delay(), Duration::from_millis(300));
    }

    #[test]
    fn default_config_template_parses_to_defaults() {
        let cfg: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn parses_minimal_toml() {
        let cfg: Config = toml::from_str(r#"shell = "/bin/zsh""#).unwrap();
        assert_eq!(cfg.shell.as_deref(), Some("/bin/zsh"));
        assert_eq!(cfg.timing, TimingConfig::default());
    }

    #[test_case("interrupt-delay-ms = 500", |t: &TimingConfig| t.interrupt_delay(), Duration::from_millis(500) ; "interrupt")]
    #[test_case("tab-switch-delay-ms = 250", |t: &TimingConfig| t.tab_switch_delay(), Duration::from_millis(250) ; "tab switch")]
    #[test_case("restart-delay-ms = 0", |t: &TimingConfig| t.restart_delay(), Duration::ZERO ; "restart")]
    #[test_case("sync-follow-up-secs = 45", |t: &TimingConfig| t.sync_follow_up(), Duration::from_secs(45) ; "sync follow up")]
    fn parses_partial_timing_table(
        line: &str,
        read: fn(&TimingConfig) -> Duration,
        expected: Duration,
    ) {
        let cfg: Config = toml::from_str(&format!("[timing]\n{line}\n")).unwrap();
        assert_eq!(read(&cfg.timing), expected);
        assert_eq!(cfg.timing.auto_command_delay(), Duration::from_millis(1000));
    }

    #[test]
    fn ignores_unknown_keys() {
        let toml_str = r#"
assistant-cli = "claude"
unknown-key = "whatever"
"#;
        let result: Result<Config, _> = toml::from_str(toml_str);
        assert!(result.is_ok());
    }

    #[test]
    fn timing_is_clamped() {
        let timing = TimingConfig {
            sync_follow_up_secs: 86_400,
            ..TimingConfig::default()
        };
        assert_eq!(timing.sync_follow_up(), timing::MAX_DELAY);
    }

    #[test]
    fn sanitize_rejects_blank_cli_and_shell() {
        let cfg = Config {
            shell: Some("   ".into()),
            assistant_cli: String::new(),
            scrollback_lines: usize::MAX,
            ..Config::default()
        }
        .sanitized();
        assert!(cfg.shell.is_none());
        assert_eq!(cfg.assistant_cli, "claude");
        assert_eq!(cfg.scrollback_lines, terminal::MAX_SCROLLBACK_LINES);
    }

    #[test]
    fn assistant_invocation_joins_args() {
        let cfg = Config::default();
        assert_eq!(
            cfg.assistant_invocation(),
            "claude --permission-mode bypassPermissions"
        );
    }

    #[cfg(unix)]
    #[test]
    fn shell_override_wins() {
        let cfg = Config {
            shell: Some("/usr/bin/fish".into()),
            ..Config::default()
        };
        assert_eq!(cfg.shell_program(), "/usr/bin/fish");
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn shell_falls_back_to_env_then_bash() {
        let saved = std::env::var("SHELL").ok();

        std::env::set_var("SHELL", "/bin/zsh");
        assert_eq!(Config::default().shell_program(), "/bin/zsh");
        std::env::set_var("SHELL", "");
        assert_eq!(Config::default().shell_program(), terminal::UNIX_SHELL);

        match saved {
            Some(shell) => std::env::set_var("SHELL", shell),
            None => std::env::remove_var("SHELL"),
        }
    }

    #[test]
    fn load_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("nope.toml"));
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn load_invalid_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "timing = [not valid").unwrap();
        assert_eq!(load_config_from(&path), Config::default());
    }

    #[test]
    fn load_oversized_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let padding = "#".repeat(limits::MAX_FILE_SIZE as usize + 1);
        std::fs::write(&path, format!("shell = \"/bin/zsh\"\n{padding}")).unwrap();
        assert_eq!(load_config_from(&path), Config::default());
    }
}
