use std::io;
use std::path::PathBuf;

/// Why a shell could not be started.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpawnError {
    #[error("shell not found: {shell}")]
    ShellNotFound { shell: String },

    #[error("permission denied launching {shell}")]
    PermissionDenied { shell: String },

    #[error("pseudo-terminal unavailable: {reason}")]
    PtyUnavailable { reason: String },

    #[error("working directory does not exist: {}", path.display())]
    MissingDirectory { path: PathBuf },

    #[error("failed to spawn {shell}: {reason}")]
    Other { shell: String, reason: String },
}

impl SpawnError {
    /// Map a spawn failure onto a variant by the underlying I/O error kind.
    pub fn classify(shell: &str, error: &anyhow::Error) -> Self {
        let io_kind = error
            .chain()
            .find_map(|cause| cause.downcast_ref::<io::Error>())
            .map(io::Error::kind);

        match io_kind {
            Some(io::ErrorKind::NotFound) => SpawnError::ShellNotFound {
                shell: shell.to_string(),
            },
            Some(io::ErrorKind::PermissionDenied) => SpawnError::PermissionDenied {
                shell: shell.to_string(),
            },
            _ => {
                let reason = format!("{error:#}");
                // Some platforms only report errno text.
                if reason.contains("No such file") {
                    SpawnError::ShellNotFound {
                        shell: shell.to_string(),
                    }
                } else if reason.contains("Permission denied") {
                    SpawnError::PermissionDenied {
                        shell: shell.to_string(),
                    }
                } else {
                    SpawnError::Other {
                        shell: shell.to_string(),
                        reason,
                    }
                }
            }
        }
    }

    /// Troubleshooting hints shown under the error.
    fn hints(&self) -> &'static [&'static str] {
        match self {
            SpawnError::ShellNotFound { .. } => &[
                "Check that your shell exists: echo $SHELL",
                "Set `shell` in ~/.config/pdesk/config.toml, e.g. /bin/bash",
            ],
            SpawnError::PermissionDenied { .. } => &[
                "Check that the shell is executable: ls -l $SHELL",
                "Check that you can enter the project directory",
            ],
            SpawnError::PtyUnavailable { .. } => &[
                "The system refused to allocate a pseudo-terminal",
                "Close unused terminals or check /dev/ptmx permissions",
            ],
            SpawnError::MissingDirectory { .. } => &[
                "The project folder was moved or deleted",
                "Open another folder and restart the terminal",
            ],
            SpawnError::Other { .. } => &["Restart the terminal to try again"],
        }
    }

    /// Human-readable block injected into the session's terminal.
    pub fn diagnostic(&self) -> String {
        let mut message = format!(
            "\x1b[31m\x1b[1mError: Failed to spawn shell\x1b[0m\r\n\r\n{}\r\n\r\n\
             \x1b[33mTroubleshooting:\x1b[0m\r\n",
            self
        );
        for hint in self.hints() {
            message.push_str("- ");
            message.push_str(hint);
            message.push_str("\r\n");
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn not_found_io_error_is_shell_not_found() {
        let error = anyhow::Error::new(io::Error::from(io::ErrorKind::NotFound))
            .context("Failed to spawn shell");
        assert_eq!(
            SpawnError::classify("/bin/nope", &error),
            SpawnError::ShellNotFound {
                shell: "/bin/nope".into()
            }
        );
    }

    #[test]
    fn permission_io_error_is_permission_denied() {
        let error = anyhow::Error::new(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(
            SpawnError::classify("/bin/sh", &error),
            SpawnError::PermissionDenied { .. }
        ));
    }

    #[test]
    fn errno_text_is_recognised() {
        let error = anyhow::anyhow!("execvp failed: No such file or directory (os error 2)");
        assert!(matches!(
            SpawnError::classify("zsh", &error),
            SpawnError::ShellNotFound { .. }
        ));
    }

    #[test]
    fn unknown_error_keeps_reason() {
        let error = anyhow::anyhow!("boom");
        assert_eq!(
            SpawnError::classify("zsh", &error),
            SpawnError::Other {
                shell: "zsh".into(),
                reason: "boom".into()
            }
        );
    }

    #[test]
    fn each_variant_has_distinct_diagnostic() {
        let errors = [
            SpawnError::ShellNotFound { shell: "a".into() },
            SpawnError::PermissionDenied { shell: "a".into() },
            SpawnError::PtyUnavailable { reason: "a".into() },
            SpawnError::MissingDirectory { path: "/a".into() },
            SpawnError::Other {
                shell: "a".into(),
                reason: "a".into(),
            },
        ];
        let diagnostics: Vec<String> = errors.iter().map(SpawnError::diagnostic).collect();
        for (i, a) in diagnostics.iter().enumerate() {
            assert!(a.starts_with("\x1b[31m\x1b[1mError: Failed to spawn shell"));
            assert!(a.contains("Troubleshooting"));
            for b in &diagnostics[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
