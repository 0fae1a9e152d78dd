//! PTY process spawning.

use crate::{ExitStatus, SessionId, SpawnError};
use anyhow::{Context as _, Result};
use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtySize};
use settings::constants::terminal;
use std::io::{Read, Write};
use std::path::PathBuf;

/// Program, arguments and environment used for every session's shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl ShellCommand {
    /// Interactive login shell for this platform, as configured.
    pub fn from_config(config: &settings::Config) -> Self {
        let program = config.shell_program();
        if cfg!(target_os = "windows") {
            Self::windows(program)
        } else {
            Self::unix(program, std::env::var("PATH").ok())
        }
    }

    fn unix(program: String, parent_path: Option<String>) -> Self {
        let path = parent_path
            .filter(|path| !path.is_empty())
            .unwrap_or_else(|| terminal::FALLBACK_PATH.to_string());
        Self {
            program,
            args: vec!["-l".to_string()],
            env: vec![
                ("TERM".into(), terminal::TERM.into()),
                ("LANG".into(), terminal::UTF8_LOCALE.into()),
                ("LC_ALL".into(), terminal::UTF8_LOCALE.into()),
                ("COLORTERM".into(), terminal::COLORTERM.into()),
                ("PATH".into(), path),
            ],
        }
    }

    fn windows(program: String) -> Self {
        Self {
            program,
            args: Vec::new(),
            env: vec![
                ("TERM".into(), terminal::TERM.into()),
                ("PYTHONIOENCODING".into(), "utf-8".into()),
            ],
        }
    }
}

/// Everything needed to start one session's shell.
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub session: SessionId,
    pub working_dir: PathBuf,
    pub cols: u16,
    pub rows: u16,
}

/// Input side of a running shell.
pub trait PtyControl: Send {
    fn write(&mut self, data: &[u8]) -> Result<()>;
    fn resize(&mut self, cols: u16, rows: u16) -> Result<()>;
    fn kill(&mut self) -> Result<()>;
}

/// Blocks until the shell exits and reaps it.
pub trait ExitWaiter: Send {
    fn wait(self: Box<Self>) -> ExitStatus;
}

/// A freshly spawned shell, split so the reader thread can own the output
/// and exit halves while the registry keeps the control half.
pub struct SpawnedShell {
    pub control: Box<dyn PtyControl>,
    pub output: Box<dyn Read + Send>,
    pub waiter: Box<dyn ExitWaiter>,
}

/// Starts shells. The registry only ever talks to this seam.
pub trait PtySpawner: Send + Sync {
    fn spawn(&self, request: &SpawnRequest) -> Result<SpawnedShell, SpawnError>;
}

/// Spawns real shells through the platform's native PTY system.
pub struct NativeSpawner {
    command: ShellCommand,
}

impl NativeSpawner {
    pub fn new(command: ShellCommand) -> Self {
        Self { command }
    }

    fn build_command(&self, request: &SpawnRequest) -> CommandBuilder {
        let mut cmd = CommandBuilder::new(&self.command.program);
        cmd.args(&self.command.args);
        for (key, value) in &self.command.env {
            cmd.env(key, value);
        }
        cmd.cwd(&request.working_dir);
        cmd
    }
}

impl PtySpawner for NativeSpawner {
    fn spawn(&self, request: &SpawnRequest) -> Result<SpawnedShell, SpawnError> {
        if !request.working_dir.is_dir() {
            return Err(SpawnError::MissingDirectory {
                path: request.working_dir.clone(),
            });
        }

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: request.rows,
                cols: request.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| SpawnError::PtyUnavailable {
                reason: format!("{e:#}"),
            })?;

        let child = pair
            .slave
            .spawn_command(self.build_command(request))
            .context("Failed to spawn shell")
            .map_err(|e| SpawnError::classify(&self.command.program, &e))?;
        // Drop the slave so the reader sees EOF once the shell is gone.
        drop(pair.slave);

        let pty_unavailable = |e: anyhow::Error| SpawnError::PtyUnavailable {
            reason: format!("{e:#}"),
        };
        let writer = pair
            .master
            .take_writer()
            .context("Failed to get PTY writer")
            .map_err(pty_unavailable)?;
        let output = pair
            .master
            .try_clone_reader()
            .context("Failed to get PTY reader")
            .map_err(pty_unavailable)?;
        let killer = child.clone_killer();

        tracing::debug!(
            session = %request.session,
            shell = %self.command.program,
            pid = ?child.process_id(),
            cwd = %request.working_dir.display(),
            "Spawned shell"
        );

        Ok(SpawnedShell {
            control: Box::new(PtyHandler {
                master: pair.master,
                writer,
                killer,
            }),
            output,
            waiter: Box::new(ChildWaiter { child }),
        })
    }
}

/// Control half of a native PTY.
struct PtyHandler {
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    killer: Box<dyn ChildKiller + Send + Sync>,
}

impl PtyControl for PtyHandler {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.writer.flush()?;
        Ok(())
    }

    fn resize(&mut self, cols: u16, rows: u16) -> Result<()> {
        self.master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .context("Failed to resize PTY")?;
        Ok(())
    }

    fn kill(&mut self) -> Result<()> {
        self.killer.kill().context("Failed to kill shell")?;
        Ok(())
    }
}

struct ChildWaiter {
    child: Box<dyn Child + Send + Sync>,
}

impl ExitWaiter for ChildWaiter {
    fn wait(mut self: Box<Self>) -> ExitStatus {
        match self.child.wait() {
            Ok(status) => status.into(),
            Err(e) => {
                tracing::debug!("Wait for child process: {}", e);
                ExitStatus::with_code(1)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unix_shell_is_login_shell_with_utf8_env() {
        let cmd = ShellCommand::unix("/bin/zsh".into(), Some("/usr/bin".into()));
        assert_eq!(cmd.program, "/bin/zsh");
        assert_eq!(cmd.args, vec!["-l"]);
        assert!(cmd.env.contains(&("TERM".into(), "xterm-256color".into())));
        assert!(cmd.env.contains(&("LC_ALL".into(), "en_US.UTF-8".into())));
        assert!(cmd.env.contains(&("COLORTERM".into(), "truecolor".into())));
        assert!(cmd.env.contains(&("PATH".into(), "/usr/bin".into())));
    }

    #[test]
    fn unix_shell_gets_fallback_path() {
        let cmd = ShellCommand::unix("/bin/bash".into(), None);
        let path = cmd.env.iter().find(|(k, _)| k == "PATH").map(|(_, v)| v);
        assert_eq!(path.map(String::as_str), Some(terminal::FALLBACK_PATH));

        let cmd = ShellCommand::unix("/bin/bash".into(), Some(String::new()));
        let path = cmd.env.iter().find(|(k, _)| k == "PATH").map(|(_, v)| v);
        assert_eq!(path.map(String::as_str), Some(terminal::FALLBACK_PATH));
    }

    #[test]
    fn windows_shell_forces_python_utf8() {
        let cmd = ShellCommand::windows("powershell.exe".into());
        assert!(cmd.args.is_empty());
        assert!(cmd.env.contains(&("PYTHONIOENCODING".into(), "utf-8".into())));
    }

    #[test]
    fn missing_working_dir_is_reported_before_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("gone");
        let spawner = NativeSpawner::new(ShellCommand::unix("/bin/sh".into(), None));
        let result = spawner.spawn(&SpawnRequest {
            session: SessionId::Main,
            working_dir: gone.clone(),
            cols: 80,
            rows: 24,
        });
        assert_eq!(
            result.err(),
            Some(SpawnError::MissingDirectory { path: gone })
        );
    }
}
