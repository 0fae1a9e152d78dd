use std::process::{Command, Stdio};

/// Whether the assistant CLI can be launched.
#[cfg_attr(test, mockall::automock)]
pub trait AssistantCli: Send + Sync {
    fn is_installed(&self) -> bool;

    /// Executable name, for messages.
    fn name(&self) -> String;
}

/// Runs `<cli> --help` the way a terminal tab would find it.
///
/// On Unix the probe goes through a login shell so `PATH` additions from the
/// user's profile (nvm, npm global prefix) apply.
#[derive(Debug, Clone)]
pub struct LoginShellProbe {
    cli: String,
}

impl LoginShellProbe {
    pub fn new(cli: impl Into<String>) -> Self {
        Self { cli: cli.into() }
    }

    fn probe_commands(&self) -> Vec<Command> {
        let check = format!("{} --help", self.cli);
        if cfg!(target_os = "windows") {
            let mut direct = Command::new("cmd");
            direct.args(["/C", &check]);
            let mut powershell = Command::new("powershell");
            powershell.args(["-Command", &check]);
            vec![direct, powershell]
        } else {
            let mut login = Command::new("/bin/bash");
            login.args(["-l", "-c", &check]);
            vec![login]
        }
    }
}

impl AssistantCli for LoginShellProbe {
    // Short-lived probe, callers run it off the async threads
    #[allow(clippy::disallowed_methods)]
    fn is_installed(&self) -> bool {
        for mut command in self.probe_commands() {
            let status = command
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
            match status {
                Ok(status) if status.success() => {
                    tracing::info!(cli = %self.cli, "Assistant CLI found");
                    return true;
                }
                Ok(status) => tracing::debug!(cli = %self.cli, ?status, "Assistant probe failed"),
                Err(e) => tracing::debug!(cli = %self.cli, "Assistant probe did not run: {}", e),
            }
        }
        tracing::warn!(cli = %self.cli, "Assistant CLI not installed");
        false
    }

    fn name(&self) -> String {
        self.cli.clone()
    }
}
