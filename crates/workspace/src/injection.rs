//! Redirecting a running session to a new command.
//!
//! The sequence is fixed: raise the tab, wait for it to settle, send an
//! interrupt, wait for the shell to print a prompt, then type the command.
//! The shell is never asked whether it is ready.

use crate::{AssistantCli, TabSignal};
use std::sync::Arc;
use std::time::Duration;
use terminal::{ProcessRegistry, SessionId};

const INTERRUPT: &[u8] = b"\x03";

/// Text typed into a session some time after the command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowUp {
    pub delay: Duration,
    pub writes: Vec<String>,
}

/// A command to run in another session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Injection {
    pub target: SessionId,
    pub command: String,
    /// Refuse unless the assistant CLI is installed.
    pub requires_assistant: bool,
    pub follow_up: Option<FollowUp>,
}

impl Injection {
    pub fn new(target: SessionId, command: impl Into<String>) -> Self {
        Self {
            target,
            command: command.into(),
            requires_assistant: false,
            follow_up: None,
        }
    }

    pub fn requiring_assistant(mut self) -> Self {
        self.requires_assistant = true;
        self
    }

    pub fn with_follow_up(mut self, delay: Duration, writes: Vec<String>) -> Self {
        self.follow_up = Some(FollowUp { delay, writes });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InjectionError {
    #[error("{cli} is not installed")]
    AssistantNotInstalled { cli: String },
}

/// Runs [`Injection`]s against the process registry.
#[derive(Clone)]
pub struct CommandInjector {
    registry: Arc<ProcessRegistry>,
    tabs: TabSignal,
    assistant: Arc<dyn AssistantCli>,
    tab_switch_delay: Duration,
    interrupt_delay: Duration,
}

impl CommandInjector {
    pub fn new(
        registry: Arc<ProcessRegistry>,
        tabs: TabSignal,
        assistant: Arc<dyn AssistantCli>,
        timing: &settings::TimingConfig,
    ) -> Self {
        Self {
            registry,
            tabs,
            assistant,
            tab_switch_delay: timing.tab_switch_delay(),
            interrupt_delay: timing.interrupt_delay(),
        }
    }

    /// Run the sequence. Returns once the command has been written; a
    /// follow-up keeps running in the background.
    pub async fn inject(&self, injection: &Injection) -> Result<(), InjectionError> {
        if injection.requires_assistant {
            self.check_assistant().await?;
        }

        let target = &injection.target;
        self.tabs.raise(target);
        tokio::time::sleep(self.tab_switch_delay).await;

        tracing::debug!(session = %target, "Interrupting before injection");
        self.registry.write(target, INTERRUPT);
        tokio::time::sleep(self.interrupt_delay).await;

        tracing::info!(session = %target, command = %injection.command, "Injecting command");
        self.registry
            .write(target, format!("{}\r", injection.command).as_bytes());

        if let Some(follow_up) = injection.follow_up.clone() {
            self.schedule_follow_up(target.clone(), follow_up);
        }
        Ok(())
    }

    async fn check_assistant(&self) -> Result<(), InjectionError> {
        let assistant = self.assistant.clone();
        let installed = tokio::task::spawn_blocking(move || assistant.is_installed())
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Assistant probe panicked: {}", e);
                false
            });
        if installed {
            Ok(())
        } else {
            Err(InjectionError::AssistantNotInstalled {
                cli: self.assistant.name(),
            })
        }
    }

    fn schedule_follow_up(&self, target: SessionId, follow_up: FollowUp) {
        let registry = self.registry.clone();
        tracing::debug!(session = %target, delay = ?follow_up.delay, "Scheduled follow-up");
        tokio::spawn(async move {
            tokio::time::sleep(follow_up.delay).await;
            for text in &follow_up.writes {
                registry.write(&target, text.as_bytes());
            }
            tracing::info!(session = %target, "Sent follow-up");
        });
    }
}
