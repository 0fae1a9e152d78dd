use crate::SessionId;
use std::fmt;

/// Distinguishes successive processes spawned under the same session id.
///
/// Every `create` hands out a fresh, strictly increasing generation so that
/// events still in flight from a killed or replaced process can be told apart
/// from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessGeneration(pub u64);

impl fmt::Display for ProcessGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a shell process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitStatus {
    /// Exit code as reported by the PTY layer.
    pub code: u32,
    /// Name of the signal that ended the process, if any.
    pub signal: Option<String>,
}

impl ExitStatus {
    pub fn with_code(code: u32) -> Self {
        Self { code, signal: None }
    }

    pub fn success(&self) -> bool {
        self.code == 0 && self.signal.is_none()
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code: {}", self.code)?;
        if let Some(signal) = &self.signal {
            write!(f, ", signal: {signal}")?;
        }
        Ok(())
    }
}

impl From<portable_pty::ExitStatus> for ExitStatus {
    fn from(status: portable_pty::ExitStatus) -> Self {
        // The signal name is only exposed through Display.
        let signal = status
            .to_string()
            .strip_prefix("Terminated by ")
            .map(str::to_owned);
        Self {
            code: status.exit_code(),
            signal,
        }
    }
}

/// Notification emitted by the process registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PtyEvent {
    /// A chunk of bytes read from the shell, in emission order.
    Output {
        id: SessionId,
        generation: ProcessGeneration,
        bytes: Vec<u8>,
    },
    /// The shell exited on its own. Sent at most once per generation and
    /// always after that generation's last `Output`.
    Exit {
        id: SessionId,
        generation: ProcessGeneration,
        status: ExitStatus,
    },
}

impl PtyEvent {
    pub fn session(&self) -> &SessionId {
        match self {
            PtyEvent::Output { id, .. } | PtyEvent::Exit { id, .. } => id,
        }
    }

    pub fn generation(&self) -> ProcessGeneration {
        match self {
            PtyEvent::Output { generation, .. } | PtyEvent::Exit { generation, .. } => *generation,
        }
    }
}
