use std::fmt;
use std::str::FromStr;

/// Identity of one logical terminal tab.
///
/// The three well-known sessions are pre-created at startup. `AdHoc` covers
/// any extra session a caller asks for by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SessionId {
    /// General-purpose shell in the project root.
    Main,
    /// Shell that hosts the assistant CLI.
    Doctor,
    /// Shell used for running project scripts.
    Exec,
    AdHoc(String),
}

impl SessionId {
    /// Sessions created eagerly when the workspace boots, in tab order.
    pub const WELL_KNOWN: [SessionId; 3] = [SessionId::Main, SessionId::Doctor, SessionId::Exec];

    /// Prefix used in user-facing status lines ("Doctor terminal exited").
    pub fn label(&self) -> &str {
        match self {
            SessionId::Main => "",
            SessionId::Doctor => "Doctor ",
            SessionId::Exec => "Exec ",
            SessionId::AdHoc(_) => "",
        }
    }

    pub fn is_well_known(&self) -> bool {
        !matches!(self, SessionId::AdHoc(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            SessionId::Main => "main",
            SessionId::Doctor => "doctor",
            SessionId::Exec => "exec",
            SessionId::AdHoc(name) => name,
        }
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("session id must not be empty")]
pub struct EmptySessionId;

impl FromStr for SessionId {
    type Err = EmptySessionId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "" => Err(EmptySessionId),
            "main" => Ok(SessionId::Main),
            "doctor" | "assistant" | "claude" => Ok(SessionId::Doctor),
            "exec" => Ok(SessionId::Exec),
            _ => Ok(SessionId::AdHoc(s.to_string())),
        }
    }
}
