//! Terminal process core.
//!
//! Session identities, PTY-backed shell spawning and the process registry.
//! Nothing in here knows about widgets; output leaves this crate as
//! [`PtyEvent`]s on a channel.

mod error;
mod events;
mod pty_handler;
mod registry;
mod session_id;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use error::SpawnError;
pub use events::{ExitStatus, ProcessGeneration, PtyEvent};
pub use pty_handler::{
    ExitWaiter, NativeSpawner, PtyControl, PtySpawner, ShellCommand, SpawnRequest, SpawnedShell,
};
pub use registry::ProcessRegistry;
pub use session_id::{EmptySessionId, SessionId};
