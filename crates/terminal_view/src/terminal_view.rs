//! Terminal view layer.
//!
//! Emulator widgets bound to sessions, keyboard encoding, clipboard
//! shortcuts, and the session multiplexer that owns widget lifecycle.

mod clipboard;
mod headless;
mod keys;
mod multiplexer;
mod widget;

pub use clipboard::{strip_ansi, COPY_CONFIRMATION};
pub use headless::{HeadlessFactory, HeadlessTerminal, TermSize};
pub use keys::{encode_key, KeyInput, KeyModifiers, Shortcut};
pub use multiplexer::{ContextMenuPrompt, KeyOutcome, Launch, SessionMode, SessionMultiplexer};
pub use widget::{Container, TerminalWidget, WidgetFactory};
