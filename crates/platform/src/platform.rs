//! Platform integrations.
//!
//! System clipboard access and opening URLs in the user's browser. Both sit
//! behind small traits so session logic can run without a desktop session.

mod browser;
mod clipboard;

pub use browser::{Browser, SystemBrowser};
pub use clipboard::{Clipboard, MemoryClipboard, SystemClipboard};
