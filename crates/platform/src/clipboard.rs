use anyhow::{anyhow, Context as _, Result};
use parking_lot::Mutex;
use std::sync::Arc;

/// Text clipboard shared by every session.
pub trait Clipboard: Send + Sync {
    fn read_text(&self) -> Result<String>;
    fn write_text(&self, text: &str) -> Result<()>;
}

/// The OS clipboard via `arboard`.
///
/// The handle is opened lazily on first use and kept afterwards; on Linux the
/// clipboard contents only survive while the owning handle is alive.
#[derive(Default)]
pub struct SystemClipboard {
    handle: Mutex<Option<arboard::Clipboard>>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_handle<R>(
        &self,
        f: impl FnOnce(&mut arboard::Clipboard) -> Result<R, arboard::Error>,
    ) -> Result<R> {
        let mut guard = self.handle.lock();
        if guard.is_none() {
            *guard = Some(arboard::Clipboard::new().context("Failed to open system clipboard")?);
        }
        let clipboard = guard
            .as_mut()
            .ok_or_else(|| anyhow!("system clipboard unavailable"))?;
        match f(clipboard) {
            Ok(value) => Ok(value),
            Err(e) => {
                // Drop the handle so the next call reconnects.
                *guard = None;
                Err(e.into())
            }
        }
    }
}

impl Clipboard for SystemClipboard {
    fn read_text(&self) -> Result<String> {
        self.with_handle(|clipboard| clipboard.get_text())
            .context("Failed to read clipboard")
    }

    fn write_text(&self, text: &str) -> Result<()> {
        self.with_handle(|clipboard| clipboard.set_text(text.to_owned()))
            .context("Failed to write clipboard")?;
        tracing::debug!(len = text.len(), "Copied to clipboard");
        Ok(())
    }
}

/// In-process clipboard. Used when no display is available and in tests.
///
/// Clones share the same contents and write history.
#[derive(Clone, Default)]
pub struct MemoryClipboard {
    writes: Arc<Mutex<Vec<String>>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the clipboard, as if another application had copied `text`.
    pub fn set(&self, text: impl Into<String>) {
        self.writes.lock().push(text.into());
    }

    /// Every value written so far, oldest first.
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().clone()
    }
}

impl Clipboard for MemoryClipboard {
    fn read_text(&self) -> Result<String> {
        self.writes
            .lock()
            .last()
            .cloned()
            .ok_or_else(|| anyhow!("clipboard is empty"))
    }

    fn write_text(&self, text: &str) -> Result<()> {
        self.writes.lock().push(text.to_owned());
        Ok(())
    }
}
