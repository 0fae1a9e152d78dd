use anyhow::{Context as _, Result};

/// Opens URLs outside the application.
pub trait Browser: Send + Sync {
    fn open(&self, url: &str) -> Result<()>;
}

/// The user's default browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl Browser for SystemBrowser {
    // Fire-and-forget launch, blocking is fine
    #[allow(clippy::disallowed_methods)]
    fn open(&self, url: &str) -> Result<()> {
        #[cfg(target_os = "macos")]
        let spawned = std::process::Command::new("open").arg(url).spawn();
        #[cfg(target_os = "windows")]
        let spawned = std::process::Command::new("cmd")
            .args(["/C", "start", "", url])
            .spawn();
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        let spawned = std::process::Command::new("xdg-open").arg(url).spawn();

        spawned.with_context(|| format!("Failed to open {url}"))?;
        tracing::info!(url, "Opened in browser");
        Ok(())
    }
}
