//! Shared fixtures for the session hub integration tests.

#![allow(dead_code)]

use pdesk_workspace::{
    AssistantCli, Collaborators, Layout, LocalProject, PackageJsonScripts, Routed, SessionHub,
};
use platform::{MemoryClipboard, SystemBrowser};
use settings::Config;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use terminal::fake::FakeSpawner;
use terminal_view::{Container, HeadlessFactory};

/// Upper bound for waiting on reader-thread output in real time.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Assistant whose availability the test flips.
#[derive(Default)]
pub struct StubAssistant {
    installed: AtomicBool,
}

impl StubAssistant {
    pub fn installed(yes: bool) -> Arc<Self> {
        Arc::new(Self {
            installed: AtomicBool::new(yes),
        })
    }

    pub fn set_installed(&self, yes: bool) {
        self.installed.store(yes, Ordering::SeqCst);
    }
}

impl AssistantCli for StubAssistant {
    fn is_installed(&self) -> bool {
        self.installed.load(Ordering::SeqCst)
    }

    fn name(&self) -> String {
        "claude".to_string()
    }
}

/// A hub over fake shells, a headless widget per session and a project
/// folder in a temp dir.
pub struct TestEnv {
    pub hub: SessionHub,
    pub spawner: FakeSpawner,
    pub clipboard: MemoryClipboard,
    pub assistant: Arc<StubAssistant>,
    pub project: TempDir,
    pub config_dir: TempDir,
}

impl TestEnv {
    /// Must be called inside a tokio runtime.
    pub fn new() -> Self {
        Self::with_layout(Layout::Tabs)
    }

    pub fn with_layout(layout: Layout) -> Self {
        let project = tempfile::tempdir().expect("Failed to create project dir");
        let config_dir = tempfile::tempdir().expect("Failed to create config dir");
        let spawner = FakeSpawner::new();
        let clipboard = MemoryClipboard::new();
        let assistant = StubAssistant::installed(true);

        let collaborators = Collaborators {
            spawner: Arc::new(spawner.clone()),
            widgets: Arc::new(HeadlessFactory::new(1_000)),
            clipboard: Arc::new(clipboard.clone()),
            browser: Arc::new(SystemBrowser),
            project: Arc::new(LocalProject::new(
                config_dir.path().join("last_path.txt"),
                project.path(),
            )),
            scripts: Arc::new(PackageJsonScripts::new(project.path())),
            assistant: assistant.clone(),
        };
        let mut hub = SessionHub::new(
            collaborators,
            &Config::default(),
            tokio::runtime::Handle::current(),
        );
        hub.bootstrap(Container::for_grid(120, 40), layout);

        Self {
            hub,
            spawner,
            clipboard,
            assistant,
            project,
            config_dir,
        }
    }

    /// Wait for the next routed event, failing the test after
    /// [`DEFAULT_TIMEOUT`]. Not for paused-time tests.
    pub async fn next(&mut self) -> Routed {
        match tokio::time::timeout(DEFAULT_TIMEOUT, self.hub.next_event()).await {
            Ok(Some(routed)) => routed,
            Ok(None) => panic!("event channel closed"),
            Err(_) => panic!("no event within {DEFAULT_TIMEOUT:?}"),
        }
    }

    /// Route `count` events.
    pub async fn drain(&mut self, count: usize) -> Vec<Routed> {
        let mut routed = Vec::with_capacity(count);
        for _ in 0..count {
            routed.push(self.next().await);
        }
        routed
    }

    pub fn screen(&self, id: &terminal::SessionId) -> String {
        self.hub.screen_text(id).unwrap_or_default()
    }
}
