//! The session hub.
//!
//! Single owner of the process registry, the widgets, the URL watcher and
//! the injector. Whatever drives the UI holds one `SessionHub` and feeds it
//! events with [`SessionHub::pump`] or [`SessionHub::next_event`].

use crate::router::{self, Routed};
use crate::{
    ActionContext, AssistantCli, CommandInjector, Injection, InjectionError, ProjectFiles,
    ScriptCatalog, ShellFlavor, SidebarAction, TabSignal, UrlPolicy, UrlWatcher,
};
use anyhow::{Context as _, Result};
use collections::IndexMap;
use platform::{Browser, Clipboard};
use settings::{Config, TimingConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use terminal::{ProcessRegistry, PtyEvent, PtySpawner, SessionId};
use terminal_view::{
    Container, ContextMenuPrompt, KeyInput, KeyOutcome, Launch, SessionMode, SessionMultiplexer,
    TerminalWidget, WidgetFactory,
};
use tokio::runtime::Handle;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

/// Everything the hub talks to outside the terminal subsystem.
pub struct Collaborators {
    pub spawner: Arc<dyn PtySpawner>,
    pub widgets: Arc<dyn WidgetFactory>,
    pub clipboard: Arc<dyn Clipboard>,
    pub browser: Arc<dyn Browser>,
    pub project: Arc<dyn ProjectFiles>,
    pub scripts: Arc<dyn ScriptCatalog>,
    pub assistant: Arc<dyn AssistantCli>,
}

/// Which sessions exist at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Layout {
    /// Main, doctor and exec tabs.
    #[default]
    Tabs,
    /// A single terminal for running scripts.
    ExecOnly,
}

impl Layout {
    pub fn sessions(self) -> Vec<SessionId> {
        match self {
            Layout::Tabs => SessionId::WELL_KNOWN.to_vec(),
            Layout::ExecOnly => vec![SessionId::Main],
        }
    }
}

enum Wake {
    TabSwitch(Result<SessionId, RecvError>),
    Pty(Option<PtyEvent>),
}

pub struct SessionHub {
    registry: Arc<ProcessRegistry>,
    events: UnboundedReceiver<PtyEvent>,
    mux: SessionMultiplexer,
    watcher: UrlWatcher,
    injector: CommandInjector,
    tabs: TabSignal,
    tab_switches: broadcast::Receiver<SessionId>,
    project: Arc<dyn ProjectFiles>,
    scripts: Arc<dyn ScriptCatalog>,
    runtime: Handle,
    container: Container,
    working_dir: PathBuf,
    assistant_invocation: String,
    timing: TimingConfig,
}

impl SessionHub {
    pub fn new(collaborators: Collaborators, config: &Config, runtime: Handle) -> Self {
        let Collaborators {
            spawner,
            widgets,
            clipboard,
            browser,
            project,
            scripts,
            assistant,
        } = collaborators;

        let (registry, events) = ProcessRegistry::new(spawner);
        let registry = Arc::new(registry);
        let tabs = TabSignal::new();
        let tab_switches = tabs.subscribe();

        let mux = SessionMultiplexer::new(
            registry.clone(),
            widgets,
            clipboard.clone(),
            runtime.clone(),
            config.timing.auto_command_delay(),
        );
        let watcher = UrlWatcher::new(clipboard, browser);
        let injector = CommandInjector::new(registry.clone(), tabs.clone(), assistant, &config.timing);

        let working_dir = project.default_project_path();
        scripts.open_project(&working_dir);
        tracing::info!(dir = %working_dir.display(), "Session hub ready");

        Self {
            registry,
            events,
            mux,
            watcher,
            injector,
            tabs,
            tab_switches,
            project,
            scripts,
            runtime,
            container: Container::for_grid(
                settings::constants::terminal::DEFAULT_COLS,
                settings::constants::terminal::DEFAULT_ROWS,
            ),
            working_dir,
            assistant_invocation: config.assistant_invocation(),
            timing: config.timing,
        }
    }

    pub fn set_url_policy(&mut self, policy: UrlPolicy) {
        self.watcher.set_policy(policy);
    }

    /// Create the startup sessions in the project folder and focus main.
    /// Returns how many got a running shell.
    pub fn bootstrap(&mut self, container: Container, layout: Layout) -> usize {
        self.container = container;
        let mut running = 0;
        for id in layout.sessions() {
            let launch = Launch::in_dir(&self.working_dir);
            if self.create(&id, launch) && self.registry.is_alive(&id) {
                running += 1;
            }
        }
        self.mux.focus(&SessionId::Main);
        tracing::info!(?layout, running, "Sessions started");
        running
    }

    /// Create the widget and shell for `id`. No-op if it already exists.
    pub fn create(&mut self, id: &SessionId, launch: Launch) -> bool {
        self.mux.initialize(id, self.container, launch).is_some()
    }

    /// Keystroke bytes from the UI. Dropped in selection mode.
    pub fn write(&self, id: &SessionId, bytes: &[u8]) -> bool {
        self.mux.handle_input(id, bytes)
    }

    pub fn send_key(&mut self, id: &SessionId, key: &KeyInput) -> KeyOutcome {
        self.mux.handle_key(id, key)
    }

    /// The terminal area changed size.
    pub fn resize(&mut self, container: Container) {
        self.container = container;
        self.mux.resize_all_to_fit(container);
    }

    /// Stop the shell of `id`. The widget stays and shows no process.
    pub fn kill(&mut self, id: &SessionId) {
        self.registry.kill(id);
        self.watcher.reset(id);
        self.mux.mark_exited(id);
    }

    pub fn set_mode(&mut self, id: &SessionId, mode: SessionMode) -> bool {
        self.mux.set_mode(id, mode)
    }

    /// Kill, dispose the widget, wait, then create the session again with
    /// the same launch settings.
    pub async fn restart(&mut self, id: &SessionId) -> bool {
        let launch = self
            .mux
            .launch(id)
            .cloned()
            .unwrap_or_else(|| Launch::in_dir(&self.working_dir));
        let was_active = self.mux.active() == Some(id);

        self.kill(id);
        self.mux.dispose(id);
        tokio::time::sleep(self.timing.restart_delay()).await;

        let created = self.create(id, launch);
        if created && was_active {
            self.mux.focus(id);
        }
        tracing::info!(session = %id, created, "Session restarted");
        created
    }

    pub fn clear(&mut self, id: &SessionId) -> bool {
        self.mux.clear(id)
    }

    pub fn focus(&mut self, id: &SessionId) -> bool {
        self.mux.focus(id)
    }

    pub fn select_all(&mut self, id: &SessionId) -> bool {
        self.mux.select_all(id)
    }

    pub fn copy_selection(&mut self, id: &SessionId) -> bool {
        self.mux.copy_selection(id)
    }

    pub fn paste(&self, id: &SessionId) -> bool {
        self.mux.paste(id)
    }

    pub fn context_menu(&self, id: &SessionId) -> Option<ContextMenuPrompt> {
        self.mux.context_menu(id)
    }

    pub fn apply_context_menu(&mut self, id: &SessionId, prompt: ContextMenuPrompt) -> bool {
        self.mux.apply_context_menu(id, prompt)
    }

    /// Move every session to `dir` by typing `cd` into it, and remember the
    /// folder for the next launch. Relative paths resolve against the
    /// current project folder.
    pub fn change_directory(&mut self, dir: &Path) -> Result<()> {
        let dir = self
            .working_dir
            .join(dir)
            .canonicalize()
            .with_context(|| format!("{} not found", dir.display()))?;
        if dir == self.working_dir {
            return Ok(());
        }
        anyhow::ensure!(dir.is_dir(), "{} is not a directory", dir.display());
        let dir = dir.as_path();

        let cd = format!("cd \"{}\"\r", dir.display());
        for id in self.mux.session_ids() {
            self.registry.write(&id, cd.as_bytes());
            self.mux.set_working_dir(&id, dir);
        }
        self.working_dir = dir.to_path_buf();
        self.scripts.open_project(dir);
        tracing::info!(dir = %dir.display(), "Changed project directory");

        self.project
            .save_current_path(dir)
            .context("Failed to remember project directory")
    }

    /// Prepare a sidebar action and run its injection in the background.
    pub fn run_action(
        &self,
        action: &SidebarAction,
    ) -> Result<JoinHandle<Result<(), InjectionError>>> {
        let cx = ActionContext {
            project_root: &self.working_dir,
            assistant: &self.assistant_invocation,
            flavor: ShellFlavor::current(),
            sync_follow_up: self.timing.sync_follow_up(),
            files: self.project.as_ref(),
            scripts: self.scripts.as_ref(),
        };
        let injection = action.prepare(&cx)?;
        Ok(self.spawn_injection(injection))
    }

    /// Run an injection in the background.
    pub fn spawn_injection(&self, injection: Injection) -> JoinHandle<Result<(), InjectionError>> {
        let injector = self.injector.clone();
        self.runtime.spawn(async move {
            let result = injector.inject(&injection).await;
            if let Err(e) = &result {
                tracing::warn!(session = %injection.target, "Injection refused: {}", e);
            }
            result
        })
    }

    pub fn list_scripts(&self) -> Result<IndexMap<String, String>> {
        self.scripts.list_scripts()
    }

    pub fn delete_script(&self, name: &str) -> Result<()> {
        self.scripts.delete_script(name)
    }

    /// Route everything already queued. Never waits.
    pub fn pump(&mut self) -> Vec<Routed> {
        self.drain_tab_switches();
        let mut routed = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            routed.push(self.route(event));
        }
        routed
    }

    /// Wait for the next process event and route it. Tab switches raised in
    /// the meantime are applied on the way.
    pub async fn next_event(&mut self) -> Option<Routed> {
        loop {
            let wake = tokio::select! {
                biased;
                switch = self.tab_switches.recv() => Wake::TabSwitch(switch),
                event = self.events.recv() => Wake::Pty(event),
            };
            match wake {
                Wake::TabSwitch(Ok(id)) => self.on_tab_switch(&id),
                Wake::TabSwitch(Err(RecvError::Lagged(skipped))) => {
                    tracing::debug!(skipped, "Missed tab switches");
                }
                Wake::TabSwitch(Err(RecvError::Closed)) => {}
                Wake::Pty(event) => return event.map(|event| self.route(event)),
            }
        }
    }

    fn drain_tab_switches(&mut self) {
        loop {
            match self.tab_switches.try_recv() {
                Ok(id) => self.on_tab_switch(&id),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Missed tab switches");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }

    fn on_tab_switch(&mut self, id: &SessionId) {
        if self.mux.focus(id) {
            tracing::debug!(session = %id, "Switched tab");
        }
    }

    fn route(&mut self, event: PtyEvent) -> Routed {
        router::route(event, &mut self.mux, &mut self.watcher)
    }

    /// Kill every shell and dispose every widget.
    pub fn shutdown(&mut self) {
        for id in self.mux.session_ids() {
            self.watcher.reset(&id);
        }
        self.registry.kill_all();
        self.mux.dispose_all();
        tracing::info!("Session hub shut down");
    }

    pub fn registry(&self) -> &Arc<ProcessRegistry> {
        &self.registry
    }

    pub fn tabs(&self) -> &TabSignal {
        &self.tabs
    }

    pub fn watcher(&self) -> &UrlWatcher {
        &self.watcher
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn active(&self) -> Option<&SessionId> {
        self.mux.active()
    }

    pub fn sessions(&self) -> Vec<SessionId> {
        self.mux.session_ids()
    }

    pub fn mode(&self, id: &SessionId) -> Option<SessionMode> {
        self.mux.mode(id)
    }

    pub fn widget(&self, id: &SessionId) -> Option<&dyn TerminalWidget> {
        self.mux.widget(id)
    }

    pub fn screen_text(&self, id: &SessionId) -> Option<String> {
        self.widget(id).map(|widget| widget.screen_text())
    }
}
