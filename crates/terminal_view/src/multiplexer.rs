//! Session multiplexer.
//!
//! Binds one terminal widget to each session id, keeps widgets fitted to the
//! terminal area, and decides whether keystrokes reach the shell.

use crate::{
    encode_key, strip_ansi, Container, KeyInput, Shortcut, TerminalWidget, WidgetFactory,
    COPY_CONFIRMATION,
};
use collections::IndexMap;
use platform::Clipboard;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use terminal::{ProcessGeneration, ProcessRegistry, SessionId};
use tokio::runtime::Handle;
use util::ResultExt as _;

/// Whether a session takes keystrokes or lets the user select text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionMode {
    #[default]
    Input,
    Selection,
}

/// How to start a session's shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launch {
    pub working_dir: PathBuf,
    /// Typed into the shell once it had time to print its prompt.
    pub auto_command: Option<String>,
}

impl Launch {
    pub fn in_dir(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            auto_command: None,
        }
    }

    pub fn with_auto_command(mut self, command: impl Into<String>) -> Self {
        self.auto_command = Some(command.into());
        self
    }
}

/// What a key press turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Encoded and written to the shell.
    Forwarded,
    /// Selection copied to the clipboard.
    Copied,
    /// Clipboard pasted into the shell.
    Pasted,
    /// Nothing happened (unknown session, stdin disabled, no encoding).
    Ignored,
}

/// Right-click prompt offered for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextMenuPrompt {
    /// Selection is non-empty: offer to copy it.
    Copy { text: String },
    /// Nothing selected: offer to paste the clipboard.
    Paste { text: String },
}

struct Binding {
    widget: Box<dyn TerminalWidget>,
    mode: SessionMode,
    /// Process the widget is currently showing. `None` after a failed
    /// spawn or once the process exited.
    generation: Option<ProcessGeneration>,
    launch: Launch,
}

/// Owner of every session's widget.
pub struct SessionMultiplexer {
    registry: Arc<ProcessRegistry>,
    factory: Arc<dyn WidgetFactory>,
    clipboard: Arc<dyn Clipboard>,
    runtime: Handle,
    auto_command_delay: Duration,
    bindings: IndexMap<SessionId, Binding>,
    active: Option<SessionId>,
}

impl SessionMultiplexer {
    pub fn new(
        registry: Arc<ProcessRegistry>,
        factory: Arc<dyn WidgetFactory>,
        clipboard: Arc<dyn Clipboard>,
        runtime: Handle,
        auto_command_delay: Duration,
    ) -> Self {
        Self {
            registry,
            factory,
            clipboard,
            runtime,
            auto_command_delay,
            bindings: collections::index_map(),
            active: None,
        }
    }

    pub fn registry(&self) -> &Arc<ProcessRegistry> {
        &self.registry
    }

    /// Create the widget for `id`, fit it, and start its shell.
    ///
    /// Returns the existing widget if `id` is already initialized, and `None`
    /// when the container has no usable area.
    pub fn initialize(
        &mut self,
        id: &SessionId,
        container: Container,
        launch: Launch,
    ) -> Option<&dyn TerminalWidget> {
        if self.bindings.contains_key(id) {
            tracing::debug!(session = %id, "Session already initialized");
            return self.widget(id);
        }
        if container.grid().is_none() {
            tracing::warn!(session = %id, ?container, "Container has no area, skipping widget");
            return None;
        }

        let mut widget = self.factory.create(id);
        widget.fit(container);
        self.bindings.insert(
            id.clone(),
            Binding {
                widget,
                mode: SessionMode::Input,
                generation: None,
                launch,
            },
        );
        self.start_process(id);
        self.widget(id)
    }

    fn start_process(&mut self, id: &SessionId) {
        let Some(binding) = self.bindings.get_mut(id) else {
            util::debug_panic!("starting a process for {id} without a widget");
            return;
        };

        match self.registry.create(id, &binding.launch.working_dir) {
            Ok(generation) => {
                binding.generation = Some(generation);
                let (cols, rows) = binding.widget.size();
                self.registry.resize(id, cols, rows);
                if let Some(command) = binding.launch.auto_command.clone() {
                    self.schedule_auto_command(id.clone(), generation, command);
                }
            }
            Err(e) => {
                tracing::error!(session = %id, "Failed to spawn PTY: {}", e);
                binding.generation = None;
                binding.widget.write_display(e.diagnostic().as_bytes());
            }
        }
    }

    /// Type `command` into the shell after the settle delay, unless the
    /// process was replaced in the meantime.
    fn schedule_auto_command(&self, id: SessionId, generation: ProcessGeneration, command: String) {
        let registry = self.registry.clone();
        let delay = self.auto_command_delay;
        tracing::debug!(session = %id, %command, ?delay, "Scheduled auto-command");
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if registry.generation(&id) == Some(generation) {
                tracing::info!(session = %id, %command, "Running auto-command");
                registry.write(&id, format!("{command}\r").as_bytes());
            } else {
                tracing::debug!(session = %id, "Auto-command dropped, process replaced");
            }
        });
    }

    /// Destroy the widget for `id`. The process is left alone.
    pub fn dispose(&mut self, id: &SessionId) -> bool {
        let removed = self.bindings.shift_remove(id).is_some();
        if removed {
            tracing::debug!(session = %id, "Disposed terminal widget");
            if self.active.as_ref() == Some(id) {
                self.active = None;
            }
        }
        removed
    }

    /// Dispose every widget.
    pub fn dispose_all(&mut self) {
        self.bindings.clear();
        self.active = None;
    }

    /// Forward keystroke bytes to the shell when the session is in input mode.
    pub fn handle_input(&self, id: &SessionId, bytes: &[u8]) -> bool {
        let Some(binding) = self.bindings.get(id) else {
            return false;
        };
        if !binding.widget.stdin_enabled() {
            tracing::trace!(session = %id, "Input dropped, stdin disabled");
            return false;
        }
        self.registry.write(id, bytes);
        true
    }

    /// Handle a key press, intercepting clipboard shortcuts.
    pub fn handle_key(&mut self, id: &SessionId, key: &KeyInput) -> KeyOutcome {
        let Some(binding) = self.bindings.get(id) else {
            return KeyOutcome::Ignored;
        };

        match key.shortcut() {
            Some(Shortcut::Copy) if binding.widget.selection().is_some() => {
                return if self.copy_selection(id) {
                    KeyOutcome::Copied
                } else {
                    KeyOutcome::Ignored
                };
            }
            // Ctrl+C without a selection falls through as an interrupt
            Some(Shortcut::Copy) => {}
            Some(Shortcut::Paste) => {
                return if self.paste(id) {
                    KeyOutcome::Pasted
                } else {
                    KeyOutcome::Ignored
                };
            }
            None => {}
        }

        let Some(bytes) = encode_key(key, binding.widget.app_cursor()) else {
            return KeyOutcome::Ignored;
        };
        if let Some(binding) = self.bindings.get_mut(id) {
            binding.widget.clear_selection();
        }
        if self.handle_input(id, &bytes) {
            KeyOutcome::Forwarded
        } else {
            KeyOutcome::Ignored
        }
    }

    /// Copy the selection without color codes and confirm in the widget.
    pub fn copy_selection(&mut self, id: &SessionId) -> bool {
        let Some(binding) = self.bindings.get_mut(id) else {
            return false;
        };
        let Some(text) = binding.widget.selection() else {
            return false;
        };
        copy_text(self.clipboard.as_ref(), binding.widget.as_mut(), &text)
    }

    /// Paste the clipboard into the shell.
    pub fn paste(&self, id: &SessionId) -> bool {
        match self.clipboard.read_text().log_err() {
            Some(text) if !text.is_empty() => self.paste_text(id, &text),
            _ => false,
        }
    }

    fn paste_text(&self, id: &SessionId, text: &str) -> bool {
        let Some(binding) = self.bindings.get(id) else {
            return false;
        };
        if binding.widget.bracketed_paste() {
            let mut bytes = Vec::with_capacity(text.len() + 12);
            bytes.extend_from_slice(b"\x1b[200~");
            bytes.extend_from_slice(text.as_bytes());
            bytes.extend_from_slice(b"\x1b[201~");
            self.handle_input(id, &bytes)
        } else {
            self.handle_input(id, text.as_bytes())
        }
    }

    /// Prompt for a right-click: copy when text is selected, else paste.
    pub fn context_menu(&self, id: &SessionId) -> Option<ContextMenuPrompt> {
        let binding = self.bindings.get(id)?;
        if let Some(text) = binding.widget.selection() {
            return Some(ContextMenuPrompt::Copy { text });
        }
        let text = self.clipboard.read_text().log_debug()?;
        (!text.is_empty()).then_some(ContextMenuPrompt::Paste { text })
    }

    /// Carry out a confirmed context-menu prompt.
    pub fn apply_context_menu(&mut self, id: &SessionId, prompt: ContextMenuPrompt) -> bool {
        match prompt {
            ContextMenuPrompt::Copy { text } => {
                let Some(binding) = self.bindings.get_mut(id) else {
                    return false;
                };
                copy_text(self.clipboard.as_ref(), binding.widget.as_mut(), &text)
            }
            ContextMenuPrompt::Paste { text } => self.paste_text(id, &text),
        }
    }

    /// Switch between input and selection mode. The process is unaffected.
    pub fn set_mode(&mut self, id: &SessionId, mode: SessionMode) -> bool {
        let Some(binding) = self.bindings.get_mut(id) else {
            return false;
        };
        binding.mode = mode;
        match mode {
            SessionMode::Selection => {
                binding.widget.set_text_selection(true);
                binding.widget.set_stdin_enabled(false);
            }
            SessionMode::Input => {
                binding.widget.set_text_selection(false);
                binding.widget.set_stdin_enabled(true);
                binding.widget.focus();
            }
        }
        tracing::debug!(session = %id, ?mode, "Session mode changed");
        true
    }

    pub fn mode(&self, id: &SessionId) -> Option<SessionMode> {
        self.bindings.get(id).map(|binding| binding.mode)
    }

    /// Re-fit every widget to `container` and resize shells that changed.
    pub fn resize_all_to_fit(&mut self, container: Container) {
        for (id, binding) in &mut self.bindings {
            if let Some((cols, rows)) = binding.widget.fit(container) {
                tracing::trace!(session = %id, cols, rows, "Refitted widget");
                self.registry.resize(id, cols, rows);
            }
        }
    }

    /// Append shell output to the widget for `id` and send back any query
    /// responses it produced.
    pub fn write_display(&mut self, id: &SessionId, bytes: &[u8]) -> bool {
        let Some(binding) = self.bindings.get_mut(id) else {
            return false;
        };
        binding.widget.write_display(bytes);
        let replies = binding.widget.take_replies();
        if !replies.is_empty() && binding.generation.is_some() {
            self.registry.write(id, &replies);
        }
        true
    }

    /// Generation of the process the widget for `id` shows.
    pub fn bound_generation(&self, id: &SessionId) -> Option<ProcessGeneration> {
        self.bindings.get(id).and_then(|binding| binding.generation)
    }

    /// Forget the process for `id` after it exited.
    pub fn mark_exited(&mut self, id: &SessionId) {
        if let Some(binding) = self.bindings.get_mut(id) {
            binding.generation = None;
        }
    }

    pub fn clear(&mut self, id: &SessionId) -> bool {
        let Some(binding) = self.bindings.get_mut(id) else {
            return false;
        };
        binding.widget.clear();
        true
    }

    pub fn select_all(&mut self, id: &SessionId) -> bool {
        let Some(binding) = self.bindings.get_mut(id) else {
            return false;
        };
        binding.widget.select_all();
        true
    }

    /// Focus `id` and blur every other widget.
    pub fn focus(&mut self, id: &SessionId) -> bool {
        if !self.bindings.contains_key(id) {
            return false;
        }
        for (other, binding) in &mut self.bindings {
            if other == id {
                binding.widget.focus();
            } else {
                binding.widget.blur();
            }
        }
        self.active = Some(id.clone());
        true
    }

    /// Session that was focused last.
    pub fn active(&self) -> Option<&SessionId> {
        self.active.as_ref()
    }

    pub fn widget(&self, id: &SessionId) -> Option<&dyn TerminalWidget> {
        self.bindings.get(id).map(|binding| binding.widget.as_ref())
    }

    pub fn is_initialized(&self, id: &SessionId) -> bool {
        self.bindings.contains_key(id)
    }

    /// Initialized sessions in creation order.
    pub fn session_ids(&self) -> Vec<SessionId> {
        self.bindings.keys().cloned().collect()
    }

    pub fn working_dir(&self, id: &SessionId) -> Option<&Path> {
        self.bindings
            .get(id)
            .map(|binding| binding.launch.working_dir.as_path())
    }

    /// Record a new working directory for `id` (used by the next restart).
    pub fn set_working_dir(&mut self, id: &SessionId, dir: &Path) {
        if let Some(binding) = self.bindings.get_mut(id) {
            binding.launch.working_dir = dir.to_path_buf();
        }
    }

    pub fn launch(&self, id: &SessionId) -> Option<&Launch> {
        self.bindings.get(id).map(|binding| &binding.launch)
    }
}

fn copy_text(clipboard: &dyn Clipboard, widget: &mut dyn TerminalWidget, text: &str) -> bool {
    let clean = strip_ansi(text);
    if clipboard.write_text(&clean).log_err().is_none() {
        return false;
    }
    widget.write_display(COPY_CONFIRMATION.as_bytes());
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HeadlessFactory, KeyModifiers};
    use platform::MemoryClipboard;
    use pretty_assertions::assert_eq;
    use terminal::fake::FakeSpawner;
    use terminal::SpawnError;

    struct Fixture {
        mux: SessionMultiplexer,
        spawner: FakeSpawner,
        clipboard: MemoryClipboard,
        _events: tokio::sync::mpsc::UnboundedReceiver<terminal::PtyEvent>,
    }

    fn fixture() -> Fixture {
        let spawner = FakeSpawner::new();
        let (registry, events) = ProcessRegistry::new(Arc::new(spawner.clone()));
        let clipboard = MemoryClipboard::new();
        let mux = SessionMultiplexer::new(
            Arc::new(registry),
            Arc::new(HeadlessFactory::new(1000)),
            Arc::new(clipboard.clone()),
            Handle::current(),
            Duration::from_millis(1000),
        );
        Fixture {
            mux,
            spawner,
            clipboard,
            _events: events,
        }
    }

    fn area() -> Container {
        Container::for_grid(100, 30)
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let mut f = fixture();
        assert!(f
            .mux
            .initialize(&SessionId::Main, area(), Launch::in_dir("/proj"))
            .is_some());
        assert!(f
            .mux
            .initialize(&SessionId::Main, area(), Launch::in_dir("/other"))
            .is_some());

        assert_eq!(f.spawner.spawn_count(), 1);
        assert_eq!(f.mux.working_dir(&SessionId::Main), Some(Path::new("/proj")));
    }

    #[tokio::test]
    async fn initialize_fits_widget_and_resizes_shell() {
        let mut f = fixture();
        let widget = f
            .mux
            .initialize(&SessionId::Exec, area(), Launch::in_dir("/proj"))
            .unwrap();
        assert_eq!(widget.size(), (100, 30));
        assert_eq!(f.spawner.shell("exec").resizes(), vec![(100, 30)]);
    }

    #[tokio::test]
    async fn unmounted_container_creates_nothing() {
        let mut f = fixture();
        let widget = f.mux.initialize(
            &SessionId::Main,
            Container::new(0.0, 0.0),
            Launch::in_dir("/proj"),
        );
        assert!(widget.is_none());
        assert!(!f.mux.is_initialized(&SessionId::Main));
        assert_eq!(f.spawner.spawn_count(), 0);
    }

    #[tokio::test]
    async fn spawn_failure_is_written_into_widget() {
        let mut f = fixture();
        f.spawner.fail_next(SpawnError::ShellNotFound {
            shell: "/bin/nope".into(),
        });
        f.mux
            .initialize(&SessionId::Doctor, area(), Launch::in_dir("/proj"));

        let text = f.mux.widget(&SessionId::Doctor).unwrap().screen_text();
        assert!(text.contains("Error: Failed to spawn shell"), "{text}");
        assert!(text.contains("shell not found: /bin/nope"), "{text}");
        assert_eq!(f.mux.bound_generation(&SessionId::Doctor), None);
    }

    #[tokio::test(start_paused = true)]
    async fn auto_command_runs_after_settle_delay() {
        let mut f = fixture();
        f.mux.initialize(
            &SessionId::Doctor,
            area(),
            Launch::in_dir("/proj").with_auto_command("claude"),
        );
        let shell = f.spawner.shell("doctor");

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert!(shell.written().is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(shell.written_str(), "claude\r");
    }

    #[tokio::test(start_paused = true)]
    async fn auto_command_skipped_for_replaced_process() {
        let mut f = fixture();
        f.mux.initialize(
            &SessionId::Main,
            area(),
            Launch::in_dir("/proj").with_auto_command("npm start"),
        );
        let first = f.spawner.shell("main");
        f.mux.registry().kill(&SessionId::Main);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(first.written().is_empty());
    }

    #[tokio::test]
    async fn selection_mode_blocks_input_and_input_mode_restores_it() {
        let mut f = fixture();
        f.mux
            .initialize(&SessionId::Main, area(), Launch::in_dir("/proj"));
        let shell = f.spawner.shell("main");

        f.mux.set_mode(&SessionId::Main, SessionMode::Selection);
        assert!(!f.mux.handle_input(&SessionId::Main, b"x"));
        assert!(f.mux.widget(&SessionId::Main).unwrap().text_selection_enabled());

        f.mux.set_mode(&SessionId::Main, SessionMode::Input);
        assert!(f.mux.handle_input(&SessionId::Main, b"y"));

        assert_eq!(shell.written_str(), "y");
        let widget = f.mux.widget(&SessionId::Main).unwrap();
        assert!(widget.is_focused());
        assert!(!widget.text_selection_enabled());
        assert_eq!(f.mux.mode(&SessionId::Main), Some(SessionMode::Input));
    }

    #[tokio::test]
    async fn copy_shortcut_with_selection_copies_stripped_text() {
        let mut f = fixture();
        f.mux
            .initialize(&SessionId::Main, area(), Launch::in_dir("/proj"));
        f.mux
            .write_display(&SessionId::Main, b"\x1b[31mred text\x1b[0m\r\n");
        f.mux.select_all(&SessionId::Main);

        let outcome = f
            .mux
            .handle_key(&SessionId::Main, &KeyInput::new("c", KeyModifiers::control()));

        assert_eq!(outcome, KeyOutcome::Copied);
        let copied = f.clipboard.writes();
        assert_eq!(copied.len(), 1);
        assert!(copied[0].contains("red text"));
        assert!(!copied[0].contains('\x1b'));
        assert!(f.spawner.shell("main").written().is_empty());
        assert!(f
            .mux
            .widget(&SessionId::Main)
            .unwrap()
            .screen_text()
            .contains('✓'));
    }

    #[tokio::test]
    async fn ctrl_c_without_selection_interrupts() {
        let mut f = fixture();
        f.mux
            .initialize(&SessionId::Main, area(), Launch::in_dir("/proj"));

        let outcome = f
            .mux
            .handle_key(&SessionId::Main, &KeyInput::new("c", KeyModifiers::control()));

        assert_eq!(outcome, KeyOutcome::Forwarded);
        assert_eq!(f.spawner.shell("main").written(), vec![0x03]);
        assert!(f.clipboard.writes().is_empty());
    }

    #[tokio::test]
    async fn paste_respects_bracketed_paste_mode() {
        let mut f = fixture();
        f.mux
            .initialize(&SessionId::Main, area(), Launch::in_dir("/proj"));
        f.clipboard.set("ls -la");

        let paste = KeyInput::new("v", KeyModifiers::platform());
        assert_eq!(f.mux.handle_key(&SessionId::Main, &paste), KeyOutcome::Pasted);
        f.mux.write_display(&SessionId::Main, b"\x1b[?2004h");
        assert_eq!(f.mux.handle_key(&SessionId::Main, &paste), KeyOutcome::Pasted);

        assert_eq!(
            f.spawner.shell("main").written_str(),
            "ls -la\x1b[200~ls -la\x1b[201~"
        );
    }

    #[tokio::test]
    async fn context_menu_offers_copy_then_paste() {
        let mut f = fixture();
        f.mux
            .initialize(&SessionId::Exec, area(), Launch::in_dir("/proj"));
        assert_eq!(f.mux.context_menu(&SessionId::Exec), None);

        f.clipboard.set("npm test");
        let prompt = f.mux.context_menu(&SessionId::Exec);
        assert_eq!(
            prompt,
            Some(ContextMenuPrompt::Paste {
                text: "npm test".into()
            })
        );
        assert!(f.mux.apply_context_menu(&SessionId::Exec, prompt.unwrap()));
        assert_eq!(f.spawner.shell("exec").written_str(), "npm test");

        f.mux.write_display(&SessionId::Exec, b"output\r\n");
        f.mux.select_all(&SessionId::Exec);
        let prompt = f.mux.context_menu(&SessionId::Exec).unwrap();
        assert!(matches!(prompt, ContextMenuPrompt::Copy { ref text } if text.contains("output")));
        assert!(f.mux.apply_context_menu(&SessionId::Exec, prompt));
        assert!(f.clipboard.read_text().unwrap().contains("output"));
    }

    #[tokio::test]
    async fn resize_all_refits_every_widget() {
        let mut f = fixture();
        f.mux
            .initialize(&SessionId::Main, area(), Launch::in_dir("/proj"));
        f.mux
            .initialize(&SessionId::Doctor, area(), Launch::in_dir("/proj"));

        f.mux.resize_all_to_fit(Container::for_grid(60, 20));

        for id in ["main", "doctor"] {
            assert_eq!(f.spawner.shell(id).resizes(), vec![(100, 30), (60, 20)]);
        }
        assert_eq!(f.mux.widget(&SessionId::Doctor).unwrap().size(), (60, 20));
    }

    #[tokio::test]
    async fn dispose_leaves_process_running() {
        let mut f = fixture();
        f.mux
            .initialize(&SessionId::Main, area(), Launch::in_dir("/proj"));
        f.mux.focus(&SessionId::Main);

        assert!(f.mux.dispose(&SessionId::Main));
        assert!(!f.mux.dispose(&SessionId::Main));

        assert!(f.mux.registry().is_alive(&SessionId::Main));
        assert!(!f.spawner.shell("main").was_killed());
        assert_eq!(f.mux.active(), None);
        assert!(!f.mux.handle_input(&SessionId::Main, b"ls\r"));
    }

    #[tokio::test]
    async fn focus_blurs_other_sessions() {
        let mut f = fixture();
        for id in SessionId::WELL_KNOWN {
            f.mux.initialize(&id, area(), Launch::in_dir("/proj"));
        }
        f.mux.focus(&SessionId::Main);
        f.mux.focus(&SessionId::Exec);

        assert!(!f.mux.widget(&SessionId::Main).unwrap().is_focused());
        assert!(f.mux.widget(&SessionId::Exec).unwrap().is_focused());
        assert_eq!(f.mux.active(), Some(&SessionId::Exec));
        assert_eq!(f.mux.session_ids(), SessionId::WELL_KNOWN.to_vec());
    }

    #[tokio::test]
    async fn query_replies_go_back_to_the_shell() {
        let mut f = fixture();
        f.mux
            .initialize(&SessionId::Main, area(), Launch::in_dir("/proj"));
        f.mux.write_display(&SessionId::Main, b"\x1b[6n");
        assert!(f.spawner.shell("main").written().starts_with(b"\x1b["));
    }
}
