//! Owner of every live shell process, keyed by session id.

use crate::{
    ExitStatus, ExitWaiter, ProcessGeneration, PtyControl, PtyEvent, PtySpawner, SessionId,
    SpawnError, SpawnRequest,
};
use anyhow::Context as _;
use collections::FxHashMap;
use parking_lot::Mutex;
use settings::constants::terminal;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use util::ResultExt as _;

struct Entry {
    generation: ProcessGeneration,
    control: Box<dyn PtyControl>,
}

type Entries = Arc<Mutex<FxHashMap<SessionId, Entry>>>;

/// Process registry.
///
/// The only place that starts or stops shells. Output and exit notifications
/// are delivered as [`PtyEvent`]s on the channel returned by [`new`].
///
/// At most one process exists per session id. Writes, resizes and kills for
/// unknown ids are silently ignored.
///
/// [`new`]: ProcessRegistry::new
pub struct ProcessRegistry {
    spawner: Arc<dyn PtySpawner>,
    entries: Entries,
    events: UnboundedSender<PtyEvent>,
    next_generation: AtomicU64,
}

impl ProcessRegistry {
    pub fn new(spawner: Arc<dyn PtySpawner>) -> (Self, UnboundedReceiver<PtyEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let registry = Self {
            spawner,
            entries: Arc::new(Mutex::new(FxHashMap::default())),
            events,
            next_generation: AtomicU64::new(1),
        };
        (registry, rx)
    }

    /// Spawn a login shell for `id` in `working_dir`.
    ///
    /// A process still running under `id` is killed first. Its remaining
    /// events carry the old generation.
    pub fn create(
        &self,
        id: &SessionId,
        working_dir: &Path,
    ) -> Result<ProcessGeneration, SpawnError> {
        if let Some(previous) = self.entries.lock().remove(id) {
            tracing::warn!(session = %id, generation = %previous.generation, "Replacing live process");
            Self::terminate(id, previous);
        }

        let shell = self.spawner.spawn(&SpawnRequest {
            session: id.clone(),
            working_dir: working_dir.to_path_buf(),
            cols: terminal::DEFAULT_COLS,
            rows: terminal::DEFAULT_ROWS,
        })?;
        let generation = ProcessGeneration(self.next_generation.fetch_add(1, Ordering::SeqCst));

        let replaced = self.entries.lock().insert(
            id.clone(),
            Entry {
                generation,
                control: shell.control,
            },
        );
        if let Some(previous) = replaced {
            tracing::warn!(session = %id, generation = %previous.generation, "Concurrent create, killing older process");
            Self::terminate(id, previous);
        }

        if let Err(e) = self.start_reader(id.clone(), generation, shell.output, shell.waiter) {
            if let Some(entry) = self.take_if_current(id, generation) {
                Self::terminate(id, entry);
            }
            return Err(SpawnError::Other {
                shell: id.to_string(),
                reason: format!("{e:#}"),
            });
        }

        tracing::info!(session = %id, %generation, cwd = %working_dir.display(), "Created session process");
        Ok(generation)
    }

    /// Write bytes to the session's shell. Unknown ids are ignored.
    pub fn write(&self, id: &SessionId, bytes: &[u8]) {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(id) else {
            tracing::debug!(session = %id, bytes = bytes.len(), "Write to unknown session dropped");
            return;
        };
        entry
            .control
            .write(bytes)
            .with_context(|| format!("writing to {id}"))
            .log_err();
    }

    /// Resize the session's PTY. Unknown ids are ignored.
    pub fn resize(&self, id: &SessionId, cols: u16, rows: u16) {
        if cols == 0 || rows == 0 {
            return;
        }
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(id) else {
            tracing::debug!(session = %id, "Resize of unknown session dropped");
            return;
        };
        entry
            .control
            .resize(cols, rows)
            .with_context(|| format!("resizing {id}"))
            .log_err();
    }

    /// Terminate the session's shell and forget it. Idempotent.
    ///
    /// No exit event is emitted for a killed process.
    pub fn kill(&self, id: &SessionId) {
        let removed = self.entries.lock().remove(id);
        match removed {
            Some(entry) => {
                tracing::info!(session = %id, generation = %entry.generation, "Killing session process");
                Self::terminate(id, entry);
            }
            None => tracing::debug!(session = %id, "Kill of unknown session ignored"),
        }
    }

    /// Kill every live process.
    pub fn kill_all(&self) {
        let drained: Vec<(SessionId, Entry)> = self.entries.lock().drain().collect();
        for (id, entry) in drained {
            Self::terminate(&id, entry);
        }
    }

    pub fn is_alive(&self, id: &SessionId) -> bool {
        self.entries.lock().contains_key(id)
    }

    /// Generation of the live process for `id`, if any.
    pub fn generation(&self, id: &SessionId) -> Option<ProcessGeneration> {
        self.entries.lock().get(id).map(|entry| entry.generation)
    }

    /// Ids with a live process, sorted.
    pub fn live_sessions(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.entries.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    fn take_if_current(&self, id: &SessionId, generation: ProcessGeneration) -> Option<Entry> {
        take_if_current(&self.entries, id, generation)
    }

    fn terminate(id: &SessionId, mut entry: Entry) {
        // ESRCH is expected if the shell already exited
        entry
            .control
            .kill()
            .with_context(|| format!("killing {id}"))
            .log_debug();
    }

    /// One reader thread per process: forwards output chunks, then reaps the
    /// child and reports the exit if the process was not killed meanwhile.
    fn start_reader(
        &self,
        id: SessionId,
        generation: ProcessGeneration,
        mut output: Box<dyn Read + Send>,
        waiter: Box<dyn ExitWaiter>,
    ) -> std::io::Result<()> {
        let entries = self.entries.clone();
        let events = self.events.clone();

        thread::Builder::new()
            .name(format!("pty-reader-{id}"))
            .spawn(move || {
                let mut buf = [0u8; terminal::READ_BUFFER_SIZE];
                loop {
                    match output.read(&mut buf) {
                        // EOF - process exited
                        Ok(0) => break,
                        Ok(n) => {
                            let event = PtyEvent::Output {
                                id: id.clone(),
                                generation,
                                bytes: buf[..n].to_vec(),
                            };
                            if events.send(event).is_err() {
                                break; // Channel closed
                            }
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                        Err(e) => {
                            // EIO once the slave side closes on Linux
                            tracing::debug!(session = %id, "PTY read ended: {}", e);
                            break;
                        }
                    }
                }

                let status: ExitStatus = waiter.wait();
                if take_if_current(&entries, &id, generation).is_some() {
                    tracing::info!(session = %id, %generation, %status, "Session process exited");
                    events
                        .send(PtyEvent::Exit {
                            id,
                            generation,
                            status,
                        })
                        .log_debug();
                } else {
                    tracing::debug!(session = %id, %generation, "Killed process reaped");
                }
            })?;
        Ok(())
    }
}

fn take_if_current(
    entries: &Mutex<FxHashMap<SessionId, Entry>>,
    id: &SessionId,
    generation: ProcessGeneration,
) -> Option<Entry> {
    let mut entries = entries.lock();
    match entries.get(id) {
        Some(entry) if entry.generation == generation => entries.remove(id),
        _ => None,
    }
}

impl Drop for ProcessRegistry {
    fn drop(&mut self) {
        self.kill_all();
        tracing::debug!("Process registry dropped, shells cleaned up");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeSpawner;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(5);

    async fn next_event(rx: &mut UnboundedReceiver<PtyEvent>) -> PtyEvent {
        tokio::time::timeout(TIMEOUT, rx.recv())
            .await
            .expect("timed out waiting for pty event")
            .expect("event channel closed")
    }

    fn registry() -> (ProcessRegistry, UnboundedReceiver<PtyEvent>, FakeSpawner) {
        let spawner = FakeSpawner::new();
        let (registry, rx) = ProcessRegistry::new(Arc::new(spawner.clone()));
        (registry, rx, spawner)
    }

    #[tokio::test]
    async fn output_is_tagged_with_session_and_generation() {
        let (registry, mut rx, spawner) = registry();
        let generation = registry.create(&SessionId::Main, Path::new("/proj")).unwrap();

        spawner.shell(&SessionId::Main.to_string()).emit(b"hello");

        assert_eq!(
            next_event(&mut rx).await,
            PtyEvent::Output {
                id: SessionId::Main,
                generation,
                bytes: b"hello".to_vec(),
            }
        );
    }

    #[tokio::test]
    async fn natural_exit_emits_exit_and_forgets_session() {
        let (registry, mut rx, spawner) = registry();
        let generation = registry.create(&SessionId::Exec, Path::new("/proj")).unwrap();

        spawner.shell("exec").exit(3);

        assert_eq!(
            next_event(&mut rx).await,
            PtyEvent::Exit {
                id: SessionId::Exec,
                generation,
                status: ExitStatus::with_code(3),
            }
        );
        assert!(!registry.is_alive(&SessionId::Exec));
    }

    #[tokio::test]
    async fn write_after_kill_is_noop() {
        let (registry, _rx, spawner) = registry();
        registry.create(&SessionId::Main, Path::new("/proj")).unwrap();
        let shell = spawner.shell("main");

        registry.kill(&SessionId::Main);
        registry.write(&SessionId::Main, b"ls\r");
        registry.resize(&SessionId::Main, 100, 40);

        assert!(shell.was_killed());
        assert!(shell.written().is_empty(), "no bytes reach a killed shell");
        assert!(shell.resizes().is_empty());
    }

    #[tokio::test]
    async fn kill_is_idempotent_and_suppresses_exit() {
        let (registry, mut rx, _spawner) = registry();
        registry.create(&SessionId::Doctor, Path::new("/proj")).unwrap();

        registry.kill(&SessionId::Doctor);
        registry.kill(&SessionId::Doctor);
        registry.kill(&SessionId::AdHoc("never".into()));

        let extra = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(extra.is_err(), "killed process must not report an exit: {extra:?}");
    }

    #[tokio::test]
    async fn create_replaces_live_process() {
        let (registry, _rx, spawner) = registry();
        let first = registry.create(&SessionId::Main, Path::new("/a")).unwrap();
        let second = registry.create(&SessionId::Main, Path::new("/b")).unwrap();

        assert!(second > first);
        assert_eq!(registry.generation(&SessionId::Main), Some(second));
        let spawned = spawner.spawned("main");
        assert_eq!(spawned.len(), 2);
        assert!(spawned[0].was_killed());
        assert!(!spawned[1].was_killed());
        assert_eq!(spawned[1].working_dir(), Path::new("/b"));
    }

    #[tokio::test]
    async fn writes_go_to_the_named_session_only() {
        let (registry, _rx, spawner) = registry();
        registry.create(&SessionId::Main, Path::new("/proj")).unwrap();
        registry.create(&SessionId::Doctor, Path::new("/proj")).unwrap();

        registry.write(&SessionId::Doctor, b"echo hi\r");

        assert_eq!(spawner.shell("doctor").written(), b"echo hi\r".to_vec());
        assert!(spawner.shell("main").written().is_empty());
    }

    #[tokio::test]
    async fn spawn_failure_leaves_no_entry() {
        let (registry, _rx, spawner) = registry();
        spawner.fail_next(SpawnError::ShellNotFound {
            shell: "/bin/nope".into(),
        });

        let result = registry.create(&SessionId::Main, Path::new("/proj"));

        assert_eq!(
            result,
            Err(SpawnError::ShellNotFound {
                shell: "/bin/nope".into()
            })
        );
        assert!(!registry.is_alive(&SessionId::Main));
    }

    #[tokio::test]
    async fn zero_sized_resize_is_ignored() {
        let (registry, _rx, spawner) = registry();
        registry.create(&SessionId::Main, Path::new("/proj")).unwrap();
        registry.resize(&SessionId::Main, 0, 10);
        registry.resize(&SessionId::Main, 120, 30);
        assert_eq!(spawner.shell("main").resizes(), vec![(120, 30)]);
    }

    #[tokio::test]
    async fn drop_kills_every_shell() {
        let (registry, _rx, spawner) = registry();
        registry.create(&SessionId::Main, Path::new("/proj")).unwrap();
        registry.create(&SessionId::Exec, Path::new("/proj")).unwrap();
        assert_eq!(registry.live_sessions(), vec![SessionId::Main, SessionId::Exec]);

        drop(registry);

        assert!(spawner.shell("main").was_killed());
        assert!(spawner.shell("exec").was_killed());
    }
}
