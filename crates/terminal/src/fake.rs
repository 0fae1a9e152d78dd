//! In-memory PTY double for tests.
//!
//! `FakeSpawner` hands out [`FakeShell`]s instead of real processes. Tests
//! push output into a shell, inspect what was written to it, and end it with
//! a scripted exit code.

use crate::{ExitStatus, ExitWaiter, PtyControl, PtySpawner, SpawnError, SpawnRequest, SpawnedShell};
use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;

/// Exit code reported for a fake shell that was killed.
pub const KILLED_EXIT_CODE: u32 = 129;

#[derive(Default)]
struct ShellState {
    written: Vec<u8>,
    resizes: Vec<(u16, u16)>,
    killed: bool,
    exit_code: Option<u32>,
    output: Option<mpsc::Sender<Vec<u8>>>,
}

/// Handle on one spawned fake shell. Clones observe the same shell.
#[derive(Clone)]
pub struct FakeShell {
    request: SpawnRequest,
    state: Arc<Mutex<ShellState>>,
}

impl FakeShell {
    /// Make the shell print `bytes`.
    pub fn emit(&self, bytes: &[u8]) {
        if let Some(tx) = self.state.lock().output.as_ref() {
            let _ = tx.send(bytes.to_vec());
        }
    }

    /// End the shell as if it exited on its own.
    pub fn exit(&self, code: u32) {
        let mut state = self.state.lock();
        state.exit_code.get_or_insert(code);
        state.output = None;
    }

    /// Everything written to the shell so far.
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().written.clone()
    }

    /// Written bytes as lossy UTF-8.
    pub fn written_str(&self) -> String {
        String::from_utf8_lossy(&self.state.lock().written).into_owned()
    }

    pub fn resizes(&self) -> Vec<(u16, u16)> {
        self.state.lock().resizes.clone()
    }

    pub fn was_killed(&self) -> bool {
        self.state.lock().killed
    }

    pub fn working_dir(&self) -> &Path {
        &self.request.working_dir
    }

    pub fn request(&self) -> &SpawnRequest {
        &self.request
    }
}

#[derive(Default)]
struct SpawnerState {
    spawned: Vec<FakeShell>,
    fail_next: Vec<SpawnError>,
}

/// [`PtySpawner`] that records every spawn. Clones share state.
#[derive(Clone, Default)]
pub struct FakeSpawner {
    state: Arc<Mutex<SpawnerState>>,
}

impl FakeSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next spawn fail with `error`. Calls queue up.
    pub fn fail_next(&self, error: SpawnError) {
        self.state.lock().fail_next.push(error);
    }

    /// Every shell spawned for `session`, oldest first.
    pub fn spawned(&self, session: &str) -> Vec<FakeShell> {
        self.state
            .lock()
            .spawned
            .iter()
            .filter(|shell| shell.request.session.as_str() == session)
            .cloned()
            .collect()
    }

    /// The most recent shell spawned for `session`.
    ///
    /// Panics if none was spawned.
    pub fn shell(&self, session: &str) -> FakeShell {
        match self.spawned(session).pop() {
            Some(shell) => shell,
            None => panic!("no shell spawned for session {session:?}"),
        }
    }

    pub fn spawn_count(&self) -> usize {
        self.state.lock().spawned.len()
    }
}

impl PtySpawner for FakeSpawner {
    fn spawn(&self, request: &SpawnRequest) -> Result<SpawnedShell, SpawnError> {
        let mut spawner = self.state.lock();
        if !spawner.fail_next.is_empty() {
            return Err(spawner.fail_next.remove(0));
        }

        let (tx, rx) = mpsc::channel();
        let state = Arc::new(Mutex::new(ShellState {
            output: Some(tx),
            ..ShellState::default()
        }));
        spawner.spawned.push(FakeShell {
            request: request.clone(),
            state: state.clone(),
        });

        Ok(SpawnedShell {
            control: Box::new(FakeControl {
                state: state.clone(),
            }),
            output: Box::new(ChannelReader {
                rx,
                pending: Vec::new(),
            }),
            waiter: Box::new(FakeWaiter { state }),
        })
    }
}

struct FakeControl {
    state: Arc<Mutex<ShellState>>,
}

impl PtyControl for FakeControl {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        if state.output.is_none() {
            return Err(anyhow!("shell has exited"));
        }
        state.written.extend_from_slice(data);
        Ok(())
    }

    fn resize(&mut self, cols: u16, rows: u16) -> Result<()> {
        self.state.lock().resizes.push((cols, rows));
        Ok(())
    }

    fn kill(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.killed = true;
        state.exit_code.get_or_insert(KILLED_EXIT_CODE);
        state.output = None;
        Ok(())
    }
}

/// Blocking reader fed by [`FakeShell::emit`]; EOF once the shell ends.
struct ChannelReader {
    rx: mpsc::Receiver<Vec<u8>>,
    pending: Vec<u8>,
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.pending.is_empty() {
            match self.rx.recv() {
                Ok(chunk) => self.pending = chunk,
                Err(_) => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

struct FakeWaiter {
    state: Arc<Mutex<ShellState>>,
}

impl ExitWaiter for FakeWaiter {
    fn wait(self: Box<Self>) -> ExitStatus {
        ExitStatus::with_code(self.state.lock().exit_code.unwrap_or(0))
    }
}

impl std::fmt::Debug for FakeShell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeShell")
            .field("session", &self.request.session)
            .field("working_dir", &self.request.working_dir)
            .finish_non_exhaustive()
    }
}

/// Convenience for building a request outside the registry.
pub fn request(session: crate::SessionId, working_dir: impl Into<PathBuf>) -> SpawnRequest {
    SpawnRequest {
        session,
        working_dir: working_dir.into(),
        cols: 80,
        rows: 24,
    }
}
