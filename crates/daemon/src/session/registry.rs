//! Session registry and lifecycle management.
//!
//! The engine binds each session id to at most one live pty-attached process
//! and mediates creation, replacement and teardown of that binding under
//! concurrent requests. All mutation of a session goes through its own
//! mutex, so requests for the same session serialize while different
//! sessions proceed independently.

use std::sync::Arc;

use dashmap::DashMap;
use portable_pty::PtySize;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use protocol::events::{Event, OutputChunk};

use crate::config::{Config, TerminalConfig};
use crate::lang::{CommandResolver, ResolveError, Resolution};
use crate::session::process::{ProcessHandle, SpawnError};
use crate::session::pump::OutputPump;
use crate::sink::EventSink;

/// Unique identifier for a session, assigned by the transport layer.
pub type SessionId = String;

/// Observable lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No process handle installed.
    Idle,
    /// A process handle is installed (the child may have exited already).
    Running,
}

/// Errors that fail a run attempt.
///
/// The engine has already delivered the matching diagnostic to the session's
/// output stream by the time one of these is returned; callers only need
/// them for logging and tests.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Spawn(#[from] SpawnError),
}

/// An installed run: the process handle and its output pump, torn down as a
/// unit.
struct ActiveRun {
    handle: ProcessHandle,
    pump: OutputPump,
}

/// Per-session slot guarded by its own mutex.
struct SessionSlot {
    active: Option<ActiveRun>,
    /// Set under the lock just before the slot is removed from the map, so a
    /// concurrent `run` retries against a fresh slot instead of resurrecting
    /// a disconnected session.
    closed: bool,
}

impl SessionSlot {
    fn new() -> Self {
        Self {
            active: None,
            closed: false,
        }
    }

    fn state(&self) -> SessionState {
        if self.active.is_some() {
            SessionState::Running
        } else {
            SessionState::Idle
        }
    }
}

/// The per-session process lifecycle engine.
///
/// Maps session ids to at most one live [`ProcessHandle`] each and owns the
/// teardown ordering that keeps descriptors closed exactly once: cancel the
/// pump, kill the child, wait for the pump to stop reading, close the
/// descriptor, run the cleanup.
pub struct Engine<S: EventSink> {
    sessions: DashMap<SessionId, Arc<Mutex<SessionSlot>>>,
    resolver: Arc<CommandResolver>,
    sink: Arc<S>,
    terminal: TerminalConfig,
}

impl<S: EventSink> Engine<S> {
    /// Creates an engine over the given configuration and outbound sink.
    pub fn new(config: &Config, sink: Arc<S>) -> Self {
        Self {
            sessions: DashMap::new(),
            resolver: Arc::new(CommandResolver::new(config.languages.clone())),
            sink,
            terminal: config.terminal.clone(),
        }
    }

    /// Builds and launches `code` for the session, replacing any process the
    /// session is already running.
    ///
    /// The previous handle (if any) is fully retired (pump stopped,
    /// descriptor closed, cleanup run) before the resolver is consulted.
    /// Resolution and launch failures are delivered to the session's output
    /// stream and leave the session idle.
    ///
    /// Returns the new child's pid.
    pub async fn run(
        &self,
        session_id: &str,
        language: &str,
        code: &str,
    ) -> Result<u32, SessionError> {
        let mut slot = self.lock_live_slot(session_id).await;

        if let Some(previous) = slot.active.take() {
            debug!(session_id, "replacing active process");
            retire(previous).await;
        }

        let resolver = Arc::clone(&self.resolver);
        let language_owned = language.to_string();
        let source = code.to_string();
        let resolved =
            tokio::task::spawn_blocking(move || resolver.resolve_named(&language_owned, &source))
                .await
                .unwrap_or_else(|e| {
                    Err(ResolveError::Stage(std::io::Error::other(format!(
                        "resolver task failed: {e}"
                    ))))
                });

        let resolution = match resolved {
            Ok(resolution) => resolution,
            Err(e) => {
                let text = match &e {
                    ResolveError::Unsupported(_) => "Unsupported language".to_string(),
                    ResolveError::Compile { diagnostic } => diagnostic.clone(),
                    other => format!("{other}\r\n"),
                };
                debug!(session_id, language, error = %e, "run request rejected");
                self.sink.deliver(session_id, Event::Output(OutputChunk { text }));
                return Err(e.into());
            }
        };

        let Resolution { command, cleanup } = resolution;
        let size = PtySize {
            rows: self.terminal.rows,
            cols: self.terminal.cols,
            pixel_width: 0,
            pixel_height: 0,
        };

        let handle = match ProcessHandle::spawn(&command, size) {
            Ok(handle) => handle.with_cleanup(cleanup),
            Err(e) => {
                warn!(session_id, error = %e, "failed to launch process");
                // An exec failure must surface as terminal output, not as a
                // silent empty run.
                self.sink
                    .deliver(session_id, Event::Output(OutputChunk::new(format!("{e}\r\n"))));
                if let Err(cleanup_err) = cleanup.run() {
                    warn!(session_id, error = %cleanup_err, "cleanup after failed launch");
                }
                return Err(e.into());
            }
        };

        let reader = match handle.clone_reader() {
            Ok(reader) => reader,
            Err(e) => {
                warn!(session_id, error = %e, "failed to acquire pty reader");
                self.sink
                    .deliver(session_id, Event::Output(OutputChunk::new(format!("{e}\r\n"))));
                let mut handle = handle;
                handle.kill();
                handle.release();
                return Err(e.into());
            }
        };

        let pid = handle.pid().unwrap_or(0);
        let pump = OutputPump::start(
            session_id.to_string(),
            reader,
            handle.alive_flag(),
            Arc::clone(&self.sink),
            self.terminal.read_buffer_size,
        );
        slot.active = Some(ActiveRun { handle, pump });

        info!(session_id, pid, language, "session running");
        Ok(pid)
    }

    /// Forwards keystrokes to the session's running process, best-effort.
    ///
    /// An unknown session, an idle slot or an exited child is a logged
    /// no-op; write failures are logged, never propagated.
    pub async fn input(&self, session_id: &str, data: &[u8]) {
        let Some(slot) = self.get_slot(session_id) else {
            debug!(session_id, "input for unknown session, ignoring");
            return;
        };
        let mut slot = slot.lock_owned().await;
        let Some(active) = slot.active.as_mut() else {
            debug!(session_id, "input with no active process, ignoring");
            return;
        };
        if !active.handle.is_alive() {
            debug!(session_id, "input after process exit, ignoring");
            return;
        }
        if let Err(e) = active.handle.write_input(data) {
            warn!(session_id, error = %e, "failed to write to pty");
        }
    }

    /// Tears down the session's process (if any) and removes the session.
    ///
    /// Idempotent: disconnecting an unknown or already-idle session is a
    /// no-op.
    pub async fn disconnect(&self, session_id: &str) {
        let Some(slot) = self.get_slot(session_id) else {
            debug!(session_id, "disconnect for unknown session, nothing to do");
            return;
        };
        let mut guard = slot.clone().lock_owned().await;
        if let Some(run) = guard.active.take() {
            retire(run).await;
        }
        guard.closed = true;
        drop(guard);
        self.sessions
            .remove_if(session_id, |_, value| Arc::ptr_eq(value, &slot));
        info!(session_id, "session removed");
    }

    /// Whether the session currently has a live child process.
    pub async fn is_running(&self, session_id: &str) -> bool {
        let Some(slot) = self.get_slot(session_id) else {
            return false;
        };
        let slot = slot.lock_owned().await;
        slot.active.as_ref().is_some_and(|run| run.handle.is_alive())
    }

    /// The session's lifecycle state. Unknown sessions read as idle.
    pub async fn state(&self, session_id: &str) -> SessionState {
        let Some(slot) = self.get_slot(session_id) else {
            return SessionState::Idle;
        };
        let slot = slot.lock_owned().await;
        slot.state()
    }

    /// Number of sessions currently registered.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn get_slot(&self, session_id: &str) -> Option<Arc<Mutex<SessionSlot>>> {
        self.sessions
            .get(session_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Locks the session's slot, creating it on first use. Retries when it
    /// catches a slot that a concurrent disconnect has just torn out.
    async fn lock_live_slot(&self, session_id: &str) -> OwnedMutexGuard<SessionSlot> {
        loop {
            let slot = self
                .sessions
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(SessionSlot::new())))
                .clone();
            let guard = slot.lock_owned().await;
            if !guard.closed {
                return guard;
            }
        }
    }
}

/// Retires an installed run completely.
///
/// Ordering matters: wake the pump (killing the child forces end-of-output
/// on the master), wait for it to stop reading, and only then close the
/// descriptor and run the cleanup. The descriptor is closed exactly once and
/// the cleanup runs exactly once because `ActiveRun` is consumed here.
async fn retire(run: ActiveRun) {
    let ActiveRun { mut handle, pump } = run;
    pump.cancel();
    handle.kill();
    pump.join().await;
    handle.release();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::ChannelSink;
    use tokio::sync::mpsc;

    fn test_engine() -> (Engine<ChannelSink>, mpsc::Receiver<(String, Event)>) {
        let (sink, rx) = ChannelSink::with_capacity(256);
        (Engine::new(&Config::default(), Arc::new(sink)), rx)
    }

    #[tokio::test]
    async fn test_unsupported_language_emits_fixed_message() {
        let (engine, mut rx) = test_engine();

        let err = engine.run("s1", "cobol", "DISPLAY 'HI'.").await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Resolve(ResolveError::Unsupported(_))
        ));

        let (sid, event) = rx.recv().await.unwrap();
        assert_eq!(sid, "s1");
        assert_eq!(event, Event::Output(OutputChunk::new("Unsupported language")));

        // The session exists but holds no process.
        assert_eq!(engine.state("s1").await, SessionState::Idle);
        assert!(!engine.is_running("s1").await);
    }

    #[tokio::test]
    async fn test_input_without_session_is_noop() {
        let (engine, mut rx) = test_engine();

        engine.input("ghost", b"5\n").await;

        assert_eq!(engine.session_count(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_input_on_idle_session_is_noop() {
        let (engine, mut rx) = test_engine();

        // Failed run leaves the session registered but idle.
        let _ = engine.run("s1", "cobol", "").await;
        let _ = rx.recv().await;

        engine.input("s1", b"5\n").await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let (engine, _rx) = test_engine();

        let _ = engine.run("s1", "cobol", "").await;
        assert_eq!(engine.session_count(), 1);

        engine.disconnect("s1").await;
        assert_eq!(engine.session_count(), 0);

        // Second disconnect, and one for a session that never existed.
        engine.disconnect("s1").await;
        engine.disconnect("never-seen").await;
        assert_eq!(engine.session_count(), 0);
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let (engine, mut rx) = test_engine();

        let _ = engine.run("a", "cobol", "").await;
        let _ = engine.run("b", "fortran", "").await;

        let mut sids = Vec::new();
        for _ in 0..2 {
            let (sid, event) = rx.recv().await.unwrap();
            assert_eq!(event, Event::Output(OutputChunk::new("Unsupported language")));
            sids.push(sid);
        }
        sids.sort();
        assert_eq!(sids, vec!["a", "b"]);
        assert_eq!(engine.session_count(), 2);
    }
}
