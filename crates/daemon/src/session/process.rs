//! PTY process supervision.
//!
//! This module owns spawning a resolved command attached to a fresh
//! pseudo-terminal and the handle that bundles the controlling descriptor,
//! the child process and the run's cleanup action.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use thiserror::Error;
use tracing::{trace, warn};

use crate::lang::{Cleanup, CommandSpec};

/// Errors launching a command onto a pseudo-terminal.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// The resolved command had an empty argv.
    #[error("cannot launch an empty command")]
    EmptyCommand,

    /// Allocating or wiring up the pty pair failed.
    #[error("failed to set up pty: {0}")]
    Pty(String),

    /// The command binary could not be started.
    #[error("failed to start {command}: {reason}")]
    Spawn { command: String, reason: String },
}

/// An exclusively-owned running (or exited) child attached to a pty.
///
/// The handle owns the controlling descriptor, its writer, the child and the
/// run's cleanup action. [`ProcessHandle::release`] consumes the handle, so
/// the descriptor is closed and the cleanup runs exactly once no matter which
/// teardown path gets there first.
pub struct ProcessHandle {
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    child: Box<dyn Child + Send + Sync>,
    pid: Option<u32>,
    alive: Arc<AtomicBool>,
    cleanup: Cleanup,
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.pid)
            .field("alive", &self.alive)
            .finish_non_exhaustive()
    }
}

impl ProcessHandle {
    /// Launches the command attached to a new pty of the given size.
    ///
    /// The subordinate side is closed in this process once the child holds
    /// it, so the child exiting surfaces as end-of-output on the master.
    /// On failure the caller still owns the resolution's cleanup.
    pub fn spawn(command: &CommandSpec, size: PtySize) -> Result<ProcessHandle, SpawnError> {
        let program = command.argv.first().ok_or(SpawnError::EmptyCommand)?;

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(size)
            .map_err(|e| SpawnError::Pty(e.to_string()))?;

        let mut cmd = CommandBuilder::new(program);
        cmd.args(&command.argv[1..]);
        if let Some(dir) = &command.cwd {
            cmd.cwd(dir);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| SpawnError::Spawn {
                command: program.clone(),
                reason: e.to_string(),
            })?;
        drop(pair.slave);

        let pid = child.process_id();
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| SpawnError::Pty(e.to_string()))?;

        trace!(command = %program, pid, "launched process on pty");

        Ok(ProcessHandle {
            master: pair.master,
            writer,
            child,
            pid,
            alive: Arc::new(AtomicBool::new(true)),
            cleanup: Cleanup::None,
        })
    }

    /// Attaches the run's cleanup action to the handle.
    pub fn with_cleanup(mut self, cleanup: Cleanup) -> Self {
        self.cleanup = cleanup;
        self
    }

    /// The child's OS process id, if the platform reports one.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Whether the output pump still considers the child live.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// The liveness flag shared with this handle's output pump.
    pub fn alive_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.alive)
    }

    /// A reader over the controlling descriptor for the output pump.
    pub fn clone_reader(&self) -> Result<Box<dyn Read + Send>, SpawnError> {
        self.master
            .try_clone_reader()
            .map_err(|e| SpawnError::Pty(e.to_string()))
    }

    /// Writes keystrokes to the child's terminal input.
    pub fn write_input(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.writer.write_all(data)?;
        self.writer.flush()
    }

    /// Signals the child to terminate. An already-exited child is fine.
    pub fn kill(&mut self) {
        if let Err(e) = self.child.kill() {
            trace!(pid = self.pid, error = %e, "kill on exited process");
        }
    }

    /// Reaps the child, closes the controlling descriptor and runs the
    /// cleanup action. Consumes the handle.
    pub fn release(mut self) {
        if let Err(e) = self.child.wait() {
            warn!(pid = self.pid, error = %e, "failed to reap child");
        }
        self.alive.store(false, Ordering::SeqCst);
        // Dropping master and writer closes the controlling descriptor.
        drop(self.writer);
        drop(self.master);
        if let Err(e) = self.cleanup.run() {
            warn!(error = %e, "cleanup failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec {
            argv: vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()],
            cwd: None,
        }
    }

    fn test_size() -> PtySize {
        PtySize {
            rows: 24,
            cols: 80,
            pixel_width: 0,
            pixel_height: 0,
        }
    }

    fn read_to_end(handle: &ProcessHandle) -> String {
        let mut reader = handle.clone_reader().unwrap();
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }

    #[test]
    fn test_spawn_captures_output() {
        let handle = ProcessHandle::spawn(&sh("echo pty_marker"), test_size()).unwrap();
        assert!(handle.pid().is_some());

        let output = read_to_end(&handle);
        assert!(output.contains("pty_marker"), "got: {:?}", output);

        handle.release();
    }

    #[test]
    fn test_spawn_empty_command() {
        let spec = CommandSpec {
            argv: vec![],
            cwd: None,
        };
        let err = ProcessHandle::spawn(&spec, test_size()).unwrap_err();
        assert!(matches!(err, SpawnError::EmptyCommand));
    }

    #[test]
    fn test_write_input_reaches_child() {
        let mut handle = ProcessHandle::spawn(&sh("read line; echo got:$line"), test_size())
            .unwrap();
        handle.write_input(b"hello\n").unwrap();

        let output = read_to_end(&handle);
        assert!(output.contains("got:hello"), "got: {:?}", output);

        handle.release();
    }

    #[test]
    fn test_release_runs_cleanup() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let (_, path) = file.keep().unwrap();

        let mut handle = ProcessHandle::spawn(&sh("true"), test_size())
            .unwrap()
            .with_cleanup(Cleanup::File(path.clone()));
        handle.kill();
        handle.release();
        assert!(!path.exists());
    }

    #[test]
    fn test_kill_stops_long_running_child() {
        let mut handle = ProcessHandle::spawn(&sh("sleep 30"), test_size()).unwrap();
        handle.kill();
        // release() must not hang: the child is gone.
        handle.release();
    }

    #[test]
    fn test_child_cwd() {
        let dir = tempfile::TempDir::new().unwrap();
        let spec = CommandSpec {
            argv: vec!["/bin/sh".to_string(), "-c".to_string(), "pwd".to_string()],
            cwd: Some(PathBuf::from(dir.path())),
        };
        let handle = ProcessHandle::spawn(&spec, test_size()).unwrap();
        let output = read_to_end(&handle);
        assert!(
            output.contains(dir.path().file_name().unwrap().to_str().unwrap()),
            "got: {:?}",
            output
        );
        handle.release();
    }
}
