//! Output pump: forwards a process handle's terminal output to the sink.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use protocol::events::{Event, OutputChunk};
use tokio::task::JoinHandle;

use crate::sink::EventSink;

/// One background worker reading a process handle's terminal output and
/// forwarding it, in order, to the session's sink.
///
/// The pump is created with an explicit cancellation flag and a join handle;
/// teardown cancels, forces the blocked read to return (by killing the child,
/// which surfaces as end-of-output on the master), and awaits [`join`] before
/// the descriptor is closed, so the pump never reads a descriptor another
/// thread has already closed.
///
/// [`join`]: OutputPump::join
pub struct OutputPump {
    cancel: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl OutputPump {
    /// Starts a pump over the given reader.
    ///
    /// `alive` is the handle's shared liveness flag; the pump clears it when
    /// it observes end-of-output. Chunks are decoded permissively: invalid
    /// byte sequences are replaced rather than failing the pump.
    pub fn start<S: EventSink>(
        session_id: String,
        mut reader: Box<dyn Read + Send>,
        alive: Arc<AtomicBool>,
        sink: Arc<S>,
        buffer_size: usize,
    ) -> Self {
        let cancel = Arc::new(AtomicBool::new(false));
        let cancel_flag = Arc::clone(&cancel);

        let task = tokio::task::spawn_blocking(move || {
            let mut buf = vec![0u8; buffer_size.max(1)];
            loop {
                if cancel_flag.load(Ordering::SeqCst) {
                    tracing::debug!(session_id = %session_id, "output pump cancelled");
                    break;
                }
                match reader.read(&mut buf) {
                    Ok(0) => {
                        tracing::debug!(session_id = %session_id, "pty reached end of output");
                        break;
                    }
                    Ok(n) => {
                        let text = String::from_utf8_lossy(&buf[..n]).into_owned();
                        sink.deliver(&session_id, Event::Output(OutputChunk { text }));
                    }
                    Err(e) => {
                        // A pty master reads as EIO once the child side is
                        // gone; treat any read failure as end of output.
                        if !cancel_flag.load(Ordering::SeqCst) {
                            tracing::debug!(
                                session_id = %session_id,
                                error = %e,
                                "pty read ended"
                            );
                        }
                        break;
                    }
                }
            }
            alive.store(false, Ordering::SeqCst);
        });

        Self { cancel, task }
    }

    /// Signals the pump to stop before its next read.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Waits for the pump worker to exit. Consumes the pump.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "output pump task failed");
        }
    }
}
