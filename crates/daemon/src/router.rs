//! Event routing from the transport boundary into the engine.
//!
//! A transport decodes inbound envelopes, attaches the session id it
//! assigned to the connection, and hands each event here. Routing never
//! raises back to the transport: run failures have already been delivered to
//! the session's output stream by the engine, and input is best-effort by
//! contract.

use std::sync::Arc;

use protocol::events::Event;
use tracing::{debug, warn};

use crate::session::Engine;
use crate::sink::EventSink;

/// Dispatches decoded inbound events to the engine.
pub struct EventRouter<S: EventSink> {
    engine: Arc<Engine<S>>,
}

impl<S: EventSink> EventRouter<S> {
    /// Creates a router over the given engine.
    pub fn new(engine: Arc<Engine<S>>) -> Self {
        Self { engine }
    }

    /// The engine this router dispatches to.
    pub fn engine(&self) -> &Arc<Engine<S>> {
        &self.engine
    }

    /// Routes one inbound event for a session.
    ///
    /// Failures are terminal for the current run attempt only and are logged
    /// here; nothing propagates to the transport.
    pub async fn route(&self, session_id: &str, event: Event) {
        match event {
            Event::Run(req) => {
                debug!(session_id, language = %req.language, "run request");
                if let Err(e) = self.engine.run(session_id, &req.language, &req.code).await {
                    debug!(session_id, error = %e, "run attempt failed");
                }
            }
            Event::Input(input) => {
                self.engine.input(session_id, &input.data).await;
            }
            Event::Disconnect => {
                self.engine.disconnect(session_id).await;
            }
            Event::Output(_) => {
                warn!(session_id, "ignoring output event sent by a client");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::sink::ChannelSink;
    use protocol::events::{InputData, OutputChunk, RunRequest};
    use tokio::sync::mpsc;

    fn test_router() -> (EventRouter<ChannelSink>, mpsc::Receiver<(String, Event)>) {
        let (sink, rx) = ChannelSink::with_capacity(64);
        let engine = Arc::new(Engine::new(&Config::default(), Arc::new(sink)));
        (EventRouter::new(engine), rx)
    }

    #[tokio::test]
    async fn test_route_unsupported_run_emits_diagnostic() {
        let (router, mut rx) = test_router();

        router
            .route(
                "s1",
                Event::Run(RunRequest {
                    language: "brainfuck".to_string(),
                    code: "+.".to_string(),
                }),
            )
            .await;

        let (sid, event) = rx.recv().await.unwrap();
        assert_eq!(sid, "s1");
        assert_eq!(event, Event::Output(OutputChunk::new("Unsupported language")));
    }

    #[tokio::test]
    async fn test_route_input_and_disconnect_never_fail() {
        let (router, mut rx) = test_router();

        router
            .route("s1", Event::Input(InputData { data: b"5\n".to_vec() }))
            .await;
        router.route("s1", Event::Disconnect).await;
        router.route("s1", Event::Disconnect).await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_route_ignores_client_output() {
        let (router, mut rx) = test_router();

        router
            .route("s1", Event::Output(OutputChunk::new("spoofed")))
            .await;

        assert!(rx.try_recv().is_err());
        assert_eq!(router.engine().session_count(), 0);
    }
}
