//! Outbound event delivery.
//!
//! The engine and its output pumps hand events to an [`EventSink`]; the sink
//! is the boundary where a transport picks them up. Delivery is best-effort:
//! a failing or lagging consumer must never stall or crash the engine.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use protocol::events::Event;
use tokio::sync::mpsc;

/// Destination for events addressed to a session.
///
/// Implementations are called from blocking pump threads as well as async
/// context, so `deliver` must not block and must absorb delivery failures
/// (logging them) instead of surfacing them.
pub trait EventSink: Send + Sync + 'static {
    /// Delivers one event addressed to a session.
    fn deliver(&self, session_id: &str, event: Event);
}

/// Default channel capacity for a sink.
const DEFAULT_SINK_CAPACITY: usize = 256;

/// Channel-backed sink handing `(session_id, event)` pairs to one consumer.
///
/// Uses `try_send` so a slow consumer drops events rather than blocking the
/// pumps that produce them; drops are counted and logged once per
/// backpressure episode.
pub struct ChannelSink {
    tx: mpsc::Sender<(String, Event)>,
    dropped: AtomicU64,
    backpressured: AtomicBool,
}

impl ChannelSink {
    /// Creates a sink with the default capacity.
    ///
    /// Returns the sink and the receiving end for the transport to drain.
    pub fn new() -> (Self, mpsc::Receiver<(String, Event)>) {
        Self::with_capacity(DEFAULT_SINK_CAPACITY)
    }

    /// Creates a sink with a specific channel capacity.
    pub fn with_capacity(capacity: usize) -> (Self, mpsc::Receiver<(String, Event)>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                tx,
                dropped: AtomicU64::new(0),
                backpressured: AtomicBool::new(false),
            },
            rx,
        )
    }

    /// Total events dropped because the consumer lagged.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl EventSink for ChannelSink {
    fn deliver(&self, session_id: &str, event: Event) {
        match self.tx.try_send((session_id.to_string(), event)) {
            Ok(()) => {
                if self.backpressured.swap(false, Ordering::Relaxed) {
                    tracing::debug!(session_id, "sink consumer recovered from backpressure");
                }
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                if !self.backpressured.swap(true, Ordering::Relaxed) {
                    tracing::warn!(
                        session_id,
                        dropped = self.dropped.load(Ordering::Relaxed),
                        "sink consumer is backpressured, dropping events"
                    );
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::trace!(session_id, "sink consumer gone, discarding event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::events::OutputChunk;

    fn output(text: &str) -> Event {
        Event::Output(OutputChunk::new(text))
    }

    #[tokio::test]
    async fn test_delivery_preserves_order() {
        let (sink, mut rx) = ChannelSink::with_capacity(16);

        sink.deliver("s1", output("one"));
        sink.deliver("s1", output("two"));
        sink.deliver("s1", output("three"));

        let mut texts = Vec::new();
        for _ in 0..3 {
            let (sid, event) = rx.recv().await.unwrap();
            assert_eq!(sid, "s1");
            if let Event::Output(chunk) = event {
                texts.push(chunk.text);
            }
        }
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_full_channel_drops_and_counts() {
        let (sink, _rx) = ChannelSink::with_capacity(2);

        sink.deliver("s1", output("a"));
        sink.deliver("s1", output("b"));
        sink.deliver("s1", output("c"));
        sink.deliver("s1", output("d"));

        assert_eq!(sink.dropped(), 2);
    }

    #[tokio::test]
    async fn test_closed_receiver_is_absorbed() {
        let (sink, rx) = ChannelSink::with_capacity(2);
        drop(rx);

        // Must not panic or error.
        sink.deliver("s1", output("into the void"));
        assert_eq!(sink.dropped(), 0);
    }
}
