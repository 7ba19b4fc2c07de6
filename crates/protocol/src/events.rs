//! Protocol event definitions for PolyRun.
//!
//! This module defines all wire events exchanged between a transport and the
//! execution engine. All events are serialized using MessagePack.

use serde::{Deserialize, Serialize};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Envelope wrapper for all protocol events.
///
/// The envelope provides versioning and sequence numbers for event ordering
/// and compatibility checking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Protocol version for compatibility checking.
    pub version: u8,
    /// Sequence number for event ordering.
    pub sequence: u64,
    /// The actual event payload.
    pub payload: Event,
}

impl Envelope {
    /// Create a new envelope with the current protocol version.
    pub fn new(sequence: u64, payload: Event) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            sequence,
            payload,
        }
    }

    /// Serialize the envelope to MessagePack bytes.
    pub fn to_msgpack(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec(self)
    }

    /// Deserialize an envelope from MessagePack bytes.
    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }
}

/// Top-level event enum containing all event types.
///
/// `Run`, `Input` and `Disconnect` travel from a client to the engine;
/// `Output` travels from the engine to a client. The transport addresses
/// every event by session id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    /// Request to build and execute a piece of source code.
    Run(RunRequest),
    /// Keystrokes for the running process's terminal.
    Input(InputData),
    /// The client went away; tear the session down.
    Disconnect,
    /// A chunk of terminal output from the running process.
    Output(OutputChunk),
}

/// Request to build and execute source code in a fresh process.
///
/// The language travels as a free-form string: an unrecognized value must
/// surface to the client as the fixed "Unsupported language" output message,
/// not as a deserialization failure, so the engine does the parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    /// Language the source is written in ("python", "c++", ...).
    pub language: String,
    /// The source code to run.
    pub code: String,
}

/// Raw bytes destined for the running process's terminal input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputData {
    /// The input bytes, forwarded verbatim.
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
}

/// One ordered chunk of decoded terminal output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputChunk {
    /// Permissively decoded output text.
    pub text: String,
}

impl OutputChunk {
    /// Convenience constructor for a text chunk.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip_envelope(event: Event) -> Envelope {
        let envelope = Envelope::new(42, event);
        let bytes = envelope.to_msgpack().expect("serialization failed");
        let decoded = Envelope::from_msgpack(&bytes).expect("deserialization failed");
        assert_eq!(envelope, decoded);
        decoded
    }

    #[test]
    fn test_envelope_version_and_sequence() {
        let envelope = Envelope::new(999, Event::Disconnect);
        assert_eq!(envelope.version, PROTOCOL_VERSION);
        assert_eq!(envelope.sequence, 999);
    }

    #[test]
    fn test_run_roundtrip() {
        roundtrip_envelope(Event::Run(RunRequest {
            language: "python".to_string(),
            code: "print('hi')\n".to_string(),
        }));
    }

    #[test]
    fn test_run_unknown_language_still_decodes() {
        // The language field is deliberately a plain string so an unknown
        // value reaches the engine instead of failing in serde.
        let decoded = roundtrip_envelope(Event::Run(RunRequest {
            language: "cobol".to_string(),
            code: "".to_string(),
        }));
        match decoded.payload {
            Event::Run(req) => assert_eq!(req.language, "cobol"),
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_input_binary_roundtrip() {
        roundtrip_envelope(Event::Input(InputData {
            data: vec![0x00, 0x03, 0xff, b'\n'],
        }));
    }

    #[test]
    fn test_disconnect_roundtrip() {
        roundtrip_envelope(Event::Disconnect);
    }

    #[test]
    fn test_output_unicode_roundtrip() {
        roundtrip_envelope(Event::Output(OutputChunk::new("λ> done ✔\r\n")));
    }

    #[test]
    fn test_output_chunk_compact() {
        let envelope = Envelope::new(1, Event::Output(OutputChunk::new("hi\r\n")));
        let bytes = envelope.to_msgpack().unwrap();
        assert!(bytes.len() < 100, "Output chunk too large: {} bytes", bytes.len());
    }

    #[test]
    fn test_empty_input() {
        roundtrip_envelope(Event::Input(InputData { data: vec![] }));
    }
}
