//! # PolyRun Protocol Library
//!
//! This crate provides the wire-level event definitions shared between the
//! PolyRun execution engine and whatever transport carries events to and from
//! remote clients.
//!
//! ## Overview
//!
//! The protocol is deliberately small. A client addresses the engine with
//! three events, and the engine answers with one:
//!
//! ```text
//! client ──► Run { language, code }      start (or replace) a run
//! client ──► Input { data }              keystrokes for the child's terminal
//! client ──► Disconnect                  tear the session down
//! client ◄── Output { text }             ordered chunks of terminal output
//! ```
//!
//! Events are wrapped in a versioned [`Envelope`] and serialized with
//! MessagePack. Session addressing is the transport's job; no session id
//! appears inside the events themselves.
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::{Envelope, Event};
//! use protocol::events::RunRequest;
//!
//! let event = Event::Run(RunRequest {
//!     language: "python".to_string(),
//!     code: "print('hi')".to_string(),
//! });
//! let envelope = Envelope::new(1, event);
//!
//! let bytes = envelope.to_msgpack().unwrap();
//! let decoded = Envelope::from_msgpack(&bytes).unwrap();
//! assert_eq!(envelope, decoded);
//! ```
//!
//! ## Modules
//!
//! - [`events`]: Protocol event definitions
//! - [`error`]: Error types

pub mod error;
pub mod events;

pub use error::{ProtocolError, Result};
pub use events::{Envelope, Event, InputData, OutputChunk, RunRequest, PROTOCOL_VERSION};
