//! Per-session process lifecycle.
//!
//! This module provides pty process supervision, the output pump that
//! forwards terminal output to the session's sink, and the registry binding
//! each session id to at most one live process.

pub mod process;
pub mod pump;
pub mod registry;

pub use process::{ProcessHandle, SpawnError};
pub use pump::OutputPump;
pub use registry::{Engine, SessionError, SessionId, SessionState};
