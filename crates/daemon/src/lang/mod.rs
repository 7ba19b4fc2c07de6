//! Language support: command resolution and temp-resource cleanup.
//!
//! This module turns (language, source) pairs into runnable commands,
//! including any synchronous compilation step, and owns the tagged cleanup
//! actions that release staged files and build directories.

pub mod cleanup;
pub mod resolver;

pub use cleanup::Cleanup;
pub use resolver::{CommandResolver, CommandSpec, Language, Resolution, ResolveError};
