//! # PolyRun Daemon Library
//!
//! This crate provides the execution engine behind PolyRun: interactive,
//! per-session code execution for several languages, with each run attached
//! to its own pseudo-terminal.
//!
//! ## Overview
//!
//! A session submits source code, the engine stages and (when needed)
//! compiles it, launches the resulting command on a fresh pty, and streams
//! the terminal output back while routing the session's keystrokes to the
//! child. Each session is bound to at most one live process; a new run
//! replaces the old one only after the old one has been fully torn down.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                        Event Router                           │
//! ├───────────────────────────────────────────────────────────────┤
//! │                                                               │
//! │  ┌─────────────────────────────────────────────────────────┐  │
//! │  │        Engine (session registry + lifecycle)            │  │
//! │  └─────────────────────────────────────────────────────────┘  │
//! │                                                               │
//! │  ┌──────────────┐  ┌──────────────┐  ┌───────────────────┐   │
//! │  │   Command    │  │     PTY      │  │   Output Pumps    │   │
//! │  │   Resolver   │  │  Supervisor  │  │ (one per process) │   │
//! │  └──────────────┘  └──────────────┘  └───────────────────┘   │
//! │                                                               │
//! │  ┌─────────────────────────────────────────────────────────┐  │
//! │  │            Event Sink (transport boundary)              │  │
//! │  └─────────────────────────────────────────────────────────┘  │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use daemon::{ChannelSink, Config, Engine};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default()?;
//!     let (sink, mut events) = ChannelSink::new();
//!     let engine = Arc::new(Engine::new(&config, Arc::new(sink)));
//!
//!     engine.run("session-1", "python", "print('hi')").await?;
//!     while let Some((session_id, event)) = events.recv().await {
//!         println!("{session_id}: {event:?}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`lang`]: Command resolution and temp-resource cleanup
//! - [`session`]: Process supervision, output pumping, session registry
//! - [`sink`]: Outbound event delivery
//! - [`router`]: Inbound event dispatch

pub mod config;
pub mod lang;
pub mod router;
pub mod session;
pub mod sink;

// Re-export protocol for convenience
pub use protocol;

// Re-export config types for convenience
pub use config::{Config, ConfigError, TerminalConfig, ToolchainConfig};

// Re-export language types for convenience
pub use lang::{Cleanup, CommandResolver, CommandSpec, Language, Resolution, ResolveError};

// Re-export session types for convenience
pub use session::{Engine, OutputPump, ProcessHandle, SessionError, SessionId, SessionState, SpawnError};

// Re-export sink and router types for convenience
pub use router::EventRouter;
pub use sink::{ChannelSink, EventSink};
