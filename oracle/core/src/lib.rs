//! Oracle Core - Hexagram Codec and Follow-up Dialogue for fromheart
//!
//! This crate holds everything a fromheart surface needs besides drawing:
//! translating hexagram names to line structures, and carrying a follow-up
//! conversation about a stored reading to the oracle service, streaming the
//! answer back fragment by fragment.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Surfaces (CLI, ...)                    │
//! └───────┬──────────────────────────────────────┬───────────────┘
//!         │ name                                 │ message
//! ┌───────┴────────┐                   ┌─────────┴──────────────┐
//! │   hexagram     │                   │  streaming::Dialogue   │
//! │ (pure, sync)   │                   │  conversation log      │
//! │ table, render  │                   └─────────┬──────────────┘
//! └────────────────┘                             │ OracleTransport
//!                                      ┌─────────┴──────────────┐
//!                                      │ backend::HttpOracle    │
//!                                      │ (reqwest, SSE)         │
//!                                      └────────────────────────┘
//! ```
//!
//! # Module Overview
//!
//! - [`hexagram`]: Trigram/hexagram codec and glyph layout
//! - [`messages`]: Identifiers and wire types
//! - [`conversation`]: Ordered turn log with a single pending oracle turn
//! - [`backend`]: Oracle transport abstraction (HTTP/SSE, scripted)
//! - [`streaming`]: The single-flight dialogue state machine
//! - [`config`]: TOML/env configuration
//!
//! # No Surface Dependencies
//!
//! Nothing here writes to a terminal. The codec does no I/O at all.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod config;
pub mod conversation;
pub mod hexagram;
pub mod messages;
pub mod streaming;

// Re-exports for convenience
pub use backend::{
    FailureReason, FollowUpRequest, HttpOracle, OracleTransport, StreamFrame, TransportError,
};
pub use conversation::{Conversation, ConversationError, Turn, TurnBody};
pub use hexagram::{
    name_for_structure, render_name, structure_for_name, GlyphSize, Hexagram, LineSequence,
    RenderedHexagram, Trigram, UnknownHexagram,
};
pub use messages::{HistoryEntry, MessageId, MessageRole, ReadingKind, ReadingRef, RequestId};
pub use streaming::{
    Dialogue, DialogueConfig, DialogueEvent, SessionOutcome, StreamPhase, SubmitError,
    Termination,
};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, BackendSettings, ConfigError,
    ConfigOverrides, ConfigSource, OracleConfig,
};
