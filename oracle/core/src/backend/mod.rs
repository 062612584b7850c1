//! Oracle Backend Integration
//!
//! Abstracted access to the oracle service through a common trait, so the
//! dialogue client never sees HTTP, SSE, or status codes.
//!
//! # Available Transports
//!
//! - **HTTP**: the fromheart service, answers streamed as SSE
//! - **Scripted**: replays canned replies, for tests and offline use
//!
//! # Usage
//!
//! ```ignore
//! use oracle_core::backend::{FollowUpRequest, HttpOracle, OracleTransport};
//! use oracle_core::messages::ReadingRef;
//!
//! let oracle = HttpOracle::new("http://localhost:8080")?;
//! let request = FollowUpRequest::new(ReadingRef::divination(42), "还有呢", Vec::new());
//! let mut rx = oracle.open_stream(&request).await?;
//! ```

mod http;
mod scripted;
mod sse;
mod traits;

pub use http::HttpOracle;
pub use scripted::{ScriptedOracle, ScriptedReply};
pub use sse::SseDecoder;
pub use traits::{
    FailureReason, FollowUpBody, FollowUpRequest, OracleTransport, StreamFrame, TransportError,
};
