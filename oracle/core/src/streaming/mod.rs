//! Streaming Dialogue
//!
//! Turns a follow-up question into a live, growing oracle answer.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                         Dialogue                               │
//! │   submit() ──▶ Conversation: [.. user, oracle(Pending)]        │
//! │                                         ▲                      │
//! │   next_event() ── select! ─┬─ cancel    │ append by MessageId  │
//! │                            ├─ timeout   │                      │
//! │                            └─ frame ────┘                      │
//! └────────────────────────────┬──────────────────────────────────┘
//!                              │ mpsc::Receiver<StreamFrame>
//! ┌────────────────────────────┴──────────────────────────────────┐
//! │        OracleTransport (HttpOracle: reqwest + SSE decode)      │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use oracle_core::backend::HttpOracle;
//! use oracle_core::messages::ReadingRef;
//! use oracle_core::streaming::{Dialogue, DialogueConfig, DialogueEvent};
//!
//! let oracle = Arc::new(HttpOracle::new("http://localhost:8080")?);
//! let mut dialogue = Dialogue::new(oracle, ReadingRef::divination(42), DialogueConfig::default());
//!
//! dialogue.submit("这件事何时有结果？")?;
//! while let Some(event) = dialogue.next_event().await {
//!     if let DialogueEvent::Fragment { text, .. } = &event {
//!         print!("{text}");
//!     }
//! }
//! ```

mod dialogue;

pub use dialogue::{
    Dialogue, DialogueConfig, DialogueEvent, SessionOutcome, StreamPhase, SubmitError,
    Termination, CANCELLED_ANNOTATION,
};
