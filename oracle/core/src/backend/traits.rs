//! Oracle Transport Traits
//!
//! The seam between the dialogue client and whatever carries a follow-up
//! question to the oracle service. A transport opens one stream per request
//! and delivers [`StreamFrame`]s in arrival order over a channel.
//!
//! Every fault is classified into a [`FailureReason`] at this boundary;
//! nothing unclassified reaches the conversation.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::messages::{HistoryEntry, ReadingRef, RequestId};

/// Why a stream session failed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum FailureReason {
    /// Daily quota for this conversation context is used up
    #[error("rate limited")]
    RateLimited,
    /// The service is busy and queueing requests
    #[error("server overloaded")]
    Overloaded,
    /// Network or transport failure, or anything unrecognized
    #[error("oracle unreachable")]
    Unreachable,
}

impl FailureReason {
    /// User-facing note appended after any partial answer
    #[must_use]
    pub const fn annotation(self) -> &'static str {
        match self {
            Self::RateLimited => "今日追问次数已尽，不可贪念天机，请明日再来。",
            Self::Overloaded => "服务器正忙，正在排队中，请稍后重试...",
            Self::Unreachable => "网络仿佛有些拥挤，请稍后再试...",
        }
    }

    /// Classify a server error code (the `error` field of a JSON error body)
    #[must_use]
    pub fn from_error_code(code: &str) -> Option<Self> {
        match code {
            "daily_limit_reached" | "too_many_requests" => Some(Self::RateLimited),
            "server_busy" => Some(Self::Overloaded),
            _ => None,
        }
    }

    /// Classify an HTTP status that was not a success
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            403 | 429 => Self::RateLimited,
            503 => Self::Overloaded,
            _ => Self::Unreachable,
        }
    }

    /// Whether retrying right away has a chance of succeeding
    #[must_use]
    pub const fn retry_now(self) -> bool {
        !matches!(self, Self::RateLimited)
    }
}

/// One event on an open stream
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamFrame {
    /// Incremental text to append
    Fragment(String),
    /// Explicit end of stream
    End,
    /// The server signalled a failure mid-stream
    Failed(FailureReason),
}

impl StreamFrame {
    /// Whether no frames follow this one
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Fragment(_))
    }
}

/// A follow-up question for one reading
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FollowUpRequest {
    /// Correlation ID for this stream session
    pub request_id: RequestId,
    /// Reading the question is about
    pub reading: ReadingRef,
    /// Trimmed user message
    pub message: String,
    /// Prior turns, oldest first
    pub history: Vec<HistoryEntry>,
}

/// JSON body of a follow-up request
#[derive(Debug, Serialize)]
pub struct FollowUpBody<'a> {
    /// The new question
    pub message: &'a str,
    /// Prior turns, oldest first
    pub history: &'a [HistoryEntry],
}

impl FollowUpRequest {
    /// Create a request with a fresh request ID
    pub fn new(reading: ReadingRef, message: impl Into<String>, history: Vec<HistoryEntry>) -> Self {
        Self {
            request_id: RequestId::new(),
            reading,
            message: message.into(),
            history,
        }
    }

    /// Body as sent on the wire
    #[must_use]
    pub fn body(&self) -> FollowUpBody<'_> {
        FollowUpBody {
            message: &self.message,
            history: &self.history,
        }
    }
}

/// Errors from opening a stream
#[derive(Debug, Error)]
pub enum TransportError {
    /// The service answered with a non-success status
    #[error("oracle rejected the request with status {status} ({reason})")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Classified reason
        reason: FailureReason,
    },

    /// HTTP client failure (connect, TLS, body)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The configured base URL cannot be used
    #[error("invalid oracle URL: {0}")]
    InvalidUrl(String),

    /// Anything else
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Classify this error for the conversation
    #[must_use]
    pub fn classify(&self) -> FailureReason {
        match self {
            Self::Rejected { reason, .. } => *reason,
            Self::Http(_) | Self::InvalidUrl(_) | Self::Other(_) => FailureReason::Unreachable,
        }
    }
}

/// Oracle transport trait
///
/// Implement this to carry follow-up questions over a different medium.
#[async_trait]
pub trait OracleTransport: Send + Sync {
    /// Transport name for logs (e.g., "HTTP")
    fn name(&self) -> &str;

    /// Check if the oracle service is reachable
    async fn health_check(&self) -> bool;

    /// Open a stream for one follow-up request
    ///
    /// Returns once the service has accepted the exchange. Frames then arrive
    /// on the receiver in order; the last one is terminal. A channel that
    /// closes without a terminal frame means the stream was lost.
    async fn open_stream(
        &self,
        request: &FollowUpRequest,
    ) -> Result<mpsc::Receiver<StreamFrame>, TransportError>;
}
