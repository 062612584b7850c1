//! Identifiers and Wire Types
//!
//! Small shared types: turn and request identifiers, who is speaking, which
//! reading a conversation belongs to, and the `(role, content)` pairs sent to
//! the oracle service as history.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a conversation turn
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a new unique message ID
    pub fn new() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        Self(format!("turn_{id}"))
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier for one stream session, sent to the backend for log correlation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub uuid::Uuid);

impl RequestId {
    /// Generate a new random request ID
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Who spoke a turn
///
/// Serialized with the role names the oracle service expects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageRole {
    /// The person asking
    #[serde(rename = "user")]
    Inquirer,
    /// The master answering
    #[serde(rename = "assistant")]
    Oracle,
}

impl MessageRole {
    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inquirer => "user",
            Self::Oracle => "assistant",
        }
    }
}

/// Kind of stored reading a conversation is attached to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingKind {
    /// A question divination
    Divination,
    /// A two-person match reading
    Love,
}

/// Reference to a stored reading held by the oracle service
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReadingRef {
    /// Which kind of reading
    pub kind: ReadingKind,
    /// Backend record ID
    pub id: u64,
}

impl ReadingRef {
    /// A divination reading
    #[must_use]
    pub const fn divination(id: u64) -> Self {
        Self {
            kind: ReadingKind::Divination,
            id,
        }
    }

    /// A love-match reading
    #[must_use]
    pub const fn love(id: u64) -> Self {
        Self {
            kind: ReadingKind::Love,
            id,
        }
    }

    /// Path of the streaming follow-up chat endpoint for this reading
    #[must_use]
    pub fn chat_stream_path(&self) -> String {
        match self.kind {
            ReadingKind::Divination => format!("/api/divination/{}/chat/stream", self.id),
            ReadingKind::Love => format!("/api/love/{}/chat/stream", self.id),
        }
    }
}

impl fmt::Display for ReadingRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ReadingKind::Divination => write!(f, "divination#{}", self.id),
            ReadingKind::Love => write!(f, "love#{}", self.id),
        }
    }
}

/// A prior turn as sent to the oracle service: role and text only
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Who spoke
    pub role: MessageRole,
    /// What was said
    pub content: String,
}
