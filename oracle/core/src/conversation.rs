//! Conversation Log
//!
//! The ordered, append-only list of turns for one reading's follow-up chat.
//!
//! # Pending turns
//!
//! An oracle turn is appended with a `Pending` body the moment a message is
//! submitted, so surfaces can show a waiting indicator. While streaming, only
//! that turn's body grows; it is located by its [`MessageId`], never by
//! position. Once the stream terminates the body becomes `Final` and is never
//! touched again. At most one turn is pending at a time.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::messages::{HistoryEntry, MessageId, MessageRole, ReadingRef};

/// Errors from conversation mutations
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConversationError {
    /// A pending oracle turn already exists
    #[error("turn {0} is still pending")]
    TurnAlreadyPending(MessageId),
}

/// Body of a turn
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "text", rename_all = "lowercase")]
pub enum TurnBody {
    /// Still receiving fragments; holds the text so far
    Pending(String),
    /// Complete and immutable
    Final(String),
}

impl TurnBody {
    /// Current text
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Pending(text) | Self::Final(text) => text,
        }
    }

    /// Whether the body can still grow
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

/// One message in the conversation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn ID
    pub id: MessageId,
    /// Who spoke
    pub role: MessageRole,
    /// When the turn was created (Unix timestamp ms)
    pub timestamp: u64,
    body: TurnBody,
}

impl Turn {
    fn finished(role: MessageRole, text: String) -> Self {
        Self {
            id: MessageId::new(),
            role,
            timestamp: now_ms(),
            body: TurnBody::Final(text),
        }
    }

    fn pending(role: MessageRole) -> Self {
        Self {
            id: MessageId::new(),
            role,
            timestamp: now_ms(),
            body: TurnBody::Pending(String::new()),
        }
    }

    /// Current text
    #[must_use]
    pub fn text(&self) -> &str {
        self.body.text()
    }

    /// Body with its state
    #[must_use]
    pub fn body(&self) -> &TurnBody {
        &self.body
    }

    /// Whether this turn is still streaming
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.body.is_pending()
    }

    /// Reduce to what the oracle service receives as history
    #[must_use]
    pub fn to_history_entry(&self) -> HistoryEntry {
        HistoryEntry {
            role: self.role,
            content: self.text().to_string(),
        }
    }
}

/// Follow-up conversation for one reading
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conversation {
    reading: ReadingRef,
    turns: Vec<Turn>,
    pending_id: Option<MessageId>,
    /// Maximum number of turns to keep (0 = unlimited)
    #[serde(default)]
    max_turns: usize,
    /// Maximum total content bytes (0 = unlimited)
    #[serde(default)]
    max_content_bytes: usize,
    #[serde(default)]
    content_bytes: usize,
}

impl Conversation {
    /// Create an empty, unbounded conversation
    #[must_use]
    pub fn new(reading: ReadingRef) -> Self {
        Self::with_limits(reading, 0, 0)
    }

    /// Create an empty conversation that prunes its oldest turns past the limits
    #[must_use]
    pub fn with_limits(reading: ReadingRef, max_turns: usize, max_content_bytes: usize) -> Self {
        Self {
            reading,
            turns: Vec::new(),
            pending_id: None,
            max_turns,
            max_content_bytes,
            content_bytes: 0,
        }
    }

    /// The reading this conversation is about
    #[must_use]
    pub fn reading(&self) -> ReadingRef {
        self.reading
    }

    /// All turns in order
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of turns
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether there are no turns
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Most recent turn
    #[must_use]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Turn by ID
    #[must_use]
    pub fn get(&self, id: &MessageId) -> Option<&Turn> {
        self.turns.iter().find(|t| &t.id == id)
    }

    /// Append a complete inquirer turn
    pub fn push_inquirer(&mut self, text: impl Into<String>) -> MessageId {
        self.push_final(MessageRole::Inquirer, text.into())
    }

    /// Append a complete oracle turn
    pub fn push_oracle(&mut self, text: impl Into<String>) -> MessageId {
        self.push_final(MessageRole::Oracle, text.into())
    }

    fn push_final(&mut self, role: MessageRole, text: String) -> MessageId {
        self.content_bytes += text.len();
        let turn = Turn::finished(role, text);
        let id = turn.id.clone();
        self.turns.push(turn);
        self.prune_if_needed();
        id
    }

    /// Append an empty pending oracle turn
    ///
    /// # Errors
    ///
    /// Returns [`ConversationError::TurnAlreadyPending`] if one already exists.
    pub fn begin_oracle_turn(&mut self) -> Result<MessageId, ConversationError> {
        if let Some(ref id) = self.pending_id {
            return Err(ConversationError::TurnAlreadyPending(id.clone()));
        }
        let turn = Turn::pending(MessageRole::Oracle);
        let id = turn.id.clone();
        self.pending_id = Some(id.clone());
        self.turns.push(turn);
        Ok(id)
    }

    /// The pending turn, if any
    #[must_use]
    pub fn pending_turn(&self) -> Option<&Turn> {
        let id = self.pending_id.as_ref()?;
        self.turns.iter().rev().find(|t| &t.id == id)
    }

    /// Whether a turn is currently pending
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending_id.is_some()
    }

    fn pending_mut(&mut self, id: &MessageId) -> Option<&mut Turn> {
        if self.pending_id.as_ref() != Some(id) {
            return None;
        }
        // The pending turn is normally last, so search from the back
        self.turns.iter_mut().rev().find(|t| &t.id == id)
    }

    /// Append a fragment to the pending turn `id`
    ///
    /// Returns `false` (and changes nothing) if `id` is not the pending turn.
    pub fn append_pending(&mut self, id: &MessageId, fragment: &str) -> bool {
        let Some(turn) = self.pending_mut(id) else {
            return false;
        };
        match turn.body {
            TurnBody::Pending(ref mut text) => text.push_str(fragment),
            TurnBody::Final(_) => return false,
        }
        self.content_bytes += fragment.len();
        true
    }

    /// Make the pending turn `id` final, optionally appending an annotation
    ///
    /// The annotation goes after any text already received, on its own line.
    pub fn finalize_pending(&mut self, id: &MessageId, annotation: Option<&str>) -> Option<&Turn> {
        let turn = self.pending_mut(id)?;
        let mut text = match std::mem::replace(&mut turn.body, TurnBody::Final(String::new())) {
            TurnBody::Pending(text) | TurnBody::Final(text) => text,
        };
        let before = text.len();
        if let Some(note) = annotation {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(note);
        }
        let added = text.len() - before;
        turn.body = TurnBody::Final(text);

        self.content_bytes += added;
        self.pending_id = None;
        self.prune_if_needed();
        self.get(id)
    }

    /// Prior turns as history, oldest first, limited to the newest `max_turns`
    ///
    /// Pending turns are never included.
    #[must_use]
    pub fn history(&self, max_turns: usize) -> Vec<HistoryEntry> {
        let finals: Vec<&Turn> = self.turns.iter().filter(|t| !t.is_pending()).collect();
        let start = finals.len().saturating_sub(max_turns);
        finals[start..]
            .iter()
            .map(|t| t.to_history_entry())
            .collect()
    }

    /// Current content size in bytes
    #[must_use]
    pub fn content_bytes(&self) -> usize {
        self.content_bytes
    }

    /// Configured limits `(max_turns, max_content_bytes)`
    #[must_use]
    pub fn limits(&self) -> (usize, usize) {
        (self.max_turns, self.max_content_bytes)
    }

    /// Drop the oldest non-pending turns until within limits
    fn prune_if_needed(&mut self) {
        if self.max_turns == 0 && self.max_content_bytes == 0 {
            return;
        }

        let mut removed = 0usize;
        while self.over_limit() {
            let Some(idx) = self.turns.iter().position(|t| !t.is_pending()) else {
                break;
            };
            let turn = self.turns.remove(idx);
            self.content_bytes = self.content_bytes.saturating_sub(turn.text().len());
            removed += 1;
        }

        if removed > 0 {
            tracing::debug!(
                removed = removed,
                remaining = self.turns.len(),
                bytes = self.content_bytes,
                "Pruned conversation turns"
            );
        }
    }

    fn over_limit(&self) -> bool {
        (self.max_turns > 0 && self.turns.len() > self.max_turns)
            || (self.max_content_bytes > 0 && self.content_bytes > self.max_content_bytes)
    }
}

/// Get current timestamp in milliseconds
fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn conversation() -> Conversation {
        Conversation::new(ReadingRef::divination(1))
    }

    #[test]
    fn test_pending_turn_grows_then_freezes() {
        let mut conv = conversation();
        conv.push_inquirer("问财运");
        let id = conv.begin_oracle_turn().unwrap();
        assert!(conv.has_pending());

        assert!(conv.append_pending(&id, "财"));
        assert!(conv.append_pending(&id, "运亨通"));
        assert_eq!(conv.pending_turn().unwrap().text(), "财运亨通");

        let turn = conv.finalize_pending(&id, None).unwrap();
        assert_eq!(turn.body(), &TurnBody::Final("财运亨通".to_string()));
        assert!(!conv.has_pending());

        // Final turns no longer accept fragments
        assert!(!conv.append_pending(&id, "!"));
        assert_eq!(conv.get(&id).unwrap().text(), "财运亨通");
    }

    #[test]
    fn test_only_one_pending_turn() {
        let mut conv = conversation();
        let id = conv.begin_oracle_turn().unwrap();
        assert_eq!(
            conv.begin_oracle_turn(),
            Err(ConversationError::TurnAlreadyPending(id))
        );
    }

    #[test]
    fn test_append_to_wrong_turn_is_ignored() {
        let mut conv = conversation();
        let user = conv.push_inquirer("hello");
        let _pending = conv.begin_oracle_turn().unwrap();
        assert!(!conv.append_pending(&user, "tampered"));
        assert_eq!(conv.get(&user).unwrap().text(), "hello");
    }

    #[test]
    fn test_annotation_appended_after_partial() {
        let mut conv = conversation();
        let id = conv.begin_oracle_turn().unwrap();
        conv.append_pending(&id, "部分");
        let turn = conv.finalize_pending(&id, Some("稍后再试")).unwrap();
        assert_eq!(turn.text(), "部分\n稍后再试");
    }

    #[test]
    fn test_annotation_alone_when_nothing_streamed() {
        let mut conv = conversation();
        let id = conv.begin_oracle_turn().unwrap();
        let turn = conv.finalize_pending(&id, Some("稍后再试")).unwrap();
        assert_eq!(turn.text(), "稍后再试");
    }

    #[test]
    fn test_history_excludes_pending_and_keeps_order() {
        let mut conv = conversation();
        conv.push_inquirer("一");
        conv.push_oracle("二");
        conv.push_inquirer("三");
        conv.begin_oracle_turn().unwrap();

        let history = conv.history(10);
        let contents: Vec<_> = history.iter().map(|h| h.content.as_str()).collect();
        assert_eq!(contents, vec!["一", "二", "三"]);
        assert_eq!(history[1].role, MessageRole::Oracle);

        let bounded = conv.history(2);
        assert_eq!(bounded.len(), 2);
        assert_eq!(bounded[0].content, "二");
    }

    #[test]
    fn test_prune_by_turn_count_spares_pending() {
        let mut conv = Conversation::with_limits(ReadingRef::love(3), 2, 0);
        conv.push_inquirer("a");
        conv.push_oracle("b");
        let id = conv.begin_oracle_turn().unwrap();
        conv.push_inquirer("c");

        assert_eq!(conv.len(), 2);
        assert!(conv.pending_turn().is_some());
        assert_eq!(conv.get(&id).unwrap().role, MessageRole::Oracle);
        assert_eq!(conv.last().unwrap().text(), "c");
    }

    #[test]
    fn test_prune_by_bytes() {
        let mut conv = Conversation::with_limits(ReadingRef::divination(9), 0, 25);
        for _ in 0..5 {
            conv.push_inquirer("AAAAAAAAAA");
        }
        assert!(conv.content_bytes() <= 25);
        assert_eq!(conv.len(), 2);
    }

    #[test]
    fn test_content_bytes_tracking() {
        let mut conv = conversation();
        conv.push_inquirer("Hello");
        let id = conv.begin_oracle_turn().unwrap();
        conv.append_pending(&id, "World!");
        conv.finalize_pending(&id, None);
        assert_eq!(conv.content_bytes(), 11);
    }
}
