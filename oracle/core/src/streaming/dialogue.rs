//! Dialogue Client
//!
//! Drives one follow-up exchange at a time against an [`OracleTransport`],
//! folding streamed fragments into the conversation's pending oracle turn.
//!
//! ```text
//!   Idle ──submit──▶ Sending ──accepted──▶ Streaming ──[DONE]──▶ Completed
//!                      │                      │
//!                      ├──────────────────────┴──▶ Failed(reason)
//!                      └──────────────────────────▶ Cancelled
//! ```
//!
//! Each call to [`Dialogue::next_event`] suspends exactly once: on the
//! transport accepting the request, or on the next frame. That wait races
//! the session's cancellation token and the fragment timeout. The open
//! request lives in the session rather than in the call, so a caller may
//! drop `next_event` (e.g. inside `select!`) without the request being sent
//! twice.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::backend::{FailureReason, FollowUpRequest, OracleTransport, StreamFrame, TransportError};
use crate::conversation::Conversation;
use crate::messages::{MessageId, ReadingRef};

/// Note appended to an answer the inquirer stopped
pub const CANCELLED_ANNOTATION: &str = "（已停止作答）";

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for a dialogue
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DialogueConfig {
    /// Longest wait for acceptance or for the next frame
    pub fragment_timeout: Duration,
    /// Prior turns sent as context with each message
    pub max_context_turns: usize,
    /// Longest accepted message, in characters after trimming
    pub max_message_chars: usize,
    /// Turns kept in the conversation log (0 = unlimited)
    pub max_turns: usize,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            fragment_timeout: Duration::from_secs(60),
            max_context_turns: 20,
            max_message_chars: 500,
            max_turns: 0,
        }
    }
}

// ============================================================================
// Events and outcomes
// ============================================================================

/// Where the dialogue is in its state machine
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StreamPhase {
    /// No session; a message may be submitted
    #[default]
    Idle,
    /// Waiting for the oracle to accept the request
    Sending,
    /// Receiving fragments
    Streaming,
}

/// Rejection of a submitted message; nothing changes when returned
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// Nothing left after trimming
    #[error("message is empty")]
    EmptyMessage,
    /// Over the configured length
    #[error("message has {len} characters, the limit is {max}")]
    MessageTooLong {
        /// Characters in the trimmed message
        len: usize,
        /// Configured limit
        max: usize,
    },
    /// A previous answer is still streaming
    #[error("the oracle is still answering")]
    Busy,
}

/// How a stream session ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    /// Explicit end marker received
    Completed,
    /// Classified failure
    Failed(FailureReason),
    /// Stopped by the inquirer
    Cancelled,
}

impl Termination {
    /// Note appended to the partial answer, if any
    #[must_use]
    pub const fn annotation(self) -> Option<&'static str> {
        match self {
            Self::Completed => None,
            Self::Failed(reason) => Some(reason.annotation()),
            Self::Cancelled => Some(CANCELLED_ANNOTATION),
        }
    }
}

/// Progress of the current session
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DialogueEvent {
    /// The oracle accepted the request
    Accepted {
        /// Pending oracle turn
        turn_id: MessageId,
    },
    /// A fragment was appended to the pending turn
    Fragment {
        /// Pending oracle turn
        turn_id: MessageId,
        /// The new text
        text: String,
    },
    /// The answer is complete
    Completed {
        /// Finalized oracle turn
        turn_id: MessageId,
        /// Full answer
        text: String,
    },
    /// The session failed; `partial` is what arrived before the failure
    Failed {
        /// Finalized oracle turn
        turn_id: MessageId,
        /// Classified reason
        reason: FailureReason,
        /// Text received before the failure
        partial: String,
    },
    /// The session was cancelled
    Cancelled {
        /// Finalized oracle turn
        turn_id: MessageId,
        /// Text received before cancellation
        partial: String,
    },
}

impl DialogueEvent {
    /// Whether this event ends the session
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Accepted { .. } | Self::Fragment { .. })
    }

    /// Turn the event belongs to
    #[must_use]
    pub fn turn_id(&self) -> &MessageId {
        match self {
            Self::Accepted { turn_id }
            | Self::Fragment { turn_id, .. }
            | Self::Completed { turn_id, .. }
            | Self::Failed { turn_id, .. }
            | Self::Cancelled { turn_id, .. } => turn_id,
        }
    }
}

/// Summary of a finished session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionOutcome {
    /// Finalized oracle turn
    pub turn_id: MessageId,
    /// How it ended
    pub termination: Termination,
    /// Final body of the turn, annotation included
    pub text: String,
    /// Fragments received
    pub fragments: u32,
    /// Time from submit to termination
    pub elapsed: Duration,
}

// ============================================================================
// Stream session
// ============================================================================

type OpenStream = BoxFuture<'static, Result<mpsc::Receiver<StreamFrame>, TransportError>>;

enum SessionPhase {
    /// The open request, polled across calls until it resolves
    Sending(OpenStream),
    Streaming(mpsc::Receiver<StreamFrame>),
}

/// One submitted message and its in-flight answer
struct StreamSession {
    turn_id: MessageId,
    phase: SessionPhase,
    cancel: CancellationToken,
    fragments: u32,
    started: Instant,
    /// Latest moment the transport may accept
    accept_deadline: Instant,
}

/// Result of one suspension
enum Step {
    Accepted,
    Fragment(String),
    Finished(Termination),
}

impl StreamSession {
    async fn step(&mut self, timeout: Duration) -> Step {
        match &mut self.phase {
            SessionPhase::Sending(open) => {
                let opened = tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => return Step::Finished(Termination::Cancelled),
                    opened = tokio::time::timeout_at(self.accept_deadline, open) => opened,
                };
                match opened {
                    Ok(Ok(rx)) => {
                        self.phase = SessionPhase::Streaming(rx);
                        Step::Accepted
                    }
                    Ok(Err(err)) => {
                        tracing::debug!(turn = %self.turn_id, error = %err, "Follow-up not accepted");
                        Step::Finished(Termination::Failed(err.classify()))
                    }
                    Err(_) => {
                        tracing::debug!(turn = %self.turn_id, "Timed out waiting for acceptance");
                        Step::Finished(Termination::Failed(FailureReason::Unreachable))
                    }
                }
            }
            SessionPhase::Streaming(rx) => {
                let frame = tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => return Step::Finished(Termination::Cancelled),
                    frame = tokio::time::timeout(timeout, rx.recv()) => frame,
                };
                match frame {
                    Ok(Some(StreamFrame::Fragment(text))) => Step::Fragment(text),
                    Ok(Some(StreamFrame::End)) => Step::Finished(Termination::Completed),
                    Ok(Some(StreamFrame::Failed(reason))) => Step::Finished(Termination::Failed(reason)),
                    Ok(None) => {
                        tracing::debug!(turn = %self.turn_id, "Stream closed without end marker");
                        Step::Finished(Termination::Failed(FailureReason::Unreachable))
                    }
                    Err(_) => {
                        tracing::debug!(turn = %self.turn_id, "Timed out waiting for next fragment");
                        Step::Finished(Termination::Failed(FailureReason::Unreachable))
                    }
                }
            }
        }
    }
}

// ============================================================================
// Dialogue
// ============================================================================

/// Follow-up chat about one reading
///
/// Single-flight: at most one message is in flight, and its answer is the
/// only turn that changes until it terminates.
pub struct Dialogue<T: OracleTransport + ?Sized + 'static> {
    transport: Arc<T>,
    config: DialogueConfig,
    conversation: Conversation,
    session: Option<StreamSession>,
    last_outcome: Option<SessionOutcome>,
}

impl<T: OracleTransport + ?Sized + 'static> Dialogue<T> {
    /// Create a dialogue with an empty conversation
    pub fn new(transport: Arc<T>, reading: ReadingRef, config: DialogueConfig) -> Self {
        let conversation = Conversation::with_limits(reading, config.max_turns, 0);
        Self::with_conversation(transport, conversation, config)
    }

    /// Resume a dialogue over an existing conversation
    pub fn with_conversation(transport: Arc<T>, conversation: Conversation, config: DialogueConfig) -> Self {
        Self {
            transport,
            config,
            conversation,
            session: None,
            last_outcome: None,
        }
    }

    /// The conversation so far
    #[must_use]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Dialogue configuration
    #[must_use]
    pub fn config(&self) -> &DialogueConfig {
        &self.config
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> StreamPhase {
        match self.session.as_ref().map(|s| &s.phase) {
            None => StreamPhase::Idle,
            Some(SessionPhase::Sending(_)) => StreamPhase::Sending,
            Some(SessionPhase::Streaming(_)) => StreamPhase::Streaming,
        }
    }

    /// Whether a session is in flight
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.session.is_some()
    }

    /// Outcome of the most recent finished session
    #[must_use]
    pub fn last_outcome(&self) -> Option<&SessionOutcome> {
        self.last_outcome.as_ref()
    }

    /// Token that cancels the current session, if one is in flight
    ///
    /// Cancelling a clone from another task ends the session at its next
    /// suspension with the partial answer kept.
    #[must_use]
    pub fn cancel_token(&self) -> Option<CancellationToken> {
        self.session.as_ref().map(|s| s.cancel.clone())
    }

    /// Cancel the current session, if any
    pub fn cancel(&self) {
        if let Some(session) = &self.session {
            session.cancel.cancel();
        }
    }

    /// Submit a message, starting a session
    ///
    /// Appends the inquirer turn and a pending oracle turn, returning the
    /// pending turn's ID. Drive the session with [`Self::next_event`].
    pub fn submit(&mut self, message: &str) -> Result<MessageId, SubmitError> {
        if self.session.is_some() || self.conversation.has_pending() {
            return Err(SubmitError::Busy);
        }

        let message = message.trim();
        if message.is_empty() {
            return Err(SubmitError::EmptyMessage);
        }
        let len = message.chars().count();
        if len > self.config.max_message_chars {
            return Err(SubmitError::MessageTooLong {
                len,
                max: self.config.max_message_chars,
            });
        }

        // History is everything before this message
        let history = self.conversation.history(self.config.max_context_turns);
        self.conversation.push_inquirer(message);
        let turn_id = self
            .conversation
            .begin_oracle_turn()
            .map_err(|_| SubmitError::Busy)?;

        let request = FollowUpRequest::new(self.conversation.reading(), message, history);
        tracing::debug!(
            turn = %turn_id,
            request_id = %request.request_id,
            reading = %request.reading,
            transport = self.transport.name(),
            history = request.history.len(),
            "Submitting follow-up"
        );

        let transport = Arc::clone(&self.transport);
        let open: OpenStream = Box::pin(async move { transport.open_stream(&request).await });

        let started = Instant::now();
        self.session = Some(StreamSession {
            turn_id: turn_id.clone(),
            phase: SessionPhase::Sending(open),
            cancel: CancellationToken::new(),
            fragments: 0,
            started,
            accept_deadline: started + self.config.fragment_timeout,
        });
        Ok(turn_id)
    }

    /// Advance the current session by one step
    ///
    /// Returns `None` when idle. Dropping the returned future before it
    /// completes leaves the session where it was: a pending open request
    /// keeps running in the session and is resumed by the next call, and
    /// unread frames stay queued.
    pub async fn next_event(&mut self) -> Option<DialogueEvent> {
        let session = self.session.as_mut()?;
        let step = session.step(self.config.fragment_timeout).await;

        match step {
            Step::Accepted => {
                tracing::debug!(turn = %session.turn_id, "Oracle accepted follow-up");
                Some(DialogueEvent::Accepted {
                    turn_id: session.turn_id.clone(),
                })
            }
            Step::Fragment(text) => {
                session.fragments += 1;
                tracing::trace!(turn = %session.turn_id, len = text.len(), "Fragment");
                self.conversation.append_pending(&session.turn_id, &text);
                Some(DialogueEvent::Fragment {
                    turn_id: session.turn_id.clone(),
                    text,
                })
            }
            Step::Finished(termination) => self
                .session
                .take()
                .map(|session| self.finish(session, termination)),
        }
    }

    /// Drive the current session to its end, passing every event to `on_event`
    ///
    /// Returns `None` if no session was in flight.
    pub async fn run_to_end<F>(&mut self, mut on_event: F) -> Option<SessionOutcome>
    where
        F: FnMut(&DialogueEvent),
    {
        while let Some(event) = self.next_event().await {
            on_event(&event);
            if event.is_terminal() {
                return self.last_outcome.clone();
            }
        }
        None
    }

    /// Submit a message and wait for the whole answer
    pub async fn send_follow_up(&mut self, message: &str) -> Result<SessionOutcome, SubmitError> {
        let turn_id = self.submit(message)?;
        let started = Instant::now();
        Ok(self.run_to_end(|_| {}).await.unwrap_or_else(|| SessionOutcome {
            turn_id,
            termination: Termination::Failed(FailureReason::Unreachable),
            text: String::new(),
            fragments: 0,
            elapsed: started.elapsed(),
        }))
    }

    /// Fold a terminated session into the conversation
    fn finish(&mut self, session: StreamSession, termination: Termination) -> DialogueEvent {
        let turn_id = session.turn_id;
        let partial = self
            .conversation
            .pending_turn()
            .map(|t| t.text().to_string())
            .unwrap_or_default();

        let text = self
            .conversation
            .finalize_pending(&turn_id, termination.annotation())
            .map_or_else(|| partial.clone(), |t| t.text().to_string());

        let elapsed = session.started.elapsed();
        match termination {
            Termination::Completed => tracing::info!(
                turn = %turn_id,
                fragments = session.fragments,
                elapsed_ms = elapsed.as_millis() as u64,
                "Follow-up answered"
            ),
            Termination::Failed(reason) => tracing::warn!(
                turn = %turn_id,
                reason = %reason,
                fragments = session.fragments,
                elapsed_ms = elapsed.as_millis() as u64,
                "Follow-up failed"
            ),
            Termination::Cancelled => tracing::warn!(
                turn = %turn_id,
                fragments = session.fragments,
                "Follow-up cancelled"
            ),
        }

        self.last_outcome = Some(SessionOutcome {
            turn_id: turn_id.clone(),
            termination,
            text: text.clone(),
            fragments: session.fragments,
            elapsed,
        });

        match termination {
            Termination::Completed => DialogueEvent::Completed { turn_id, text },
            Termination::Failed(reason) => DialogueEvent::Failed {
                turn_id,
                reason,
                partial,
            },
            Termination::Cancelled => DialogueEvent::Cancelled { turn_id, partial },
        }
    }
}
