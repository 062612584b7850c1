//! Scripted transport that replays canned replies in order.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

use super::traits::{FailureReason, FollowUpRequest, OracleTransport, StreamFrame, TransportError};

/// One canned reply
#[derive(Clone, Debug)]
pub enum ScriptedReply {
    /// Accept, deliver these frames, then close the channel
    Frames(Vec<StreamFrame>),
    /// Reject before any frame with the given status
    Reject {
        /// HTTP status code to report
        status: u16,
        /// Classified reason
        reason: FailureReason,
    },
    /// Accept, deliver these frames, then go silent with the channel open
    Stall(Vec<StreamFrame>),
    /// Accept only once `gate` is notified, then deliver `frames`
    Gated {
        /// Released by the test when acceptance may proceed
        gate: Arc<Notify>,
        /// Frames delivered after acceptance
        frames: Vec<StreamFrame>,
    },
    /// Never answer the request at all
    Hang,
}

impl ScriptedReply {
    /// A complete answer streamed as the given fragments
    pub fn answer<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut frames: Vec<StreamFrame> = fragments
            .into_iter()
            .map(|text| StreamFrame::Fragment(text.into()))
            .collect();
        frames.push(StreamFrame::End);
        Self::Frames(frames)
    }
}

/// Transport that answers from a queue of [`ScriptedReply`]s
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<FollowUpRequest>>,
    stalled: Mutex<Vec<mpsc::Sender<StreamFrame>>>,
}

impl ScriptedOracle {
    /// Create with replies served first to last
    pub fn new(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Queue another reply
    pub fn push(&self, reply: ScriptedReply) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(reply);
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<FollowUpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl OracleTransport for ScriptedOracle {
    fn name(&self) -> &str {
        "Scripted"
    }

    async fn health_check(&self) -> bool {
        true
    }

    async fn open_stream(
        &self,
        request: &FollowUpRequest,
    ) -> Result<mpsc::Receiver<StreamFrame>, TransportError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let reply = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or_else(|| TransportError::Other("no scripted reply left".to_string()))?;

        let (frames, keep_open) = match reply {
            ScriptedReply::Frames(frames) => (frames, false),
            ScriptedReply::Stall(frames) => (frames, true),
            ScriptedReply::Gated { gate, frames } => {
                gate.notified().await;
                (frames, false)
            }
            ScriptedReply::Reject { status, reason } => {
                return Err(TransportError::Rejected { status, reason });
            }
            ScriptedReply::Hang => std::future::pending().await,
        };

        let (tx, rx) = mpsc::channel(frames.len().max(1));
        for frame in frames {
            // Capacity covers every frame
            let _ = tx.try_send(frame);
        }
        if keep_open {
            self.stalled
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(tx);
        }
        Ok(rx)
    }
}
