//! HTTP Oracle Transport
//!
//! Talks to the fromheart oracle service over HTTP. Follow-up questions are
//! POSTed as JSON and answered with a Server-Sent Events body.
//!
//! # Endpoints
//!
//! - `POST /api/divination/{id}/chat/stream` - follow-up on a divination
//! - `POST /api/love/{id}/chat/stream` - follow-up on a match reading
//! - `GET /api/health` - liveness
//!
//! The service uses double-submit CSRF protection: every POST carries the
//! same token in the `csrf_token` cookie and the `X-CSRF-Token` header.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, COOKIE};
use serde::Deserialize;
use tokio::sync::mpsc;

use super::sse::SseDecoder;
use super::traits::{FailureReason, FollowUpRequest, OracleTransport, StreamFrame, TransportError};
use crate::config::BackendSettings;
use crate::messages::ReadingRef;

/// Header carrying the CSRF token
const CSRF_HEADER: &str = "X-CSRF-Token";
/// Header carrying the per-session correlation ID
const REQUEST_ID_HEADER: &str = "X-Request-Id";
/// Frames buffered between the body reader and the dialogue
const FRAME_CHANNEL_CAPACITY: usize = 100;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// HTTP oracle client
#[derive(Clone)]
pub struct HttpOracle {
    /// Base URL without trailing slash
    base_url: String,
    /// Double-submit CSRF token
    csrf_token: String,
    /// Timeout for the health probe
    health_timeout: Duration,
    /// HTTP client
    http_client: reqwest::Client,
}

impl HttpOracle {
    /// Create a client for `base_url` with default timeouts
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        Self::from_settings(&BackendSettings {
            base_url: base_url.into(),
            ..BackendSettings::default()
        })
    }

    /// Create from resolved backend settings
    pub fn from_settings(settings: &BackendSettings) -> Result<Self, TransportError> {
        let base_url = settings.base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(TransportError::InvalidUrl(settings.base_url.clone()));
        }

        // No total timeout: answers stream for as long as the oracle talks.
        // Stalls are caught by the dialogue's fragment timeout.
        let http_client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()?;

        let csrf_token = settings
            .csrf_token
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());

        Ok(Self {
            base_url,
            csrf_token,
            health_timeout: settings.health_timeout,
            http_client,
        })
    }

    /// Use a specific CSRF token instead of a generated one
    #[must_use]
    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = token.into();
        self
    }

    /// Get the base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Chat stream endpoint URL for a reading
    fn stream_url(&self, reading: &ReadingRef) -> String {
        format!("{}{}", self.base_url, reading.chat_stream_path())
    }

    /// Health endpoint URL
    fn health_url(&self) -> String {
        format!("{}/api/health", self.base_url)
    }
}

/// Classify a non-success response from its status and body
///
/// A recognized `error` code in the body wins. A 403 without one is an
/// authorization problem (CSRF, record ownership), not a quota.
pub(crate) fn classify_rejection(status: u16, body: &str) -> FailureReason {
    if let Ok(ErrorBody { error }) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(reason) = FailureReason::from_error_code(&error) {
            return reason;
        }
        if status == 403 {
            return FailureReason::Unreachable;
        }
    }
    FailureReason::from_status(status)
}

#[async_trait]
impl OracleTransport for HttpOracle {
    fn name(&self) -> &str {
        "HTTP"
    }

    async fn health_check(&self) -> bool {
        self.http_client
            .get(self.health_url())
            .timeout(self.health_timeout)
            .send()
            .await
            .is_ok_and(|response| response.status().is_success())
    }

    async fn open_stream(
        &self,
        request: &FollowUpRequest,
    ) -> Result<mpsc::Receiver<StreamFrame>, TransportError> {
        let url = self.stream_url(&request.reading);
        let started = Instant::now();

        tracing::debug!(
            request_id = %request.request_id,
            reading = %request.reading,
            history = request.history.len(),
            "Opening oracle stream"
        );

        let response = self
            .http_client
            .post(&url)
            .header(ACCEPT, "text/event-stream")
            .header(REQUEST_ID_HEADER, request.request_id.to_string())
            .header(CSRF_HEADER, &self.csrf_token)
            .header(COOKIE, format!("csrf_token={}", self.csrf_token))
            .json(&request.body())
            .send()
            .await?;

        // Check for HTTP errors
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = classify_rejection(status.as_u16(), &body);
            tracing::warn!(
                request_id = %request.request_id,
                status = status.as_u16(),
                reason = %reason,
                "Oracle rejected follow-up"
            );
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                reason,
            });
        }

        tracing::debug!(
            request_id = %request.request_id,
            latency_ms = started.elapsed().as_millis() as u64,
            "Oracle stream accepted"
        );

        let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let mut stream = response.bytes_stream();
        let request_id = request.request_id;

        // Spawn task to process stream
        tokio::spawn(async move {
            let mut decoder = SseDecoder::new();

            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(bytes) => {
                        for frame in decoder.push(&bytes) {
                            let terminal = frame.is_terminal();
                            if tx.send(frame).await.is_err() {
                                // Receiver dropped, stop streaming
                                tracing::debug!(%request_id, "Stream receiver dropped");
                                return;
                            }
                            if terminal {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(%request_id, error = %e, "Oracle stream broke");
                        let _ = tx.send(StreamFrame::Failed(FailureReason::Unreachable)).await;
                        return;
                    }
                }
            }

            // Body ended; without an end marker this is a lost stream
            for frame in decoder.finish() {
                if tx.send(frame).await.is_err() {
                    return;
                }
            }
        });

        Ok(rx)
    }
}
