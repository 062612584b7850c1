//! Server-Sent Events Decoding
//!
//! Turns the chat stream's SSE body into [`StreamFrame`]s. The service emits:
//!
//! ```text
//! data: {"content": "风"}
//!
//! data: {"content": "雨"}
//!
//! data: [DONE]
//! ```
//!
//! and may report a mid-stream failure as `data: {"error": "server_busy"}`.
//! Bytes are buffered until a whole line is available, so multi-byte
//! characters split across network chunks decode correctly.

use serde::Deserialize;

use super::traits::{FailureReason, StreamFrame};

/// Sentinel data payload marking the end of the stream
const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Incremental SSE decoder
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already known to hold no newline
    scanned: usize,
    finished: bool,
}

impl SseDecoder {
    /// Create an empty decoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a terminal frame has been produced
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed a chunk of body bytes, returning every frame it completes
    ///
    /// Nothing is returned after a terminal frame.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamFrame> {
        if self.finished {
            return Vec::new();
        }
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(offset) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n') {
            let pos = self.scanned + offset;
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.scanned = 0;
            if let Some(frame) = self.decode_line(&line[..line.len() - 1]) {
                frames.push(frame);
                if self.finished {
                    self.buffer.clear();
                    break;
                }
            }
        }
        self.scanned = self.buffer.len();
        frames
    }

    /// Signal end of body
    ///
    /// Decodes any unterminated last line. A body that ends without a
    /// terminal frame yields `Failed(Unreachable)`, after any trailing
    /// fragment so its text still reaches the answer.
    pub fn finish(&mut self) -> Vec<StreamFrame> {
        if self.finished {
            return Vec::new();
        }
        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        let mut frames = Vec::new();
        if let Some(frame) = self.decode_line(&rest) {
            frames.push(frame);
            if self.finished {
                return frames;
            }
        }
        tracing::debug!("Body ended without end marker");
        self.finished = true;
        frames.push(StreamFrame::Failed(FailureReason::Unreachable));
        frames
    }

    fn decode_line(&mut self, raw: &[u8]) -> Option<StreamFrame> {
        let line = String::from_utf8_lossy(raw);
        let frame = parse_line(line.trim_end_matches('\r'))?;
        if frame.is_terminal() {
            self.finished = true;
        }
        Some(frame)
    }
}

/// Parse one SSE line; only `data:` fields carry frames
fn parse_line(line: &str) -> Option<StreamFrame> {
    let data = line.strip_prefix("data:")?;
    let data = data.strip_prefix(' ').unwrap_or(data);

    if data == DONE_MARKER {
        return Some(StreamFrame::End);
    }

    match serde_json::from_str::<ChatChunk>(data) {
        Ok(ChatChunk {
            error: Some(code), ..
        }) => {
            let reason = FailureReason::from_error_code(&code).unwrap_or(FailureReason::Unreachable);
            tracing::debug!(code = %code, reason = %reason, "Stream reported an error");
            Some(StreamFrame::Failed(reason))
        }
        Ok(ChatChunk {
            content: Some(text),
            ..
        }) if !text.is_empty() => Some(StreamFrame::Fragment(text)),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(error = %e, "Skipping malformed SSE data line");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn fragment(text: &str) -> StreamFrame {
        StreamFrame::Fragment(text.to_string())
    }

    #[test]
    fn test_basic_stream() {
        let mut decoder = SseDecoder::new();
        let body = "data: {\"content\":\"风\"}\n\ndata: {\"content\":\"雨\"}\n\ndata: [DONE]\n\n";
        let frames = decoder.push(body.as_bytes());
        assert_eq!(frames, vec![fragment("风"), fragment("雨"), StreamFrame::End]);
        assert!(decoder.is_finished());
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_multibyte_split_across_chunks() {
        let body = "data: {\"content\":\"同舟\"}\n".as_bytes();
        // Split inside the first character of 同
        let split = body.iter().position(|&b| b >= 0x80).unwrap() + 1;

        let mut decoder = SseDecoder::new();
        assert!(decoder.push(&body[..split]).is_empty());
        assert_eq!(decoder.push(&body[split..]), vec![fragment("同舟")]);
    }

    #[test]
    fn test_crlf_and_comments() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b": keep-alive\r\nevent: message\r\ndata: {\"content\":\"x\"}\r\n\r\n");
        assert_eq!(frames, vec![fragment("x")]);
    }

    #[test]
    fn test_error_frame_is_classified() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(
            b"data: {\"content\":\"\xe9\x83\xa8\"}\ndata: {\"error\":\"server_busy\"}\ndata: {\"content\":\"late\"}\n",
        );
        assert_eq!(
            frames,
            vec![
                fragment("部"),
                StreamFrame::Failed(FailureReason::Overloaded)
            ]
        );
        assert!(decoder.push(b"data: [DONE]\n").is_empty());
    }

    #[test]
    fn test_unknown_error_code_is_unreachable() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"data: {\"error\":\"llm exploded\"}\n");
        assert_eq!(frames, vec![StreamFrame::Failed(FailureReason::Unreachable)]);
    }

    #[test]
    fn test_malformed_and_empty_content_skipped() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"data: {not json\ndata: {\"content\":\"\"}\ndata: {\"content\":\"ok\"}\n");
        assert_eq!(frames, vec![fragment("ok")]);
    }

    #[test]
    fn test_body_without_done_is_lost() {
        let mut decoder = SseDecoder::new();
        decoder.push(b"data: {\"content\":\"partial\"}\n\n");
        assert_eq!(
            decoder.finish(),
            vec![StreamFrame::Failed(FailureReason::Unreachable)]
        );
    }

    #[test]
    fn test_unterminated_done_line_at_eof() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: [DONE]").is_empty());
        assert_eq!(decoder.finish(), vec![StreamFrame::End]);
    }

    #[test]
    fn test_unterminated_fragment_at_eof_is_kept() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push("data: {\"content\":\"已说出的话\"}".as_bytes()).is_empty());
        assert_eq!(
            decoder.finish(),
            vec![
                fragment("已说出的话"),
                StreamFrame::Failed(FailureReason::Unreachable)
            ]
        );
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_long_line_in_small_chunks() {
        let text = "长".repeat(2000);
        let body = format!("data: {{\"content\":\"{text}\"}}\n");
        let mut decoder = SseDecoder::new();
        let mut frames = Vec::new();
        for chunk in body.as_bytes().chunks(7) {
            frames.extend(decoder.push(chunk));
            assert_eq!(decoder.scanned, decoder.buffer.len());
        }
        assert_eq!(frames, vec![fragment(&text)]);
        assert!(decoder.buffer.is_empty());
    }
}
