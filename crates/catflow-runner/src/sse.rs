//! SSE (Server-Sent Events) decoding for cat progress streams.
//!
//! The endpoint sends one JSON object per `data:` line:
//!
//! ```text
//! data: {"type":"progress","step":2,"totalSteps":4,"stepName":"Gutter Overlay","message":"Running vision step..."}
//!
//! data: {"type":"complete","data":{"choices":[{"message":{"content":"done"}}]}}
//! ```
//!
//! A `complete` or `error` event does not end the stream; the reader keeps
//! going until the connection closes. Lines that are not JSON and events of
//! unknown type are skipped so that newer servers can add event kinds.

use catflow_types::ProgressUpdate;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::{Result, RunError};

/// Used when an `error` event carries no message.
const GENERIC_PIPELINE_ERROR: &str = "pipeline failed";

/// One decoded event from the progress stream.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Progress(ProgressUpdate),
    /// Payload shaped like a non-streaming completion body.
    Complete(Value),
    Error(String),
}

/// Parse a single SSE line.
///
/// Returns `None` for blank lines, non-`data:` lines, empty payloads,
/// payloads that are not JSON, unknown event types, and `complete` events
/// whose `data` is missing or null.
pub fn parse_sse_line(line: &str) -> Option<PipelineEvent> {
    let payload = line.trim().strip_prefix("data:")?.trim();
    if payload.is_empty() {
        return None;
    }

    let event: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => {
            trace!(error = %e, "skipping non-JSON SSE line");
            return None;
        }
    };

    match event.get("type").and_then(Value::as_str) {
        Some("progress") => Some(PipelineEvent::Progress(ProgressUpdate {
            step: coerce_u32(event.get("step")),
            total_steps: coerce_u32(event.get("totalSteps")),
            step_name: coerce_string(event.get("stepName")),
            message: coerce_string(event.get("message")),
        })),
        Some("complete") => match event.get("data").filter(|d| !d.is_null()) {
            Some(data) => Some(PipelineEvent::Complete(data.clone())),
            None => {
                debug!("ignoring complete event without data");
                None
            }
        },
        Some("error") => {
            let message = event
                .get("message")
                .or_else(|| event.get("error"))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .unwrap_or(GENERIC_PIPELINE_ERROR);
            Some(PipelineEvent::Error(message.to_string()))
        }
        other => {
            debug!(event_type = ?other, "ignoring unknown SSE event");
            None
        }
    }
}

/// Numbers, numeric strings, or 0.
fn coerce_u32(value: Option<&Value>) -> u32 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|v| v.min(u32::MAX as u64) as u32)
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u32))
            .unwrap_or(0),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && *f >= 0.0)
            .map(|f| f as u32)
            .unwrap_or(0),
        _ => 0,
    }
}

fn coerce_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        None | Some(Value::Null) => String::new(),
        Some(other) => other.to_string(),
    }
}

// ── Line framing ────────────────────────────────────────────────────────

/// Splits a byte stream into lines on `\n`.
///
/// Bytes after the last newline are carried over to the next push, so a
/// line (or a multi-byte UTF-8 character) split across network reads is
/// only decoded once it is complete.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    /// Append a chunk and return every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let Some(last_newline) = self.pending.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };

        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);

        complete[..last_newline]
            .split(|b| *b == b'\n')
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect()
    }

    /// The unterminated tail left when the stream ended, if any.
    pub fn finish(self) -> Option<String> {
        let tail = String::from_utf8_lossy(&self.pending).into_owned();
        (!tail.trim().is_empty()).then_some(tail)
    }
}

// ── Stream state ────────────────────────────────────────────────────────

/// Accumulates the terminal outcome of a progress stream.
#[derive(Debug, Default)]
pub struct StreamState {
    complete: Option<Value>,
    error: Option<String>,
    progress_events: usize,
}

impl StreamState {
    /// Feed one line; progress updates are forwarded to `progress`.
    pub fn observe(&mut self, line: &str, progress: Option<&mpsc::UnboundedSender<ProgressUpdate>>) {
        let Some(event) = parse_sse_line(line) else {
            return;
        };
        trace!(event = ?event, "pipeline event");

        match event {
            PipelineEvent::Progress(update) => {
                self.progress_events += 1;
                if let Some(tx) = progress {
                    // A dropped receiver only means nobody is watching.
                    let _ = tx.send(update);
                }
            }
            PipelineEvent::Complete(data) => self.complete = Some(data),
            PipelineEvent::Error(message) => self.error = Some(message),
        }
    }

    /// Resolve once the stream has closed.
    ///
    /// An `error` event wins over a `complete` payload.
    pub fn finish(self) -> Result<Value> {
        if let Some(message) = self.error {
            return Err(RunError::Pipeline(message));
        }
        match self.complete {
            Some(data) => Ok(data),
            None => {
                debug!(
                    progress_events = self.progress_events,
                    "stream closed without a complete event"
                );
                Err(RunError::StreamIncomplete)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ── Skipped lines ───────────────────────────────────────────────

    #[test]
    fn blank_and_non_data_lines_skipped() {
        for line in ["", "   ", ": keepalive", "event: progress", "id: 7", "data:", "data:   "] {
            assert_eq!(parse_sse_line(line), None, "line {line:?}");
        }
    }

    #[test]
    fn malformed_json_skipped() {
        assert_eq!(parse_sse_line("data: {not json"), None);
        assert_eq!(parse_sse_line("data: [DONE]"), None);
    }

    #[test]
    fn unknown_type_skipped() {
        assert_eq!(parse_sse_line(r#"data: {"type":"heartbeat"}"#), None);
        assert_eq!(parse_sse_line(r#"data: {"step":1}"#), None);
    }

    // ── Events ──────────────────────────────────────────────────────

    #[test]
    fn progress_event() {
        let line = r#"data: {"type":"progress","step":2,"totalSteps":4,"stepName":"Gutter Overlay","message":"Running vision step..."}"#;
        assert_eq!(
            parse_sse_line(line),
            Some(PipelineEvent::Progress(ProgressUpdate {
                step: 2,
                total_steps: 4,
                step_name: "Gutter Overlay".into(),
                message: "Running vision step...".into(),
            }))
        );
    }

    #[test]
    fn progress_coerces_numbers() {
        let line = r#"data: {"type":"progress","step":"3","totalSteps":"many","stepName":null}"#;
        let Some(PipelineEvent::Progress(update)) = parse_sse_line(line) else {
            panic!("expected progress");
        };
        assert_eq!(update.step, 3);
        assert_eq!(update.total_steps, 0);
        assert_eq!(update.step_name, "");
        assert_eq!(update.message, "");

        assert_eq!(coerce_u32(Some(&json!(2.9))), 2);
        assert_eq!(coerce_u32(Some(&json!(-1))), 0);
        assert_eq!(coerce_u32(Some(&json!(true))), 0);
    }

    #[test]
    fn no_space_after_data_prefix() {
        assert!(matches!(
            parse_sse_line(r#"data:{"type":"error","message":"boom"}"#),
            Some(PipelineEvent::Error(m)) if m == "boom"
        ));
    }

    #[test]
    fn complete_event_carries_data() {
        let line = r#"data: {"type":"complete","data":{"choices":[{"message":{"content":"done"}}]}}"#;
        assert_eq!(
            parse_sse_line(line),
            Some(PipelineEvent::Complete(
                json!({"choices":[{"message":{"content":"done"}}]})
            ))
        );
    }

    #[test]
    fn complete_event_without_data_skipped() {
        assert_eq!(parse_sse_line(r#"data: {"type":"complete"}"#), None);
        assert_eq!(parse_sse_line(r#"data: {"type":"complete","data":null}"#), None);
    }

    #[test]
    fn error_event_without_message() {
        assert_eq!(
            parse_sse_line(r#"data: {"type":"error"}"#),
            Some(PipelineEvent::Error(GENERIC_PIPELINE_ERROR.into()))
        );
    }

    #[test]
    fn carriage_returns_tolerated() {
        assert!(parse_sse_line("data: {\"type\":\"complete\",\"data\":{}}\r").is_some());
    }

    // ── SseLineBuffer ───────────────────────────────────────────────

    #[test]
    fn buffer_carries_partial_lines() {
        let mut buf = SseLineBuffer::default();
        assert!(buf.push(b"data: {\"a\"").is_empty());
        assert_eq!(buf.push(b":1}\ndata: x\n\nda"), vec!["data: {\"a\":1}", "data: x", ""]);
        assert_eq!(buf.push(b"ta: y\n"), vec!["data: y"]);
        assert_eq!(buf.finish(), None);
    }

    #[test]
    fn buffer_handles_split_utf8() {
        let text = "data: {\"stepName\":\"Überprüfung\"}\n".as_bytes();
        // Split inside the two-byte 'Ü'.
        let cut = text.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let mut buf = SseLineBuffer::default();
        assert!(buf.push(&text[..cut]).is_empty());
        assert_eq!(buf.push(&text[cut..]), vec!["data: {\"stepName\":\"Überprüfung\"}"]);
    }

    #[test]
    fn buffer_returns_unterminated_tail() {
        let mut buf = SseLineBuffer::default();
        buf.push(b"data: one\ndata: tail");
        assert_eq!(buf.finish().as_deref(), Some("data: tail"));
    }

    // ── StreamState ─────────────────────────────────────────────────

    #[test]
    fn state_forwards_progress_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut state = StreamState::default();
        state.observe(r#"data: {"type":"progress","step":1,"totalSteps":2}"#, Some(&tx));
        state.observe(r#"data: {"type":"progress","step":2,"totalSteps":2}"#, Some(&tx));
        state.observe(r#"data: {"type":"complete","data":{"ok":true}}"#, Some(&tx));

        assert_eq!(rx.try_recv().unwrap().step, 1);
        assert_eq!(rx.try_recv().unwrap().step, 2);
        assert!(rx.try_recv().is_err());
        assert_eq!(state.finish().unwrap(), json!({"ok": true}));
    }

    #[test]
    fn state_error_beats_complete() {
        let mut state = StreamState::default();
        state.observe(r#"data: {"type":"complete","data":{}}"#, None);
        state.observe(r#"data: {"type":"error","message":"step 3 timed out"}"#, None);
        assert!(matches!(state.finish(), Err(RunError::Pipeline(m)) if m == "step 3 timed out"));
    }

    #[test]
    fn state_without_complete_fails() {
        let mut state = StreamState::default();
        for _ in 0..5 {
            state.observe(r#"data: {"type":"progress","step":1}"#, None);
        }
        assert!(matches!(state.finish(), Err(RunError::StreamIncomplete)));
    }

    #[test]
    fn dropped_receiver_is_harmless() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut state = StreamState::default();
        state.observe(r#"data: {"type":"progress","step":1}"#, Some(&tx));
        state.observe(r#"data: {"type":"complete","data":{"ok":true}}"#, Some(&tx));
        assert_eq!(state.finish().unwrap(), json!({"ok": true}));
    }

    #[test]
    fn complete_without_data_leaves_stream_incomplete() {
        let mut state = StreamState::default();
        state.observe(r#"data: {"type":"progress","step":1}"#, None);
        state.observe(r#"data: {"type":"complete"}"#, None);
        assert!(matches!(state.finish(), Err(RunError::StreamIncomplete)));

        let mut state = StreamState::default();
        state.observe(r#"data: {"type":"complete","data":null}"#, None);
        assert!(matches!(state.finish(), Err(RunError::StreamIncomplete)));
    }
}
