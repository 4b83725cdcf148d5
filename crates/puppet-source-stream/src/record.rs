//! Stream line model.
//!
//! Each line of the stream file is one JSON envelope
//! `{"ts": "<rfc3339>", "event": {...}}`; older producers wrote the bare
//! event object with no envelope, and both forms are accepted. The `event`
//! value is handed to the core classifier untouched.

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("invalid stream line: {0}")]
    InvalidLine(String),

    #[error("stream io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One parsed stream line.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEnvelope {
    /// Producer timestamp; `None` when absent or unparseable.
    pub ts: Option<DateTime<Utc>>,
    /// The raw activity record for the classifier.
    pub event: Value,
}

/// Parse one line. The only hard failure is non-JSON; a missing envelope or
/// a malformed `ts` degrades gracefully.
pub fn parse_line(line: &str) -> Result<StreamEnvelope, StreamError> {
    let value: Value =
        serde_json::from_str(line).map_err(|e| StreamError::InvalidLine(e.to_string()))?;

    let ts = value
        .get("ts")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc));

    let event = match value.get("event") {
        Some(event) => event.clone(),
        None => value,
    };

    Ok(StreamEnvelope { ts, event })
}

// ─── Tests ────────────────────────────────────────────────────────
