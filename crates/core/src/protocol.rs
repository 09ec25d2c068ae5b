//! Messages exchanged between the orchestrator and an acquisition worker.
//!
//! One JSON object per line, discriminated by `type`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Worker protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    /// Transfer progress of the current unit, in percent.
    Progress { value: f32 },
    /// Fatal worker error; the worker exits non-zero after sending it.
    Error { message: String },
    /// One unit failed; the worker carries on with the next.
    TrackError { track: String, message: String },
    /// Worker to parent: credentials expired, refresh them.
    RefreshCookiesRequest,
    /// Parent to worker: refresh attempt finished.
    RefreshCookiesDone,
}

impl WorkerMessage {
    pub fn progress(value: f32) -> Self {
        Self::Progress { value }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn track_error(track: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TrackError {
            track: track.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid worker message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("worker channel closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Encodes a message as a single newline-terminated line.
pub fn encode_line(message: &WorkerMessage) -> Result<String, ProtocolError> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

/// Decodes one line. Surrounding whitespace is ignored.
pub fn decode_line(line: &str) -> Result<WorkerMessage, ProtocolError> {
    Ok(serde_json::from_str(line.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_tags() {
        assert_eq!(
            encode_line(&WorkerMessage::progress(42.5)).unwrap(),
            "{\"type\":\"PROGRESS\",\"value\":42.5}\n"
        );
        assert_eq!(
            encode_line(&WorkerMessage::RefreshCookiesRequest).unwrap(),
            "{\"type\":\"REFRESH_COOKIES_REQUEST\"}\n"
        );
        assert_eq!(
            encode_line(&WorkerMessage::RefreshCookiesDone).unwrap(),
            "{\"type\":\"REFRESH_COOKIES_DONE\"}\n"
        );
    }

    #[test]
    fn test_decode_track_error() {
        let msg = decode_line(r#"  {"type":"TRACK_ERROR","track":"Intro","message":"boom"}  "#)
            .unwrap();
        assert_eq!(msg, WorkerMessage::track_error("Intro", "boom"));
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        assert!(decode_line(r#"{"type":"HELLO"}"#).is_err());
        assert!(decode_line("[download] 12.0%").is_err());
    }
}
