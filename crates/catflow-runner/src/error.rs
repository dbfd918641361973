//! Runner error types.
//!
//! Each failure class is its own variant so callers can tell a rejected
//! input from a transport failure or a broken progress stream.

use thiserror::Error;

/// Errors that can occur while running a cat.
#[derive(Error, Debug)]
pub enum RunError {
    /// Rejected before any network call (no message and no image, bad slug).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The endpoint answered with a non-2xx status.
    #[error("{message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Server-provided text, or a generic phrase when there was none.
        message: String,
    },

    /// The progress stream carried an `error` event.
    #[error("pipeline failed: {0}")]
    Pipeline(String),

    /// The progress stream ended without a `complete` event.
    #[error("stream ended without a complete event")]
    StreamIncomplete,

    /// The response body could not be interpreted.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Network failure or other transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A convenience type alias for runner operations.
pub type Result<T> = std::result::Result<T, RunError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_http_is_verbatim() {
        let err = RunError::Http {
            status: 402,
            message: "Insufficient credits".into(),
        };
        assert_eq!(err.to_string(), "Insufficient credits");
    }

    #[test]
    fn display_stream_incomplete() {
        assert_eq!(
            RunError::StreamIncomplete.to_string(),
            "stream ended without a complete event"
        );
    }

    #[test]
    fn display_pipeline() {
        let err = RunError::Pipeline("vision service unavailable".into());
        assert_eq!(err.to_string(), "pipeline failed: vision service unavailable");
    }

    #[test]
    fn json_error_from_conversion() {
        let serde_err = serde_json::from_str::<serde_json::Value>("nope").unwrap_err();
        let err: RunError = serde_err.into();
        assert!(err.to_string().starts_with("json error:"));
    }
}
