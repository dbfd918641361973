//! Error types shared across catflow crates.

use thiserror::Error;

/// Top-level error type for catflow pipeline definitions and configuration.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CatflowError {
    /// Caller input was rejected before any I/O took place.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A pipeline slug does not satisfy `[a-z0-9-]+` without edge hyphens.
    #[error("invalid slug '{slug}': {reason}")]
    InvalidSlug {
        /// The offending slug.
        slug: String,
        /// Which rule it violated.
        reason: String,
    },

    /// Configuration is malformed or could not be read.
    #[error("invalid config: {reason}")]
    ConfigInvalid {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// A required credential's environment variable is unset or blank.
    #[error("missing credential: set {var}")]
    MissingCredential {
        /// Name of the environment variable.
        var: String,
    },

    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A convenience type alias for catflow operations.
pub type Result<T> = std::result::Result<T, CatflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_input() {
        let err = CatflowError::InvalidInput("message or image required".into());
        assert_eq!(err.to_string(), "invalid input: message or image required");
    }

    #[test]
    fn display_invalid_slug() {
        let err = CatflowError::InvalidSlug {
            slug: "-bad".into(),
            reason: "leading hyphen".into(),
        };
        assert_eq!(err.to_string(), "invalid slug '-bad': leading hyphen");
    }

    #[test]
    fn json_error_from_conversion() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: CatflowError = serde_err.into();
        assert!(err.to_string().starts_with("json error:"));
    }
}
