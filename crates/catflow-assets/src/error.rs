//! Asset persistence errors.
//!
//! These never escape a persistence run; they are recorded against the
//! step that failed and shown next to it.

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AssetError {
    /// The embedded payload was not valid base64.
    #[error("invalid image data: {0}")]
    Decode(String),

    /// The object path escapes the store root or is otherwise unusable.
    #[error("invalid object path: {0}")]
    InvalidPath(String),

    /// The store rejected the upload.
    #[error("upload failed: {0}")]
    Upload(String),

    /// The store could not produce a retrieval URL.
    #[error("could not sign url: {0}")]
    Sign(String),

    /// The store is missing required settings (URL, key).
    #[error("storage not configured: {0}")]
    NotConfigured(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, AssetError>;
