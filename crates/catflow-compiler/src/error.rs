//! Rejection reasons for structured step configs.

use thiserror::Error;

/// Why a structured step config could not be built.
///
/// The `Display` text is meant to be shown to the person editing the cat.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuredConfigError {
    /// No target had both a name and at least one non-blank prompt.
    #[error("add at least one target with a name and one or more prompts")]
    NoTargets,

    /// The post-processing blocks were not valid JSON.
    #[error("post-processing blocks are not valid JSON: {0}")]
    BlocksNotJson(String),

    /// The post-processing blocks parsed, but not as an array.
    #[error("post-processing blocks must be a JSON array")]
    BlocksNotArray,

    /// An entry in the blocks array was not an object.
    #[error("post-processing block #{0} must be a JSON object")]
    BlockNotObject(usize),

    /// More blocks than the allowed maximum.
    #[error("too many post-processing blocks: {count} (max {max})")]
    TooManyBlocks { count: usize, max: usize },
}
