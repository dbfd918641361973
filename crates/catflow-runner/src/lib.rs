//! Pipeline runner for catflow.
//!
//! Executes a cat published on an OpenAI-compatible completion endpoint and
//! surfaces per-step progress and debug records.
//!
//! # Architecture
//!
//! - [`CatRunner`] issues the request and picks the JSON or SSE path
//! - [`sse`] frames the byte stream into lines and decodes progress events
//! - [`types`] holds the request body and [`RunOutput`]
//! - [`RunError`] separates input, HTTP, protocol and transport failures

pub mod error;
pub mod runner;
pub mod sse;
pub mod types;

pub use error::{Result, RunError};
pub use runner::CatRunner;
pub use sse::{PipelineEvent, parse_sse_line};
pub use types::{CatRequest, ContentPart, RunInput, RunOptions, RunOutput};
