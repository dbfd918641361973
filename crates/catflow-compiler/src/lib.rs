//! Instruction compiler and codecs for catflow pipelines.
//!
//! # Architecture
//!
//! - [`compile()`] turns a cat's steps into model ids plus one serialized
//!   instruction document
//! - [`codec`] is the bracket-tagged text grammar (`[router]`, `[step]`)
//!   the document is stored in
//! - [`structured`] is the separate JSON encoding for vision segmentation
//!   and post-processing steps
//!
//! ```rust,ignore
//! use catflow_compiler::{compile, codec};
//!
//! let compiled = compile("Roof Inspector", "", &steps);
//! let doc = codec::parse(&compiled.instructions);
//! assert_eq!(doc.steps.len(), steps.len());
//! ```

pub mod codec;
pub mod compile;
pub mod error;
pub mod structured;

pub use codec::{parse, serialize};
pub use compile::compile;
pub use error::StructuredConfigError;
pub use structured::{StructuredStepConfig, VisionTarget, build_structured, parse_from_structured};
