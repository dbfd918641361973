//! # catflow-types
//!
//! Core type definitions for catflow pipelines ("cats").
//!
//! Every other catflow crate depends on this one. It contains:
//!
//! - **[`step`]** -- the [`Step`] tagged union ("kitten") and [`normalize`]
//! - **[`pipeline`]** -- the [`Cat`] pipeline definition and slug rules
//! - **[`document`]** -- the compiled instruction document
//! - **[`run`]** -- debug steps and progress updates produced by a run
//! - **[`config`]** -- configuration schema and discovery
//! - **[`credential`]** -- [`Credential`] for access tokens and storage keys
//! - **[`error`]** -- [`CatflowError`]

pub mod config;
pub mod credential;
pub mod document;
pub mod error;
pub mod pipeline;
pub mod run;
pub mod step;

pub use credential::Credential;
pub use document::{CompiledPipeline, InstructionDocument, RouterStepInstruction};
pub use error::{CatflowError, Result};
pub use pipeline::Cat;
pub use run::{DebugStep, ProgressUpdate};
pub use step::{ImageSource, Step, StepKind, normalize};
