//! Compiled instruction document types.
//!
//! These are derived from a cat's steps and never edited by hand. The text
//! encoding lives in `catflow-compiler`.

use serde::{Deserialize, Serialize};

/// One per-step directive in a compiled document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterStepInstruction {
    /// 1-based position. Not required to be contiguous.
    pub index: u32,

    /// Lowercase model identifier.
    pub model_id: String,

    pub instructions: String,
}

impl RouterStepInstruction {
    pub fn new(index: u32, model_id: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            index,
            model_id: model_id.into(),
            instructions: instructions.into(),
        }
    }
}

/// Global directive plus ordered per-step directives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionDocument {
    #[serde(default)]
    pub global: String,

    #[serde(default)]
    pub steps: Vec<RouterStepInstruction>,
}

impl InstructionDocument {
    /// A document with global text only (the legacy plain-text form).
    pub fn plain(global: impl Into<String>) -> Self {
        Self {
            global: global.into(),
            steps: Vec::new(),
        }
    }
}

/// Output of compiling a cat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledPipeline {
    /// Ordered models for the legacy single/fallback-model path.
    pub model_ids: Vec<String>,

    /// The serialized instruction document.
    pub instructions: String,
}
