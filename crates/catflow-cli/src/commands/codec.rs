//! `catflow decode` / `catflow encode` -- instruction document conversion.

use std::path::PathBuf;

use anyhow::Context;
use catflow_compiler::codec;
use catflow_types::InstructionDocument;

use super::{print_json, read_json, read_text};

/// Arguments for `catflow decode`.
#[derive(clap::Args)]
pub struct DecodeArgs {
    /// Text file holding a stored instruction document.
    pub file: PathBuf,
}

/// Arguments for `catflow encode`.
#[derive(clap::Args)]
pub struct EncodeArgs {
    /// JSON file holding `{global, steps: [{index, modelId, instructions}]}`.
    pub file: PathBuf,
}

pub fn decode(args: DecodeArgs) -> anyhow::Result<()> {
    let raw = read_text(&args.file)?;
    print_json(&codec::parse(&raw))
}

pub fn encode(args: EncodeArgs) -> anyhow::Result<()> {
    let value = read_json(&args.file)?;
    let doc: InstructionDocument = serde_json::from_value(value)
        .with_context(|| format!("{} is not an instruction document", args.file.display()))?;
    println!("{}", codec::serialize(&doc));
    Ok(())
}
