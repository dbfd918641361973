//! `catflow structured` -- the structured vision step config codec.
//!
//! ```text
//! catflow structured parse stored.json   # stored config -> editor view
//! catflow structured build editor.json   # editor view -> stored config (or error)
//! ```

use std::path::Path;

use anyhow::Context;
use catflow_compiler::{StructuredStepConfig, build_structured, parse_from_structured};
use serde_json::Value;

use super::{print_json, read_json};

pub fn parse(file: &Path) -> anyhow::Result<()> {
    let raw = read_json(file)?;
    print_json(&parse_from_structured(&raw))
}

pub fn build(file: &Path) -> anyhow::Result<()> {
    let raw = read_json(file)?;
    let stored = build_value(raw).with_context(|| format!("rejected {}", file.display()))?;
    print_json(&stored.unwrap_or(Value::Null))
}

fn build_value(raw: Value) -> anyhow::Result<Option<Value>> {
    let cfg: StructuredStepConfig =
        serde_json::from_value(raw).context("expected {enabled, includeRaw, targets, blocksJson}")?;
    Ok(build_structured(&cfg)?)
}
