//! CLI command implementations for `catflow`.
//!
//! - [`compile`] -- Step normalization and compilation.
//! - [`codec`] -- Instruction document decode/encode.
//! - [`structured`] -- Structured vision config codec.
//! - [`run`] -- Pipeline execution and asset saving.

pub mod codec;
pub mod compile;
pub mod run;
pub mod structured;

use std::path::Path;

use anyhow::Context;
use catflow_types::config::Config;
use serde_json::Value;

/// Load configuration from the given path override or via auto-discovery.
///
/// Discovery order: `--config`, `CATFLOW_CONFIG`, `~/.catflow/config.json`.
/// Returns a default `Config` if no config file is found.
pub fn load_config(config_override: Option<&Path>) -> anyhow::Result<Config> {
    if let Some(path) = config_override
        && !path.exists()
    {
        anyhow::bail!("config file not found: {}", path.display());
    }
    catflow_types::config::load_config(config_override).context("failed to load config")
}

pub(crate) fn read_text(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

pub(crate) fn read_json(path: &Path) -> anyhow::Result<Value> {
    let raw = read_text(path)?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not valid JSON", path.display()))
}

pub(crate) fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
