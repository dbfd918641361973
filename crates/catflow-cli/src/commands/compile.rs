//! `catflow compile` -- normalize and compile a step list.
//!
//! # Example
//!
//! ```text
//! catflow compile --steps steps.json --name "Roof Inspector"
//! ```

use std::path::PathBuf;

use anyhow::Context;
use catflow_compiler::compile;
use catflow_types::config::Config;
use catflow_types::step::{default_steps, normalize_with};
use catflow_types::{Cat, Step};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use super::{print_json, read_json};

/// Arguments for the `catflow compile` subcommand.
#[derive(clap::Args)]
pub struct CompileArgs {
    /// JSON file holding a step array (or an object with a `steps` array).
    #[arg(long)]
    pub steps: PathBuf,

    /// Cat display name.
    #[arg(long)]
    pub name: String,

    /// Optional description included in the router directive.
    #[arg(long, default_value = "")]
    pub description: String,

    /// Explicit slug (derived from the name when omitted).
    #[arg(long)]
    pub slug: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompileOutput {
    slug: String,
    model: String,
    model_ids: Vec<String>,
    instructions: String,
    steps: Vec<Step>,
}

pub fn run(args: CompileArgs, config: &Config) -> anyhow::Result<()> {
    let raw = read_json(&args.steps)?;
    let output = compile_value(&raw, &args, config)?;
    print_json(&output)
}

fn compile_value(raw: &Value, args: &CompileArgs, config: &Config) -> anyhow::Result<CompileOutput> {
    let entries = raw
        .as_array()
        .or_else(|| raw.get("steps").and_then(Value::as_array))
        .context("expected a JSON array of steps")?;

    let defaults = config.defaults.normalize_defaults();
    let mut steps = normalize_with(entries, &defaults);
    if steps.is_empty() {
        info!("no usable steps; using a single default step");
        steps = default_steps(&defaults);
    }

    let cat = Cat {
        name: args.name.clone(),
        description: args.description.clone(),
        slug: args.slug.clone(),
        steps,
    };
    let slug = cat.resolved_slug()?;
    let compiled = compile(&cat.name, &cat.description, &cat.steps);

    Ok(CompileOutput {
        model: cat.model_name()?,
        slug,
        model_ids: compiled.model_ids,
        instructions: compiled.instructions,
        steps: cat.steps,
    })
}
