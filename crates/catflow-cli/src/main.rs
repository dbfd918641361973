//! `catflow` -- CLI for compiling, inspecting, and running catflow pipelines.
//!
//! Provides the following subcommands:
//!
//! - `catflow compile` -- Normalize a step list and compile it to model ids + instructions.
//! - `catflow decode` / `catflow encode` -- Convert between the bracket DSL and JSON.
//! - `catflow structured` -- Parse or build a structured vision step config.
//! - `catflow run` -- Execute a published cat, optionally saving generated images.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

/// catflow pipeline CLI.
#[derive(Parser)]
#[command(name = "catflow", about = "catflow pipeline CLI", version)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (overrides auto-discovery).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Compile a step list into model ids and an instruction document.
    Compile(commands::compile::CompileArgs),

    /// Parse an instruction document and print it as JSON.
    Decode(commands::codec::DecodeArgs),

    /// Serialize a JSON `{global, steps}` document to the bracket format.
    Encode(commands::codec::EncodeArgs),

    /// Structured vision step config codec.
    Structured {
        #[command(subcommand)]
        action: StructuredCmd,
    },

    /// Run a published cat.
    Run(commands::run::RunArgs),
}

/// Subcommands for `catflow structured`.
#[derive(Subcommand)]
enum StructuredCmd {
    /// Read a stored config and print the editor view.
    Parse {
        /// JSON file holding the stored config.
        file: PathBuf,
    },

    /// Validate an editor view and print the stored config.
    Build {
        /// JSON file holding `{enabled, includeRaw, targets, blocksJson}`.
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Compile(args) => {
            let config = commands::load_config(config_path)?;
            commands::compile::run(args, &config)?;
        }
        Commands::Decode(args) => commands::codec::decode(args)?,
        Commands::Encode(args) => commands::codec::encode(args)?,
        Commands::Structured { action } => match action {
            StructuredCmd::Parse { file } => commands::structured::parse(&file)?,
            StructuredCmd::Build { file } => commands::structured::build(&file)?,
        },
        Commands::Run(args) => {
            let config = commands::load_config(config_path)?;
            commands::run::run(args, &config).await?;
        }
    }

    Ok(())
}
