//! `catflow run` -- execute a published cat.
//!
//! Progress updates go to stderr as they arrive, the final answer to stdout.
//! With `--save-assets` (implies `--debug`), images produced by pipeline
//! steps are saved to the configured store and each step's status printed.
//!
//! # Example
//!
//! ```text
//! catflow run --slug roof-inspector --message "Check this roof" \
//!     --image-url https://example.com/roof.jpg --progress --save-assets
//! ```

use anyhow::Context;
use catflow_assets::{AssetPersister, AssetTracker, SaveStatus, store_from_config};
use catflow_runner::{CatRunner, RunInput, RunOptions};
use catflow_types::config::Config;
use catflow_types::{DebugStep, ProgressUpdate, Credential};
use tokio::sync::mpsc;

/// Arguments for the `catflow run` subcommand.
#[derive(clap::Args)]
pub struct RunArgs {
    /// Slug of the cat to run.
    #[arg(long)]
    pub slug: String,

    /// Text message to send.
    #[arg(short, long, default_value = "")]
    pub message: String,

    /// Image URL (or data URL) to attach.
    #[arg(long)]
    pub image_url: Option<String>,

    /// Stream progress updates while the cat runs.
    #[arg(long)]
    pub progress: bool,

    /// Request per-step debug records.
    #[arg(long)]
    pub debug: bool,

    /// Run the draft definition instead of the published one.
    #[arg(long)]
    pub draft: bool,

    /// Save images produced by pipeline steps.
    #[arg(long)]
    pub save_assets: bool,
}

pub async fn run(args: RunArgs, config: &Config) -> anyhow::Result<()> {
    let token = Credential::require_env(&config.endpoint.access_token_env)?;

    let mut input = RunInput::text(args.message.clone());
    if let Some(url) = &args.image_url {
        input = input.with_image(url.clone());
    }

    let (progress_tx, progress_task) = if args.progress {
        let (tx, mut rx) = mpsc::unbounded_channel::<ProgressUpdate>();
        let task = tokio::spawn(async move {
            while let Some(update) = rx.recv().await {
                eprintln!(
                    "[{}/{}] {}: {}",
                    update.step, update.total_steps, update.step_name, update.message
                );
            }
        });
        (Some(tx), Some(task))
    } else {
        (None, None)
    };

    let options = RunOptions {
        cat_draft: args.draft,
        debug_pipeline: args.debug || args.save_assets,
        progress: progress_tx,
    };

    let runner = CatRunner::new(config.endpoint.clone());
    let result = runner.run(&token, &args.slug, &input, &options).await;

    // Closing the sender ends the printer task.
    drop(options);
    if let Some(task) = progress_task {
        let _ = task.await;
    }

    let output = result?;
    println!("{}", output.text);

    let steps = output.debug_steps.unwrap_or_default();
    if args.debug {
        print_debug_steps(&steps);
    }
    if args.save_assets {
        save_assets(config, &args.slug, steps).await?;
    }
    Ok(())
}

fn print_debug_steps(steps: &[DebugStep]) {
    for step in steps {
        eprintln!(
            "step {} {} -> {} ({} ms)",
            step.index, step.client_model, step.provider_model, step.duration_ms
        );
    }
}

async fn save_assets(config: &Config, slug: &str, steps: Vec<DebugStep>) -> anyhow::Result<()> {
    let store = store_from_config(&config.storage).context("failed to open asset store")?;
    let tracker = AssetTracker::new();
    let persister = AssetPersister::from_config(store, tracker.clone(), &config.storage);

    let indexes: Vec<u32> = steps.iter().map(|s| s.index).collect();
    let (_, handle) = persister.spawn(slug.trim(), steps);
    let summary = handle.await.context("asset task panicked")?;

    for index in indexes {
        match tracker.status(index) {
            SaveStatus::Saved(asset) => eprintln!("step {index}: saved {}", asset.url),
            SaveStatus::Failed(err) => eprintln!("step {index}: failed: {err}"),
            SaveStatus::Saving | SaveStatus::Idle => {}
        }
    }
    eprintln!(
        "assets: {} saved, {} failed, {} without images",
        summary.saved, summary.failed, summary.skipped
    );
    Ok(())
}
