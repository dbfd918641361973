//! Persisting generated images from a run's debug steps.
//!
//! Steps are handled one at a time in order. For each step that carries an
//! embedded image the pipeline marks it saving, decodes it, uploads it under
//! `{user_id}/{slug}/{run_token}/step-{index}.{ext}` and requests a signed
//! URL. The run token is checked before every status write, so a run that
//! was superseded stops publishing at its next write.

use std::sync::Arc;

use catflow_types::DebugStep;
use catflow_types::config::{DEFAULT_SIGNED_URL_TTL_SECS, StorageConfig};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::image::{decode_image, find_image_payload};
use crate::store::AssetStore;
use crate::tracker::{AssetTracker, RunToken, SavedAsset};

/// Counts for one finished (or abandoned) run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersistSummary {
    pub saved: usize,
    pub failed: usize,
    /// Steps without an embedded image.
    pub skipped: usize,
    /// The run was superseded before it finished.
    pub cancelled: bool,
}

/// Drives uploads for a store and publishes progress to a tracker.
#[derive(Clone)]
pub struct AssetPersister {
    store: Arc<dyn AssetStore>,
    tracker: AssetTracker,
    user_id: String,
    signed_url_ttl_secs: u64,
}

impl AssetPersister {
    pub fn new(store: Arc<dyn AssetStore>, tracker: AssetTracker) -> Self {
        Self {
            store,
            tracker,
            user_id: "local".into(),
            signed_url_ttl_secs: DEFAULT_SIGNED_URL_TTL_SECS,
        }
    }

    /// Take the path namespace and URL lifetime from storage settings.
    pub fn from_config(
        store: Arc<dyn AssetStore>,
        tracker: AssetTracker,
        config: &StorageConfig,
    ) -> Self {
        Self::new(store, tracker)
            .with_user_id(&config.user_id)
            .with_signed_url_ttl(config.signed_url_ttl_secs)
    }

    pub fn with_user_id(mut self, user_id: &str) -> Self {
        let trimmed = user_id.trim();
        if !trimmed.is_empty() {
            self.user_id = trimmed.to_string();
        }
        self
    }

    pub fn with_signed_url_ttl(mut self, secs: u64) -> Self {
        self.signed_url_ttl_secs = secs;
        self
    }

    pub fn tracker(&self) -> &AssetTracker {
        &self.tracker
    }

    /// Supersede any current run and persist `steps` in the background.
    pub fn spawn(&self, slug: &str, steps: Vec<DebugStep>) -> (RunToken, JoinHandle<PersistSummary>) {
        let token = self.tracker.begin_run();
        let this = self.clone();
        let slug = slug.to_string();
        let handle = tokio::spawn(async move { this.persist(token, &slug, &steps).await });
        (token, handle)
    }

    /// Persist every embedded image in `steps` under `token`.
    ///
    /// `token` should come from [`AssetTracker::begin_run`]. Per-step
    /// failures are recorded on the tracker and never returned.
    pub async fn persist(&self, token: RunToken, slug: &str, steps: &[DebugStep]) -> PersistSummary {
        let mut summary = PersistSummary::default();

        for step in steps {
            let Some(payload) = find_image_payload(step) else {
                summary.skipped += 1;
                continue;
            };

            if !self.tracker.mark_saving(token, step.index) {
                return self.abandon(token, summary);
            }

            let published = match self.save_one(token, slug, step.index, payload).await {
                Ok(asset) => {
                    debug!(run = %token, step = step.index, path = %asset.path, "asset saved");
                    summary.saved += 1;
                    self.tracker.mark_saved(token, step.index, asset)
                }
                Err(e) => {
                    warn!(run = %token, step = step.index, error = %e, "asset save failed");
                    summary.failed += 1;
                    self.tracker.mark_failed(token, step.index, e.to_string())
                }
            };
            if !published {
                return self.abandon(token, summary);
            }
        }

        info!(
            run = %token,
            store = self.store.name(),
            saved = summary.saved,
            failed = summary.failed,
            "asset persistence finished"
        );
        summary
    }

    async fn save_one(
        &self,
        token: RunToken,
        slug: &str,
        index: u32,
        payload: &str,
    ) -> Result<SavedAsset> {
        let (bytes, format) = decode_image(payload)?;
        let path = object_path(&self.user_id, slug, token, index, format.extension());
        self.store.upload(&path, bytes, format.content_type()).await?;
        let url = self.store.signed_url(&path, self.signed_url_ttl_secs).await?;
        Ok(SavedAsset { url, path })
    }

    fn abandon(&self, token: RunToken, mut summary: PersistSummary) -> PersistSummary {
        debug!(run = %token, "asset persistence superseded");
        summary.cancelled = true;
        summary
    }
}

impl std::fmt::Debug for AssetPersister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetPersister")
            .field("store", &self.store.name())
            .field("user_id", &self.user_id)
            .field("signed_url_ttl_secs", &self.signed_url_ttl_secs)
            .finish()
    }
}

/// `{user_id}/{slug}/{run_token}/step-{index}.{ext}`; a blank slug becomes `cat`.
pub fn object_path(user_id: &str, slug: &str, token: RunToken, index: u32, ext: &str) -> String {
    let slug = match slug.trim() {
        "" => "cat",
        s => s,
    };
    format!("{user_id}/{slug}/{token}/step-{index}.{ext}")
}
