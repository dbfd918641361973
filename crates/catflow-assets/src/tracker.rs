//! Observable per-step save status, scoped to a single persistence run.
//!
//! Every run gets a fresh [`RunToken`]. Starting a run supersedes the one
//! before it, and every status write is a compare-then-apply under one lock:
//! a write tagged with a token that is no longer current is dropped. A
//! superseded run can therefore keep working in the background without ever
//! becoming visible.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

/// Identity of one persistence run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RunToken(Uuid);

impl RunToken {
    fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RunToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Where a saved asset lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedAsset {
    /// Retrieval URL (signed, or `file://` for local storage).
    pub url: String,
    /// Object path inside the store.
    pub path: String,
}

/// What a caller sees for one step index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    Saving,
    Saved(SavedAsset),
    Failed(String),
}

/// Point-in-time copy of the tracker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssetSnapshot {
    pub run: Option<RunToken>,
    pub saving: BTreeSet<u32>,
    pub saved: BTreeMap<u32, SavedAsset>,
    pub errors: BTreeMap<u32, String>,
}

impl AssetSnapshot {
    pub fn status(&self, index: u32) -> SaveStatus {
        if self.saving.contains(&index) {
            SaveStatus::Saving
        } else if let Some(asset) = self.saved.get(&index) {
            SaveStatus::Saved(asset.clone())
        } else if let Some(err) = self.errors.get(&index) {
            SaveStatus::Failed(err.clone())
        } else {
            SaveStatus::Idle
        }
    }

    pub fn is_empty(&self) -> bool {
        self.saving.is_empty() && self.saved.is_empty() && self.errors.is_empty()
    }
}

/// Shared, cloneable status board.
#[derive(Debug, Clone, Default)]
pub struct AssetTracker {
    inner: Arc<Mutex<AssetSnapshot>>,
}

impl AssetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supersede any running persistence and clear all statuses.
    pub fn begin_run(&self) -> RunToken {
        let token = RunToken::fresh();
        let mut state = self.inner.lock();
        *state = AssetSnapshot {
            run: Some(token),
            ..Default::default()
        };
        token
    }

    /// Supersede the current run without starting another.
    pub fn cancel(&self) {
        let mut state = self.inner.lock();
        *state = AssetSnapshot::default();
    }

    pub fn current(&self) -> Option<RunToken> {
        self.inner.lock().run
    }

    pub fn is_current(&self, token: RunToken) -> bool {
        self.current() == Some(token)
    }

    pub fn snapshot(&self) -> AssetSnapshot {
        self.inner.lock().clone()
    }

    pub fn status(&self, index: u32) -> SaveStatus {
        self.inner.lock().status(index)
    }

    /// Apply `write` only if `token` is still the current run.
    ///
    /// Returns `false` when the write was dropped.
    pub(crate) fn commit(&self, token: RunToken, write: impl FnOnce(&mut AssetSnapshot)) -> bool {
        let mut state = self.inner.lock();
        if state.run != Some(token) {
            return false;
        }
        write(&mut state);
        true
    }

    pub(crate) fn mark_saving(&self, token: RunToken, index: u32) -> bool {
        self.commit(token, |s| {
            s.errors.remove(&index);
            s.saving.insert(index);
        })
    }

    pub(crate) fn mark_saved(&self, token: RunToken, index: u32, asset: SavedAsset) -> bool {
        self.commit(token, |s| {
            s.saving.remove(&index);
            s.errors.remove(&index);
            s.saved.insert(index, asset);
        })
    }

    pub(crate) fn mark_failed(&self, token: RunToken, index: u32, message: String) -> bool {
        self.commit(token, |s| {
            s.saving.remove(&index);
            s.errors.insert(index, message);
        })
    }
}
