//! Generated-asset persistence for catflow.
//!
//! After a debug run, steps that produced images carry them as base64 in
//! their parsed JSON. [`AssetPersister`] uploads each one to an
//! [`AssetStore`], signs a retrieval URL, and publishes per-step status on
//! an [`AssetTracker`]. Starting a new run supersedes the old one; a
//! superseded run never writes status again.

pub mod error;
pub mod image;
pub mod persist;
pub mod store;
pub mod tracker;

pub use error::{AssetError, Result};
pub use image::{ImageFormat, find_image_payload};
pub use persist::{AssetPersister, PersistSummary, object_path};
pub use store::{AssetStore, HttpAssetStore, LocalAssetStore, store_from_config};
pub use tracker::{AssetSnapshot, AssetTracker, RunToken, SaveStatus, SavedAsset};
