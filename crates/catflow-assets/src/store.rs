//! Object storage backends for generated assets.
//!
//! [`AssetStore`] is the seam the persistence pipeline writes through.
//! Two implementations ship: [`LocalAssetStore`] writes below a directory
//! and hands out `file://` URLs, [`HttpAssetStore`] talks to a
//! Supabase-compatible storage API and returns time-limited signed URLs.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use catflow_types::Credential;
use catflow_types::config::{StorageBackend, StorageConfig};
use serde_json::Value;
use tracing::debug;

use crate::error::{AssetError, Result};

/// Write-then-sign access to an object store.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Store `bytes` at `path`, replacing anything already there.
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;

    /// A URL that retrieves `path` for at least `ttl_secs` seconds.
    async fn signed_url(&self, path: &str, ttl_secs: u64) -> Result<String>;
}

/// Build the store selected by `config.storage.backend`.
///
/// The HTTP backend reads its key from the environment variable named by
/// `api_key_env`.
pub fn store_from_config(config: &StorageConfig) -> Result<Arc<dyn AssetStore>> {
    match config.backend {
        StorageBackend::Local => Ok(Arc::new(LocalAssetStore::new(config.root_path()))),
        StorageBackend::Http => {
            let key = Credential::require_env(&config.api_key_env)
                .map_err(|e| AssetError::NotConfigured(e.to_string()))?;
            Ok(Arc::new(HttpAssetStore::new(
                config.base_url.clone(),
                config.bucket.clone(),
                key,
            )?))
        }
    }
}

/// Reject absolute paths and `..` so objects stay under the store root.
fn checked_relative(path: &str) -> Result<&Path> {
    let p = Path::new(path);
    if path.trim().is_empty() {
        return Err(AssetError::InvalidPath("empty path".into()));
    }
    if p.components().any(|c| !matches!(c, Component::Normal(_))) {
        return Err(AssetError::InvalidPath(path.to_string()));
    }
    Ok(p)
}

// ── Local filesystem ────────────────────────────────────────────────────

/// Stores assets as plain files below `root`.
#[derive(Debug, Clone)]
pub struct LocalAssetStore {
    root: PathBuf,
}

impl LocalAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        Ok(self.root.join(checked_relative(path)?))
    }
}

#[async_trait]
impl AssetStore for LocalAssetStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn upload(&self, path: &str, bytes: Vec<u8>, _content_type: &str) -> Result<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        debug!(path = %target.display(), "asset written");
        Ok(())
    }

    /// Local files do not expire; the TTL is ignored.
    async fn signed_url(&self, path: &str, _ttl_secs: u64) -> Result<String> {
        let target = self.resolve(path)?;
        if !tokio::fs::try_exists(&target).await? {
            return Err(AssetError::Sign(format!("{path} does not exist")));
        }
        let absolute = std::path::absolute(&target)?;
        Ok(format!("file://{}", absolute.display()))
    }
}

// ── HTTP (Supabase-compatible) ──────────────────────────────────────────

/// Stores assets in a bucket behind a Supabase-compatible storage API.
///
/// `base_url` is the storage root, e.g. `https://<ref>.supabase.co/storage/v1`.
pub struct HttpAssetStore {
    base_url: String,
    bucket: String,
    api_key: Credential,
    http: reqwest::Client,
}

impl HttpAssetStore {
    pub fn new(base_url: String, bucket: String, api_key: Credential) -> Result<Self> {
        if base_url.trim().is_empty() {
            return Err(AssetError::NotConfigured("storage base_url is empty".into()));
        }
        if bucket.trim().is_empty() {
            return Err(AssetError::NotConfigured("storage bucket is empty".into()));
        }
        Ok(Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            bucket: bucket.trim().to_string(),
            api_key,
            http: reqwest::Client::new(),
        })
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/object/{}/{}", self.base_url, self.bucket, path)
    }

    fn sign_url(&self, path: &str) -> String {
        format!("{}/object/sign/{}/{}", self.base_url, self.bucket, path)
    }

    /// The storage API returns a path relative to the storage root.
    fn absolute(&self, signed: &str) -> String {
        if signed.starts_with("http://") || signed.starts_with("https://") {
            signed.to_string()
        } else if signed.starts_with('/') {
            format!("{}{}", self.base_url, signed)
        } else {
            format!("{}/{}", self.base_url, signed)
        }
    }
}

impl std::fmt::Debug for HttpAssetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAssetStore")
            .field("base_url", &self.base_url)
            .field("bucket", &self.bucket)
            .field("api_key", &self.api_key)
            .finish()
    }
}

async fn failure_text(response: reqwest::Response) -> String {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
                .map(String::from)
        })
        .unwrap_or(body);
    format!("HTTP {status}: {}", detail.trim())
}

#[async_trait]
impl AssetStore for HttpAssetStore {
    fn name(&self) -> &str {
        "http"
    }

    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        checked_relative(path)?;
        let response = self
            .http
            .post(self.object_url(path))
            .bearer_auth(self.api_key.expose())
            .header("apikey", self.api_key.expose())
            .header("Content-Type", content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AssetError::Upload(failure_text(response).await));
        }
        debug!(bucket = %self.bucket, path = %path, "asset uploaded");
        Ok(())
    }

    async fn signed_url(&self, path: &str, ttl_secs: u64) -> Result<String> {
        checked_relative(path)?;
        let response = self
            .http
            .post(self.sign_url(path))
            .bearer_auth(self.api_key.expose())
            .header("apikey", self.api_key.expose())
            .json(&serde_json::json!({ "expiresIn": ttl_secs }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AssetError::Sign(failure_text(response).await));
        }
        let body: Value = response.json().await?;
        let signed = body
            .get("signedURL")
            .or_else(|| body.get("signedUrl"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AssetError::Sign("response carried no signed URL".into()))?;
        Ok(self.absolute(signed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_only() {
        assert!(checked_relative("local/cat/abc/step-1.png").is_ok());
        assert!(checked_relative("").is_err());
        assert!(checked_relative("/etc/passwd").is_err());
        assert!(checked_relative("a/../../b.png").is_err());
        assert!(checked_relative("./a.png").is_err());
    }

    #[tokio::test]
    async fn local_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalAssetStore::new(dir.path());
        store
            .upload("u/cat/run/step-1.png", vec![1, 2, 3], "image/png")
            .await
            .unwrap();

        let on_disk = std::fs::read(dir.path().join("u/cat/run/step-1.png")).unwrap();
        assert_eq!(on_disk, vec![1, 2, 3]);

        let url = store.signed_url("u/cat/run/step-1.png", 60).await.unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("u/cat/run/step-1.png"));
    }

    #[tokio::test]
    async fn local_sign_missing_object_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalAssetStore::new(dir.path());
        let err = store.signed_url("nope.png", 60).await.unwrap_err();
        assert!(matches!(err, AssetError::Sign(_)));
    }

    #[tokio::test]
    async fn local_rejects_escape() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalAssetStore::new(dir.path());
        let err = store.upload("../x.png", vec![0], "image/png").await.unwrap_err();
        assert!(matches!(err, AssetError::InvalidPath(_)));
    }

    #[test]
    fn http_store_requires_base_and_bucket() {
        assert!(HttpAssetStore::new("".into(), "b".into(), Credential::new("k")).is_err());
        assert!(HttpAssetStore::new("http://x".into(), " ".into(), Credential::new("k")).is_err());
    }

    #[test]
    fn http_store_absolute_urls() {
        let store = HttpAssetStore::new(
            "https://ref.supabase.co/storage/v1/".into(),
            "cat-assets".into(),
            Credential::new("k"),
        )
        .unwrap();
        assert_eq!(
            store.absolute("/object/sign/cat-assets/a.png?token=t"),
            "https://ref.supabase.co/storage/v1/object/sign/cat-assets/a.png?token=t"
        );
        assert_eq!(store.absolute("https://cdn.example.com/a.png"), "https://cdn.example.com/a.png");
        assert_eq!(
            store.object_url("u/a.png"),
            "https://ref.supabase.co/storage/v1/object/cat-assets/u/a.png"
        );
    }

    #[test]
    fn http_store_debug_redacts_key() {
        let store =
            HttpAssetStore::new("http://x".into(), "b".into(), Credential::new("sk-secret"))
                .unwrap();
        let debug = format!("{store:?}");
        assert!(!debug.contains("sk-secret"));
    }

    #[test]
    fn local_backend_from_config() {
        let config = StorageConfig {
            root: "/tmp/catflow-assets".into(),
            ..Default::default()
        };
        let store = store_from_config(&config).unwrap();
        assert_eq!(store.name(), "local");
    }

    #[test]
    fn http_backend_names_missing_key_variable() {
        let var = "CATFLOW_TEST_STORAGE_KEY_UNSET_5517";
        unsafe { std::env::remove_var(var) };
        let config = StorageConfig {
            backend: StorageBackend::Http,
            base_url: "http://x".into(),
            api_key_env: var.into(),
            ..Default::default()
        };
        let Err(err) = store_from_config(&config) else {
            panic!("expected a missing-key error");
        };
        assert!(matches!(&err, AssetError::NotConfigured(m) if m.contains(var)), "got: {err:?}");
    }
}
