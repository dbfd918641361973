//! Configuration schema types.
//!
//! All structs accept both `snake_case` and `camelCase` field names via
//! `#[serde(alias)]`. Unknown fields are ignored for forward compatibility,
//! and every section falls back to its defaults when absent.
//!
//! - [`loader`] -- config file discovery and loading

pub mod loader;

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::step::{DEFAULT_IMAGE_MODEL_ID, DEFAULT_MODEL_ID, NormalizeDefaults};

pub use loader::{discover_config_path, load_config};

/// Env var holding the bearer token for the completion endpoint.
pub const DEFAULT_ACCESS_TOKEN_ENV: &str = "CATFLOW_ACCESS_TOKEN";

/// Env var holding the object-storage service key.
pub const DEFAULT_STORAGE_KEY_ENV: &str = "CATFLOW_STORAGE_KEY";

/// Signed asset URLs stay valid for a week by default.
pub const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 60 * 60 * 24 * 7;

// ── Root config ──────────────────────────────────────────────────────────

/// Root configuration for catflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Completion endpoint that executes cats.
    #[serde(default)]
    pub endpoint: EndpointConfig,

    /// Where generated assets are persisted.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Fallback values used when normalizing steps.
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

// ── Endpoint ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// API base; requests go to `{base_url}/chat/completions`.
    #[serde(default = "default_base_url", alias = "baseUrl")]
    pub base_url: String,

    /// Environment variable holding the access token.
    #[serde(default = "default_access_token_env", alias = "accessTokenEnv")]
    pub access_token_env: String,

    /// Transport timeout in seconds. Unset means no client-side timeout.
    #[serde(default, alias = "timeoutSecs")]
    pub timeout_secs: Option<u64>,

    /// Extra headers sent with every request.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            access_token_env: default_access_token_env(),
            timeout_secs: None,
            headers: HashMap::new(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8787/v1".into()
}

fn default_access_token_env() -> String {
    DEFAULT_ACCESS_TOKEN_ENV.into()
}

// ── Storage ──────────────────────────────────────────────────────────────

/// Which object store receives generated assets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// A directory on the local filesystem.
    #[default]
    Local,
    /// A bucket behind an HTTP object-storage API.
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Root directory for the local backend. Supports a leading `~/`.
    #[serde(default = "default_storage_root")]
    pub root: String,

    /// Storage API base for the HTTP backend.
    #[serde(default, alias = "baseUrl")]
    pub base_url: String,

    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Environment variable holding the storage service key.
    #[serde(default = "default_storage_key_env", alias = "apiKeyEnv")]
    pub api_key_env: String,

    #[serde(
        default = "default_signed_url_ttl_secs",
        alias = "signedUrlTtlSecs"
    )]
    pub signed_url_ttl_secs: u64,

    /// Namespace prefix for object paths.
    #[serde(default = "default_user_id", alias = "userId")]
    pub user_id: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            root: default_storage_root(),
            base_url: String::new(),
            bucket: default_bucket(),
            api_key_env: default_storage_key_env(),
            signed_url_ttl_secs: default_signed_url_ttl_secs(),
            user_id: default_user_id(),
        }
    }
}

impl StorageConfig {
    /// The local root with `~/` expanded.
    pub fn root_path(&self) -> PathBuf {
        if let Some(rest) = self.root.strip_prefix("~/")
            && let Some(home) = dirs::home_dir()
        {
            return home.join(rest);
        }
        PathBuf::from(&self.root)
    }
}

fn default_storage_root() -> String {
    "~/.catflow/assets".into()
}

fn default_bucket() -> String {
    "cat-assets".into()
}

fn default_storage_key_env() -> String {
    DEFAULT_STORAGE_KEY_ENV.into()
}

fn default_signed_url_ttl_secs() -> u64 {
    DEFAULT_SIGNED_URL_TTL_SECS
}

fn default_user_id() -> String {
    "local".into()
}

// ── Defaults ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_model_id", alias = "modelId")]
    pub model_id: String,

    #[serde(default = "default_image_model_id", alias = "imageModelId")]
    pub image_model_id: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            image_model_id: default_image_model_id(),
        }
    }
}

impl DefaultsConfig {
    pub fn normalize_defaults(&self) -> NormalizeDefaults {
        NormalizeDefaults {
            model_id: self.model_id.clone(),
            image_model_id: self.image_model_id.clone(),
        }
    }
}

fn default_model_id() -> String {
    DEFAULT_MODEL_ID.into()
}

fn default_image_model_id() -> String {
    DEFAULT_IMAGE_MODEL_ID.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_object_yields_defaults() {
        let config: Config = serde_json::from_value(json!({})).unwrap();
        assert_eq!(config.endpoint.base_url, "http://localhost:8787/v1");
        assert_eq!(config.endpoint.access_token_env, DEFAULT_ACCESS_TOKEN_ENV);
        assert!(config.endpoint.timeout_secs.is_none());
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.storage.signed_url_ttl_secs, DEFAULT_SIGNED_URL_TTL_SECS);
        assert_eq!(config.defaults.model_id, DEFAULT_MODEL_ID);
    }

    #[test]
    fn camel_case_aliases_accepted() {
        let config: Config = serde_json::from_value(json!({
            "endpoint": {"baseUrl": "https://api.example.com/v1", "timeoutSecs": 90},
            "storage": {"backend": "http", "baseUrl": "https://store.example.com", "userId": "u-1"},
            "defaults": {"modelId": "gpt-4o"},
            "somethingNew": true
        }))
        .unwrap();
        assert_eq!(config.endpoint.base_url, "https://api.example.com/v1");
        assert_eq!(config.endpoint.timeout_secs, Some(90));
        assert_eq!(config.storage.backend, StorageBackend::Http);
        assert_eq!(config.storage.user_id, "u-1");
        assert_eq!(config.defaults.model_id, "gpt-4o");
        assert_eq!(config.defaults.image_model_id, DEFAULT_IMAGE_MODEL_ID);
    }

    #[test]
    fn root_path_without_tilde() {
        let storage = StorageConfig {
            root: "/var/lib/catflow".into(),
            ..Default::default()
        };
        assert_eq!(storage.root_path(), PathBuf::from("/var/lib/catflow"));
    }
}
