//! Configuration file discovery and loading.
//!
//! The discovery order is:
//! 1. An explicit path (the CLI's `--config`).
//! 2. `CATFLOW_CONFIG` environment variable.
//! 3. `~/.catflow/config.json`.
//! 4. If none found, built-in defaults.

use std::path::{Path, PathBuf};

use super::Config;
use crate::error::{CatflowError, Result};

/// Env var naming an explicit config file.
pub const CONFIG_ENV: &str = "CATFLOW_CONFIG";

/// Discover the config file path using the fallback chain.
///
/// An explicit path or `CATFLOW_CONFIG` is returned without checking that it
/// exists, so that a typo surfaces as an error instead of silently loading
/// defaults.
pub fn discover_config_path(explicit: Option<&Path>, home_dir: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV)
        && !env_path.trim().is_empty()
    {
        return Some(PathBuf::from(env_path));
    }

    let candidate = home_dir?.join(".catflow").join("config.json");
    candidate.exists().then_some(candidate)
}

/// Load the configuration, falling back to defaults when no file is found.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let Some(path) = discover_config_path(explicit, dirs::home_dir()) else {
        tracing::info!("no config file found, using defaults");
        return Ok(Config::default());
    };

    tracing::debug!(path = %path.display(), "loading config file");
    let contents = std::fs::read_to_string(&path).map_err(|e| CatflowError::ConfigInvalid {
        reason: format!("failed to read {}: {e}", path.display()),
    })?;

    serde_json::from_str(&contents).map_err(|e| CatflowError::ConfigInvalid {
        reason: format!("failed to parse {}: {e}", path.display()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_wins() {
        let path = PathBuf::from("/tmp/does-not-matter.json");
        assert_eq!(
            discover_config_path(Some(&path), None),
            Some(path.clone())
        );
    }

    #[test]
    fn home_candidate_requires_existence() {
        let dir = tempfile::tempdir().unwrap();
        if std::env::var(CONFIG_ENV).is_ok() {
            return;
        }
        assert_eq!(discover_config_path(None, Some(dir.path().to_path_buf())), None);

        std::fs::create_dir_all(dir.path().join(".catflow")).unwrap();
        std::fs::write(dir.path().join(".catflow/config.json"), "{}").unwrap();
        assert_eq!(
            discover_config_path(None, Some(dir.path().to_path_buf())),
            Some(dir.path().join(".catflow/config.json"))
        );
    }

    #[test]
    fn load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catflow.json");
        std::fs::write(&path, r#"{"endpoint": {"base_url": "https://x.test/v1"}}"#).unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.endpoint.base_url, "https://x.test/v1");
    }

    #[test]
    fn load_missing_explicit_file_errors() {
        let err = load_config(Some(Path::new("/nonexistent/catflow.json"))).unwrap_err();
        assert!(matches!(err, CatflowError::ConfigInvalid { .. }));
    }

    #[test]
    fn load_malformed_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ nope").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }
}
