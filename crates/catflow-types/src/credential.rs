//! Access tokens and storage keys.

use std::fmt;

use crate::error::{CatflowError, Result};

/// A credential for the completion endpoint or the asset store.
///
/// Remembers where it came from so a rejected token can be traced back to
/// its environment variable. The value itself never appears in `Debug`
/// output; call [`expose()`](Credential::expose) only when building a
/// request header.
#[derive(Clone, Default)]
pub struct Credential {
    value: String,
    source: Option<String>,
}

impl Credential {
    /// Wrap a credential supplied directly by the caller.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            source: None,
        }
    }

    /// Read a credential from the named environment variable.
    ///
    /// Returns `None` when the variable is unset or blank.
    pub fn from_env(var: &str) -> Option<Self> {
        let value = std::env::var(var).ok()?.trim().to_string();
        if value.is_empty() {
            return None;
        }
        Some(Self {
            value,
            source: Some(var.to_string()),
        })
    }

    /// Like [`from_env`](Credential::from_env), but a missing variable is an error.
    pub fn require_env(var: &str) -> Result<Self> {
        Self::from_env(var).ok_or_else(|| CatflowError::MissingCredential { var: var.to_string() })
    }

    /// The raw credential.
    pub fn expose(&self) -> &str {
        &self.value
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Environment variable the credential was read from, if any.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("source", &self.source)
            .field("set", &!self.value.is_empty())
            .finish_non_exhaustive()
    }
}
