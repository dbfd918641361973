//! The [`Cat`] pipeline definition and its slug rules.
//!
//! A cat is exposed to callers under the synthetic model id `cat:<slug>`,
//! so the slug must be URL-safe: lowercase `[a-z0-9-]+` with no leading or
//! trailing hyphen.

use serde::{Deserialize, Serialize};

use crate::error::{CatflowError, Result};
use crate::step::Step;

/// Slug used when a name contains no usable characters.
const FALLBACK_SLUG: &str = "cat";

/// A named, ordered pipeline of steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cat {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Explicit slug; derived from `name` when absent or blank.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,

    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Cat {
    /// The slug callers address this cat by.
    ///
    /// An explicit slug wins when it is non-blank; otherwise the name is
    /// slugified.
    pub fn resolved_slug(&self) -> Result<String> {
        match self.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(explicit) => {
                validate_slug(explicit)?;
                Ok(explicit.to_string())
            }
            None => Ok(slugify(&self.name)),
        }
    }

    /// The synthetic model identifier, `cat:<slug>`.
    pub fn model_name(&self) -> Result<String> {
        Ok(model_name_for(&self.resolved_slug()?))
    }
}

/// `cat:<slug>`.
pub fn model_name_for(slug: &str) -> String {
    format!("cat:{slug}")
}

/// Derive a slug from a display name.
///
/// Lowercases ASCII alphanumerics, collapses every other run of characters
/// into a single hyphen, and trims edge hyphens.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// Check that `slug` is non-empty lowercase `[a-z0-9-]+` without edge hyphens.
pub fn validate_slug(slug: &str) -> Result<()> {
    let invalid = |reason: &str| CatflowError::InvalidSlug {
        slug: slug.to_string(),
        reason: reason.to_string(),
    };

    if slug.is_empty() {
        return Err(invalid("empty"));
    }
    if let Some(bad) = slug
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
    {
        return Err(invalid(&format!("unexpected character '{bad}'")));
    }
    if slug.starts_with('-') || slug.ends_with('-') {
        return Err(invalid("leading or trailing hyphen"));
    }
    Ok(())
}
