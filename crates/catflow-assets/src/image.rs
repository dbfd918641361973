//! Locating and decoding images embedded in debug step output.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use catflow_types::DebugStep;
use serde_json::Value;

use crate::error::{AssetError, Result};

/// Fields checked on `parsed_json`, most preferred first.
pub const IMAGE_FIELDS: [&str; 3] = ["overlay_base64", "image_base64", "overlay_png_base64"];

/// Image container inferred from the base64 header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    /// `iVBORw0K` is PNG, `/9j/` is JPEG, anything else is assumed PNG.
    pub fn sniff(base64: &str) -> Self {
        if base64.starts_with("/9j/") {
            ImageFormat::Jpeg
        } else {
            ImageFormat::Png
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }
}

/// The embedded base64 image of a debug step, if it has one.
///
/// A `data:<mime>;base64,` prefix is stripped.
pub fn find_image_payload(step: &DebugStep) -> Option<&str> {
    let parsed = step.parsed_json.as_ref()?;
    IMAGE_FIELDS
        .iter()
        .filter_map(|field| parsed.get(*field).and_then(Value::as_str))
        .map(strip_data_url)
        .map(str::trim)
        .find(|payload| !payload.is_empty())
}

/// Decode a payload into raw bytes plus its sniffed format.
pub fn decode_image(payload: &str) -> Result<(Vec<u8>, ImageFormat)> {
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| AssetError::Decode(e.to_string()))?;
    if bytes.is_empty() {
        return Err(AssetError::Decode("empty image".into()));
    }
    Ok((bytes, ImageFormat::sniff(&compact)))
}

fn strip_data_url(raw: &str) -> &str {
    match raw.strip_prefix("data:").and_then(|rest| rest.split_once(";base64,")) {
        Some((_, data)) => data,
        None => raw,
    }
}
