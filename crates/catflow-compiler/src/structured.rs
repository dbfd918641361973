//! Structured step config for vision segmentation and post-processing.
//!
//! This encoding is independent of the text grammar in [`crate::codec`]:
//! it is stored as a JSON value in its own column and combined with the
//! instruction document by the execution endpoint.
//!
//! ```json
//! { "steps": [
//!   { "type": "vision_sam3", "config": { "targets": [{"name":"rooflines","prompts":["roof edge"]}], "include_raw": false } },
//!   { "type": "vision_postprocess", "config": { "blocks": [{"id":"dedupe_lines"}] } }
//! ]}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::error::StructuredConfigError;

pub const MAX_TARGETS: usize = 25;
pub const MAX_BLOCKS: usize = 25;

/// The step kinds this codec understands. Anything else is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuredStepKind {
    VisionSam3,
    VisionPostprocess,
}

impl StructuredStepKind {
    pub fn tag(&self) -> &'static str {
        match self {
            StructuredStepKind::VisionSam3 => "vision_sam3",
            StructuredStepKind::VisionPostprocess => "vision_postprocess",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "vision_sam3" => Some(StructuredStepKind::VisionSam3),
            "vision_postprocess" => Some(StructuredStepKind::VisionPostprocess),
            _ => None,
        }
    }
}

/// A named segmentation target and the prompts that find it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisionTarget {
    pub name: String,
    pub prompts: Vec<String>,
}

impl VisionTarget {
    /// Trimmed copy, or `None` if the name or every prompt is blank.
    fn sanitized(&self) -> Option<VisionTarget> {
        let name = self.name.trim();
        let prompts: Vec<String> = self
            .prompts
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect();
        (!name.is_empty() && !prompts.is_empty()).then(|| VisionTarget {
            name: name.to_string(),
            prompts,
        })
    }
}

/// Editor-facing view of the structured config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredStepConfig {
    /// `false` means "clear the stored config".
    pub enabled: bool,

    #[serde(default)]
    pub include_raw: bool,

    #[serde(default)]
    pub targets: Vec<VisionTarget>,

    /// Post-processing blocks as JSON text, edited verbatim.
    #[serde(default)]
    pub blocks_json: String,
}

/// Read a stored structured config.
///
/// Accepts the JSON value itself or a string containing it. Unknown step
/// types, invalid targets, and non-object blocks are dropped silently.
pub fn parse_from_structured(raw: &Value) -> StructuredStepConfig {
    let owned;
    let raw = match raw {
        Value::String(text) => {
            owned = serde_json::from_str::<Value>(text).unwrap_or(Value::Null);
            &owned
        }
        other => other,
    };

    let mut include_raw = false;
    let mut targets = Vec::new();
    let mut blocks = Vec::new();

    let steps = raw
        .get("steps")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for step in steps {
        let Some(kind) = step
            .get("type")
            .and_then(Value::as_str)
            .and_then(StructuredStepKind::from_tag)
        else {
            continue;
        };
        let config = step.get("config").unwrap_or(&Value::Null);

        match kind {
            StructuredStepKind::VisionSam3 => {
                include_raw |= config
                    .get("include_raw")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                targets.extend(
                    config
                        .get("targets")
                        .and_then(Value::as_array)
                        .into_iter()
                        .flatten()
                        .filter_map(target_from_value),
                );
            }
            StructuredStepKind::VisionPostprocess => {
                blocks.extend(
                    config
                        .get("blocks")
                        .and_then(Value::as_array)
                        .into_iter()
                        .flatten()
                        .filter(|b| b.is_object())
                        .cloned(),
                );
            }
        }
    }

    let blocks_json =
        serde_json::to_string_pretty(&Value::Array(blocks)).unwrap_or_else(|_| "[]".into());

    StructuredStepConfig {
        enabled: !targets.is_empty(),
        include_raw,
        targets,
        blocks_json,
    }
}

/// Validate and encode a structured config.
///
/// `Ok(None)` clears the stored config and is returned whenever
/// `enabled` is false, regardless of the other fields.
pub fn build_structured(
    cfg: &StructuredStepConfig,
) -> Result<Option<Value>, StructuredConfigError> {
    if !cfg.enabled {
        return Ok(None);
    }

    let mut targets: Vec<VisionTarget> =
        cfg.targets.iter().filter_map(VisionTarget::sanitized).collect();
    if targets.is_empty() {
        return Err(StructuredConfigError::NoTargets);
    }
    if targets.len() > MAX_TARGETS {
        debug!(count = targets.len(), max = MAX_TARGETS, "truncating vision targets");
        targets.truncate(MAX_TARGETS);
    }

    let blocks = parse_blocks(&cfg.blocks_json)?;

    Ok(Some(json!({
        "steps": [
            {
                "type": StructuredStepKind::VisionSam3.tag(),
                "config": { "targets": targets, "include_raw": cfg.include_raw }
            },
            {
                "type": StructuredStepKind::VisionPostprocess.tag(),
                "config": { "blocks": blocks }
            }
        ]
    })))
}

fn target_from_value(value: &Value) -> Option<VisionTarget> {
    let name = value.get("name").and_then(Value::as_str)?;
    let prompts = value
        .get("prompts")
        .and_then(Value::as_array)?
        .iter()
        .filter_map(Value::as_str)
        .map(String::from)
        .collect();
    VisionTarget {
        name: name.to_string(),
        prompts,
    }
    .sanitized()
}

fn parse_blocks(text: &str) -> Result<Vec<Map<String, Value>>, StructuredConfigError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let value: Value = serde_json::from_str(text)
        .map_err(|e| StructuredConfigError::BlocksNotJson(e.to_string()))?;
    let Value::Array(items) = value else {
        return Err(StructuredConfigError::BlocksNotArray);
    };
    if items.len() > MAX_BLOCKS {
        return Err(StructuredConfigError::TooManyBlocks {
            count: items.len(),
            max: MAX_BLOCKS,
        });
    }

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(map) => Ok(map),
            _ => Err(StructuredConfigError::BlockNotObject(i + 1)),
        })
        .collect()
}
