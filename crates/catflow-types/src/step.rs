//! Pipeline step ("kitten") model and normalization.
//!
//! A [`Step`] carries an opaque `id`, a display `name`, and a [`StepKind`]
//! discriminated by the JSON `type` tag. Raw step lists coming from an
//! editor are loosely shaped, so [`normalize`] coerces them field by field
//! instead of relying on strict deserialization.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Model used when a step does not name one.
pub const DEFAULT_MODEL_ID: &str = "gemini-3-flash";

/// Image generation model used when an `image_gen` step does not name one.
pub const DEFAULT_IMAGE_MODEL_ID: &str = "gemini-2.5-flash-image";

/// Display label given to steps with a blank name.
pub const DEFAULT_STEP_NAME: &str = "Kitten";

/// Which image a vision or image-generation step consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSource {
    /// The image attached to the user's request.
    #[default]
    Original,
    /// The overlay produced by the preceding step.
    PreviousOverlay,
}

impl ImageSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSource::Original => "original",
            ImageSource::PreviousOverlay => "previous_overlay",
        }
    }

    fn from_raw(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("previous_overlay") => ImageSource::PreviousOverlay,
            _ => ImageSource::Original,
        }
    }
}

/// One unit of work in a cat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Opaque identifier, stable across edits.
    pub id: String,

    /// Display label.
    pub name: String,

    /// Variant-specific fields, tagged by `type`.
    #[serde(flatten)]
    pub kind: StepKind,
}

/// The five step variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    /// A chat-completion call against `model_id`.
    Model {
        model_id: String,
        #[serde(default)]
        instructions: String,
    },

    /// A call to a route on the vision service.
    VisionHttp {
        path: String,
        #[serde(default)]
        image_source: ImageSource,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        instructions: Option<String>,
    },

    /// An image-generation call.
    ImageGen {
        #[serde(default)]
        image_source: ImageSource,
        model_id: String,
        #[serde(default)]
        system_instructions: String,
        #[serde(default)]
        instructions: String,
    },

    /// A JavaScript `transform(input, ctx)` function.
    TransformJs { code: String },

    /// A Python `transform(input, ctx)` function.
    TransformPy { code: String },
}

impl Step {
    /// A model step with a freshly generated id.
    pub fn model(
        name: impl Into<String>,
        model_id: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            id: new_step_id(),
            name: name.into(),
            kind: StepKind::Model {
                model_id: model_id.into(),
                instructions: instructions.into(),
            },
        }
    }

    /// The `type` tag this step serializes with.
    pub fn type_tag(&self) -> &'static str {
        match &self.kind {
            StepKind::Model { .. } => "model",
            StepKind::VisionHttp { .. } => "vision_http",
            StepKind::ImageGen { .. } => "image_gen",
            StepKind::TransformJs { .. } => "transform_js",
            StepKind::TransformPy { .. } => "transform_py",
        }
    }

    /// The model this step is explicitly bound to, if any.
    ///
    /// Transforms never name a model; vision steps only when overridden.
    pub fn model_id(&self) -> Option<&str> {
        let id = match &self.kind {
            StepKind::Model { model_id, .. } | StepKind::ImageGen { model_id, .. } => {
                Some(model_id.as_str())
            }
            StepKind::VisionHttp { model_id, .. } => model_id.as_deref(),
            StepKind::TransformJs { .. } | StepKind::TransformPy { .. } => None,
        };
        id.map(str::trim).filter(|s| !s.is_empty())
    }
}

/// Fallback values applied while normalizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeDefaults {
    pub model_id: String,
    pub image_model_id: String,
}

impl Default for NormalizeDefaults {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.into(),
            image_model_id: DEFAULT_IMAGE_MODEL_ID.into(),
        }
    }
}

/// Normalize a raw step list using the built-in defaults.
///
/// See [`normalize_with`].
pub fn normalize(raw: &[Value]) -> Vec<Step> {
    normalize_with(raw, &NormalizeDefaults::default())
}

/// Coerce loosely shaped step objects into [`Step`] values.
///
/// Blank ids are regenerated, blank names become `"Kitten"`, and blank model
/// ids take the configured default. A missing `type` means `model`. Entries
/// that are not objects, carry an unknown `type`, or lack their variant's
/// required field are dropped.
///
/// The result may be empty; callers that need a runnable cat should fall
/// back to [`default_steps`].
pub fn normalize_with(raw: &[Value], defaults: &NormalizeDefaults) -> Vec<Step> {
    raw.iter()
        .filter_map(|entry| {
            let step = normalize_one(entry, defaults);
            if step.is_none() {
                debug!(entry = %entry, "dropping step during normalization");
            }
            step
        })
        .collect()
}

/// A single default model step, used when an editor hands over no steps.
pub fn default_steps(defaults: &NormalizeDefaults) -> Vec<Step> {
    vec![Step::model(DEFAULT_STEP_NAME, defaults.model_id.clone(), "")]
}

fn normalize_one(entry: &Value, defaults: &NormalizeDefaults) -> Option<Step> {
    let obj = entry.as_object()?;

    let id = text(obj, &["id"]).unwrap_or_else(new_step_id);
    let name = text(obj, &["name"]).unwrap_or_else(|| DEFAULT_STEP_NAME.to_string());
    let model_id = text(obj, &["model_id", "modelId"]);
    let instructions = raw_text(obj, "instructions");

    let kind = match text(obj, &["type"]).as_deref() {
        None | Some("model") => {
            let model_id = model_id.unwrap_or_else(|| defaults.model_id.trim().to_string());
            if model_id.is_empty() {
                return None;
            }
            StepKind::Model {
                model_id,
                instructions: instructions.unwrap_or_default(),
            }
        }
        Some("vision_http") => StepKind::VisionHttp {
            path: text(obj, &["path"])?,
            image_source: image_source(obj),
            model_id,
            instructions: instructions.filter(|s| !s.trim().is_empty()),
        },
        Some("image_gen") => StepKind::ImageGen {
            image_source: image_source(obj),
            model_id: model_id.unwrap_or_else(|| defaults.image_model_id.trim().to_string()),
            system_instructions: raw_text(obj, "system_instructions")
                .or_else(|| raw_text(obj, "systemInstructions"))
                .unwrap_or_default(),
            instructions: instructions.unwrap_or_default(),
        },
        Some("transform_js") => StepKind::TransformJs {
            code: code(obj)?,
        },
        Some("transform_py") => StepKind::TransformPy {
            code: code(obj)?,
        },
        Some(_) => return None,
    };

    Some(Step { id, name, kind })
}

fn new_step_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// First non-blank string among `keys`, trimmed.
fn text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(String::from)
}

/// A string field kept verbatim (free text keeps its inner layout).
fn raw_text(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(String::from)
}

fn code(obj: &Map<String, Value>) -> Option<String> {
    raw_text(obj, "code").filter(|c| !c.trim().is_empty())
}

fn image_source(obj: &Map<String, Value>) -> ImageSource {
    let raw = obj
        .get("image_source")
        .or_else(|| obj.get("imageSource"))
        .and_then(Value::as_str);
    ImageSource::from_raw(raw)
}
