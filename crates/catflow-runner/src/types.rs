//! Request and response shapes for executing a cat.
//!
//! The request mirrors the OpenAI chat completion format, addressed to the
//! synthetic model `cat:<slug>` and extended with catflow's run flags.

use catflow_types::DebugStep;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use catflow_types::ProgressUpdate;

/// What the user sends to a cat: text, an image, or both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunInput {
    pub message: String,
    pub image_url: Option<String>,
}

impl RunInput {
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            image_url: None,
        }
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Content parts for the user message; empty when there is nothing to send.
    pub fn content_parts(&self) -> Vec<ContentPart> {
        let mut parts = Vec::with_capacity(2);
        let text = self.message.trim();
        if !text.is_empty() {
            parts.push(ContentPart::Text {
                text: text.to_string(),
            });
        }
        if let Some(url) = self.image_url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            parts.push(ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: url.to_string(),
                },
            });
        }
        parts
    }
}

/// Per-run switches.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Run the draft (unpublished) definition of the cat.
    pub cat_draft: bool,

    /// Ask the server for per-step debug records.
    pub debug_pipeline: bool,

    /// Where progress updates go. `Some` asks the server for an event stream.
    pub progress: Option<mpsc::UnboundedSender<ProgressUpdate>>,
}

/// One part of a multimodal user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMessage {
    pub role: String,
    pub content: Vec<ContentPart>,
}

/// Body of the execution request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatRequest {
    /// Always `cat:<slug>`.
    pub model: String,

    /// Token streaming is never used; progress travels on its own channel.
    pub stream: bool,

    pub cat_draft: bool,
    pub debug_pipeline: bool,
    pub progress_updates: bool,
    pub messages: Vec<UserMessage>,
}

impl CatRequest {
    pub fn new(model: impl Into<String>, content: Vec<ContentPart>, options: &RunOptions) -> Self {
        Self {
            model: model.into(),
            stream: false,
            cat_draft: options.cat_draft,
            debug_pipeline: options.debug_pipeline,
            progress_updates: options.progress.is_some(),
            messages: vec![UserMessage {
                role: "user".into(),
                content,
            }],
        }
    }
}

/// Final result of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOutput {
    /// Assistant message content, stringified if it was not a string.
    pub text: String,

    /// Present when the response carried `debug.pipeline_steps`.
    pub debug_steps: Option<Vec<DebugStep>>,
}

impl RunOutput {
    /// Pull the answer and debug records out of a completion body.
    ///
    /// Missing fields yield empty text / `None`; malformed debug records are
    /// skipped.
    pub fn from_completion(body: &Value) -> Self {
        let text = match body.pointer("/choices/0/message/content") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };

        let debug_steps = body
            .pointer("/debug/pipeline_steps")
            .and_then(Value::as_array)
            .map(|steps| {
                steps
                    .iter()
                    .filter_map(|s| serde_json::from_value::<DebugStep>(s.clone()).ok())
                    .collect()
            });

        Self { text, debug_steps }
    }
}
