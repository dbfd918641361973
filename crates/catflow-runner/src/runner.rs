//! Executes a compiled cat against the completion endpoint.
//!
//! [`CatRunner`] sends one chat-completion-shaped POST addressed to
//! `cat:<slug>`. The response is either a plain JSON completion or, when
//! progress was requested and the server supports it, a `text/event-stream`
//! of progress events that ends with the same completion payload.

use catflow_types::config::EndpointConfig;
use catflow_types::pipeline::{model_name_for, validate_slug};
use catflow_types::Credential;
use futures_util::StreamExt;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Result, RunError};
use crate::sse::{SseLineBuffer, StreamState};
use crate::types::{CatRequest, RunInput, RunOptions, RunOutput};

const EVENT_STREAM: &str = "text/event-stream";

/// Runs cats over HTTP.
///
/// ```rust,ignore
/// use catflow_runner::{CatRunner, RunInput, RunOptions};
///
/// let runner = CatRunner::new(config.endpoint.clone());
/// let out = runner
///     .run(&token, "roof-inspector", &RunInput::text("Check this roof"), &RunOptions::default())
///     .await?;
/// println!("{}", out.text);
/// ```
pub struct CatRunner {
    config: EndpointConfig,
    http: reqwest::Client,
}

impl CatRunner {
    pub fn new(config: EndpointConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Use a caller-provided client (shared pools, custom TLS).
    pub fn with_client(config: EndpointConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    fn completions_url(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        format!("{base}/chat/completions")
    }

    /// Execute the cat published under `slug`.
    ///
    /// # Errors
    ///
    /// - [`RunError::InvalidInput`] before any I/O when the input has neither
    ///   text nor an image, or the slug/token is unusable
    /// - [`RunError::Http`] for non-2xx responses, carrying the server's text
    /// - [`RunError::Pipeline`] / [`RunError::StreamIncomplete`] for a
    ///   progress stream that reported an error or never completed
    /// - [`RunError::Transport`] for network failures
    pub async fn run(
        &self,
        access_token: &Credential,
        slug: &str,
        input: &RunInput,
        options: &RunOptions,
    ) -> Result<RunOutput> {
        let content = input.content_parts();
        if content.is_empty() {
            return Err(RunError::InvalidInput(
                "enter a message or attach an image".into(),
            ));
        }
        let slug = slug.trim();
        validate_slug(slug).map_err(|e| RunError::InvalidInput(e.to_string()))?;
        if access_token.is_empty() {
            return Err(RunError::InvalidInput("missing access token".into()));
        }

        let wants_progress = options.progress.is_some();
        let request = CatRequest::new(model_name_for(slug), content, options);

        debug!(
            slug = %slug,
            parts = request.messages[0].content.len(),
            draft = request.cat_draft,
            debug_pipeline = request.debug_pipeline,
            progress = wants_progress,
            "sending cat run request"
        );

        let mut req = self
            .http
            .post(self.completions_url())
            .bearer_auth(access_token.expose())
            .header("Content-Type", "application/json");
        if wants_progress {
            req = req.header("Accept", format!("{EVENT_STREAM}, application/json"));
        }
        if let Some(secs) = self.config.timeout_secs {
            req = req.timeout(std::time::Duration::from_secs(secs));
        }
        for (k, v) in &self.config.headers {
            if is_reserved_header(k) {
                warn!(header = %k, "ignoring configured header that the runner sets itself");
                continue;
            }
            req = req.header(k.as_str(), v.as_str());
        }

        let response = req.json(&request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = http_error_message(status.as_u16(), &body);
            warn!(slug = %slug, status = status.as_u16(), message = %message, "cat run rejected");
            return Err(RunError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let is_event_stream = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.to_ascii_lowercase().contains(EVENT_STREAM));

        let completion = if is_event_stream && wants_progress {
            self.consume_stream(response, options).await?
        } else {
            if wants_progress {
                warn!(
                    slug = %slug,
                    "progress requested but server replied without an event stream; continuing without progress"
                );
            }
            let body = response.text().await?;
            serde_json::from_str::<Value>(&body).map_err(|e| {
                RunError::InvalidResponse(format!("failed to parse completion body: {e}"))
            })?
        };

        let output = RunOutput::from_completion(&completion);
        debug!(
            slug = %slug,
            chars = output.text.len(),
            debug_steps = output.debug_steps.as_ref().map(Vec::len),
            "cat run finished"
        );
        Ok(output)
    }

    /// Read the event stream to its end and return the `complete` payload.
    async fn consume_stream(
        &self,
        response: reqwest::Response,
        options: &RunOptions,
    ) -> Result<Value> {
        let mut byte_stream = response.bytes_stream();
        let mut lines = SseLineBuffer::default();
        let mut state = StreamState::default();
        let progress = options.progress.as_ref();

        while let Some(chunk) = byte_stream.next().await {
            let bytes = chunk?;
            for line in lines.push(&bytes) {
                state.observe(&line, progress);
            }
        }

        if let Some(tail) = lines.finish() {
            state.observe(&tail, progress);
        }

        debug!("progress stream closed");
        state.finish()
    }
}

impl std::fmt::Debug for CatRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatRunner")
            .field("base_url", &self.config.base_url)
            .field("timeout_secs", &self.config.timeout_secs)
            .finish()
    }
}

/// Headers owned by the request itself; configured extras may not replace them.
const RESERVED_HEADERS: [&str; 3] = ["authorization", "content-type", "accept"];

fn is_reserved_header(name: &str) -> bool {
    RESERVED_HEADERS
        .iter()
        .any(|reserved| name.trim().eq_ignore_ascii_case(reserved))
}

/// Message for a non-2xx response: JSON error text, else the raw body,
/// else a generic phrase.
fn http_error_message(status: u16, body: &str) -> String {
    extract_error_message(body)
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| format!("Request failed with status {status}"))
}

/// `{"error": {"message": "..."}}`, `{"error": "..."}` or `{"message": "..."}`.
fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .and_then(|v| {
            v.get("message")
                .and_then(Value::as_str)
                .or_else(|| v.as_str())
        })
        .or_else(|| value.get("message").and_then(Value::as_str))
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner(base_url: &str) -> CatRunner {
        CatRunner::new(EndpointConfig {
            base_url: base_url.into(),
            ..Default::default()
        })
    }

    #[test]
    fn completions_url_construction() {
        assert_eq!(
            runner("https://api.example.com/v1").completions_url(),
            "https://api.example.com/v1/chat/completions"
        );
        assert_eq!(
            runner("https://api.example.com/v1/").completions_url(),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn http_error_message_fallbacks() {
        assert_eq!(
            http_error_message(401, r#"{"error":{"message":"Invalid API key"}}"#),
            "Invalid API key"
        );
        assert_eq!(http_error_message(402, r#"{"error":"Out of credits"}"#), "Out of credits");
        assert_eq!(http_error_message(404, r#"{"message":"Cat not found"}"#), "Cat not found");
        assert_eq!(http_error_message(500, "upstream exploded\n"), "upstream exploded");
        assert_eq!(http_error_message(503, "  "), "Request failed with status 503");
    }

    #[tokio::test]
    async fn empty_input_rejected_before_io() {
        // Nothing listens here; reaching the network would surface a transport error.
        let r = runner("http://127.0.0.1:9");
        let err = r
            .run(&Credential::new("tok"), "cat", &RunInput::text("  "), &RunOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn bad_slug_rejected_before_io() {
        let r = runner("http://127.0.0.1:9");
        for slug in ["", "  ", "Not A Slug"] {
            let err = r
                .run(&Credential::new("tok"), slug, &RunInput::text("hi"), &RunOptions::default())
                .await
                .unwrap_err();
            assert!(matches!(err, RunError::InvalidInput(_)), "slug {slug:?}");
        }
    }

    #[tokio::test]
    async fn missing_token_rejected_before_io() {
        let r = runner("http://127.0.0.1:9");
        let err = r
            .run(&Credential::default(), "cat", &RunInput::text("hi"), &RunOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::InvalidInput(_)));
    }

    #[test]
    fn reserved_headers_match_case_insensitively() {
        assert!(is_reserved_header("Authorization"));
        assert!(is_reserved_header("CONTENT-TYPE"));
        assert!(is_reserved_header(" accept "));
        assert!(!is_reserved_header("x-catflow-client"));
        assert!(!is_reserved_header("accept-language"));
    }

    #[test]
    fn debug_shows_base_url() {
        let debug = format!("{:?}", runner("https://api.example.com/v1"));
        assert!(debug.contains("api.example.com"));
    }
}
