//! Client for OpenAI-compatible chat completion providers.
//!
//! Speaks `POST {base_url}/chat/completions` in both buffered and streaming
//! form. The streaming variant parses the provider's `text/event-stream`
//! response into plain content fragments, so callers never see SSE framing.

use bytes::Bytes;
use futures::{stream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::pin::Pin;
use thiserror::Error as ThisError;
use tracing::debug;

use crate::config::LlmConfig;
use crate::errors::Error;

/// How much of an upstream error body to keep for diagnostics.
const ERROR_BODY_LIMIT: usize = 512;

#[derive(ThisError, Debug)]
pub enum LlmError {
    #[error("provider rejected the API key")]
    InvalidApiKey,

    #[error("provider rate limit exceeded")]
    RateLimited,

    #[error("provider returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("request to provider failed: {0}")]
    Transport(reqwest::Error),

    #[error("provider did not respond within the request timeout")]
    Timeout,

    #[error("provider response was malformed: {0}")]
    Malformed(String),

    #[error("provider stream failed: {0}")]
    Stream(reqwest::Error),
}

impl From<LlmError> for Error {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::InvalidApiKey => Error::UpstreamAuth {
                detail: Some("The LLM provider rejected the API key".to_string()),
            },
            LlmError::RateLimited => Error::UpstreamRateLimited {
                detail: Some("The LLM provider is rate limiting requests".to_string()),
            },
            other => Error::Upstream {
                message: "Failed to generate recipes. Please try again.".to_string(),
                detail: Some(other.to_string()),
            },
        }
    }
}

/// A single chat message in provider wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<&'a serde_json::Value>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Internal {
                operation: format!("build LLM HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    #[cfg(test)]
    pub fn for_tests(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: "test-model".to_string(),
            temperature: 0.7,
            max_tokens: 256,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Runs a buffered completion and returns the assistant message content.
    ///
    /// `response_format` is passed through verbatim, so callers can request
    /// schema-constrained JSON output.
    pub async fn complete(
        &self,
        api_key: &str,
        messages: &[ChatMessage],
        response_format: Option<&serde_json::Value>,
    ) -> Result<String, LlmError> {
        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format,
            stream: false,
        };

        let response = self.send(api_key, &request).await?;
        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Malformed(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::Malformed("response carried no choices".to_string()))
    }

    /// Runs a streaming completion, yielding assistant content fragments as
    /// the provider produces them.
    pub async fn stream_completion(
        &self,
        api_key: &str,
        messages: &[ChatMessage],
    ) -> Result<impl Stream<Item = Result<String, LlmError>> + Send, LlmError> {
        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: None,
            stream: true,
        };

        let response = self.send(api_key, &request).await?;
        Ok(fragment_stream(response.bytes_stream()))
    }

    async fn send(&self, api_key: &str, request: &CompletionRequest<'_>) -> Result<reqwest::Response, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %self.model, stream = request.stream, "sending completion request");

        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Transport(e)
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > ERROR_BODY_LIMIT {
            let mut cut = ERROR_BODY_LIMIT;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }

        Err(match status.as_u16() {
            401 | 403 => LlmError::InvalidApiKey,
            429 => LlmError::RateLimited,
            _ => LlmError::Api { status: status.as_u16(), body },
        })
    }
}

/// Outcome of one SSE line.
enum SseLine {
    Fragment(String),
    Done,
    Ignored,
}

/// Parses a single line of an OpenAI-style event stream.
///
/// Only `data:` lines matter; event names, comments, and blank keep-alive
/// lines are skipped. A chunk whose delta has no content (role announcements,
/// finish markers) is also skipped rather than yielding an empty fragment.
fn parse_sse_line(line: &str) -> SseLine {
    let Some(data) = line.trim().strip_prefix("data:") else {
        return SseLine::Ignored;
    };
    let data = data.trim();

    if data == "[DONE]" {
        return SseLine::Done;
    }

    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => {
            let content = chunk
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta.content);
            match content {
                Some(content) if !content.is_empty() => SseLine::Fragment(content),
                _ => SseLine::Ignored,
            }
        }
        Err(e) => {
            debug!("skipping unparseable stream chunk: {e}");
            SseLine::Ignored
        }
    }
}

struct FragmentState {
    bytes: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
    buffer: String,
    pending: VecDeque<String>,
    done: bool,
}

/// Adapts a raw SSE byte stream into a stream of content fragments.
///
/// Provider chunks do not align with line boundaries, so bytes are buffered
/// until a full line is available. The stream ends at the `[DONE]` sentinel
/// or when the connection closes.
fn fragment_stream(
    bytes: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
) -> impl Stream<Item = Result<String, LlmError>> + Send {
    let state = FragmentState {
        bytes: Box::pin(bytes),
        buffer: String::new(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.pending.pop_front() {
                return Some((Ok(fragment), state));
            }
            if state.done {
                return None;
            }

            match state.bytes.next().await {
                None => {
                    state.done = true;
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(LlmError::Stream(e)), state));
                }
                Some(Ok(chunk)) => {
                    state.buffer.push_str(&String::from_utf8_lossy(&chunk));
                    while let Some(newline) = state.buffer.find('\n') {
                        let line: String = state.buffer.drain(..=newline).collect();
                        match parse_sse_line(&line) {
                            SseLine::Fragment(fragment) => state.pending.push_back(fragment),
                            SseLine::Done => {
                                state.done = true;
                                break;
                            }
                            SseLine::Ignored => {}
                        }
                    }
                }
            }
        }
    })
}
