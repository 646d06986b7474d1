//! OpenAI-compatible chat completion provider (`/chat/completions`).
//!
//! Works against OpenRouter, OpenAI and local servers speaking the same
//! protocol. All wire types are private to this module. The provider is
//! stateless and single-shot: one POST per call, no retries.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::llm::ProviderError;
use crate::memory::ChatMessage;

// ── Public provider ───────────────────────────────────────────────────────────

/// Adapter for any HTTP endpoint implementing `/chat/completions`.
///
/// Constructed once at startup, then cheaply cloned because
/// `reqwest::Client` is an `Arc` internally.
#[derive(Clone)]
pub struct OpenAiCompatibleProvider {
    client: Client,
    api_base_url: String,
    model: String,
    api_key: String,
    temperature: Option<f32>,
    system_prompt: Option<String>,
}

impl std::fmt::Debug for OpenAiCompatibleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleProvider")
            .field("api_base_url", &self.api_base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("system_prompt", &self.system_prompt.is_some())
            .finish_non_exhaustive()
    }
}

impl OpenAiCompatibleProvider {
    /// `api_key` is sent as `Authorization: Bearer <key>` on every request.
    pub fn new(
        api_base_url: String,
        model: String,
        api_key: String,
        timeout_seconds: u64,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Client(e.to_string()))?;

        Ok(Self {
            client,
            api_base_url,
            model,
            api_key,
            temperature: None,
            system_prompt: None,
        })
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: Option<String>) -> Self {
        self.system_prompt = system_prompt;
        self
    }

    /// Send the ordered `history` and return the trimmed reply text.
    pub async fn complete(&self, history: &[ChatMessage]) -> Result<String, ProviderError> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        if let Some(sys) = &self.system_prompt {
            messages.push(ChatMessage::system(sys.as_str()));
        }
        messages.extend_from_slice(history);

        let payload = ChatCompletionRequest {
            model: &self.model,
            messages: &messages,
            temperature: self.temperature,
        };

        debug!(
            model = %payload.model,
            messages = payload.messages.len(),
            "sending completion request"
        );
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %json, "full completion request payload");
        }

        // `.json()` also sets `Content-Type: application/json`.
        let response = self
            .client
            .post(&self.api_base_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                debug!(url = %self.api_base_url, error = %e, timeout = e.is_timeout(), "completion request failed (transport)");
                ProviderError::Transport(e.to_string())
            })?;

        let response = check_status(response).await?;

        let body = response.text().await.map_err(|e| {
            debug!(error = %e, "failed to read completion response body");
            ProviderError::Transport(format!("failed to read response body: {e}"))
        })?;
        trace!(response = %body, "full completion response payload");

        extract_content(&body)
    }
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// Error envelope used by OpenAI and compatible APIs.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// Pull `choices[0].message.content` out of a 2xx body.
fn extract_content(body: &str) -> Result<String, ProviderError> {
    let malformed = |detail: String| ProviderError::MalformedResponse {
        detail,
        body: body.to_string(),
    };

    let parsed: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| malformed(format!("failed to parse response body: {e}")))?;

    debug!(choices = parsed.choices.len(), "received completion response");

    parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| malformed("response has no choices".into()))?
        .message
        .content
        .map(|s| s.trim().to_string())
        .ok_or_else(|| malformed("first choice has no message content".into()))
}

/// Return the response if successful, otherwise a transport error carrying
/// the status and the provider's error message.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());

    let message = if let Ok(env) = serde_json::from_str::<ErrorEnvelope>(&body) {
        let code = env.error.code.map(|v| match v {
            serde_json::Value::String(s) => format!(" [code={s}]"),
            other => format!(" [code={other}]"),
        }).unwrap_or_default();
        format!("HTTP {status}{code}: {}", env.error.message)
    } else {
        format!("HTTP {status}: {body}")
    };

    debug!(%status, %message, "completion request returned HTTP error");
    Err(ProviderError::Transport(message))
}
