//! LLM provider abstraction.
//!
//! `LlmProvider` is an enum over concrete provider implementations.
//! Provider instances are shared immutable capabilities; clone them freely.
//!
//! Providers return `Result<String, ProviderError>`. [`LlmProvider::reply`]
//! is the boundary where a failure becomes one of the fixed user-facing
//! fallback strings, so callers of `reply` never see an error.

pub mod providers;

use thiserror::Error;
use tracing::error;

use crate::memory::ChatMessage;

/// Sent to the user when the completion service cannot be reached.
pub const TRANSPORT_FALLBACK: &str = "Вибачте, сталася помилка під час звернення до сервісу AI.";

/// Sent to the user when the completion service answers with an unexpected body.
pub const MALFORMED_FALLBACK: &str = "Вибачте, я отримав неочікувану відповідь від сервісу AI.";

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP client could not be constructed (startup only).
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    /// Connection failure, timeout or non-2xx status.
    #[error("provider request failed: {0}")]
    Transport(String),
    /// 2xx response without the expected `choices[0].message.content`.
    #[error("unexpected provider response: {detail}")]
    MalformedResponse { detail: String, body: String },
}

impl ProviderError {
    /// The user-facing text substituted for this failure.
    pub fn fallback_text(&self) -> &'static str {
        match self {
            ProviderError::MalformedResponse { .. } => MALFORMED_FALLBACK,
            ProviderError::Client(_) | ProviderError::Transport(_) => TRANSPORT_FALLBACK,
        }
    }
}

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available provider backends.
///
/// Enum dispatch avoids `dyn` trait objects and the `async-trait` dependency.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    Dummy(providers::dummy::DummyProvider),
    OpenAiCompatible(providers::openai_compatible::OpenAiCompatibleProvider),
}

impl LlmProvider {
    /// One completion round-trip over the ordered `history`.
    pub async fn complete(&self, history: &[ChatMessage]) -> Result<String, ProviderError> {
        match self {
            LlmProvider::Dummy(p) => p.complete(history).await,
            LlmProvider::OpenAiCompatible(p) => p.complete(history).await,
        }
    }

    /// Like [`complete`](Self::complete) but never fails: errors are logged
    /// and replaced by their fallback text.
    pub async fn reply(&self, history: &[ChatMessage]) -> String {
        match self.complete(history).await {
            Ok(text) => text,
            Err(e) => {
                match &e {
                    ProviderError::MalformedResponse { detail, body } => {
                        error!(%detail, response_body = %body, "error parsing completion response");
                    }
                    other => error!(error = %other, "error calling completion service"),
                }
                e.fallback_text().to_string()
            }
        }
    }
}
