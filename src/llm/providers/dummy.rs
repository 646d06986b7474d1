//! Dummy LLM provider: echoes the latest user message back prefixed with
//! `[echo]`. Lets the bot run end to end without an API account.

use crate::llm::ProviderError;
use crate::memory::{ChatMessage, Role};

#[derive(Debug, Clone)]
pub struct DummyProvider;

impl DummyProvider {
    pub async fn complete(&self, history: &[ChatMessage]) -> Result<String, ProviderError> {
        let last = history
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        Ok(format!("[echo] {last}"))
    }
}
