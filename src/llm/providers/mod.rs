//! LLM provider implementations.
//!
//! `build(config, api_key)` is the factory, called once at startup.

pub mod dummy;
pub mod openai_compatible;

use crate::config::LlmConfig;
use crate::llm::{LlmProvider, ProviderError};

/// Construct the provider named by `config.provider`.
pub fn build(config: &LlmConfig, api_key: &str) -> Result<LlmProvider, ProviderError> {
    match config.provider.as_str() {
        "dummy" => Ok(LlmProvider::Dummy(dummy::DummyProvider)),
        "openai" => {
            let oai = &config.openai;
            let p = openai_compatible::OpenAiCompatibleProvider::new(
                oai.api_base_url.clone(),
                oai.model.clone(),
                api_key.to_string(),
                oai.timeout_seconds,
            )?
            .with_temperature(oai.temperature)
            .with_system_prompt(oai.system_prompt.clone());
            Ok(LlmProvider::OpenAiCompatible(p))
        }
        other => Err(ProviderError::Client(format!("unknown provider: {other}"))),
    }
}
