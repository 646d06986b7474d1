//! Configuration loading with env-var overrides.
//!
//! Reads the TOML file named by `RELAY_CONFIG`, falling back to
//! `config/default.toml` when it exists and to built-in defaults otherwise.
//! `RELAY_LOG_LEVEL` overrides `[bot] log_level`. Secrets come from the
//! environment only and are required.

use std::{
    env, fmt, fs,
    path::Path,
};

use serde::Deserialize;

use crate::error::AppError;
use crate::logger;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

pub const TELEGRAM_TOKEN_VAR: &str = "TELEGRAM_BOT_TOKEN";
pub const LLM_API_KEY_VAR: &str = "OPENROUTER_API_KEY";

/// A secret string whose `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// OpenAI-compatible provider configuration (`[llm.openai]`).
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Model name passed in the request body.
    pub model: String,
    /// Sampling temperature; omitted from the request when `None`.
    pub temperature: Option<f32>,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
    /// Sent as a leading `system` message, never stored in history.
    pub system_prompt: Option<String>,
}

/// LLM configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Active provider: `"openai"` or `"dummy"`. Maps to `default` in `[llm]`.
    pub provider: String,
    pub openai: OpenAiConfig,
}

/// Fully-resolved bot configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    /// Per-conversation history window.
    pub history_limit: usize,
    pub llm: LlmConfig,
    pub telegram_bot_token: Secret,
    pub llm_api_key: Secret,
}

/// Values normally taken from the process environment.
/// Tests build this directly instead of mutating env vars.
#[derive(Default, Clone)]
pub struct EnvOverrides {
    pub config_path: Option<String>,
    pub log_level: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub llm_api_key: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            config_path: env::var("RELAY_CONFIG").ok(),
            log_level: env::var("RELAY_LOG_LEVEL").ok(),
            telegram_bot_token: env::var(TELEGRAM_TOKEN_VAR).ok(),
            llm_api_key: env::var(LLM_API_KEY_VAR).ok(),
        }
    }
}

// ── Raw TOML shape ────────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    bot: RawBot,
    #[serde(default)]
    history: RawHistory,
    #[serde(default)]
    llm: RawLlm,
}

#[derive(Deserialize)]
struct RawBot {
    #[serde(default = "default_log_level")]
    log_level: String,
}

impl Default for RawBot {
    fn default() -> Self {
        Self { log_level: default_log_level() }
    }
}

#[derive(Deserialize)]
struct RawHistory {
    #[serde(default = "default_history_limit")]
    limit: usize,
}

impl Default for RawHistory {
    fn default() -> Self {
        Self { limit: default_history_limit() }
    }
}

#[derive(Deserialize)]
struct RawLlm {
    #[serde(rename = "default", default = "default_llm_provider")]
    provider: String,
    #[serde(default)]
    openai: RawOpenAiConfig,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self { provider: default_llm_provider(), openai: RawOpenAiConfig::default() }
    }
}

#[derive(Deserialize)]
struct RawOpenAiConfig {
    #[serde(default = "default_openai_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_openai_model")]
    model: String,
    #[serde(default)]
    temperature: Option<f32>,
    #[serde(default = "default_openai_timeout_seconds")]
    timeout_seconds: u64,
    #[serde(default)]
    system_prompt: Option<String>,
}

impl Default for RawOpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            model: default_openai_model(),
            temperature: None,
            timeout_seconds: default_openai_timeout_seconds(),
            system_prompt: None,
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_history_limit() -> usize { 25 }
fn default_llm_provider() -> String { "openai".to_string() }
fn default_openai_api_base_url() -> String { "https://openrouter.ai/api/v1/chat/completions".to_string() }
fn default_openai_model() -> String { "deepseek/deepseek-r1-0528:free".to_string() }
fn default_openai_timeout_seconds() -> u64 { 60 }

// ── Loading ───────────────────────────────────────────────────────────────────

/// Load config from the file (if any), then apply env-var overrides.
pub fn load() -> Result<Config, AppError> {
    load_from(EnvOverrides::from_env())
}

/// Internal loader. An explicit `config_path` must exist; the default path
/// is optional.
pub fn load_from(overrides: EnvOverrides) -> Result<Config, AppError> {
    load_with_default(overrides, Path::new(DEFAULT_CONFIG_PATH))
}

/// Like [`load_from`] with the fallback file path made explicit.
fn load_with_default(overrides: EnvOverrides, default_path: &Path) -> Result<Config, AppError> {
    let raw = match overrides.config_path.as_deref() {
        Some(path) => read_raw(Path::new(path))?,
        None if default_path.exists() => read_raw(default_path)?,
        None => RawConfig::default(),
    };

    let log_level = overrides.log_level.unwrap_or(raw.bot.log_level);
    // Full EnvFilter directives are validated by the logger itself.
    if !log_level.contains('=') && !log_level.contains(',') {
        logger::parse_level(&log_level)
            .map_err(|e| AppError::Config(e.to_string()))?;
    }

    if raw.history.limit == 0 {
        return Err(AppError::Config("[history] limit must be at least 1".into()));
    }

    match raw.llm.provider.as_str() {
        "openai" | "dummy" => {}
        other => return Err(AppError::Config(format!("unknown llm provider: '{other}'"))),
    }

    Ok(Config {
        log_level,
        history_limit: raw.history.limit,
        llm: LlmConfig {
            provider: raw.llm.provider,
            openai: OpenAiConfig {
                api_base_url: raw.llm.openai.api_base_url,
                model: raw.llm.openai.model,
                temperature: raw.llm.openai.temperature,
                timeout_seconds: raw.llm.openai.timeout_seconds,
                system_prompt: raw.llm.openai.system_prompt.filter(|s| !s.trim().is_empty()),
            },
        },
        telegram_bot_token: require_secret(TELEGRAM_TOKEN_VAR, overrides.telegram_bot_token)?,
        llm_api_key: require_secret(LLM_API_KEY_VAR, overrides.llm_api_key)?,
    })
}

fn read_raw(path: &Path) -> Result<RawConfig, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;
    toml::from_str(&text)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))
}

fn require_secret(name: &str, value: Option<String>) -> Result<Secret, AppError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(Secret(v)),
        _ => Err(AppError::Config(format!("{name} is not set"))),
    }
}

// ── test helpers ──────────────────────────────────────────────────────────────

#[cfg(test)]
impl Config {
    /// Dummy provider, fake secrets, no external calls.
    pub fn test_default() -> Self {
        Self {
            log_level: "info".into(),
            history_limit: 25,
            llm: LlmConfig {
                provider: "dummy".into(),
                openai: OpenAiConfig {
                    api_base_url: "http://localhost:0/v1/chat/completions".into(),
                    model: "test-model".into(),
                    temperature: None,
                    timeout_seconds: 1,
                    system_prompt: None,
                },
            },
            telegram_bot_token: Secret("test-token".into()),
            llm_api_key: Secret("test-key".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_toml(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    fn with_secrets(config_path: Option<&Path>) -> EnvOverrides {
        EnvOverrides {
            config_path: config_path.map(|p| p.display().to_string()),
            log_level: None,
            telegram_bot_token: Some("123:abc".into()),
            llm_api_key: Some("sk-test".into()),
        }
    }

    #[test]
    fn empty_file_uses_defaults() {
        let f = write_toml("");
        let cfg = load_from(with_secrets(Some(f.path()))).unwrap();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.history_limit, 25);
        assert_eq!(cfg.llm.provider, "openai");
        assert_eq!(cfg.llm.openai.api_base_url, "https://openrouter.ai/api/v1/chat/completions");
        assert_eq!(cfg.llm.openai.model, "deepseek/deepseek-r1-0528:free");
        assert_eq!(cfg.llm.openai.temperature, None);
        assert_eq!(cfg.telegram_bot_token.expose(), "123:abc");
        assert_eq!(cfg.llm_api_key.expose(), "sk-test");
    }

    #[test]
    fn no_file_uses_builtin_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_with_default(with_secrets(None), &dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.history_limit, 25);
        assert_eq!(cfg.llm.provider, "openai");
        assert_eq!(cfg.llm.openai.timeout_seconds, 60);
        assert!(cfg.llm.openai.system_prompt.is_none());
    }

    #[test]
    fn default_file_is_read_when_present() {
        let f = write_toml("[history]\nlimit = 7\n");
        let cfg = load_with_default(with_secrets(None), f.path()).unwrap();
        assert_eq!(cfg.history_limit, 7);
    }

    #[test]
    fn toml_values_apply() {
        let f = write_toml(
            r#"
[bot]
log_level = "debug"

[history]
limit = 10

[llm]
default = "dummy"

[llm.openai]
model = "openai/gpt-4o-mini"
temperature = 0.5
timeout_seconds = 5
system_prompt = "Be brief."
"#,
        );
        let cfg = load_from(with_secrets(Some(f.path()))).unwrap();
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.history_limit, 10);
        assert_eq!(cfg.llm.provider, "dummy");
        assert_eq!(cfg.llm.openai.model, "openai/gpt-4o-mini");
        assert_eq!(cfg.llm.openai.temperature, Some(0.5));
        assert_eq!(cfg.llm.openai.timeout_seconds, 5);
        assert_eq!(cfg.llm.openai.system_prompt.as_deref(), Some("Be brief."));
    }

    #[test]
    fn blank_system_prompt_is_dropped() {
        let f = write_toml("[llm.openai]\nsystem_prompt = \"  \"\n");
        let cfg = load_from(with_secrets(Some(f.path()))).unwrap();
        assert!(cfg.llm.openai.system_prompt.is_none());
    }

    #[test]
    fn env_log_level_override() {
        let f = write_toml("[bot]\nlog_level = \"warn\"\n");
        let mut env = with_secrets(Some(f.path()));
        env.log_level = Some("trace".into());
        let cfg = load_from(env).unwrap();
        assert_eq!(cfg.log_level, "trace");
    }

    #[test]
    fn filter_directive_accepted() {
        let f = write_toml("[bot]\nlog_level = \"relay_bot=debug,teloxide=warn\"\n");
        let cfg = load_from(with_secrets(Some(f.path()))).unwrap();
        assert_eq!(cfg.log_level, "relay_bot=debug,teloxide=warn");
    }

    #[test]
    fn invalid_log_level_errors() {
        let f = write_toml("[bot]\nlog_level = \"verbose\"\n");
        assert!(load_from(with_secrets(Some(f.path()))).is_err());
    }

    #[test]
    fn missing_telegram_token_is_fatal() {
        let f = write_toml("");
        let mut env = with_secrets(Some(f.path()));
        env.telegram_bot_token = None;
        let msg = load_from(env).unwrap_err().to_string();
        assert!(msg.contains(TELEGRAM_TOKEN_VAR), "got: {msg}");
    }

    #[test]
    fn empty_api_key_is_fatal() {
        let f = write_toml("");
        let mut env = with_secrets(Some(f.path()));
        env.llm_api_key = Some("   ".into());
        let msg = load_from(env).unwrap_err().to_string();
        assert!(msg.contains(LLM_API_KEY_VAR), "got: {msg}");
    }

    #[test]
    fn zero_history_limit_errors() {
        let f = write_toml("[history]\nlimit = 0\n");
        assert!(load_from(with_secrets(Some(f.path()))).is_err());
    }

    #[test]
    fn unknown_provider_errors() {
        let f = write_toml("[llm]\ndefault = \"qwen\"\n");
        let msg = load_from(with_secrets(Some(f.path()))).unwrap_err().to_string();
        assert!(msg.contains("qwen"));
    }

    #[test]
    fn missing_explicit_file_errors() {
        let env = with_secrets(Some(Path::new("/nonexistent/relay.toml")));
        let msg = load_from(env).unwrap_err().to_string();
        assert!(msg.contains("config error"));
    }

    #[test]
    fn secrets_are_redacted_in_debug() {
        let cfg = Config::test_default();
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("test-token"));
        assert!(!dbg.contains("test-key"));
        assert!(dbg.contains("Secret(***)"));
    }
}
