//! Layered configuration: defaults, optional TOML file, then environment
//!
//! Environment variables use the `PERSONA_CHAT_` prefix with `__` between
//! section and key, e.g. `PERSONA_CHAT_SESSION__MODEL=gpt-4`.

use crate::error::{ChatError, Result};
use crate::persona::Persona;
use secrecy::SecretString;
use serde::Deserialize;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const TEMPERATURE_RANGE: RangeInclusive<f32> = 0.0..=1.3;
pub const MAX_TOKENS_RANGE: RangeInclusive<u32> = 5..=2000;

const ENV_PREFIX: &str = "PERSONA_CHAT";

/// Top-level configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from an optional TOML file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(false));
        }
        let settings = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string (no environment overlay)
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: Config = ::config::Config::builder()
            .add_source(::config::File::from_str(toml, ::config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.session.validate()?;
        self.rate_limit.validate()?;
        if self.completion.base_url.trim().is_empty() {
            return Err(ChatError::Configuration("completion.base_url is empty".into()));
        }
        Ok(())
    }
}

/// Remote completion endpoint settings
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionConfig {
    /// OpenAI-compatible API base, without the `/chat/completions` suffix
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_base_url() -> String { "https://api.openai.com/v1".to_string() }
fn default_timeout_ms() -> u64 { 30_000 }

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl CompletionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Per-session defaults, overridable per `submit` call
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum output tokens per completion call
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Ceiling on tokens across the whole conversation log
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,

    #[serde(default = "default_persona")]
    pub default_persona: Persona,
}

fn default_model() -> String { "gpt-3.5-turbo".to_string() }
fn default_temperature() -> f32 { 0.7 }
fn default_max_tokens() -> u32 { 150 }
fn default_token_budget() -> usize { 4096 }
fn default_persona() -> Persona { Persona::Default }

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            token_budget: default_token_budget(),
            default_persona: default_persona(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        check_temperature(self.temperature)?;
        check_max_tokens(self.max_tokens)?;
        if self.model.trim().is_empty() {
            return Err(ChatError::Configuration("session.model is empty".into()));
        }
        if self.token_budget == 0 {
            return Err(ChatError::Configuration("session.token_budget must be positive".into()));
        }
        Ok(())
    }
}

pub(crate) fn check_temperature(value: f32) -> Result<()> {
    if TEMPERATURE_RANGE.contains(&value) {
        Ok(())
    } else {
        Err(ChatError::InvalidParameter {
            name: "temperature",
            reason: format!(
                "{} is outside {}..={}",
                value,
                TEMPERATURE_RANGE.start(),
                TEMPERATURE_RANGE.end()
            ),
        })
    }
}

pub(crate) fn check_max_tokens(value: u32) -> Result<()> {
    if MAX_TOKENS_RANGE.contains(&value) {
        Ok(())
    } else {
        Err(ChatError::InvalidParameter {
            name: "max_tokens",
            reason: format!(
                "{} is outside {}..={}",
                value,
                MAX_TOKENS_RANGE.start(),
                MAX_TOKENS_RANGE.end()
            ),
        })
    }
}

/// History file placement
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    /// Directory holding per-session history files
    #[serde(default = "default_history_dir")]
    pub directory: PathBuf,

    /// Fixed file name; a timestamped name is generated when unset
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Indent the JSON document
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

fn default_history_dir() -> PathBuf { PathBuf::from(".") }
fn default_pretty() -> bool { true }

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            directory: default_history_dir(),
            file: None,
            pretty: default_pretty(),
        }
    }
}

/// Sliding-window request throttling
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_enabled")]
    pub enabled: bool,

    /// Requests admitted per window
    #[serde(default = "default_rate_limit")]
    pub limit: usize,

    #[serde(default = "default_rate_period")]
    pub period_secs: u64,
}

fn default_rate_enabled() -> bool { true }
fn default_rate_limit() -> usize { 3 }
fn default_rate_period() -> u64 { 60 }

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_rate_enabled(),
            limit: default_rate_limit(),
            period_secs: default_rate_period(),
        }
    }
}

impl RateLimitConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.enabled && (self.limit == 0 || self.period_secs == 0) {
            return Err(ChatError::Configuration(
                "rate_limit.limit and rate_limit.period_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Host-side credential substitution.
///
/// When a user-supplied credential equals `access_passphrase`, the
/// `server_api_key` is used in its place.
#[derive(Debug, Default, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub access_passphrase: Option<SecretString>,

    #[serde(default)]
    pub server_api_key: Option<SecretString>,
}

/// Log output settings
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String { "info".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.session.model, "gpt-3.5-turbo");
        assert_eq!(config.session.temperature, 0.7);
        assert_eq!(config.session.max_tokens, 150);
        assert_eq!(config.session.token_budget, 4096);
        assert_eq!(config.session.default_persona, Persona::Default);
        assert_eq!(config.rate_limit.limit, 3);
        assert_eq!(config.rate_limit.period(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_str() {
        let config = Config::from_toml_str(
            r#"
            [session]
            model = "gpt-4"
            temperature = 1.1
            default_persona = "thoughtful"

            [history]
            directory = "/tmp/chats"
            file = "alice.json"

            [credentials]
            access_passphrase = "open sesame"
            server_api_key = "sk-server"
            "#,
        )
        .unwrap();

        assert_eq!(config.session.model, "gpt-4");
        assert_eq!(config.session.temperature, 1.1);
        assert_eq!(config.session.max_tokens, 150);
        assert_eq!(config.session.default_persona, Persona::Thoughtful);
        assert_eq!(config.history.file, Some(PathBuf::from("alice.json")));
        assert_eq!(
            config.credentials.server_api_key.as_ref().map(|s| s.expose_secret().as_str()),
            Some("sk-server")
        );
    }

    #[test]
    fn test_out_of_range_session_is_rejected() {
        let result = Config::from_toml_str("[session]\ntemperature = 1.5\n");
        assert!(matches!(result, Err(ChatError::InvalidParameter { name: "temperature", .. })));

        let result = Config::from_toml_str("[session]\nmax_tokens = 4\n");
        assert!(matches!(result, Err(ChatError::InvalidParameter { name: "max_tokens", .. })));
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        assert!(check_temperature(0.0).is_ok());
        assert!(check_temperature(1.3).is_ok());
        assert!(check_temperature(-0.1).is_err());
        assert!(check_max_tokens(5).is_ok());
        assert!(check_max_tokens(2000).is_ok());
        assert!(check_max_tokens(2001).is_err());
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("persona-chat.toml");
        std::fs::write(&path, "[session]\nmodel = \"gpt-3.5-turbo\"\ntoken_budget = 77\n").unwrap();

        std::env::set_var("PERSONA_CHAT_SESSION__MODEL", "gpt-4");
        std::env::set_var("PERSONA_CHAT_RATE_LIMIT__ENABLED", "false");
        let result = Config::load(Some(path.as_path()));
        std::env::remove_var("PERSONA_CHAT_SESSION__MODEL");
        std::env::remove_var("PERSONA_CHAT_RATE_LIMIT__ENABLED");

        let config = result.unwrap();
        assert_eq!(config.session.model, "gpt-4");
        assert_eq!(config.session.token_budget, 77);
        assert!(!config.rate_limit.enabled);
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let config = Config::from_toml_str("[credentials]\nserver_api_key = \"sk-very-secret\"\n").unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("sk-very-secret"));
    }
}
