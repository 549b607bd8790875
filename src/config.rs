use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ConciergeConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub inference: InferenceConfig,
    pub retrieval: RetrievalConfig,
    pub sessions: SessionConfig,
    pub game: GameConfig,
    pub notify: NotifyConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub cache_dir: String,
}

/// Hosted text-generation endpoint settings.
#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct InferenceConfig {
    pub api_base: String,
    pub model: String,
    /// Bearer token. Usually supplied through `HF_TOKEN` rather than the file.
    pub token: Option<String>,
    pub timeout_secs: u64,
    pub temperature: f64,
    pub chat_max_new_tokens: u32,
    pub game_max_new_tokens: u32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub chat_context_results: usize,
    pub digest_results: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    pub ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GameConfig {
    pub min_year: i32,
    pub max_year: i32,
}

/// SMS gateway settings for the daily digest.
#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct NotifyConfig {
    pub api_base: String,
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from_number: Option<String>,
    pub to_number: Option<String>,
}

/// Fully-populated SMS credentials, produced by [`NotifyConfig::settings`].
#[derive(Clone)]
pub struct SmsSettings {
    pub api_base: String,
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub to_number: String,
}

const REDACTED: &str = "<redacted>";

fn redact(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| REDACTED)
}

// Secrets never reach logs through `{:?}`.
impl std::fmt::Debug for InferenceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceConfig")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("token", &redact(&self.token))
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("chat_max_new_tokens", &self.chat_max_new_tokens)
            .field("game_max_new_tokens", &self.game_max_new_tokens)
            .finish()
    }
}

impl std::fmt::Debug for NotifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyConfig")
            .field("api_base", &self.api_base)
            .field("account_sid", &self.account_sid)
            .field("auth_token", &redact(&self.auth_token))
            .field("from_number", &self.from_number)
            .field("to_number", &self.to_number)
            .finish()
    }
}

impl std::fmt::Debug for SmsSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmsSettings")
            .field("api_base", &self.api_base)
            .field("account_sid", &self.account_sid)
            .field("auth_token", &REDACTED)
            .field("from_number", &self.from_number)
            .field("to_number", &self.to_number)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 7860,
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_concierge_dir()
            .join("concierge.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_concierge_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "local".into(),
            model: "all-MiniLM-L6-v2".into(),
            cache_dir,
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api-inference.huggingface.co/models".into(),
            model: "mistralai/Mistral-7B-Instruct-v0.3".into(),
            token: None,
            timeout_secs: 120,
            temperature: 0.7,
            chat_max_new_tokens: 500,
            game_max_new_tokens: 200,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chat_context_results: 3,
            digest_results: 5,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 24 * 60 * 60,
            sweep_interval_secs: 60 * 60,
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            min_year: 1950,
            max_year: 1980,
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.twilio.com/2010-04-01".into(),
            account_sid: None,
            auth_token: None,
            from_number: None,
            to_number: None,
        }
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl InferenceConfig {
    /// The bearer token, or an error naming the variable to set.
    pub fn require_token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .filter(|t| !t.is_empty())
            .context("inference token not configured; set HF_TOKEN or [inference].token")
    }
}

impl NotifyConfig {
    /// Collect the SMS settings, failing with the names of any that are missing.
    pub fn settings(&self) -> Result<SmsSettings> {
        let fields = [
            ("TWILIO_ACCOUNT_SID", &self.account_sid),
            ("TWILIO_AUTH_TOKEN", &self.auth_token),
            ("TWILIO_FROM_NUMBER", &self.from_number),
            ("TWILIO_TO_NUMBER", &self.to_number),
        ];
        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, value)| value.as_deref().map_or(true, str::is_empty))
            .map(|(name, _)| *name)
            .collect();
        anyhow::ensure!(
            missing.is_empty(),
            "SMS configuration incomplete, missing: {}",
            missing.join(", ")
        );

        Ok(SmsSettings {
            api_base: self.api_base.clone(),
            account_sid: self.account_sid.clone().unwrap_or_default(),
            auth_token: self.auth_token.clone().unwrap_or_default(),
            from_number: self.from_number.clone().unwrap_or_default(),
            to_number: self.to_number.clone().unwrap_or_default(),
        })
    }
}

/// Returns `~/.concierge/`
pub fn default_concierge_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".concierge")
}

/// Returns the default config file path: `~/.concierge/config.toml`
pub fn default_config_path() -> PathBuf {
    default_concierge_dir().join("config.toml")
}

impl ConciergeConfig {
    /// Load config from the default TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            ConciergeConfig::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// `CONCIERGE_*` variables cover local settings; the upstream credentials use the
    /// names their providers document (`HF_TOKEN`, `TWILIO_*`).
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("CONCIERGE_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("CONCIERGE_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("CONCIERGE_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("CONCIERGE_PORT") {
            self.server.port = val
                .parse()
                .with_context(|| format!("CONCIERGE_PORT is not a valid port: {val}"))?;
        }
        if let Ok(val) = std::env::var("HF_TOKEN") {
            self.inference.token = Some(val);
        }
        if let Ok(val) = std::env::var("TWILIO_ACCOUNT_SID") {
            self.notify.account_sid = Some(val);
        }
        if let Ok(val) = std::env::var("TWILIO_AUTH_TOKEN") {
            self.notify.auth_token = Some(val);
        }
        if let Ok(val) = std::env::var("TWILIO_FROM_NUMBER") {
            self.notify.from_number = Some(val);
        }
        if let Ok(val) = std::env::var("TWILIO_TO_NUMBER") {
            self.notify.to_number = Some(val);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.game.min_year <= self.game.max_year,
            "[game] min_year ({}) must not exceed max_year ({})",
            self.game.min_year,
            self.game.max_year
        );
        anyhow::ensure!(self.sessions.ttl_secs > 0, "[sessions] ttl_secs must be positive");
        Ok(())
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ConciergeConfig::default();
        assert_eq!(config.server.port, 7860);
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.retrieval.chat_context_results, 3);
        assert_eq!(config.retrieval.digest_results, 5);
        assert_eq!(config.sessions.ttl(), Duration::from_secs(86_400));
        assert_eq!((config.game.min_year, config.game.max_year), (1950, 1980));
        assert!(config.storage.db_path.ends_with("concierge.db"));
        config.validate().unwrap();
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[server]
port = 8080

[inference]
model = "microsoft/Phi-3-mini-4k-instruct"
chat_max_new_tokens = 200

[sessions]
ttl_secs = 60
"#;
        let config: ConciergeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.inference.model, "microsoft/Phi-3-mini-4k-instruct");
        assert_eq!(config.inference.chat_max_new_tokens, 200);
        assert_eq!(config.sessions.ttl_secs, 60);
        // defaults still apply for unset fields
        assert_eq!(config.inference.game_max_new_tokens, 200);
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn inverted_year_range_is_rejected() {
        let mut config = ConciergeConfig::default();
        config.game.min_year = 1990;
        config.game.max_year = 1980;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("min_year"));
    }

    #[test]
    fn missing_token_is_reported() {
        let config = ConciergeConfig::default();
        let err = config.inference.require_token().unwrap_err();
        assert!(err.to_string().contains("HF_TOKEN"));
    }

    #[test]
    fn sms_settings_list_missing_fields() {
        let notify = NotifyConfig {
            account_sid: Some("AC123".into()),
            auth_token: Some(String::new()),
            ..NotifyConfig::default()
        };
        let err = notify.settings().unwrap_err().to_string();
        assert!(err.contains("TWILIO_AUTH_TOKEN"));
        assert!(err.contains("TWILIO_FROM_NUMBER"));
        assert!(err.contains("TWILIO_TO_NUMBER"));
        assert!(!err.contains("TWILIO_ACCOUNT_SID"));
    }

    #[test]
    fn sms_settings_complete() {
        let notify = NotifyConfig {
            account_sid: Some("AC123".into()),
            auth_token: Some("secret".into()),
            from_number: Some("+15550001111".into()),
            to_number: Some("+15552223333".into()),
            ..NotifyConfig::default()
        };
        let settings = notify.settings().unwrap();
        assert_eq!(settings.account_sid, "AC123");
        assert_eq!(settings.to_number, "+15552223333");
        assert_eq!(settings.auth_token, "secret");
    }

    #[test]
    fn debug_output_hides_credentials() {
        let mut config = ConciergeConfig::default();
        config.inference.token = Some("hf_secret".into());
        config.notify = NotifyConfig {
            account_sid: Some("AC123".into()),
            auth_token: Some("tw_secret".into()),
            from_number: Some("+15550001111".into()),
            to_number: Some("+15552223333".into()),
            ..NotifyConfig::default()
        };
        let settings = config.notify.settings().unwrap();

        for rendered in [format!("{config:?}"), format!("{settings:?}")] {
            assert!(!rendered.contains("hf_secret"), "{rendered}");
            assert!(!rendered.contains("tw_secret"), "{rendered}");
            assert!(rendered.contains("<redacted>"));
            assert!(rendered.contains("AC123"));
        }
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = ConciergeConfig::default();
        std::env::set_var("CONCIERGE_DB", "/tmp/override.db");
        std::env::set_var("CONCIERGE_PORT", "9000");
        std::env::set_var("HF_TOKEN", "hf_test");

        config.apply_env_overrides().unwrap();

        assert_eq!(config.storage.db_path, "/tmp/override.db");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.inference.token.as_deref(), Some("hf_test"));

        // Clean up
        std::env::remove_var("CONCIERGE_DB");
        std::env::remove_var("CONCIERGE_PORT");
        std::env::remove_var("HF_TOKEN");
    }
}
