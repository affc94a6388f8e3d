//! Service configuration
//!
//! Layered: serde defaults, then an optional TOML file, then `RELAY__*`
//! environment variables, then the `GEMINI_*` overrides.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::gemini::GeminiConfig;
use crate::session::SessionIdStrategy;

/// Config file looked up when `RELAY_CONFIG` is unset (extension optional)
pub const DEFAULT_CONFIG_PATH: &str = "config/relay";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("GEMINI_API_KEY environment variable is required")]
    MissingApiKey,

    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub gemini: GeminiConfig,

    #[serde(default)]
    pub images: ImageConfig,

    #[serde(default)]
    pub sessions: SessionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Image acquisition settings
#[derive(Debug, Clone, Deserialize)]
pub struct ImageConfig {
    /// Directory for transient image files (system temp dir when unset)
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    /// Largest accepted image in bytes
    #[serde(default = "default_max_image_bytes")]
    pub max_bytes: usize,

    /// Timeout for fetching `image_url` in milliseconds
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
}

/// Session store settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub id_strategy: SessionIdStrategy,
}

/// Logging settings
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 5000 }
fn default_max_body_bytes() -> usize { 25 * 1024 * 1024 }
fn default_max_image_bytes() -> usize { 20 * 1024 * 1024 }
fn default_fetch_timeout_ms() -> u64 { 30_000 }
fn default_log_level() -> String { "info".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            max_bytes: default_max_image_bytes(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
        }
    }
}

impl ImageConfig {
    /// Get fetch timeout as Duration
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Load from `RELAY_CONFIG` (or the default path), the environment,
    /// and validate
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("RELAY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.gemini = config.gemini.from_env();
        config.validate()?;
        Ok(config)
    }

    /// Load from an optional file plus `RELAY__SECTION__KEY` variables
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(path).required(false))
            .add_source(
                ::config::Environment::with_prefix("RELAY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Parse from a TOML string, without environment overrides
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from_str(contents, ::config::FileFormat::Toml))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Reject configurations the service cannot start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.gemini.has_api_key() {
            return Err(ConfigError::MissingApiKey);
        }
        if self.gemini.model_name().is_empty() {
            return Err(ConfigError::Invalid("gemini.model cannot be empty".to_string()));
        }
        if self.images.max_bytes == 0 {
            return Err(ConfigError::Invalid("images.max_bytes must be positive".to_string()));
        }
        if self.images.max_bytes > self.server.max_body_bytes {
            return Err(ConfigError::Invalid(format!(
                "images.max_bytes ({}) exceeds server.max_body_bytes ({})",
                self.images.max_bytes, self.server.max_body_bytes
            )));
        }
        self.socket_addr()?;
        Ok(())
    }

    /// Listener address
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| {
                ConfigError::Invalid(format!(
                    "bad listen address {}:{}: {}",
                    self.server.host, self.server.port, e
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.images.max_bytes, 20 * 1024 * 1024);
        assert_eq!(config.images.fetch_timeout(), Duration::from_secs(30));
        assert_eq!(config.sessions.id_strategy, SessionIdStrategy::Random);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_missing_api_key_fails_validation() {
        let config = Config::default();
        assert!(matches!(config.validate(), Err(ConfigError::MissingApiKey)));
    }

    #[test]
    fn test_valid_with_api_key() {
        let mut config = Config::default();
        config.gemini = config.gemini.with_api_key("test-key");
        assert!(config.validate().is_ok());
        assert_eq!(config.socket_addr().unwrap().port(), 5000);
    }

    #[test]
    fn test_from_toml_sections() {
        let config = Config::from_toml(
            r#"
            [server]
            port = 8081

            [gemini]
            model = "gemini-1.5-pro"
            timeout_ms = 5000

            [gemini.generation]
            temperature = 0.4

            [images]
            max_bytes = 1024

            [sessions]
            id_strategy = "sequential"

            [logging]
            json = true
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.gemini.model, "gemini-1.5-pro");
        assert_eq!(config.gemini.timeout(), Duration::from_secs(5));
        assert_eq!(config.gemini.generation.temperature, 0.4);
        assert_eq!(config.gemini.generation.top_k, 64);
        assert_eq!(config.images.max_bytes, 1024);
        assert_eq!(config.sessions.id_strategy, SessionIdStrategy::Sequential);
        assert!(config.logging.json);
    }

    #[test]
    fn test_image_limit_must_fit_body_limit() {
        let mut config = Config::default();
        config.gemini = config.gemini.with_api_key("test-key");
        config.server.max_body_bytes = 1024;

        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_bad_host_rejected() {
        let mut config = Config::default();
        config.gemini = config.gemini.with_api_key("test-key");
        config.server.host = "not a host".to_string();

        assert!(matches!(config.socket_addr(), Err(ConfigError::Invalid(_))));
    }
}
