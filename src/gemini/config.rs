//! Configuration for the Gemini model client

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Gemini client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    /// API key (read from env GEMINI_API_KEY if not set)
    #[serde(default)]
    pub api_key: Option<SecretString>,

    /// Generative Language API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model name, with or without the `models/` prefix
    #[serde(default = "default_model")]
    pub model: String,

    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Fixed generation parameters bound to every conversation
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// Sampling parameters sent as `generationConfig`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase", deserialize = "snake_case"))]
pub struct GenerationConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_top_k")]
    pub top_k: u32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default = "default_response_mime_type")]
    pub response_mime_type: String,
}

fn default_base_url() -> String { "https://generativelanguage.googleapis.com".to_string() }
fn default_model() -> String { "gemini-1.5-flash".to_string() }
fn default_timeout_ms() -> u64 { 120_000 }
fn default_temperature() -> f32 { 1.0 }
fn default_top_p() -> f32 { 0.95 }
fn default_top_k() -> u32 { 64 }
fn default_max_output_tokens() -> u32 { 8192 }
fn default_response_mime_type() -> String { "text/plain".to_string() }

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            max_output_tokens: default_max_output_tokens(),
            response_mime_type: default_response_mime_type(),
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            timeout_ms: default_timeout_ms(),
            generation: GenerationConfig::default(),
        }
    }
}

impl GeminiConfig {
    /// Load overrides from environment variables
    pub fn from_env(mut self) -> Self {
        if let Ok(val) = std::env::var("GEMINI_API_KEY") {
            self.api_key = Some(SecretString::new(val));
        }

        if let Ok(val) = std::env::var("GEMINI_MODEL") {
            self.model = val;
        }

        if let Ok(val) = std::env::var("GEMINI_BASE_URL") {
            self.base_url = val;
        }

        if let Ok(val) = std::env::var("GEMINI_TIMEOUT_MS") {
            if let Ok(timeout) = val.parse() {
                self.timeout_ms = timeout;
            }
        }

        self
    }

    /// Set the API key explicitly
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::new(api_key.into()));
        self
    }

    /// True when a non-empty API key is configured
    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_ref()
            .map_or(false, |key| !key.expose_secret().trim().is_empty())
    }

    /// Model name without the `models/` prefix
    pub fn model_name(&self) -> &str {
        self.model.trim().trim_start_matches("models/")
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GeminiConfig::default();
        assert!(!config.has_api_key());
        assert_eq!(config.model, "gemini-1.5-flash");
        assert_eq!(config.timeout(), Duration::from_secs(120));
        assert_eq!(config.generation.top_k, 64);
        assert_eq!(config.generation.max_output_tokens, 8192);
        assert_eq!(config.generation.response_mime_type, "text/plain");
    }

    #[test]
    fn test_blank_api_key_is_missing() {
        let config = GeminiConfig::default().with_api_key("   ");
        assert!(!config.has_api_key());

        let config = GeminiConfig::default().with_api_key("key-123");
        assert!(config.has_api_key());
    }

    #[test]
    fn test_model_and_url_normalization() {
        let config = GeminiConfig {
            model: "models/gemini-1.5-pro".to_string(),
            base_url: "http://localhost:9000/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.model_name(), "gemini-1.5-pro");
        assert_eq!(config.base_url(), "http://localhost:9000");
    }

    #[test]
    fn test_generation_config_wire_format() {
        let value = serde_json::to_value(GenerationConfig::default()).unwrap();
        assert_eq!(value["topP"], 0.95_f32 as f64);
        assert_eq!(value["topK"], 64);
        assert_eq!(value["maxOutputTokens"], 8192);
        assert_eq!(value["responseMimeType"], "text/plain");
    }

    #[test]
    fn test_generation_config_reads_snake_case() {
        let config: GenerationConfig =
            serde_json::from_str(r#"{"temperature": 0.2, "top_k": 10}"#).unwrap();
        assert_eq!(config.temperature, 0.2);
        assert_eq!(config.top_k, 10);
        assert_eq!(config.top_p, 0.95);
    }
}
