//! Configuration management for Zero services.
//!
//! The scoring service reads the shared configuration file at
//! `~/.codecoder/config.json`, with credentials merged in from
//! `~/.codecoder/secrets.json` by the modular loader.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (ZERO_* prefix, provider API keys)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `ZERO_LLM_PROVIDER` → llm.provider
//! - `ZERO_LLM_API_URL` → llm.api_url
//! - `ZERO_LLM_MODEL` → llm.model
//! - `ZERO_LOG_LEVEL` → observability.log_level
//! - `ZERO_SCORING_DB` → storage.db_path
//!
//! ## LLM API Keys (→ llm.api_key, only when unset)
//! - `GOOGLE_API_KEY` / `GEMINI_API_KEY` for `google`
//! - `DEEPSEEK_API_KEY` for `deepseek`
//! - `OPENAI_API_KEY` for `openai`
//! - `DASHSCOPE_API_KEY` for `qwen`

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new()
        .map_or_else(
            || PathBuf::from(".codecoder"),
            |dirs| dirs.home_dir().join(".codecoder"),
        )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// LLM Configuration
// ============================================================================

/// LLM provider configuration.
///
/// Passed explicitly to the LLM client; nothing here is read from ambient
/// state after loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider discriminator ("google", "deepseek", "qwen", "openai", "ollama")
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// Full endpoint URL for completion requests
    #[serde(default = "default_llm_api_url")]
    pub api_url: String,

    /// API key (query string for google, bearer token otherwise)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model identifier sent with OpenAI-compatible requests
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Per-attempt request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Number of retries after the first attempt
    #[serde(default = "default_llm_retries")]
    pub max_retries: u32,

    /// Initial backoff between retries in milliseconds (doubled per attempt)
    #[serde(default = "default_llm_backoff_ms")]
    pub backoff_ms: u64,

    /// Upper bound for a single backoff sleep in milliseconds
    #[serde(default = "default_llm_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Sampling temperature
    #[serde(default = "default_llm_temperature")]
    pub temperature: f64,

    /// Maximum output tokens
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            api_url: default_llm_api_url(),
            api_key: None,
            model: default_llm_model(),
            timeout_secs: default_llm_timeout(),
            max_retries: default_llm_retries(),
            backoff_ms: default_llm_backoff_ms(),
            max_backoff_ms: default_llm_max_backoff_ms(),
            temperature: default_llm_temperature(),
            max_tokens: default_llm_max_tokens(),
        }
    }
}

impl LlmConfig {
    /// Environment variables holding the API key for this provider, in lookup order.
    pub fn api_key_env_vars(&self) -> &'static [&'static str] {
        match self.provider.to_lowercase().as_str() {
            "google" | "gemini" => &["GOOGLE_API_KEY", "GEMINI_API_KEY"],
            "deepseek" => &["DEEPSEEK_API_KEY"],
            "openai" => &["OPENAI_API_KEY"],
            "qwen" => &["DASHSCOPE_API_KEY"],
            _ => &[],
        }
    }
}

fn default_llm_provider() -> String {
    "deepseek".into()
}

fn default_llm_api_url() -> String {
    "https://api.deepseek.com/v1/chat/completions".into()
}

fn default_llm_model() -> String {
    "deepseek-chat".into()
}

fn default_llm_timeout() -> u64 {
    30
}

fn default_llm_retries() -> u32 {
    2
}

fn default_llm_backoff_ms() -> u64 {
    1000
}

fn default_llm_max_backoff_ms() -> u64 {
    8000
}

fn default_llm_temperature() -> f64 {
    0.7
}

fn default_llm_max_tokens() -> u32 {
    2000
}

// ============================================================================
// Scoring Configuration
// ============================================================================

/// Response parsing and score reconciliation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Maximum difference between structured and mentioned scores
    /// (on the 0-1 scale) before a reconciliation is flagged
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Object keys holding the structured score, first present wins
    #[serde(default = "default_score_fields")]
    pub score_fields: Vec<String>,

    /// Object keys holding the rationale text, first present wins
    #[serde(default = "default_rationale_fields")]
    pub rationale_fields: Vec<String>,

    /// Remove `<think>` reasoning blocks before parsing
    #[serde(default = "default_true")]
    pub strip_reasoning: bool,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            score_fields: default_score_fields(),
            rationale_fields: default_rationale_fields(),
            strip_reasoning: true,
        }
    }
}

fn default_tolerance() -> f64 {
    0.01
}

fn default_score_fields() -> Vec<String> {
    vec!["score".into(), "sentiment_score".into()]
}

fn default_rationale_fields() -> Vec<String> {
    vec![
        "value".into(),
        "rationale".into(),
        "analysis".into(),
        "analysis_summary".into(),
    ]
}

// ============================================================================
// Storage Configuration
// ============================================================================

/// Result store configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// SQLite database path (default: ~/.codecoder/scoring.db)
    #[serde(default)]
    pub db_path: Option<String>,
}

impl StorageConfig {
    /// Resolve the database path, falling back to the config directory.
    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| config_dir().join("scoring.db"))
    }
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    /// Aliases: "level" for backward compatibility with existing config files
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    /// Aliases: "format" for backward compatibility with existing config files
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets to exclude from logging.
    ///
    /// These modules will be set to `warn` level to reduce noise.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure for the scoring service.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// JSON Schema reference
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// LLM provider configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Response parsing configuration
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Result storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default directory.
    ///
    /// Missing files fall back to defaults; `secrets.json` is merged in.
    pub fn load() -> Result<Self> {
        Self::load_from_dir(&config_dir())
    }

    /// Load configuration from a specific directory.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let value = crate::config_loader::load_modular_config(Some(dir.to_path_buf()))?;
        if value.as_object().is_some_and(|obj| obj.is_empty()) {
            tracing::info!("Config file not found, using defaults");
        }

        serde_json::from_value(value)
            .with_context(|| format!("Failed to parse config from {}", dir.display()))
    }

    /// Load configuration from a specific file (no modular merging).
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(provider) = std::env::var("ZERO_LLM_PROVIDER") {
            self.llm.provider = provider;
        }
        if let Ok(url) = std::env::var("ZERO_LLM_API_URL") {
            self.llm.api_url = url;
        }
        if let Ok(model) = std::env::var("ZERO_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Ok(level) = std::env::var("ZERO_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Ok(path) = std::env::var("ZERO_SCORING_DB") {
            self.storage.db_path = Some(path);
        }

        self.apply_api_key_fallback();
    }

    /// Fill `llm.api_key` from the provider's environment variable when unset.
    fn apply_api_key_fallback(&mut self) {
        if self.llm.api_key.is_some() {
            return;
        }

        self.llm.api_key = self
            .llm
            .api_key_env_vars()
            .iter()
            .find_map(|name| std::env::var(name).ok())
            .filter(|key| !key.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.llm.provider, "deepseek");
        assert_eq!(config.llm.timeout_secs, 30);
        assert_eq!(config.llm.max_retries, 2);
        assert!((config.scoring.tolerance - 0.01).abs() < f64::EPSILON);
        assert_eq!(config.scoring.score_fields[0], "score");
        assert_eq!(config.scoring.rationale_fields[0], "value");
        assert!(config.scoring.strip_reasoning);
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{"llm": {"provider": "google", "api_url": "https://example.test/gen"}}"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.llm.provider, "google");
        assert_eq!(config.llm.api_url, "https://example.test/gen");
        assert_eq!(config.llm.max_tokens, 2000);
        assert_eq!(config.scoring.rationale_fields.len(), 4);
    }

    #[test]
    fn test_observability_aliases() {
        let json = r#"{"observability": {"level": "debug", "format": "json"}}"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.observability.log_format, "json");
    }

    #[test]
    fn test_api_key_env_vars() {
        let mut llm = LlmConfig::default();
        assert_eq!(llm.api_key_env_vars(), &["DEEPSEEK_API_KEY"]);

        llm.provider = "Google".into();
        assert_eq!(llm.api_key_env_vars(), &["GOOGLE_API_KEY", "GEMINI_API_KEY"]);

        llm.provider = "ollama".into();
        assert!(llm.api_key_env_vars().is_empty());
    }

    #[test]
    fn test_load_from_dir_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_dir(dir.path()).unwrap();
        assert_eq!(config.llm.model, "deepseek-chat");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"scoring": {"tolerance": 0.05}}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert!((config.scoring.tolerance - 0.05).abs() < f64::EPSILON);
    }

    #[test]
    fn test_resolved_db_path() {
        let storage = StorageConfig {
            db_path: Some("/tmp/scores.db".into()),
        };
        assert_eq!(storage.resolved_db_path(), PathBuf::from("/tmp/scores.db"));

        let storage = StorageConfig::default();
        assert!(storage.resolved_db_path().ends_with("scoring.db"));
    }
}
