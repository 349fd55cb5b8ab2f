//! Relay settings loaded from a TOML file
//!
//! Every table is optional; missing values fall back to the defaults below.
//! Secrets (API keys, webhook verify token) never live here, they come from
//! the environment only.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root settings file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub llm: LlmSettings,

    #[serde(default)]
    pub memory: MemorySettings,

    #[serde(default)]
    pub persona: PersonaSettings,

    #[serde(default)]
    pub webhook: WebhookSettings,
}

impl Settings {
    /// Load settings from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load settings from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(content)?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// "production" hides error details from API responses
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3010
}

fn default_environment() -> String {
    "development".to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
        }
    }
}

/// LLM provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// Provider name: "groq", "openai", "huggingface", "gradio"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model to use; the provider's default when absent
    #[serde(default)]
    pub model: Option<String>,

    /// Custom API endpoint
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Outbound request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "groq".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    300
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Conversation store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySettings {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_snapshot_file")]
    pub snapshot_file: String,

    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,

    /// Turns kept per session, 0 keeps everything
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Prior turns sent to the provider with each question
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_snapshot_file() -> String {
    "sessions.json".to_string()
}

fn default_flush_interval_secs() -> u64 {
    60
}

fn default_max_turns() -> usize {
    200
}

fn default_history_window() -> usize {
    6
}

impl MemorySettings {
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(&self.snapshot_file)
    }
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            snapshot_file: default_snapshot_file(),
            flush_interval_secs: default_flush_interval_secs(),
            max_turns: default_max_turns(),
            history_window: default_history_window(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonaSettings {
    /// TOML profile replacing the built-in one
    #[serde(default)]
    pub profile_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookSettings {
    /// Sender used when a webhook payload carries none
    #[serde(default)]
    pub default_sender: Option<String>,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}
