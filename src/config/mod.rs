//! Application configuration

pub mod language;
pub mod prompts;
pub mod settings;

use std::env;
use std::path::PathBuf;

pub use language::Language;
pub use prompts::{PersonaProfile, PromptBuilder};
pub use settings::{ConfigError, LlmSettings, MemorySettings, Settings};

/// Runtime configuration: settings file plus environment overrides
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub production: bool,
    pub llm: LlmSettings,
    pub memory: MemorySettings,
    pub persona_profile: Option<PathBuf>,
    pub default_sender: Option<String>,
    pub groq_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub hf_token: Option<String>,
    pub gradio_space_url: Option<String>,
    pub verify_token: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let settings = match env::var("RELAY_CONFIG") {
            Ok(path) => Settings::from_file(PathBuf::from(path).as_path())?,
            Err(_) => Settings::default(),
        };

        Ok(Self::from_settings(settings, |key| env::var(key).ok())?)
    }

    /// Build from settings, letting `lookup` override individual values
    pub fn from_settings(
        settings: Settings,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let Settings {
            server,
            mut llm,
            mut memory,
            persona,
            webhook,
        } = settings;

        if let Some(provider) = lookup("LLM_PROVIDER") {
            llm.provider = provider;
        }
        if let Some(model) = lookup("LLM_MODEL") {
            llm.model = Some(model);
        }
        if let Some(url) = lookup("LLM_BASE_URL") {
            llm.base_url = Some(url);
        }
        if let Some(t) = lookup("LLM_TEMPERATURE").and_then(|v| v.parse().ok()) {
            llm.temperature = t;
        }
        if let Some(n) = lookup("LLM_MAX_TOKENS").and_then(|v| v.parse().ok()) {
            llm.max_tokens = n;
        }
        if let Some(secs) = lookup("LLM_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            llm.timeout_secs = secs;
        }

        if let Some(dir) = lookup("RELAY_DATA_DIR") {
            memory.data_dir = PathBuf::from(dir);
        }
        if let Some(secs) = lookup("FLUSH_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
            memory.flush_interval_secs = secs;
        }
        if let Some(n) = lookup("MAX_TURNS_PER_SESSION").and_then(|v| v.parse().ok()) {
            memory.max_turns = n;
        }
        if let Some(n) = lookup("HISTORY_WINDOW").and_then(|v| v.parse().ok()) {
            memory.history_window = n;
        }

        if memory.flush_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "flush interval must be at least one second".into(),
            ));
        }
        if llm.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "LLM timeout must be at least one second".into(),
            ));
        }

        let environment = lookup("APP_ENV")
            .or_else(|| lookup("NODE_ENV"))
            .unwrap_or(server.environment);

        Ok(Self {
            host: lookup("HOST").unwrap_or(server.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(server.port),
            production: environment.eq_ignore_ascii_case("production"),
            llm,
            memory,
            persona_profile: lookup("PERSONA_PROFILE")
                .map(PathBuf::from)
                .or(persona.profile_path),
            default_sender: lookup("WEBHOOK_DEFAULT_SENDER").or(webhook.default_sender),
            groq_api_key: lookup("GROQ_API_KEY").or_else(|| lookup("GRK_API_KY")),
            openai_api_key: lookup("OPENAI_API_KEY"),
            hf_token: lookup("HF_TOKEN"),
            gradio_space_url: lookup("GRADIO_SPACE_URL"),
            verify_token: lookup("WHATSAPP_VERIFY_TOKEN"),
        })
    }
}
