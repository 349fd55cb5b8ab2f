//! AI provider integrations
//!
//! Every backend sits behind [`ChatProvider`]; the concrete one is picked
//! from configuration at startup.

mod gradio;
mod openai_compat;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{Config, LlmSettings};
use crate::conversation::Message;

pub use gradio::{GradioConfig, GradioProvider};
pub use openai_compat::{OpenAICompatConfig, OpenAICompatProvider};

/// Returned when the upstream call succeeded but produced no text
pub const EMPTY_REPLY: &str = "Sorry, I couldn't respond right now.";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Missing credential: {0} is not set")]
    MissingCredential(&'static str),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request failed: {0}")]
    RequestFailed(reqwest::Error),

    #[error("Request timed out")]
    Timeout,

    #[error("Upstream returned HTTP {status}: {payload}")]
    Upstream { status: u16, payload: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::RequestFailed(err)
        }
    }
}

/// Submit a conversation, get the assistant's text back
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &str;

    async fn complete(&self, messages: &[Message]) -> Result<String, ProviderError>;
}

/// Build the provider named in `config.llm.provider`.
///
/// Fails fast when the provider's credential is missing.
pub fn from_config(config: &Config) -> Result<Arc<dyn ChatProvider>, ProviderError> {
    let llm = &config.llm;

    match llm.provider.to_lowercase().as_str() {
        "groq" => {
            let key = config
                .groq_api_key
                .clone()
                .ok_or(ProviderError::MissingCredential("GROQ_API_KEY"))?;
            let provider = OpenAICompatProvider::new(apply_settings(OpenAICompatConfig::groq(key), llm))?;
            Ok(Arc::new(provider))
        }
        "openai" => {
            let key = config
                .openai_api_key
                .clone()
                .ok_or(ProviderError::MissingCredential("OPENAI_API_KEY"))?;
            let provider =
                OpenAICompatProvider::new(apply_settings(OpenAICompatConfig::openai(key), llm))?;
            Ok(Arc::new(provider))
        }
        "huggingface" | "hf" => {
            let token = config
                .hf_token
                .clone()
                .ok_or(ProviderError::MissingCredential("HF_TOKEN"))?;
            let provider = OpenAICompatProvider::new(apply_settings(
                OpenAICompatConfig::huggingface(token),
                llm,
            ))?;
            Ok(Arc::new(provider))
        }
        "gradio" => {
            let space_url = config
                .gradio_space_url
                .clone()
                .or_else(|| llm.base_url.clone())
                .ok_or_else(|| ProviderError::NotConfigured("GRADIO_SPACE_URL".into()))?;
            let provider = GradioProvider::new(GradioConfig {
                space_url,
                token: config.hf_token.clone(),
                timeout_secs: llm.timeout_secs,
            })?;
            Ok(Arc::new(provider))
        }
        _ => Err(ProviderError::UnknownProvider(llm.provider.clone())),
    }
}

fn apply_settings(mut preset: OpenAICompatConfig, llm: &LlmSettings) -> OpenAICompatConfig {
    if let Some(ref url) = llm.base_url {
        preset.base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(ref model) = llm.model {
        preset.model = model.clone();
    }
    preset.temperature = llm.temperature;
    preset.max_tokens = llm.max_tokens;
    preset.timeout_secs = llm.timeout_secs;
    preset
}
