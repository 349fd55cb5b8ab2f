//! OpenAI-compatible provider
//!
//! Works with any API that implements the OpenAI chat completions format:
//! - OpenAI (api.openai.com)
//! - Groq (api.groq.com)
//! - Hugging Face inference router (router.huggingface.co)
//! - Local servers such as vLLM or LM Studio, via `LLM_BASE_URL`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::conversation::Message;

use super::{ChatProvider, ProviderError, EMPTY_REPLY};

/// OpenAI-compatible chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl From<&Message> for ChatMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role.as_str().to_string(),
            content: msg.content.clone(),
        }
    }
}

/// Chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible provider configuration
#[derive(Debug, Clone)]
pub struct OpenAICompatConfig {
    /// Provider name used in logs
    pub name: String,
    /// Base URL for the API (e.g., https://api.openai.com/v1)
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl OpenAICompatConfig {
    fn preset(name: &str, base_url: &str, api_key: String, model: &str) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.to_string(),
            api_key,
            model: model.to_string(),
            temperature: 0.7,
            max_tokens: 300,
            timeout_secs: 30,
        }
    }

    /// Create config for OpenAI
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::preset("openai", "https://api.openai.com/v1", api_key.into(), "gpt-4o-mini")
    }

    /// Create config for Groq
    pub fn groq(api_key: impl Into<String>) -> Self {
        Self::preset(
            "groq",
            "https://api.groq.com/openai/v1",
            api_key.into(),
            "llama-3.3-70b-versatile",
        )
    }

    /// Create config for the Hugging Face inference router
    pub fn huggingface(token: impl Into<String>) -> Self {
        Self::preset(
            "huggingface",
            "https://router.huggingface.co/v1",
            token.into(),
            "meta-llama/Llama-3.1-8B-Instruct",
        )
    }
}

/// OpenAI-compatible API provider
pub struct OpenAICompatProvider {
    config: OpenAICompatConfig,
    client: Client,
}

impl OpenAICompatProvider {
    /// Create a new provider with the given configuration
    pub fn new(config: OpenAICompatConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn build_request(&self, messages: &[Message]) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: messages.iter().map(ChatMessage::from).collect(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        }
    }
}

/// Turn a raw HTTP result into reply text.
///
/// Non-success statuses carry the upstream payload verbatim.
fn parse_completion(status: StatusCode, body: &str) -> Result<String, ProviderError> {
    if !status.is_success() {
        return Err(ProviderError::Upstream {
            status: status.as_u16(),
            payload: body.to_string(),
        });
    }

    let completion: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

    let content = completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty());

    Ok(content.unwrap_or_else(|| EMPTY_REPLY.to_string()))
}

#[async_trait]
impl ChatProvider for OpenAICompatProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let request = self.build_request(messages);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        parse_completion(status, &body)
    }
}
