//! Hugging Face Space provider
//!
//! Calls a Gradio app's `/run/predict` endpoint. The Space carries its own
//! persona, so only the latest user message is forwarded.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::conversation::{Message, Role};

use super::{ChatProvider, ProviderError, EMPTY_REPLY};

#[derive(Debug, Clone)]
pub struct GradioConfig {
    /// Space root, e.g. https://user-chatbot.hf.space
    pub space_url: String,
    /// Only needed for private Spaces
    pub token: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    data: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    data: Vec<Value>,
}

pub struct GradioProvider {
    config: GradioConfig,
    client: Client,
}

impl GradioProvider {
    pub fn new(config: GradioConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn predict_url(&self) -> String {
        format!("{}/run/predict", self.config.space_url.trim_end_matches('/'))
    }

    fn predict_request(&self, message: &str) -> RequestBuilder {
        let request = self
            .client
            .post(self.predict_url())
            .json(&PredictRequest { data: [message] });

        match self.config.token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn last_user_message(messages: &[Message]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
}

fn parse_prediction(status: StatusCode, body: &str) -> Result<String, ProviderError> {
    if !status.is_success() {
        return Err(ProviderError::Upstream {
            status: status.as_u16(),
            payload: body.to_string(),
        });
    }

    let prediction: PredictResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse prediction: {}", e)))?;

    let text = match prediction.data.into_iter().next() {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    let text = text.trim();
    if text.is_empty() {
        Ok(EMPTY_REPLY.to_string())
    } else {
        Ok(text.to_string())
    }
}

#[async_trait]
impl ChatProvider for GradioProvider {
    fn name(&self) -> &str {
        "gradio"
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, ProviderError> {
        let message = last_user_message(messages)
            .ok_or_else(|| ProviderError::InvalidResponse("No user message to send".into()))?;

        let response = self.predict_request(message).send().await?;

        let status = response.status();
        let body = response.text().await?;

        parse_prediction(status, &body)
    }
}
