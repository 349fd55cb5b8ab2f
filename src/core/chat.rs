//! Chat engine
//!
//! The ChatEngine handles one inbound message end to end:
//! 1. Takes the session's lock so exchanges in one session never interleave
//! 2. Renders the persona prompt in the resolved language
//! 3. Sends it, with recent session history, to the configured provider
//! 4. Applies the persona rules to the reply
//! 5. Records both turns in the conversation store

use std::sync::Arc;

use crate::config::{Language, PromptBuilder};
use crate::conversation::Message;
use crate::providers::{ChatProvider, ProviderError};

use super::memory::ConversationStore;

/// Sent instead of an error on the plain chat path
pub const FALLBACK_REPLY: &str = "Sorry, I'm having an issue right now. Please try again later.";

/// One inbound message
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
    pub language: Language,
}

/// Errors from the chat engine
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("No message provided")]
    EmptyMessage,

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// The core chat engine
pub struct ChatEngine {
    provider: Arc<dyn ChatProvider>,
    store: Arc<ConversationStore>,
    prompts: PromptBuilder,
    history_window: usize,
}

impl ChatEngine {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        store: Arc<ConversationStore>,
        prompts: PromptBuilder,
    ) -> Self {
        Self {
            provider,
            store,
            prompts,
            history_window: 0,
        }
    }

    /// Number of prior turns sent along with each question
    pub fn with_history_window(mut self, turns: usize) -> Self {
        self.history_window = turns;
        self
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    /// Generate a reply, propagating provider failures.
    ///
    /// The user turn is recorded even when the provider fails; the
    /// assistant turn only when a reply was produced.
    pub async fn respond(&self, request: &ChatRequest) -> Result<String, ChatError> {
        if request.message.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let _session = self.store.lock_session(&request.session_id).await;

        let history = self
            .store
            .history(&request.session_id, self.history_window)
            .await;
        let prompt = self
            .prompts
            .build(&request.message, request.language, &history);
        tracing::debug!(
            session = %request.session_id,
            language = request.language.code(),
            about_person = prompt.about_person,
            history = history.len(),
            "Rendered prompt"
        );

        self.store
            .append(&request.session_id, Message::user(request.message.as_str()))
            .await;

        let messages = prompt.clone().into_messages(history);
        let raw = match self.provider.complete(&messages).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(
                    provider = self.provider.name(),
                    session = %request.session_id,
                    error = %e,
                    "Provider call failed"
                );
                return Err(e.into());
            }
        };

        let reply = self.prompts.guard_reply(&raw, &prompt);
        self.store
            .append(&request.session_id, Message::assistant(reply.as_str()))
            .await;

        Ok(reply)
    }

    /// Generate a reply for the chat endpoint: provider failures become
    /// [`FALLBACK_REPLY`] instead of an error.
    pub async fn chat(&self, request: &ChatRequest) -> Result<String, ChatError> {
        match self.respond(request).await {
            Err(ChatError::Provider(_)) => Ok(FALLBACK_REPLY.to_string()),
            other => other,
        }
    }
}
