//! Core request handling
//!
//! The chat engine and the conversation store it records into.

mod chat;
mod memory;

pub use chat::{ChatEngine, ChatError, ChatRequest, FALLBACK_REPLY};
pub use memory::ConversationStore;
