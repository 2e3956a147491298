//! Completion provider trait: `complete(prompt) → text`.
//!
//! A prompt is an ordered list of [`Message`]s. Concrete chat backends
//! (OpenAI, Ollama) live in the `clarify-harness` app crate.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::{ChatMessage, Sender};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A fully bound prompt message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

impl From<&ChatMessage> for Message {
    fn from(m: &ChatMessage) -> Self {
        match m.sender {
            Sender::Human => Message::user(m.content.clone()),
            Sender::Agent => Message::assistant(m.content.clone()),
        }
    }
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-3.5-turbo"`).
    fn model_name(&self) -> &str;

    /// Run the prompt and return the model's text reply.
    async fn complete(&self, messages: &[Message]) -> Result<String>;
}
