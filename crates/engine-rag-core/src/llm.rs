//! Reasoning (text completion) collaborator trait.

use anyhow::Result;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single prompt message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A single-turn text completion backend.
///
/// Each call is independent; implementations keep no conversation state.
#[async_trait]
pub trait Completion: Send + Sync {
    /// Returns the model identifier.
    fn model_name(&self) -> &str;

    /// Complete the given prompt messages and return the generated text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}
