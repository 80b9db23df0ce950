//! Chat message value objects sent to hosted models.
//!
//! A pipeline step renders its prompt template and wraps it in a single user
//! message; the provider answers with an assistant message. Messages serialize
//! straight into the `{"role", "content"}` shape both wire formats share.

use serde::Serialize;

/// The role of a message sender in a chat exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The rendered prompt
    User,
    /// The model reply
    Assistant,
}

/// A single message in a chat exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}
