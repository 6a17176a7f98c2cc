//! Conversation with the chat-completion service

mod session;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use session::ConversationSession;

/// Message role in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt
    System,
    /// Spoken user input
    User,
    /// Model reply
    Assistant,
}

/// One entry in the conversation window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Entry role
    pub role: Role,
    /// Entry text
    pub content: String,
}

impl ChatMessage {
    /// Build a system entry
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Build a user entry
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Build an assistant entry
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Everything that can go wrong during one exchange
#[derive(Debug, Error)]
pub enum ChatError {
    /// Request exceeded its timeout
    #[error("chat request timed out")]
    Timeout,

    /// Transport-level failure
    #[error("chat network failure: {0}")]
    Network(String),

    /// Service answered with a non-200 status
    #[error("chat service returned status {code}: {detail}")]
    Status { code: u16, detail: String },

    /// Response body was missing the expected fields
    #[error("chat response was malformed")]
    Malformed,
}

impl ChatError {
    /// The fixed, human-readable message spoken in place of a reply
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Timeout => {
                "The assistant took too long to reply. Please say that again.".to_string()
            }
            Self::Network(_) => {
                "I'm having network trouble reaching the assistant.".to_string()
            }
            Self::Status { code, detail } => {
                format!("The chat service returned an error (status {code}): {detail}")
            }
            Self::Malformed => {
                "The assistant's reply came back in a shape I couldn't read.".to_string()
            }
        }
    }
}
