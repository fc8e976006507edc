//! LLM Provider Abstraction Layer
//!
//! This module provides a common interface for interacting with the two
//! supported text-generation backends (OpenAI and Ollama). The LlmProvider
//! trait defines the contract that both providers implement, enabling the
//! generation gateway to dispatch by provider transparently.
//!
//! Every generation call accepts a `CancellationToken`; a triggered token
//! makes the call fail with [`LlmError::Cancelled`], which callers treat as
//! benign (never logged as an error, never retried).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio_util::sync::CancellationToken;

pub mod gateway;
pub mod ollama;
pub mod openai;

pub use gateway::{Gateway, GenerationConfig};
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LlmError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// The request was superseded by a newer one. Always benign.
    #[error("Request was cancelled")]
    Cancelled,

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl LlmError {
    /// True when the failure is a superseded-request cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Text-generation backend selector
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenAI-compatible cloud API
    OpenAi,

    /// Local Ollama server
    Ollama,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::OpenAi => write!(f, "openai"),
            Provider::Ollama => write!(f, "ollama"),
        }
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "openai" => Ok(Provider::OpenAi),
            "ollama" => Ok(Provider::Ollama),
            other => Err(format!("unknown provider: {}", other)),
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instruction
    System,

    /// Human (or relabeled interlocutor) message
    User,

    /// Model-authored message
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Message in the wire format submitted to a generation backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// Role as the backend should perceive it
    pub role: Role,

    /// Content of the message
    pub content: String,

    /// Optional display-name hint for the author
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            name: None,
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            name: None,
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            name: None,
        }
    }

    /// Attach a display-name hint
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Completed generation result
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Generated text
    pub content: String,

    /// Total token count reported by the backend, when available
    pub tokens: Option<u32>,
}

/// A model available for selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelInfo {
    /// Model identifier used in generation requests
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Which provider serves the model
    pub provider: Provider,

    /// Optional description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// LLM Provider trait that both backends implement
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Returns the name of the provider ("openai" or "ollama")
    fn name(&self) -> &str;

    /// Generate a single complete response for the given messages
    ///
    /// # Arguments
    /// * `model_id` - Model to run (e.g., "gpt-4o-mini", "llama3.1:8b")
    /// * `messages` - Role-relative view of the conversation
    /// * `temperature` - Sampling temperature in [0.0, 1.0]
    /// * `cancel` - Token that aborts the call with `LlmError::Cancelled`
    async fn generate(
        &self,
        model_id: &str,
        messages: &[ChatMessage],
        temperature: f32,
        cancel: &CancellationToken,
    ) -> Result<Completion>;

    /// List the models this provider currently serves
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let user_msg = ChatMessage::user("Hello");
        assert_eq!(user_msg.role, Role::User);
        assert_eq!(user_msg.content, "Hello");
        assert_eq!(user_msg.name, None);

        let assistant_msg = ChatMessage::assistant("Hi there").with_name("bot1");
        assert_eq!(assistant_msg.role, Role::Assistant);
        assert_eq!(assistant_msg.name, Some("bot1".to_string()));

        let system_msg = ChatMessage::system("You are a debater");
        assert_eq!(system_msg.role, Role::System);
    }

    #[test]
    fn test_message_serialization() {
        let msg = ChatMessage::user("test");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("name"));

        let named = ChatMessage::assistant("reply").with_name("bot2");
        let json = serde_json::to_string(&named).unwrap();
        assert!(json.contains(r#""name":"bot2""#));
        assert!(json.contains(r#""role":"assistant""#));
    }

    #[test]
    fn test_provider_round_trip() {
        assert_eq!("openai".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert_eq!("ollama".parse::<Provider>().unwrap(), Provider::Ollama);
        assert!("anthropic".parse::<Provider>().is_err());

        assert_eq!(Provider::OpenAi.to_string(), "openai");
        assert_eq!(Provider::Ollama.to_string(), "ollama");

        let json = serde_json::to_string(&Provider::Ollama).unwrap();
        assert_eq!(json, r#""ollama""#);
    }

    #[test]
    fn test_cancelled_classification() {
        assert!(LlmError::Cancelled.is_cancelled());
        assert!(!LlmError::Timeout.is_cancelled());
        assert!(!LlmError::NetworkError("x".to_string()).is_cancelled());
    }
}
