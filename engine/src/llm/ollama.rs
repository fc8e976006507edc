//! Ollama LLM Provider
//!
//! This module implements the LlmProvider trait for Ollama, a local LLM
//! server, typically at http://localhost:11434.
//!
//! Key features:
//! - Local execution (no API keys required)
//! - Non-streaming chat completion via `/api/chat`
//! - Model listing via `/api/tags`
//! - Cooperative cancellation via `CancellationToken`

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{ChatMessage, Completion, LlmError, LlmProvider, ModelInfo, Provider, Result};

/// Ollama provider configuration
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    /// Base URL for Ollama API (typically http://localhost:11434)
    base_url: String,

    /// HTTP client for API requests
    client: Client,
}

impl OllamaProvider {
    /// Create a new Ollama provider
    ///
    /// # Arguments
    /// * `base_url` - Base URL for Ollama API (e.g., "http://localhost:11434")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::builder()
                .timeout(Duration::from_secs(300))
                .build()
                .unwrap_or_default(),
        }
    }

    async fn request_chat(
        &self,
        model_id: &str,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<Completion> {
        let request = OllamaRequest {
            model: model_id.to_string(),
            messages: messages
                .iter()
                .map(|msg| OllamaMessage {
                    role: msg.role.to_string(),
                    content: msg.content.clone(),
                })
                .collect(),
            stream: false,
            options: OllamaOptions { temperature },
        };

        tracing::debug!(
            "Ollama request: model={}, messages={}, total_chars={}",
            model_id,
            request.messages.len(),
            request
                .messages
                .iter()
                .map(|m| m.content.len())
                .sum::<usize>()
        );

        let url = format!("{}/api/chat", self.base_url);
        let start = std::time::Instant::now();
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else if e.is_connect() {
                    LlmError::ProviderUnavailable(format!(
                        "Cannot connect to Ollama at {}. Is Ollama running?",
                        self.base_url
                    ))
                } else {
                    LlmError::NetworkError(e.to_string())
                }
            })?;

        tracing::debug!(
            "Ollama response received in {:.1}s",
            start.elapsed().as_secs_f64()
        );

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::ProviderUnavailable(format!(
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(format!("Failed to parse Ollama response: {}", e)))?;

        let tokens = match (
            ollama_response.prompt_eval_count,
            ollama_response.eval_count,
        ) {
            (Some(prompt), Some(eval)) => Some(prompt + eval),
            (_, Some(eval)) => Some(eval),
            _ => None,
        };

        Ok(Completion {
            content: ollama_response.message.content,
            tokens,
        })
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(
        &self,
        model_id: &str,
        messages: &[ChatMessage],
        temperature: f32,
        cancel: &CancellationToken,
    ) -> Result<Completion> {
        tokio::select! {
            _ = cancel.cancelled() => Err(LlmError::Cancelled),
            result = self.request_chat(model_id, messages, temperature) => result,
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_connect() {
                LlmError::ProviderUnavailable(format!(
                    "Cannot connect to Ollama at {}. Is Ollama running?",
                    self.base_url
                ))
            } else {
                LlmError::NetworkError(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            return Err(LlmError::ProviderUnavailable(format!(
                "Ollama API error ({})",
                response.status()
            )));
        }

        let tags: OllamaTagsResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(format!("Failed to parse Ollama tags: {}", e)))?;

        Ok(tags
            .models
            .into_iter()
            .map(|model| ModelInfo {
                id: model.name.clone(),
                name: model.name.clone(),
                provider: Provider::Ollama,
                description: Some(format!("Local Ollama model: {}", model.name)),
            })
            .collect())
    }
}

/// Ollama API request format
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama message format
#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

/// Ollama API response format
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

/// Ollama model listing response
#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaTag>,
}

#[derive(Debug, Deserialize)]
struct OllamaTag {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_provider_properties() {
        let provider = OllamaProvider::new("http://localhost:11434");
        assert_eq!(provider.name(), "ollama");
    }

    #[tokio::test]
    async fn test_cancel_before_send() {
        let provider = OllamaProvider::new("http://localhost:11434");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let messages = vec![ChatMessage::user("Hello")];
        let result = provider
            .generate("llama3.1:8b", &messages, 0.7, &cancel)
            .await;

        assert!(matches!(result, Err(LlmError::Cancelled)));
    }

    #[test]
    fn test_response_token_accounting() {
        let json = r#"{"message":{"role":"assistant","content":"hi"},"prompt_eval_count":12,"eval_count":30,"done":true}"#;
        let parsed: OllamaResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.prompt_eval_count, Some(12));
        assert_eq!(parsed.eval_count, Some(30));

        let json = r#"{"message":{"role":"assistant","content":"hi"},"done":true}"#;
        let parsed: OllamaResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.eval_count, None);
    }
}
