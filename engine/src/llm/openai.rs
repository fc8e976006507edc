//! OpenAI LLM Provider
//!
//! Implements the LlmProvider trait against the OpenAI chat completions API.
//! The API key comes from config, with the `OPENAI_API_KEY` environment
//! variable as a fallback. `name` hints on messages are passed through so the
//! backend can tell the two debate participants apart.

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{ChatMessage, Completion, LlmError, LlmProvider, ModelInfo, Provider, Result};

/// Maximum tokens requested per completion
const MAX_TOKENS: u32 = 1000;

pub struct OpenAiProvider {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Create a new OpenAI provider
    ///
    /// # Arguments
    /// * `base_url` - API base (e.g., "https://api.openai.com/v1")
    /// * `api_key` - Bearer token; `None` defers to the `OPENAI_API_KEY` env var
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
        }
    }

    fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = &self.api_key {
            return Ok(key.clone());
        }
        std::env::var("OPENAI_API_KEY").map_err(|_| {
            LlmError::AuthenticationFailed(
                "No OpenAI API key configured (set llm.openai.api_key or OPENAI_API_KEY)"
                    .to_string(),
            )
        })
    }

    async fn request_chat(
        &self,
        model_id: &str,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<Completion> {
        let api_key = self.resolve_api_key()?;
        let url = format!("{}/chat/completions", self.base_url);

        let api_messages: Vec<serde_json::Value> = messages
            .iter()
            .map(|msg| match &msg.name {
                Some(name) => json!({
                    "role": msg.role.to_string(),
                    "content": msg.content,
                    "name": name,
                }),
                None => json!({
                    "role": msg.role.to_string(),
                    "content": msg.content,
                }),
            })
            .collect();

        let payload = json!({
            "model": model_id,
            "messages": api_messages,
            "temperature": temperature,
            "max_tokens": MAX_TOKENS,
            "stream": false,
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::NetworkError(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            return Err(match status.as_u16() {
                401 | 403 => LlmError::AuthenticationFailed(text),
                _ => LlmError::InvalidRequest(format!("OpenAI API error ({}): {}", status, text)),
            });
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        let content = data
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .ok_or_else(|| LlmError::ParseError("No content in response".to_string()))?;

        let tokens = data
            .get("usage")
            .and_then(|usage| usage.get("total_tokens"))
            .and_then(|total| total.as_u64())
            .map(|total| total as u32);

        Ok(Completion {
            content: content.to_string(),
            tokens,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
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
        let api_key = self.resolve_api_key()?;
        let url = format!("{}/models", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LlmError::ProviderUnavailable(format!(
                "OpenAI API error ({})",
                response.status()
            )));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        let models = data
            .get("data")
            .and_then(|d| d.as_array())
            .ok_or_else(|| LlmError::ParseError("No model data in response".to_string()))?;

        Ok(models
            .iter()
            .filter_map(|model| model.get("id").and_then(|id| id.as_str()))
            .filter(|id| id.starts_with("gpt"))
            .map(|id| ModelInfo {
                id: id.to_string(),
                name: id.to_string(),
                provider: Provider::OpenAi,
                description: Some(format!("OpenAI model: {}", id)),
            })
            .collect())
    }
}
