//! Generation Gateway
//!
//! Dispatches generation requests to the configured provider and aggregates
//! model listings across providers. The gateway is deliberately thin: word
//! truncation, quota accounting, and cancellation-slot management belong to
//! the scheduler, not here.

use tokio_util::sync::CancellationToken;

use super::ollama::OllamaProvider;
use super::openai::OpenAiProvider;
use super::{ChatMessage, Completion, LlmProvider, ModelInfo, Provider, Result};

/// Per-call generation settings
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Which backend serves the request
    pub provider: Provider,

    /// Model identifier
    pub model_id: String,

    /// Sampling temperature in [0.0, 1.0]
    pub temperature: f32,
}

/// Gateway over both generation backends
pub struct Gateway {
    openai: OpenAiProvider,
    ollama: OllamaProvider,
}

impl Gateway {
    /// Create a new gateway
    pub fn new(openai: OpenAiProvider, ollama: OllamaProvider) -> Self {
        Self { openai, ollama }
    }

    fn provider(&self, provider: Provider) -> &dyn LlmProvider {
        match provider {
            Provider::OpenAi => &self.openai,
            Provider::Ollama => &self.ollama,
        }
    }

    /// Generate a single complete response via the configured provider
    pub async fn generate(
        &self,
        config: &GenerationConfig,
        messages: &[ChatMessage],
        cancel: &CancellationToken,
    ) -> Result<Completion> {
        self.provider(config.provider)
            .generate(&config.model_id, messages, config.temperature, cancel)
            .await
    }

    /// List models available for selection
    ///
    /// With a specific provider, failures propagate to the caller. Without
    /// one, each provider's failure degrades to an empty subset so a single
    /// unreachable backend never fails the whole listing.
    pub async fn list_models(&self, provider: Option<Provider>) -> Result<Vec<ModelInfo>> {
        if let Some(provider) = provider {
            return self.provider(provider).list_models().await;
        }

        let (openai, ollama) =
            tokio::join!(self.openai.list_models(), self.ollama.list_models());

        let mut models = openai.unwrap_or_else(|e| {
            tracing::warn!("OpenAI model listing unavailable: {}", e);
            Vec::new()
        });
        models.extend(ollama.unwrap_or_else(|e| {
            tracing::warn!("Ollama model listing unavailable: {}", e);
            Vec::new()
        }));

        Ok(models)
    }
}
