//! Text generation providers.

use async_trait::async_trait;
use docqa_embeddings::DEFAULT_OLLAMA_URL;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{DEFAULT_GENERATION_MODEL, OllamaConfig};
use crate::error::GenerationError;

/// Trait for text generation providers.
///
/// The engine never retries a generation call; retry policy belongs to the
/// provider or its caller.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// Generate a reply to `user_prompt` under `system_prompt`.
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> std::result::Result<String, GenerationError>;
}

/// Generation provider backed by the Ollama chat API.
pub struct OllamaGenerator {
    /// API base URL.
    base_url: String,

    /// HTTP client.
    client: reqwest::Client,

    /// Chat model.
    model: String,

    /// Sampling temperature.
    temperature: f32,
}

impl OllamaGenerator {
    /// Create a generator pointing at the local Ollama default endpoint.
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            client: reqwest::Client::new(),
            model: DEFAULT_GENERATION_MODEL.to_string(),
            temperature: 0.0,
        }
    }

    /// Create a generator from the `[ollama]` config section.
    pub fn from_config(config: &OllamaConfig) -> Self {
        Self::new()
            .with_base_url(&config.base_url)
            .with_model(&config.generation_model)
            .with_temperature(config.temperature)
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the chat model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Use a preconfigured HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

impl Default for OllamaGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationProvider for OllamaGenerator {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> std::result::Result<String, GenerationError> {
        debug!("Generating with model: {}", self.model);

        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GenerationError::ApiRequest(format!(
                "{status}: {error_text}"
            )));
        }

        let result: ChatResponse = response.json().await?;
        let content = result.message.content;
        if content.trim().is_empty() {
            return Err(GenerationError::InvalidResponse(
                "model returned no content".to_string(),
            ));
        }

        debug!("Generated {} characters", content.len());
        Ok(content)
    }
}

/// Ollama `/api/chat` request body.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

/// Ollama `/api/chat` response body (non-streaming).
#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: String,
}
