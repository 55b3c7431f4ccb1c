//! Embedding providers.
//!
//! The engine talks to embedding backends through [`EmbeddingProvider`].
//! [`OllamaEmbeddings`] is the bundled HTTP implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{EmbeddingError, Result};
use crate::{DEFAULT_EMBEDDING_MODEL, DEFAULT_OLLAMA_URL, Embedding};

/// Trait for embedding providers.
///
/// Implementations must return vectors of one consistent dimension and must
/// report failures as errors rather than substituting placeholder vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// Model used to produce embeddings.
    fn model(&self) -> &str;

    /// Generate an embedding for the given text.
    async fn embed(&self, text: &str) -> Result<Embedding>;

    /// Generate embeddings for multiple texts, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        // Default implementation: process sequentially
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }
}

/// Check a batch response against the request it answers.
///
/// The batch must hold one non-empty vector per input and every vector must
/// share the dimension of the first.
pub fn validate_batch(expected_len: usize, embeddings: &[Embedding]) -> Result<()> {
    if embeddings.len() != expected_len {
        return Err(EmbeddingError::InvalidResponse(format!(
            "expected {expected_len} embeddings, got {}",
            embeddings.len()
        )));
    }

    let Some(first) = embeddings.first() else {
        return Ok(());
    };
    if first.is_empty() {
        return Err(EmbeddingError::InvalidResponse(
            "provider returned an empty embedding".to_string(),
        ));
    }
    if let Some(bad) = embeddings.iter().find(|e| e.len() != first.len()) {
        return Err(EmbeddingError::DimensionMismatch {
            expected: first.len(),
            actual: bad.len(),
        });
    }

    Ok(())
}

/// Embedding provider backed by an Ollama server.
pub struct OllamaEmbeddings {
    /// API base URL.
    base_url: String,

    /// HTTP client.
    client: reqwest::Client,

    /// Embedding model.
    model: String,
}

impl OllamaEmbeddings {
    /// Create a provider pointing at the local Ollama default endpoint.
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            client: reqwest::Client::new(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the embedding model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Use a preconfigured HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    async fn request(&self, input: Vec<&str>) -> Result<Vec<Embedding>> {
        let body = OllamaEmbedRequest {
            model: &self.model,
            input: &input,
        };

        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ApiRequest(format!(
                "{status}: {error_text}"
            )));
        }

        let result: OllamaEmbedResponse = response.json().await?;
        validate_batch(input.len(), &result.embeddings)?;
        Ok(result.embeddings)
    }
}

impl Default for OllamaEmbeddings {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddings {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        debug!("Generating embedding with model: {}", self.model);

        let embedding = self
            .request(vec![text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                EmbeddingError::InvalidResponse("no embedding in response".to_string())
            })?;

        debug!("Generated embedding with {} dimensions", embedding.len());
        Ok(embedding)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Generating batch embeddings for {} texts with model: {}",
            texts.len(),
            self.model
        );

        let embeddings = self
            .request(texts.iter().map(String::as_str).collect())
            .await?;

        info!("Generated {} batch embeddings", embeddings.len());
        Ok(embeddings)
    }
}

/// Ollama `/api/embed` request body.
#[derive(Debug, Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

/// Ollama `/api/embed` response body.
#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Embedding>,
}
