//! Configuration for the retrieval engine.

use std::path::Path;

use docqa_embeddings::{DEFAULT_EMBEDDING_MODEL, DEFAULT_OLLAMA_URL};
use serde::{Deserialize, Serialize};

use crate::chunker::{ChunkParams, ChunkStrategy};
use crate::error::{Result, RetrievalError};

/// Default generation model.
pub const DEFAULT_GENERATION_MODEL: &str = "qwen2.5:1.5b";

/// Configuration for the retrieval engine.
///
/// Every section falls back to its defaults when omitted, so a TOML file only
/// needs the values it overrides:
///
/// ```toml
/// [chunking]
/// strategy = "fixed"
/// size = 200
///
/// [cache]
/// similarity_threshold = 0.9
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// How documents are split at ingestion.
    pub chunking: ChunkParams,

    /// Query processing configuration.
    pub query: QueryConfig,

    /// Reranking configuration.
    pub rerank: RerankConfig,

    /// Semantic cache configuration.
    pub cache: CacheConfig,

    /// Ollama endpoint and models.
    pub ollama: OllamaConfig,
}

impl RetrievalConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from TOML text and validate it.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = tokio::fs::read_to_string(path).await?;
        Self::from_toml_str(&text)
    }

    /// Set the chunking parameters.
    pub fn with_chunking(mut self, strategy: ChunkStrategy, size: usize, overlap: usize) -> Self {
        self.chunking = ChunkParams {
            strategy,
            size,
            overlap,
        };
        self
    }

    /// Set how many results a query returns.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.query.top_k = top_k;
        self
    }

    /// Set the cache similarity threshold.
    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.cache.similarity_threshold = threshold;
        self
    }

    /// Set the reranking configuration.
    pub fn with_rerank(mut self, config: RerankConfig) -> Self {
        self.rerank = config;
        self
    }

    /// Set the Ollama configuration.
    pub fn with_ollama(mut self, config: OllamaConfig) -> Self {
        self.ollama = config;
        self
    }

    /// Check every value is within its documented range.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.size == 0 {
            return Err(invalid("chunking.size must be greater than zero"));
        }
        if self.query.top_k == 0 {
            return Err(invalid("query.top_k must be greater than zero"));
        }
        if self.rerank.candidates == 0 {
            return Err(invalid("rerank.candidates must be greater than zero"));
        }
        if self.rerank.max_concurrency == 0 {
            return Err(invalid("rerank.max_concurrency must be greater than zero"));
        }
        if !(0.0..=10.0).contains(&self.rerank.keep_threshold) {
            return Err(invalid("rerank.keep_threshold must be within [0, 10]"));
        }
        if !(0.0..=1.0).contains(&self.cache.similarity_threshold) {
            return Err(invalid("cache.similarity_threshold must be within [0, 1]"));
        }
        if self.cache.max_entries == Some(0) {
            return Err(invalid("cache.max_entries must be greater than zero when set"));
        }
        if self.ollama.temperature.is_nan() || self.ollama.temperature < 0.0 {
            return Err(invalid("ollama.temperature must not be negative"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> RetrievalError {
    RetrievalError::Config(message.to_string())
}

/// Configuration for query processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Number of chunks used as context for a grounded answer.
    pub top_k: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

/// Configuration for the reranking pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    /// How many retrieved chunks are handed to the judge.
    pub candidates: usize,

    /// Minimum judge score (0-10) a candidate needs to be kept.
    pub keep_threshold: f32,

    /// Maximum number of judge calls in flight at once.
    pub max_concurrency: usize,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            candidates: 5,
            keep_threshold: 6.0,
            max_concurrency: 8,
        }
    }
}

/// Configuration for the semantic answer cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// A cached answer is reused only when similarity is strictly above this.
    pub similarity_threshold: f32,

    /// Upper bound on cached answers; unbounded when `None`.
    pub max_entries: Option<usize>,

    /// System prompt for answers generated on a cache miss.
    pub system_prompt: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
            max_entries: None,
            system_prompt: "You are a helpful assistant.".to_string(),
        }
    }
}

/// Configuration for the Ollama providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Server base URL.
    pub base_url: String,

    /// Model used for embeddings.
    pub embedding_model: String,

    /// Model used for generation and relevance judging.
    pub generation_model: String,

    /// Sampling temperature for generation.
    pub temperature: f32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
            temperature: 0.0,
        }
    }
}
