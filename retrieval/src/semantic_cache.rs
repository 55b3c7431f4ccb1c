//! Similarity-gated answer cache in front of the generation provider.
//!
//! A question is answered from the cache when some earlier question's
//! embedding is strictly more similar than the configured threshold.
//! Otherwise the generation provider answers it and the answer is cached.

use std::sync::Arc;
use std::time::{Duration, Instant};

use docqa_embeddings::{CacheStats, CacheStore, EmbeddingProvider};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::CacheConfig;
use crate::error::{Result, RetrievalError};
use crate::generation::GenerationProvider;

/// Where an answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    /// Reused from an earlier, similar question.
    Cache,
    /// Freshly generated.
    Llm,
}

/// The answer to a cached question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheAnswer {
    /// Answer text.
    pub answer: String,

    /// Whether the answer was served from the cache.
    pub is_hit: bool,

    /// Best similarity found in the cache. On a miss this is never negative,
    /// and it is zero when the cache was empty.
    pub similarity: f32,

    /// The earlier question whose answer was reused, on a hit.
    pub matched_query: Option<String>,

    /// Wall-clock time spent answering.
    pub latency: Duration,

    /// Where the answer came from.
    pub source: AnswerSource,
}

/// Answer cache keyed by question embeddings.
#[derive(Clone)]
pub struct SemanticCache {
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn GenerationProvider>,
    store: CacheStore,
    threshold: f32,
    system_prompt: String,
}

impl SemanticCache {
    /// Create a cache from the `[cache]` config section.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
        config: &CacheConfig,
    ) -> Self {
        let store = match config.max_entries {
            Some(max) => CacheStore::bounded(max),
            None => CacheStore::new(),
        };
        Self {
            embedder,
            generator,
            store,
            threshold: config.similarity_threshold,
            system_prompt: config.system_prompt.clone(),
        }
    }

    /// Similarity a cached question must exceed to be reused.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Answer `question`, reusing a cached answer when one is close enough.
    pub async fn ask_with_cache(&self, question: &str) -> Result<CacheAnswer> {
        if question.trim().is_empty() {
            return Err(RetrievalError::EmptyQuery);
        }
        let started = Instant::now();

        let embedding = self
            .embedder
            .embed(question)
            .await
            .map_err(RetrievalError::EmbeddingFailed)?;

        let best = self.store.best_match(&embedding).await?;
        if let Some(hit) = best.as_ref().filter(|m| m.similarity > self.threshold) {
            debug!(
                "Cache hit ({:.3}) for {question:?} via {:?}",
                hit.similarity, hit.query
            );
            return Ok(CacheAnswer {
                answer: hit.answer.clone(),
                is_hit: true,
                similarity: hit.similarity,
                matched_query: Some(hit.query.clone()),
                latency: started.elapsed(),
                source: AnswerSource::Cache,
            });
        }

        let similarity = best.map_or(0.0, |m| m.similarity.max(0.0));
        debug!("Cache miss ({similarity:.3}) for {question:?}");

        let answer = self
            .generator
            .generate(&self.system_prompt, question)
            .await
            .map_err(RetrievalError::GenerationFailed)?;
        self.store.append(question, embedding, answer.clone()).await;

        Ok(CacheAnswer {
            answer,
            is_hit: false,
            similarity,
            matched_query: None,
            latency: started.elapsed(),
            source: AnswerSource::Llm,
        })
    }

    /// Drop every cached answer.
    pub async fn clear(&self) {
        self.store.clear().await;
        info!("Semantic cache cleared");
    }

    /// Number of cached answers.
    pub async fn len(&self) -> usize {
        self.store.len().await
    }

    /// Check if nothing is cached.
    pub async fn is_empty(&self) -> bool {
        self.store.is_empty().await
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        self.store.stats().await
    }
}
