//! Query-time retrieval over the vector index.

use std::sync::Arc;

use docqa_embeddings::{EmbeddingProvider, MetadataFilter, VectorEntry, VectorIndex};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Result, RetrievalError};

/// A retrieved entry with its scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    /// The indexed entry.
    pub entry: VectorEntry,

    /// Cosine similarity between the query and the entry.
    pub raw_score: f32,

    /// Judge score (0-10), set by the reranker.
    pub rerank_score: Option<f32>,

    /// Whether the candidate is part of the selected context.
    pub keep: bool,
}

impl ScoredCandidate {
    /// A freshly retrieved candidate, selected until a reranker says otherwise.
    pub fn retrieved(entry: VectorEntry, raw_score: f32) -> Self {
        Self {
            entry,
            raw_score,
            rerank_score: None,
            keep: true,
        }
    }

    /// The candidate text.
    pub fn content(&self) -> &str {
        &self.entry.content
    }
}

/// Embeds queries and ranks index entries against them.
///
/// Ranking is an exact scan of every entry; results are ordered by score
/// with ties in insertion order.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<RwLock<VectorIndex>>,
}

impl Retriever {
    /// Create a retriever over a shared index.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<RwLock<VectorIndex>>) -> Self {
        Self { embedder, index }
    }

    /// Return at most `k` entries most similar to `query`, best first.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredCandidate>> {
        self.retrieve_filtered(query, k, &MetadataFilter::new()).await
    }

    /// Return at most `k` entries most similar to `query` among those whose
    /// metadata satisfies `filter`, best first.
    pub async fn retrieve_filtered(
        &self,
        query: &str,
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<ScoredCandidate>> {
        if k == 0 {
            return Err(RetrievalError::InvalidParameter(
                "k must be greater than zero".to_string(),
            ));
        }
        if query.trim().is_empty() {
            return Err(RetrievalError::EmptyQuery);
        }
        if self.index.read().await.count_matching(filter) == 0 {
            debug!("No indexed entries match, nothing to retrieve");
            return Ok(Vec::new());
        }

        let embedding = self
            .embedder
            .embed(query)
            .await
            .map_err(RetrievalError::RetrievalFailed)?;

        let index = self.index.read().await;
        let candidates: Vec<ScoredCandidate> = index
            .search_where(&embedding, k, |entry| filter.matches(&entry.metadata))?
            .into_iter()
            .map(|hit| ScoredCandidate::retrieved(hit.entry.clone(), hit.score))
            .collect();

        debug!(
            "Retrieved {} of {} entries for query",
            candidates.len(),
            index.len()
        );
        Ok(candidates)
    }
}
