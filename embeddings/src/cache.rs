//! Answer cache store keyed by query embeddings.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::Embedding;
use crate::error::Result;
use crate::similarity::cosine_similarity;

/// A cached answer together with the embedding of the query that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The query text as asked.
    pub query: String,

    /// Embedding of `query`.
    pub embedding: Embedding,

    /// The generated answer.
    pub answer: String,

    /// When the entry was appended.
    pub created_at: DateTime<Utc>,
}

/// The closest cached entry for a lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheMatch {
    /// Query of the matched entry.
    pub query: String,

    /// Stored answer of the matched entry.
    pub answer: String,

    /// Cosine similarity between the lookup embedding and the entry.
    pub similarity: f32,
}

/// Append-only store of answered queries.
///
/// Lookups scan every entry. Entries are never modified; the only removals
/// are [`CacheStore::clear`] and, when a bound is configured, dropping the
/// oldest entry to make room.
#[derive(Debug, Clone, Default)]
pub struct CacheStore {
    /// Entries, oldest first.
    entries: Arc<RwLock<Vec<CacheEntry>>>,

    /// Optional upper bound on the number of entries.
    max_entries: Option<usize>,
}

impl CacheStore {
    /// Create an unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that keeps at most `max_entries` entries.
    pub fn bounded(max_entries: usize) -> Self {
        Self {
            entries: Arc::default(),
            max_entries: Some(max_entries.max(1)),
        }
    }

    /// Find the entry most similar to `embedding`.
    ///
    /// When several entries share the best score the earliest inserted one
    /// wins. Returns `None` only when the store is empty.
    pub async fn best_match(&self, embedding: &[f32]) -> Result<Option<CacheMatch>> {
        let entries = self.entries.read().await;

        let mut best: Option<(&CacheEntry, f32)> = None;
        for entry in entries.iter() {
            let score = cosine_similarity(embedding, &entry.embedding)?;
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((entry, score)),
            }
        }

        Ok(best.map(|(entry, similarity)| CacheMatch {
            query: entry.query.clone(),
            answer: entry.answer.clone(),
            similarity,
        }))
    }

    /// Append a new answer.
    pub async fn append(
        &self,
        query: impl Into<String>,
        embedding: Embedding,
        answer: impl Into<String>,
    ) -> CacheEntry {
        let entry = CacheEntry {
            query: query.into(),
            embedding,
            answer: answer.into(),
            created_at: Utc::now(),
        };

        let mut entries = self.entries.write().await;
        if let Some(max) = self.max_entries {
            while entries.len() >= max {
                let evicted = entries.remove(0);
                debug!("Evicted cached answer for {:?}", evicted.query);
            }
        }
        entries.push(entry.clone());
        debug!("Cached answer ({} entries)", entries.len());

        entry
    }

    /// Remove every entry.
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        let dropped = entries.len();
        entries.clear();
        info!("Cleared answer cache ({dropped} entries dropped)");
    }

    /// Number of cached answers.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Check if the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;
        CacheStats {
            entries: entries.len(),
            max_entries: self.max_entries,
            oldest: entries.first().map(|e| e.created_at),
            newest: entries.last().map(|e| e.created_at),
        }
    }
}

/// Statistics about the answer cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of entries in cache.
    pub entries: usize,

    /// Configured bound, if any.
    pub max_entries: Option<usize>,

    /// Timestamp of the oldest entry.
    pub oldest: Option<DateTime<Utc>>,

    /// Timestamp of the newest entry.
    pub newest: Option<DateTime<Utc>>,
}
