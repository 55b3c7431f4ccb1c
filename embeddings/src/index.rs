//! Ephemeral vector index scanned in full on every search.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::similarity::rank_top_k;

/// Free-form metadata attached to an indexed entry.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// How many entries [`VectorIndex::stats`] samples.
const STATS_SAMPLE_SIZE: usize = 5;

/// An entry in the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorEntry {
    /// The indexed text.
    pub content: String,

    /// The embedding vector, stored as returned by the provider.
    pub embedding: Embedding,

    /// Associated metadata.
    pub metadata: Metadata,
}

/// A search result borrowed from the index.
#[derive(Debug, Clone, Copy)]
pub struct SearchHit<'a> {
    /// Position of the entry in insertion order.
    pub position: usize,

    /// The matched entry.
    pub entry: &'a VectorEntry,

    /// Cosine similarity against the query.
    pub score: f32,
}

/// An in-memory vector index.
///
/// Entries keep their insertion order and every embedding shares one
/// dimension, fixed by the first batch inserted after a reset. Searches are
/// exact linear scans.
#[derive(Debug, Default)]
pub struct VectorIndex {
    /// Stored entries, oldest first.
    entries: Vec<VectorEntry>,

    /// Dimension of the stored embeddings, `None` while empty.
    dimension: Option<usize>,
}

impl VectorIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard every entry.
    pub fn reset(&mut self) {
        let dropped = self.entries.len();
        self.entries.clear();
        self.dimension = None;
        info!("Reset vector index ({dropped} entries dropped)");
    }

    /// Insert a batch of chunks with their embeddings.
    ///
    /// Returns the number of inserted entries.
    pub fn insert_batch(
        &mut self,
        chunks: Vec<String>,
        embeddings: Vec<Embedding>,
    ) -> Result<usize> {
        let metadata = vec![Metadata::new(); chunks.len()];
        self.insert_batch_with_metadata(chunks, embeddings, metadata)
    }

    /// Insert a batch of chunks with their embeddings and per-entry metadata.
    ///
    /// The whole batch is validated before anything is inserted, so a
    /// rejected batch leaves the index untouched.
    pub fn insert_batch_with_metadata(
        &mut self,
        chunks: Vec<String>,
        embeddings: Vec<Embedding>,
        metadata: Vec<Metadata>,
    ) -> Result<usize> {
        if embeddings.len() != chunks.len() {
            return Err(EmbeddingError::BatchSizeMismatch {
                expected: chunks.len(),
                actual: embeddings.len(),
            });
        }
        if metadata.len() != chunks.len() {
            return Err(EmbeddingError::BatchSizeMismatch {
                expected: chunks.len(),
                actual: metadata.len(),
            });
        }

        let Some(first) = embeddings.first() else {
            return Ok(0);
        };
        let dimension = self.dimension.unwrap_or(first.len());
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dimension) {
            return Err(EmbeddingError::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            });
        }

        let count = chunks.len();
        self.entries.extend(
            chunks
                .into_iter()
                .zip(embeddings)
                .zip(metadata)
                .map(|((content, embedding), metadata)| VectorEntry {
                    content,
                    embedding,
                    metadata,
                }),
        );
        self.dimension = Some(dimension);

        debug!("Inserted {count} entries (dimension {dimension})");
        Ok(count)
    }

    /// All entries in insertion order.
    pub fn scan_all(&self) -> &[VectorEntry] {
        &self.entries
    }

    /// Return the `k` entries most similar to `query`, best first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit<'_>>> {
        self.search_where(query, k, |_| true)
    }

    /// Like [`VectorIndex::search`], but only entries accepted by `filter`
    /// are ranked. Ties keep insertion order.
    pub fn search_where<F>(
        &self,
        query: &[f32],
        k: usize,
        filter: F,
    ) -> Result<Vec<SearchHit<'_>>>
    where
        F: Fn(&VectorEntry) -> bool,
    {
        let positions: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| filter(entry))
            .map(|(position, _)| position)
            .collect();

        let ranked = rank_top_k(
            query,
            positions
                .iter()
                .map(|&position| self.entries[position].embedding.as_slice()),
            k,
        )?;

        Ok(ranked
            .into_iter()
            .map(|(rank, score)| {
                let position = positions[rank];
                SearchHit {
                    position,
                    entry: &self.entries[position],
                    score,
                }
            })
            .collect())
    }

    /// Number of entries whose metadata satisfies `filter`.
    pub fn count_matching(&self, filter: &MetadataFilter) -> usize {
        self.entries
            .iter()
            .filter(|entry| filter.matches(&entry.metadata))
            .count()
    }

    /// Get the number of entries in the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dimension shared by the stored embeddings.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Entry count plus a small sample of the stored entries.
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            count: self.entries.len(),
            dimension: self.dimension,
            sample: self
                .entries
                .iter()
                .take(STATS_SAMPLE_SIZE)
                .cloned()
                .collect(),
        }
    }
}

/// Equality conditions on entry metadata. An empty filter accepts everything.
///
/// ```rust,ignore
/// let hr_only = MetadataFilter::new().with("source", "HR");
/// let hits = index.search_where(&query, 3, |e| hr_only.matches(&e.metadata))?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilter {
    conditions: Vec<(String, serde_json::Value)>,
}

impl MetadataFilter {
    /// Create a filter that accepts every entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key` to be present with exactly `value`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.conditions.push((key.into(), value.into()));
        self
    }

    /// Check if the filter has no conditions.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Whether `metadata` satisfies every condition.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.conditions
            .iter()
            .all(|(key, value)| metadata.get(key) == Some(value))
    }
}

/// Snapshot of the vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of entries.
    pub count: usize,

    /// Embedding dimension, if anything is indexed.
    pub dimension: Option<usize>,

    /// The first few entries, oldest first.
    pub sample: Vec<VectorEntry>,
}
