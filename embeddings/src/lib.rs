//! # Embeddings
//!
//! This crate provides the numeric half of the document question-answering
//! engine: embedding providers, cosine similarity, and the two in-memory
//! stores that are scanned with it.
//!
//! ## Features
//!
//! - **Embedding Generation**: Convert text to dense vectors through a provider
//! - **Similarity Scoring**: Cosine similarity with a defined zero-vector policy
//! - **Vector Index**: Ephemeral, insertion-ordered store scanned in full per query
//! - **Answer Cache Store**: Query embeddings paired with previously generated answers
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► Embedding ──► VectorIndex                │
//! │       │                    │              │                     │
//! │       ▼                    ▼              ▼                     │
//! │    Ollama         cosine_similarity   CacheStore                │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod error;
pub mod index;
pub mod provider;
pub mod similarity;

pub use cache::{CacheEntry, CacheMatch, CacheStats, CacheStore};
pub use error::{EmbeddingError, Result};
pub use index::{IndexStats, Metadata, MetadataFilter, SearchHit, VectorEntry, VectorIndex};
pub use provider::{EmbeddingProvider, OllamaEmbeddings, validate_batch};
pub use similarity::{cosine_similarity, rank_top_k};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Default Ollama endpoint used by the bundled providers.
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";
