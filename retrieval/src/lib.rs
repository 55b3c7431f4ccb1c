//! # Retrieval Engine
//!
//! This crate answers questions about a single ingested document:
//!
//! - **Chunker**: splits the document into overlapping windows
//! - **Retriever**: ranks chunks by embedding similarity
//! - **Reranker**: keeps only chunks a relevance judge scores highly
//! - **Semantic Cache**: reuses answers to sufficiently similar questions
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          RagSession                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   ingest ──▶ Chunker ──▶ EmbeddingProvider ──▶ VectorIndex      │
//! │                                                   │             │
//! │   query ───────────────▶ Retriever ◀──────────────┘             │
//! │                              │                                  │
//! │                              ▼                                  │
//! │                          Reranker ──▶ RelevanceJudge            │
//! │                              │                                  │
//! │                              ▼                                  │
//! │                      GenerationProvider                         │
//! │                              ▲                                  │
//! │   ask_with_cache ──▶ SemanticCache ──▶ CacheStore               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docqa_retrieval::{RagSession, RetrievalConfig};
//!
//! let config = RetrievalConfig::load("docqa.toml").await?;
//! let session = RagSession::new(config)?;
//!
//! session.ingest(&document).await?;
//! let answer = session.answer_reranked("Who built the bridge?").await?;
//! let cached = session.ask_with_cache("What is the capital of France?").await?;
//! ```

pub mod chunker;
pub mod config;
pub mod engine;
pub mod error;
pub mod generation;
pub mod prompts;
pub mod reranker;
pub mod retriever;
pub mod semantic_cache;

#[cfg(test)]
mod test_support;

pub use chunker::{Chunk, ChunkParams, ChunkStrategy, Chunker, chunk};
pub use config::{CacheConfig, OllamaConfig, QueryConfig, RerankConfig, RetrievalConfig};
pub use engine::{
    IngestReport, RagAnswer, RagSession, RagSessionBuilder, RerankedAnswer, SessionStats,
};
pub use error::{GenerationError, JudgeError, Result, RetrievalError};
pub use generation::{GenerationProvider, OllamaGenerator};
pub use reranker::{LlmJudge, RelevanceJudge, RerankOutcome, Reranker};
pub use retriever::{Retriever, ScoredCandidate};
pub use semantic_cache::{AnswerSource, CacheAnswer, SemanticCache};

// Re-export from dependencies for convenience
pub use docqa_embeddings::{
    Embedding, EmbeddingError, EmbeddingProvider, MetadataFilter, OllamaEmbeddings, VectorEntry,
    VectorIndex, cosine_similarity,
};
