//! Error types for the retrieval engine.

use docqa_embeddings::EmbeddingError;
use thiserror::Error;

/// Result type alias for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Errors that can occur in the retrieval engine.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// A caller-supplied parameter is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Two vectors that must share a dimension do not.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The query text is empty or whitespace.
    #[error("query is empty")]
    EmptyQuery,

    /// Embedding the question failed.
    #[error("embedding failed: {0}")]
    EmbeddingFailed(#[source] EmbeddingError),

    /// Embedding the document chunks failed.
    #[error("ingestion failed: {0}")]
    IngestionFailed(#[source] EmbeddingError),

    /// Embedding the query for a search failed.
    #[error("retrieval failed: {0}")]
    RetrievalFailed(#[source] EmbeddingError),

    /// Nothing relevant survived retrieval or reranking.
    #[error("no relevant context found")]
    NoRelevantContext,

    /// The generation provider failed.
    #[error("generation failed: {0}")]
    GenerationFailed(#[source] GenerationError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Index and similarity failures are contract violations; anything else the
/// embeddings crate reports is a provider failure.
impl From<EmbeddingError> for RetrievalError {
    fn from(err: EmbeddingError) -> Self {
        match err {
            EmbeddingError::DimensionMismatch { expected, actual } => {
                Self::DimensionMismatch { expected, actual }
            }
            EmbeddingError::BatchSizeMismatch { expected, actual } => Self::InvalidParameter(
                format!("batch holds {actual} items where {expected} were expected"),
            ),
            other => Self::EmbeddingFailed(other),
        }
    }
}

/// Errors reported by a generation provider.
#[derive(Error, Debug)]
pub enum GenerationError {
    /// API request failed.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// Invalid response from provider.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors from a single relevance judgment.
#[derive(Error, Debug)]
pub enum JudgeError {
    /// The underlying generation call failed.
    #[error("judge generation failed: {0}")]
    Generation(#[from] GenerationError),

    /// The judge replied without a usable score.
    #[error("malformed relevance score: {0:?}")]
    MalformedScore(String),
}
