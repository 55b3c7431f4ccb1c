//! Session engine tying chunking, retrieval, reranking and caching together.

use std::sync::Arc;
use std::time::{Duration, Instant};

use docqa_embeddings::{
    CacheStats, EmbeddingProvider, IndexStats, Metadata, MetadataFilter, OllamaEmbeddings,
    VectorIndex, validate_batch,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::chunker::{Chunk, Chunker};
use crate::config::RetrievalConfig;
use crate::error::{Result, RetrievalError};
use crate::generation::{GenerationProvider, OllamaGenerator};
use crate::prompts::{GROUNDED_SYSTEM_PROMPT, NO_CONTEXT_FALLBACK, grounded_prompt};
use crate::reranker::{LlmJudge, RelevanceJudge, Reranker};
use crate::retriever::{Retriever, ScoredCandidate};
use crate::semantic_cache::{CacheAnswer, SemanticCache};

/// A question-answering session over one ingested document.
///
/// The session owns all mutable state: the vector index holding the active
/// document and the semantic answer cache. Ingesting a new document replaces
/// the previous one. Sessions are cheap to share behind an `Arc`; every
/// operation takes `&self`.
pub struct RagSession {
    /// Configuration.
    config: RetrievalConfig,

    /// Embedding provider shared by ingestion, retrieval and the cache.
    embedder: Arc<dyn EmbeddingProvider>,

    /// Generation provider.
    generator: Arc<dyn GenerationProvider>,

    /// Judge used by the reranking pass.
    judge: Arc<dyn RelevanceJudge>,

    /// Index over the active document.
    index: Arc<RwLock<VectorIndex>>,

    /// Document splitter.
    chunker: Chunker,

    /// Query-time search over `index`.
    retriever: Retriever,

    /// Relevance filter.
    reranker: Reranker,

    /// Answer cache.
    cache: SemanticCache,
}

impl RagSession {
    /// Create a new session builder.
    pub fn builder() -> RagSessionBuilder {
        RagSessionBuilder::new()
    }

    /// Create a session backed by the Ollama providers named in `config`.
    pub fn new(config: RetrievalConfig) -> Result<Self> {
        RagSessionBuilder::new().with_config(config).build()
    }

    /// The session configuration.
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Replace the active document with `document`.
    ///
    /// The document is chunked and every chunk embedded before the index is
    /// touched. If embedding fails the index is left empty rather than
    /// holding a partial or stale document.
    pub async fn ingest(&self, document: &str) -> Result<IngestReport> {
        let chunks = self
            .chunker
            .chunk(document)
            .into_iter()
            .map(|chunk| (chunk, None))
            .collect();
        let report = self.replace_index(chunks).await?;
        info!("Ingested document as {} chunks", report.chunk_count);
        Ok(report)
    }

    /// Replace the active document with several `(source, text)` documents.
    ///
    /// Each chunk carries its document's source label under the `source`
    /// metadata key, so [`RagSession::query_filtered`] can restrict a search
    /// to one source. Failure semantics match [`RagSession::ingest`].
    pub async fn ingest_sources(&self, documents: &[(&str, &str)]) -> Result<IngestReport> {
        let chunks = documents
            .iter()
            .flat_map(|&(source, text)| {
                self.chunker
                    .chunk(text)
                    .into_iter()
                    .map(move |chunk| (chunk, Some(source)))
            })
            .collect();
        let report = self.replace_index(chunks).await?;
        info!(
            "Ingested {} documents as {} chunks",
            documents.len(),
            report.chunk_count
        );
        Ok(report)
    }

    async fn replace_index(&self, chunks: Vec<(Chunk, Option<&str>)>) -> Result<IngestReport> {
        if chunks.is_empty() {
            self.index.write().await.reset();
            debug!("Nothing to index");
            return Ok(IngestReport {
                chunk_count: 0,
                dimension: None,
            });
        }

        debug!(
            "Embedding {} chunks with {}/{}",
            chunks.len(),
            self.embedder.name(),
            self.embedder.model()
        );
        let texts: Vec<String> = chunks.iter().map(|(c, _)| c.content.clone()).collect();
        let embedded = match self.embedder.embed_batch(&texts).await {
            Ok(embeddings) => validate_batch(texts.len(), &embeddings).map(|()| embeddings),
            Err(err) => Err(err),
        };
        let embeddings = match embedded {
            Ok(embeddings) => embeddings,
            Err(err) => {
                warn!("Ingestion failed, clearing index: {err}");
                self.index.write().await.reset();
                return Err(RetrievalError::IngestionFailed(err));
            }
        };

        let metadata: Vec<Metadata> = chunks
            .iter()
            .map(|(chunk, source)| chunk_metadata(chunk, *source))
            .collect();
        let mut index = self.index.write().await;
        index.reset();
        let chunk_count = index.insert_batch_with_metadata(texts, embeddings, metadata)?;
        Ok(IngestReport {
            chunk_count,
            dimension: index.dimension(),
        })
    }

    /// Return at most `k` chunks most similar to `question`, best first.
    pub async fn query(&self, question: &str, k: usize) -> Result<Vec<ScoredCandidate>> {
        self.retriever.retrieve(question, k).await
    }

    /// Like [`RagSession::query`], but only chunks whose metadata satisfies
    /// `filter` are ranked.
    pub async fn query_filtered(
        &self,
        question: &str,
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<ScoredCandidate>> {
        self.retriever.retrieve_filtered(question, k, filter).await
    }

    /// Answer `question` from the top-ranked chunks of the active document.
    pub async fn answer(&self, question: &str) -> Result<RagAnswer> {
        let started = Instant::now();
        let sources = self
            .retriever
            .retrieve(question, self.config.query.top_k)
            .await?;
        if sources.is_empty() {
            return Err(RetrievalError::NoRelevantContext);
        }

        let prompt = grounded_prompt(sources.iter().map(ScoredCandidate::content), question);
        let answer = self
            .generator
            .generate(GROUNDED_SYSTEM_PROMPT, &prompt)
            .await
            .map_err(RetrievalError::GenerationFailed)?;

        Ok(RagAnswer {
            answer,
            sources,
            latency: started.elapsed(),
        })
    }

    /// Answer `question` from the chunks that survive a relevance check.
    ///
    /// When no chunk survives, the reply is a fixed fallback message and the
    /// generation provider is not asked to answer.
    pub async fn answer_reranked(&self, question: &str) -> Result<RerankedAnswer> {
        let started = Instant::now();
        let retrieved = self
            .retriever
            .retrieve(question, self.config.rerank.candidates)
            .await?;
        let outcome = self
            .reranker
            .rerank(question, retrieved, self.judge.as_ref())
            .await?;

        if !outcome.has_relevant() {
            info!("No relevant context survived reranking, using fallback reply");
            return Ok(RerankedAnswer {
                answer: NO_CONTEXT_FALLBACK.to_string(),
                candidates: outcome.candidates,
                fallback: true,
                latency: started.elapsed(),
            });
        }

        let prompt = grounded_prompt(outcome.kept().map(ScoredCandidate::content), question);
        let answer = self
            .generator
            .generate(GROUNDED_SYSTEM_PROMPT, &prompt)
            .await
            .map_err(RetrievalError::GenerationFailed)?;

        Ok(RerankedAnswer {
            answer,
            candidates: outcome.candidates,
            fallback: false,
            latency: started.elapsed(),
        })
    }

    /// Answer `question` through the semantic cache.
    pub async fn ask_with_cache(&self, question: &str) -> Result<CacheAnswer> {
        self.cache.ask_with_cache(question).await
    }

    /// Drop every cached answer.
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    /// Drop the active document.
    pub async fn reset(&self) {
        self.index.write().await.reset();
    }

    /// Get session statistics.
    pub async fn stats(&self) -> SessionStats {
        SessionStats {
            index: self.index.read().await.stats(),
            cache: self.cache.stats().await,
        }
    }
}

fn chunk_metadata(chunk: &Chunk, source: Option<&str>) -> Metadata {
    let mut metadata = Metadata::from_iter([
        ("chunk_id".to_string(), Value::from(chunk.id.clone())),
        ("start_offset".to_string(), Value::from(chunk.start_offset)),
        ("end_offset".to_string(), Value::from(chunk.end_offset)),
        (
            "estimated_tokens".to_string(),
            Value::from(chunk.estimated_tokens()),
        ),
    ]);
    if let Some(source) = source {
        metadata.insert("source".to_string(), Value::from(source));
    }
    metadata
}

/// Builder for [`RagSession`].
pub struct RagSessionBuilder {
    config: RetrievalConfig,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    generator: Option<Arc<dyn GenerationProvider>>,
    judge: Option<Arc<dyn RelevanceJudge>>,
}

impl RagSessionBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: RetrievalConfig::default(),
            embedder: None,
            generator: None,
            judge: None,
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: RetrievalConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom embedding provider instead of Ollama.
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Use a custom generation provider instead of Ollama.
    pub fn with_generator(mut self, generator: Arc<dyn GenerationProvider>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Use a custom relevance judge. Defaults to an [`LlmJudge`] over the
    /// generation provider.
    pub fn with_judge(mut self, judge: Arc<dyn RelevanceJudge>) -> Self {
        self.judge = Some(judge);
        self
    }

    /// Validate the configuration and build the session.
    pub fn build(self) -> Result<RagSession> {
        let Self {
            config,
            embedder,
            generator,
            judge,
        } = self;
        config.validate()?;

        let embedder: Arc<dyn EmbeddingProvider> = match embedder {
            Some(embedder) => embedder,
            None => Arc::new(
                OllamaEmbeddings::new()
                    .with_base_url(&config.ollama.base_url)
                    .with_model(&config.ollama.embedding_model),
            ),
        };
        let generator: Arc<dyn GenerationProvider> = match generator {
            Some(generator) => generator,
            None => Arc::new(OllamaGenerator::from_config(&config.ollama)),
        };
        let judge: Arc<dyn RelevanceJudge> = match judge {
            Some(judge) => judge,
            None => Arc::new(LlmJudge::new(generator.clone())),
        };

        let index = Arc::new(RwLock::new(VectorIndex::new()));
        let chunker = Chunker::new(config.chunking.clone())?;
        let retriever = Retriever::new(embedder.clone(), index.clone());
        let reranker = Reranker::from_config(&config.rerank);
        let cache = SemanticCache::new(embedder.clone(), generator.clone(), &config.cache);

        info!(
            "Session ready (embedder {}/{}, generator {})",
            embedder.name(),
            embedder.model(),
            generator.name()
        );
        Ok(RagSession {
            config,
            embedder,
            generator,
            judge,
            index,
            chunker,
            retriever,
            reranker,
            cache,
        })
    }
}

impl Default for RagSessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a successful ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Number of chunks indexed.
    pub chunk_count: usize,

    /// Embedding dimension, if anything was indexed.
    pub dimension: Option<usize>,
}

/// A grounded answer and the chunks it was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagAnswer {
    /// Generated answer.
    pub answer: String,

    /// Context chunks, best first.
    pub sources: Vec<ScoredCandidate>,

    /// Wall time from receiving the question to returning the answer.
    pub latency: Duration,
}

/// An answer produced after reranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankedAnswer {
    /// Generated answer, or the fallback message.
    pub answer: String,

    /// Every retrieved candidate with its judge score and keep flag.
    pub candidates: Vec<ScoredCandidate>,

    /// Whether the fallback message was used.
    pub fallback: bool,

    /// Wall time spent retrieving, judging and generating.
    pub latency: Duration,
}

impl RerankedAnswer {
    /// Candidates that were used as context.
    pub fn kept(&self) -> impl Iterator<Item = &ScoredCandidate> {
        self.candidates.iter().filter(|c| c.keep)
    }
}

/// Statistics about a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Vector index snapshot.
    pub index: IndexStats,

    /// Answer cache snapshot.
    pub cache: CacheStats,
}
