//! Integration tests for a full question-answering session.
//!
//! These drive `RagSession` end to end with deterministic in-process
//! providers, plus one run against a mocked Ollama server.

mod common;

use std::sync::Arc;

use common::{KeywordEmbedder, KeywordGenerator, fixture, init_tracing};
use docqa_retrieval::prompts::NO_CONTEXT_FALLBACK;
use docqa_retrieval::{
    AnswerSource, ChunkStrategy, MetadataFilter, OllamaConfig, RagSession, RetrievalConfig,
    RetrievalError, ScoredCandidate,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// One chunk per paragraph of `notes.txt`.
fn config() -> RetrievalConfig {
    RetrievalConfig::default().with_chunking(ChunkStrategy::Recursive, 120, 0)
}

fn session_with(
    embedder: KeywordEmbedder,
) -> (RagSession, Arc<KeywordEmbedder>, Arc<KeywordGenerator>) {
    init_tracing();
    let embedder = Arc::new(embedder);
    let generator = Arc::new(KeywordGenerator::new());
    let session = RagSession::builder()
        .with_config(config())
        .with_embedder(embedder.clone())
        .with_generator(generator.clone())
        .build()
        .unwrap();
    (session, embedder, generator)
}

fn session() -> (RagSession, Arc<KeywordEmbedder>, Arc<KeywordGenerator>) {
    session_with(KeywordEmbedder::new())
}

fn offset(candidate: &ScoredCandidate, key: &str) -> usize {
    candidate.entry.metadata[key].as_u64().unwrap() as usize
}

#[tokio::test]
async fn test_ingested_chunks_cover_the_document() {
    let (session, _, _) = session();
    let document = fixture("notes.txt");

    let report = session.ingest(&document).await.unwrap();
    assert_eq!(report.chunk_count, 3);
    assert_eq!(report.dimension, Some(common::VOCABULARY.len()));

    let mut chunks = session.query("bridge", 10).await.unwrap();
    assert_eq!(chunks.len(), 3);
    chunks.sort_by_key(|c| offset(c, "start_offset"));

    let mut covered = 0;
    for chunk in &chunks {
        let (start, end) = (offset(chunk, "start_offset"), offset(chunk, "end_offset"));
        assert!(start <= covered, "gap before byte {start}");
        assert!(start < end);
        assert_eq!(&document[start..end], chunk.content());
        covered = covered.max(end);
    }
    assert_eq!(covered, document.len());

    // Paragraph breaks stay with the preceding chunk.
    assert!(chunks[0].content().ends_with("1937.\n\n"));
}

#[tokio::test]
async fn test_query_ranks_matching_paragraph_first() {
    let (session, _, _) = session();
    session.ingest(&fixture("notes.txt")).await.unwrap();

    let results = session.query("Which bridge is the golden one?", 2).await.unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0].content().starts_with("The Golden Gate Bridge"));
    assert!(results[0].raw_score > results[1].raw_score);
}

#[tokio::test]
async fn test_reranked_answer_uses_only_relevant_context() {
    let (session, _, generator) = session();
    session.ingest(&fixture("notes.txt")).await.unwrap();

    let answer = session
        .answer_reranked("When did the Golden Gate bridge open?")
        .await
        .unwrap();

    assert!(!answer.fallback);
    assert_eq!(answer.answer, "answer #1");
    assert_eq!(answer.candidates.len(), 3);
    assert_eq!(answer.kept().count(), 1);
    assert!(answer.candidates.iter().all(|c| c.rerank_score.is_some()));
    assert_eq!(generator.judgments(), 3);

    let prompt = generator.last_prompt().unwrap();
    assert!(prompt.contains("Golden Gate Bridge"));
    assert!(!prompt.contains("Pizza"));
}

#[tokio::test]
async fn test_irrelevant_question_falls_back_without_generation() {
    let (session, _, generator) = session();
    session.ingest(&fixture("notes.txt")).await.unwrap();

    let answer = session
        .answer_reranked("What is the capital of France?")
        .await
        .unwrap();

    assert!(answer.fallback);
    assert_eq!(answer.answer, NO_CONTEXT_FALLBACK);
    assert_eq!(answer.kept().count(), 0);
    assert_eq!(generator.judgments(), 3);
    assert_eq!(generator.answers(), 0);
}

#[tokio::test]
async fn test_new_document_replaces_the_old_one() {
    let (session, _, _) = session();
    session.ingest(&fixture("notes.txt")).await.unwrap();

    let report = session.ingest("Mars is red.").await.unwrap();
    assert_eq!(report.chunk_count, 1);

    let results = session.query("pizza", 5).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].content(), "Mars is red.");
}

#[tokio::test]
async fn test_source_filter_limits_the_search() {
    let (session, _, _) = session();
    session
        .ingest_sources(&[
            ("kitchen", "Pizza needs cheese and a hot oven."),
            ("space", "Mars is the red planet."),
        ])
        .await
        .unwrap();

    let all = session.query("the red planet", 2).await.unwrap();
    assert_eq!(all[0].content(), "Mars is the red planet.");

    let kitchen = MetadataFilter::new().with("source", "kitchen");
    let results = session
        .query_filtered("the red planet", 2, &kitchen)
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].content(), "Pizza needs cheese and a hot oven.");
    assert_eq!(results[0].entry.metadata["source"], json!("kitchen"));
}

#[tokio::test]
async fn test_cache_miss_then_hit() {
    let (session, _, generator) = session();

    let first = session.ask_with_cache("Why is Mars red?").await.unwrap();
    assert!(!first.is_hit);
    assert_eq!(first.source, AnswerSource::Llm);

    let second = session.ask_with_cache("Why is Mars red?").await.unwrap();
    assert!(second.is_hit);
    assert_eq!(second.source, AnswerSource::Cache);
    assert_eq!(second.similarity, 1.0);
    assert_eq!(second.answer, first.answer);
    assert_eq!(generator.answers(), 1);

    // The cache does not need a document.
    assert_eq!(session.stats().await.index.count, 0);
}

#[tokio::test]
async fn test_cache_threshold_is_strict() {
    // cos([1,0,0,0,0], [17,9,5,2,1]) == 17/20 == 0.85
    let (session, _, generator) = session_with(
        KeywordEmbedder::new()
            .with_override("first question", vec![1.0, 0.0, 0.0, 0.0, 0.0])
            .with_override("second question", vec![17.0, 9.0, 5.0, 2.0, 1.0]),
    );

    session.ask_with_cache("first question").await.unwrap();
    let second = session.ask_with_cache("second question").await.unwrap();

    assert!(!second.is_hit);
    assert_eq!(second.similarity, 0.85);
    assert_eq!(generator.answers(), 2);
}

#[tokio::test]
async fn test_clear_cache_forces_regeneration() {
    let (session, _, generator) = session();

    session.ask_with_cache("Why is Mars red?").await.unwrap();
    session.clear_cache().await;
    let again = session.ask_with_cache("Why is Mars red?").await.unwrap();

    assert!(!again.is_hit);
    assert_eq!(again.answer, "answer #2");
    assert_eq!(generator.answers(), 2);
}

#[tokio::test]
async fn test_blank_query_is_rejected_everywhere() {
    let (session, embedder, _) = session();
    session.ingest(&fixture("notes.txt")).await.unwrap();
    let calls = embedder.calls();

    assert!(matches!(session.query(" ", 3).await, Err(RetrievalError::EmptyQuery)));
    assert!(matches!(
        session.answer_reranked("").await,
        Err(RetrievalError::EmptyQuery)
    ));
    assert!(matches!(
        session.ask_with_cache("\n").await,
        Err(RetrievalError::EmptyQuery)
    ));
    assert_eq!(embedder.calls(), calls);
}

#[tokio::test]
async fn test_cached_answers_over_ollama() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "nomic-embed-text",
            "embeddings": [[0.1, 0.7, 0.2, 0.4]]
        })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "qwen2.5:1.5b",
            "message": { "role": "assistant", "content": "Paris." },
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = RagSession::new(RetrievalConfig::default().with_ollama(OllamaConfig {
        base_url: server.uri(),
        ..OllamaConfig::default()
    }))
    .unwrap();

    let first = session
        .ask_with_cache("What is the capital of France?")
        .await
        .unwrap();
    let second = session
        .ask_with_cache("What's France's capital city?")
        .await
        .unwrap();

    assert!(!first.is_hit);
    assert!(second.is_hit);
    assert_eq!(second.answer, "Paris.");
    assert_eq!(
        second.matched_query.as_deref(),
        Some("What is the capital of France?")
    );
}

#[tokio::test]
async fn test_ollama_outage_during_ingestion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(503).set_body_string("model loading"))
        .mount(&server)
        .await;

    let session = RagSession::new(RetrievalConfig::default().with_ollama(OllamaConfig {
        base_url: server.uri(),
        ..OllamaConfig::default()
    }))
    .unwrap();

    let result = session.ingest(&fixture("notes.txt")).await;
    assert!(matches!(result, Err(RetrievalError::IngestionFailed(_))));
    assert_eq!(session.stats().await.index.count, 0);
}
