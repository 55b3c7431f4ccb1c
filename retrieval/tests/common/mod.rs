//! Deterministic providers shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use docqa_retrieval::prompts::RELEVANCE_SYSTEM_PROMPT;
use docqa_retrieval::{
    Embedding, EmbeddingError, EmbeddingProvider, GenerationError, GenerationProvider,
};

/// Words the keyword embedder counts, one dimension each.
pub const VOCABULARY: [&str; 9] = [
    "bridge", "golden", "gate", "pizza", "cheese", "oven", "mars", "red", "planet",
];

/// Get the path to the test fixtures directory.
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// Read a fixture file.
pub fn fixture(name: &str) -> String {
    std::fs::read_to_string(fixtures_dir().join(name)).unwrap()
}

/// Install a test subscriber so `RUST_LOG=debug` shows engine logs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

/// Embeds text as a bag of [`VOCABULARY`] word counts.
///
/// Texts registered with [`KeywordEmbedder::with_override`] get a fixed
/// vector instead.
#[derive(Default)]
pub struct KeywordEmbedder {
    overrides: HashMap<String, Embedding>,
    calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_override(mut self, text: &str, embedding: Vec<f32>) -> Self {
        self.overrides.insert(text.to_string(), embedding);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn name(&self) -> &str {
        "keyword"
    }

    fn model(&self) -> &str {
        "bag-of-words"
    }

    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(embedding) = self.overrides.get(text) {
            return Ok(embedding.clone());
        }

        let mut embedding = vec![0.0; VOCABULARY.len()];
        for word in words(text) {
            if let Some(slot) = VOCABULARY.iter().position(|v| *v == word) {
                embedding[slot] += 1.0;
            }
        }
        Ok(embedding)
    }
}

/// Judges relevance by shared vocabulary and answers everything else with a
/// numbered reply.
#[derive(Default)]
pub struct KeywordGenerator {
    judgments: AtomicUsize,
    answers: AtomicUsize,
    last_prompt: std::sync::Mutex<Option<String>>,
}

impl KeywordGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn judgments(&self) -> usize {
        self.judgments.load(Ordering::SeqCst)
    }

    pub fn answers(&self) -> usize {
        self.answers.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().ok().and_then(|p| p.clone())
    }
}

#[async_trait]
impl GenerationProvider for KeywordGenerator {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, GenerationError> {
        if system_prompt == RELEVANCE_SYSTEM_PROMPT {
            self.judgments.fetch_add(1, Ordering::SeqCst);
            let (query, document) = user_prompt
                .strip_prefix("Query: ")
                .and_then(|rest| rest.split_once("\nDocument: "))
                .ok_or_else(|| GenerationError::InvalidResponse(user_prompt.to_string()))?;

            let query_words: Vec<String> = words(query)
                .filter(|w| VOCABULARY.contains(&w.as_str()))
                .collect();
            let shared = words(document).any(|w| query_words.contains(&w));
            return Ok(if shared { "8" } else { "1" }.to_string());
        }

        let n = self.answers.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut last) = self.last_prompt.lock() {
            *last = Some(user_prompt.to_string());
        }
        Ok(format!("answer #{n}"))
    }
}
