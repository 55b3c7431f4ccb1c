//! Scripted providers for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use docqa_embeddings::{Embedding, EmbeddingError, EmbeddingProvider};

use crate::error::GenerationError;
use crate::generation::GenerationProvider;

/// Embeds texts by table lookup. Unknown texts fail.
#[derive(Default)]
pub(crate) struct TableEmbedder {
    table: HashMap<String, Embedding>,
    fail_all: bool,
    calls: AtomicUsize,
}

impl TableEmbedder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with(mut self, text: &str, embedding: Vec<f32>) -> Self {
        self.table.insert(text.to_string(), embedding);
        self
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for TableEmbedder {
    fn name(&self) -> &str {
        "table"
    }

    fn model(&self) -> &str {
        "table"
    }

    async fn embed(&self, text: &str) -> docqa_embeddings::Result<Embedding> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_all {
            return Err(EmbeddingError::ApiRequest("provider unavailable".to_string()));
        }
        self.table
            .get(text)
            .cloned()
            .ok_or_else(|| EmbeddingError::InvalidResponse(format!("no embedding for {text:?}")))
    }
}

/// Replies from a queue of canned results and records every prompt.
#[derive(Default)]
pub(crate) struct ScriptedGenerator {
    replies: Mutex<Vec<std::result::Result<String, String>>>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedGenerator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reply(self, text: &str) -> Self {
        self.push(Ok(text.to_string()))
    }

    pub(crate) fn fail(self, message: &str) -> Self {
        self.push(Err(message.to_string()))
    }

    fn push(self, reply: std::result::Result<String, String>) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push(reply);
        }
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or_default()
    }

    pub(crate) fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl GenerationProvider for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> std::result::Result<String, GenerationError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push((system_prompt.to_string(), user_prompt.to_string()));
        }
        let next = self.replies.lock().ok().and_then(|mut replies| {
            if replies.is_empty() {
                None
            } else {
                Some(replies.remove(0))
            }
        });
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(GenerationError::ApiRequest(message)),
            None => Err(GenerationError::InvalidResponse("no scripted reply left".to_string())),
        }
    }
}
