//! Second-pass relevance filtering of retrieved candidates.
//!
//! Every candidate is scored 0-10 by a [`RelevanceJudge`]. Judgments run
//! concurrently, but filtering only starts once all of them have finished.
//! A judgment that fails counts as the lowest score and never aborts the
//! batch.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use regex_lite::Regex;
use tracing::{debug, warn};

use crate::config::RerankConfig;
use crate::error::{JudgeError, Result, RetrievalError};
use crate::generation::GenerationProvider;
use crate::prompts::{RELEVANCE_SYSTEM_PROMPT, relevance_prompt};
use crate::retriever::ScoredCandidate;

/// Highest score a judge can give.
pub const MAX_RELEVANCE: f32 = 10.0;

/// A numeric range such as `0-10`, or a possibly negative number.
static SCORE_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?P<range>\d+(?:\.\d+)?\s*-\s*\d+(?:\.\d+)?)|(?P<score>-?\d+(?:\.\d+)?)").ok()
});

/// Scores how relevant a document is to a query.
#[async_trait]
pub trait RelevanceJudge: Send + Sync {
    /// Score `content` against `query` on a 0-10 scale.
    async fn judge(&self, query: &str, content: &str) -> std::result::Result<f32, JudgeError>;
}

/// A judge that asks the generation provider for a score.
pub struct LlmJudge {
    generator: Arc<dyn GenerationProvider>,
}

impl LlmJudge {
    /// Create a judge backed by `generator`.
    pub fn new(generator: Arc<dyn GenerationProvider>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl RelevanceJudge for LlmJudge {
    async fn judge(&self, query: &str, content: &str) -> std::result::Result<f32, JudgeError> {
        let reply = self
            .generator
            .generate(RELEVANCE_SYSTEM_PROMPT, &relevance_prompt(query, content))
            .await?;
        parse_score(&reply)
    }
}

/// Read the score out of a judge reply.
///
/// A line holding nothing but a number wins. Otherwise the last number in
/// the reply is used, ignoring range bounds (`0-10`) and denominators
/// (`/10`, `out of 10`). Negative scores are returned as is.
pub fn parse_score(reply: &str) -> std::result::Result<f32, JudgeError> {
    let standalone = reply.lines().rev().find_map(|line| {
        let line = line.trim();
        let numeric =
            !line.is_empty() && line.chars().all(|c| c.is_ascii_digit() || c == '.' || c == '-');
        if numeric { line.parse::<f32>().ok() } else { None }
    });

    standalone
        .or_else(|| {
            SCORE_PATTERN.as_ref().and_then(|pattern| {
                pattern
                    .captures_iter(reply)
                    .filter_map(|caps| caps.name("score"))
                    .filter(|found| !is_denominator(&reply[..found.start()]))
                    .filter_map(|found| found.as_str().parse::<f32>().ok())
                    .last()
            })
        })
        .ok_or_else(|| JudgeError::MalformedScore(reply.to_string()))
}

fn is_denominator(preceding: &str) -> bool {
    let preceding = preceding.trim_end();
    preceding.ends_with('/') || preceding.to_ascii_lowercase().ends_with("out of")
}

/// Result of a reranking pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankOutcome {
    /// Every candidate in input order, with `rerank_score` and `keep` set.
    pub candidates: Vec<ScoredCandidate>,
}

impl RerankOutcome {
    /// Candidates that met the keep threshold.
    pub fn kept(&self) -> impl Iterator<Item = &ScoredCandidate> {
        self.candidates.iter().filter(|c| c.keep)
    }

    /// Whether at least one candidate survived.
    pub fn has_relevant(&self) -> bool {
        self.candidates.iter().any(|c| c.keep)
    }

    /// The surviving candidates, or [`RetrievalError::NoRelevantContext`]
    /// when none survived.
    pub fn into_kept(self) -> Result<Vec<ScoredCandidate>> {
        let kept: Vec<ScoredCandidate> = self.candidates.into_iter().filter(|c| c.keep).collect();
        if kept.is_empty() {
            return Err(RetrievalError::NoRelevantContext);
        }
        Ok(kept)
    }
}

/// Filters candidates by judge score.
#[derive(Debug, Clone)]
pub struct Reranker {
    keep_threshold: f32,
    max_concurrency: usize,
}

impl Reranker {
    /// Create a reranker that keeps candidates scoring at least `keep_threshold`.
    pub fn new(keep_threshold: f32, max_concurrency: usize) -> Self {
        Self {
            keep_threshold,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Create a reranker from the `[rerank]` config section.
    pub fn from_config(config: &RerankConfig) -> Self {
        Self::new(config.keep_threshold, config.max_concurrency)
    }

    /// Minimum score a candidate needs to be kept.
    pub fn keep_threshold(&self) -> f32 {
        self.keep_threshold
    }

    /// Score every candidate and mark which ones to keep.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: Vec<ScoredCandidate>,
        judge: &dyn RelevanceJudge,
    ) -> Result<RerankOutcome> {
        if query.trim().is_empty() {
            return Err(RetrievalError::EmptyQuery);
        }

        // `buffered` yields in input order; collecting waits for every judgment.
        let scores: Vec<Option<f32>> = stream::iter(
            candidates
                .iter()
                .map(|candidate| judge_one(judge, query, candidate.content())),
        )
        .buffered(self.max_concurrency)
        .collect()
        .await;

        let candidates: Vec<ScoredCandidate> = candidates
            .into_iter()
            .zip(scores)
            .map(|(mut candidate, score)| {
                candidate.rerank_score = Some(score.unwrap_or(0.0));
                candidate.keep = score.is_some_and(|s| s >= self.keep_threshold);
                candidate
            })
            .collect();

        let outcome = RerankOutcome { candidates };
        debug!(
            "Reranking kept {} of {} candidates",
            outcome.kept().count(),
            outcome.candidates.len()
        );
        Ok(outcome)
    }
}

impl Default for Reranker {
    fn default() -> Self {
        Self::from_config(&RerankConfig::default())
    }
}

/// Run one judgment. `None` means the judgment failed.
async fn judge_one(judge: &dyn RelevanceJudge, query: &str, content: &str) -> Option<f32> {
    match judge.judge(query, content).await {
        Ok(score) if score.is_nan() => {
            warn!("Relevance judge returned NaN, treating as irrelevant");
            None
        }
        Ok(score) => Some(score.clamp(0.0, MAX_RELEVANCE)),
        Err(err) => {
            warn!("Relevance judgment failed, treating as irrelevant: {err}");
            None
        }
    }
}
