//! Similarity computation for embeddings.

use std::cmp::Reverse;

use ordered_float::OrderedFloat;

use crate::error::{EmbeddingError, Result};

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 means identical direction
/// - 0.0 means orthogonal vectors, or that either vector has zero magnitude
/// - -1.0 means opposite vectors
///
/// Sums are accumulated in `f64` and the denominator is taken as
/// `sqrt(|a|² · |b|²)`, so `cosine_similarity(v, v)` is exactly `1.0` for
/// any non-zero `v`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    let score = dot / (norm_a * norm_b).sqrt();
    Ok(score.clamp(-1.0, 1.0) as f32)
}

/// Score every candidate against `query` and return the `k` best as
/// `(position, score)` pairs, highest score first.
///
/// Candidates with equal scores keep their input order.
pub fn rank_top_k<'a, I>(query: &[f32], candidates: I, k: usize) -> Result<Vec<(usize, f32)>>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut scores: Vec<(usize, OrderedFloat<f32>)> = Vec::new();
    for (position, embedding) in candidates.into_iter().enumerate() {
        let score = cosine_similarity(query, embedding)?;
        scores.push((position, OrderedFloat(score)));
    }

    // Stable sort: ties stay in insertion order.
    scores.sort_by_key(|(_, score)| Reverse(*score));
    scores.truncate(k);

    Ok(scores
        .into_iter()
        .map(|(position, score)| (position, score.0))
        .collect())
}
