//! Document chunking for ingestion.
//!
//! Splits raw text into overlapping chunks. Three strategies are supported:
//!
//! - [`ChunkStrategy::Fixed`] cuts windows of exactly `size` characters.
//! - [`ChunkStrategy::Recursive`] cuts at `size` characters when that falls
//!   between words. When it would split a word, the cut is pulled back to the
//!   last paragraph break, line break or space inside the window, in that
//!   order of preference, keeping the separator at the end of the chunk.
//! - [`ChunkStrategy::Token`] treats `size`/`overlap` as token counts at four
//!   characters per token and cuts fixed windows.
//!
//! Sizes are counted in characters, offsets are byte offsets into the
//! source, and every strategy advances by at least one character per chunk.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RetrievalError};

/// Characters per token used by [`ChunkStrategy::Token`].
pub const CHARS_PER_TOKEN: usize = 4;

/// Cut points tried by the recursive strategy, most preferred first.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// A chunk of text extracted from a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique identifier for this chunk.
    pub id: String,

    /// The actual text content.
    pub content: String,

    /// Byte offset of the first character in the source document.
    pub start_offset: usize,

    /// Byte offset one past the last character.
    pub end_offset: usize,
}

impl Chunk {
    fn from_source(text: &str, start_offset: usize, end_offset: usize) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: text[start_offset..end_offset].to_string(),
            start_offset,
            end_offset,
        }
    }

    /// Estimate token count (rough approximation: ~4 chars per token).
    pub fn estimated_tokens(&self) -> usize {
        self.content.chars().count().div_ceil(CHARS_PER_TOKEN)
    }
}

/// How text is split into chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    /// Exact windows of `size` characters.
    Fixed,
    /// Windows pulled back to the nearest natural boundary.
    #[default]
    Recursive,
    /// Fixed windows sized in approximate tokens.
    Token,
}

/// Parameters for a chunking run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkParams {
    /// Splitting strategy.
    pub strategy: ChunkStrategy,

    /// Maximum chunk length (characters, or tokens for `Token`).
    pub size: usize,

    /// How much of the previous chunk the next one repeats.
    pub overlap: usize,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            strategy: ChunkStrategy::Recursive,
            size: 500,
            overlap: 50,
        }
    }
}

/// Splits documents according to a fixed set of [`ChunkParams`].
#[derive(Debug, Clone)]
pub struct Chunker {
    params: ChunkParams,
}

impl Chunker {
    /// Create a chunker, rejecting a zero `size`.
    pub fn new(params: ChunkParams) -> Result<Self> {
        if params.size == 0 {
            return Err(RetrievalError::InvalidParameter(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        Ok(Self { params })
    }

    /// The parameters this chunker was built with.
    pub fn params(&self) -> &ChunkParams {
        &self.params
    }

    /// Chunk text content. Empty input yields no chunks.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        if text.is_empty() {
            return Vec::new();
        }

        // Byte offset of every char boundary, including the end of input.
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(offset, _)| offset)
            .chain(std::iter::once(text.len()))
            .collect();

        let ChunkParams {
            strategy,
            size,
            overlap,
        } = self.params;

        let windows = match strategy {
            ChunkStrategy::Fixed => fixed_windows(bounds.len() - 1, size, overlap),
            ChunkStrategy::Recursive => recursive_windows(text, &bounds, size, overlap),
            ChunkStrategy::Token => fixed_windows(
                bounds.len() - 1,
                size.saturating_mul(CHARS_PER_TOKEN),
                overlap.saturating_mul(CHARS_PER_TOKEN),
            ),
        };

        windows
            .into_iter()
            .map(|(start, end)| Chunk::from_source(text, bounds[start], bounds[end]))
            .collect()
    }
}

/// Chunk `text` with `params` in one call.
pub fn chunk(text: &str, params: &ChunkParams) -> Result<Vec<Chunk>> {
    Ok(Chunker::new(params.clone())?.chunk(text))
}

/// Character windows `[start, end)` for the fixed strategy.
fn fixed_windows(len: usize, size: usize, overlap: usize) -> Vec<(usize, usize)> {
    let step = size.saturating_sub(overlap).max(1);
    let mut windows = Vec::new();
    let mut start = 0;

    while start < len {
        let end = (start + size).min(len);
        windows.push((start, end));
        if end == len {
            break;
        }
        start += step;
    }

    windows
}

/// Character windows `[start, end)` for the recursive strategy.
fn recursive_windows(
    text: &str,
    bounds: &[usize],
    size: usize,
    overlap: usize,
) -> Vec<(usize, usize)> {
    let len = bounds.len() - 1;
    let mut windows = Vec::new();
    let mut start = 0;

    while start < len {
        let hard_end = (start + size).min(len);
        let end = if hard_end < len && !at_word_boundary(text, bounds, hard_end) {
            snap_to_separator(text, bounds, start, hard_end).unwrap_or(hard_end)
        } else {
            hard_end
        };

        windows.push((start, end));
        if end == len {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }

    windows
}

/// Whether a cut at character position `pos` falls between tokens, i.e. a
/// separator character sits right before or right after it.
fn at_word_boundary(text: &str, bounds: &[usize], pos: usize) -> bool {
    let is_separator = |c: char| c == ' ' || c == '\n';
    let before = text[bounds[pos - 1]..bounds[pos]].chars().next();
    let after = text[bounds[pos]..].chars().next();
    before.is_some_and(is_separator) || after.is_some_and(is_separator)
}

/// Find the preferred cut inside the window `[start, hard_end)`.
///
/// Returns the character position just past the last separator that begins
/// strictly after `start`, trying separators in preference order.
fn snap_to_separator(text: &str, bounds: &[usize], start: usize, hard_end: usize) -> Option<usize> {
    let window_start = bounds[start];
    let window = &text[window_start..bounds[hard_end]];

    SEPARATORS.iter().find_map(|separator| {
        let found = window.rfind(separator).filter(|offset| *offset > 0)?;
        let cut = window_start + found + separator.len();
        bounds.binary_search(&cut).ok()
    })
}
