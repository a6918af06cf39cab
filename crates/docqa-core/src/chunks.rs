//! Splits page text into overlapping chunks for embedding and search.
//! Prefers paragraph boundaries; falls back to line breaks, sentence ends, spaces, then a hard cut.
//!
//! Sizes and offsets are counted in characters, not bytes. A chunk is always an
//! exact slice of its page, and chunk `i + 1` starts `chunk_overlap` characters
//! before chunk `i` ends.

use tracing::debug;

use crate::document::Page;

/// Default target characters per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default characters shared by consecutive chunks.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Cut points, best first. Separators on the same level compete by position.
const BOUNDARIES: &[&[&str]] = &[&["\n\n"], &["\n"], &[". ", "? ", "! "], &[" "]];

/// Validated chunking parameters: `chunk_overlap < chunk_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl ChunkConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ChunkError> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(ChunkError::InvalidConfig {
                chunk_size,
                chunk_overlap,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// A chunk of page text, with source reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    /// Page the text came from (0-based).
    pub page: usize,
    /// Character offset of the first character within the page.
    pub start: usize,
    /// Character offset one past the last character within the page.
    pub end: usize,
    /// Position of this chunk in the whole document's chunk sequence.
    pub ordinal: usize,
}

/// Character range `[start, end)` produced by [`split_text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// Chunk every page. Pages with only whitespace produce nothing.
pub fn chunk_pages(pages: &[Page], config: &ChunkConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for page in pages {
        if page.text.trim().is_empty() {
            debug!(page = page.index, "Skipping empty page");
            continue;
        }
        let chars: Vec<char> = page.text.chars().collect();
        for span in split_chars(&chars, config) {
            chunks.push(Chunk {
                text: chars[span.start..span.end].iter().collect(),
                page: page.index,
                start: span.start,
                end: span.end,
                ordinal: chunks.len(),
            });
        }
    }
    chunks
}

/// Splits `text` into overlapping character spans of at most `chunk_size`.
pub fn split_text(text: &str, config: &ChunkConfig) -> Vec<Span> {
    let chars: Vec<char> = text.chars().collect();
    split_chars(&chars, config)
}

fn split_chars(chars: &[char], config: &ChunkConfig) -> Vec<Span> {
    let len = chars.len();
    let mut spans = Vec::new();
    if len == 0 {
        return spans;
    }
    let mut start = 0;
    loop {
        let limit = start + config.chunk_size;
        if limit >= len {
            spans.push(Span { start, end: len });
            break;
        }
        // A cut must leave more than the overlap behind, or the next chunk would not advance.
        let end = find_boundary(chars, start, start + config.chunk_overlap + 1, limit).unwrap_or(limit);
        spans.push(Span { start, end });
        start = end - config.chunk_overlap;
    }
    spans
}

/// Latest cut position in `[min_end, max_end]` on the best boundary level that has one.
/// The separator ends at the returned position, so it stays with the earlier chunk.
fn find_boundary(chars: &[char], start: usize, min_end: usize, max_end: usize) -> Option<usize> {
    for level in BOUNDARIES {
        let best = level
            .iter()
            .filter_map(|sep| last_match_end(chars, sep, start, min_end, max_end))
            .max();
        if best.is_some() {
            return best;
        }
    }
    None
}

fn last_match_end(chars: &[char], sep: &str, start: usize, min_end: usize, max_end: usize) -> Option<usize> {
    let sep: Vec<char> = sep.chars().collect();
    let lowest = min_end.max(start + sep.len());
    (lowest..=max_end)
        .rev()
        .find(|&end| chars[end - sep.len()..end] == sep[..])
}

#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("invalid chunking: chunk_size {chunk_size} must be greater than chunk_overlap {chunk_overlap}")]
    InvalidConfig {
        chunk_size: usize,
        chunk_overlap: usize,
    },
}
