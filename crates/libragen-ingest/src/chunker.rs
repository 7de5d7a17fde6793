//! Recursive character chunking with overlap.
//!
//! The splitter is greedy: each window takes up to `chunk_size` characters
//! and breaks at the best available boundary, preferring paragraph breaks
//! (`\n\n`), then line breaks, then spaces, then a hard cut. Successive
//! windows overlap by exactly `chunk_overlap` characters so no boundary
//! context is lost. Offsets are character-based; line spans are 1-based
//! and inclusive.

use tracing::trace;

/// Chunking parameters.
#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared between successive chunks.
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
        }
    }
}

/// One chunk of a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub content: String,
    /// 1-based first line covered by this chunk.
    pub start_line: u32,
    /// 1-based last line covered by this chunk (inclusive).
    pub end_line: u32,
}

/// Break-point preference, best first. The empty terminator stands for a
/// hard cut at the window edge.
const SEPARATORS: &[&[char]] = &[&['\n', '\n'], &['\n'], &[' ']];

/// Split `text` into overlapping chunks.
///
/// Empty and all-whitespace input produces no chunks, as do windows that
/// contain only whitespace.
#[must_use]
pub fn chunk_text(text: &str, config: &ChunkerConfig) -> Vec<Chunk> {
    if text.trim().is_empty() || config.chunk_size == 0 {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let line_starts = line_numbers(&chars);

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let hard_end = (start + config.chunk_size).min(chars.len());
        let end = if hard_end == chars.len() {
            hard_end
        } else {
            find_break(&chars, start, hard_end)
        };

        let content: String = chars[start..end].iter().collect();
        if !content.trim().is_empty() {
            chunks.push(Chunk {
                content,
                start_line: line_starts[start],
                end_line: line_starts[end - 1],
            });
        }

        if end == chars.len() {
            break;
        }

        // Overlap the next window by exactly `chunk_overlap` characters,
        // always making forward progress.
        let next = end.saturating_sub(config.chunk_overlap);
        start = if next > start { next } else { end };
    }

    trace!(chunks = chunks.len(), chars = chars.len(), "chunked text");
    chunks
}

/// Find the best break position in `[start, hard_end)`: the latest
/// occurrence of the highest-preference separator in the second half of
/// the window, else a hard cut. Returns the exclusive chunk end.
fn find_break(chars: &[char], start: usize, hard_end: usize) -> usize {
    let min_break = start + (hard_end - start) / 2;

    for sep in SEPARATORS {
        if hard_end - start < sep.len() {
            continue;
        }
        let mut i = hard_end - sep.len();
        while i > min_break {
            if &chars[i..i + sep.len()] == *sep {
                return i + sep.len();
            }
            i -= 1;
        }
    }
    hard_end
}

/// 1-based line number of each character.
fn line_numbers(chars: &[char]) -> Vec<u32> {
    let mut lines = Vec::with_capacity(chars.len());
    let mut line = 1u32;
    for c in chars {
        lines.push(line);
        if *c == '\n' {
            line += 1;
        }
    }
    lines
}
