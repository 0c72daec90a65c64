//! Sentence-boundary text chunker.
//!
//! Flattens the input to a single line (newline and whitespace runs become
//! one space) and splits it after `.`, `!`, or `?` when the next word
//! starts with an uppercase Latin letter or a Hangul syllable. Paragraph
//! and section structure is not preserved.
//!
//! `max_chunk_size` is accepted but not enforced: a sentence longer than
//! the limit is emitted whole rather than re-split.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Default upper bound handed to [`chunk_text`] by document extraction.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 4000;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\t\n\x0B\x0C\r ]+").unwrap());

// Group 1 is the gap between sentences; the punctuation and the capital
// stay with their own segments.
static SENTENCE_GAP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]([\t\n\x0B\x0C\r ]+)[A-Z\u{AC00}-\u{D7A3}]").unwrap());

/// One segment of extracted text with its 0-based position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkInfo {
    pub text: String,
    pub chunk_index: usize,
}

/// Split `text` into sentence chunks with contiguous indices starting at 0.
/// Empty or all-whitespace input yields no chunks.
pub fn chunk_text(text: &str, max_chunk_size: usize) -> Vec<ChunkInfo> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    for sentence in split_sentences(text) {
        if sentence.chars().count() > max_chunk_size {
            tracing::debug!(
                len = sentence.chars().count(),
                max_chunk_size,
                "sentence exceeds max chunk size; kept whole"
            );
        }
        chunks.push(ChunkInfo {
            text: sentence,
            chunk_index: chunks.len(),
        });
    }
    chunks
}

fn split_sentences(text: &str) -> Vec<String> {
    let flat = WHITESPACE_RUN.replace_all(text, " ");
    let flat = flat.trim();

    let mut sentences = Vec::new();
    let mut start = 0;
    for caps in SENTENCE_GAP.captures_iter(flat) {
        let Some(gap) = caps.get(1) else { continue };
        push_trimmed(&mut sentences, &flat[start..gap.start()]);
        start = gap.end();
    }
    push_trimmed(&mut sentences, &flat[start..]);
    sentences
}

fn push_trimmed(out: &mut Vec<String>, part: &str) {
    let trimmed = part.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}
