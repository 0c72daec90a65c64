//! Page-range extraction with size-based routing.
//!
//! Small documents are extracted in one pass over the page range
//! (direct mode). Documents whose declared size exceeds the threshold are
//! extracted in page groups (segmented mode), each group chunked on its
//! own and re-indexed into one continuous sequence.
//!
//! Every chunk is then cleaned for display, spaced around operators, and
//! flagged for formulas. Detection runs on the chunk text as extracted,
//! before any normalization, so symbol spacing is seen as-is.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};

use crate::chunk::{chunk_text, ChunkInfo};
use crate::clean::{clean, CleanOptions};
use crate::extract::{ExtractError, PagedSource};
use crate::formula::has_formula;

/// Used when neither metadata nor the first page yields a title.
pub const UNKNOWN_TITLE: &str = "Unknown Title";

static OPERATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*([=+\-*/<>≤≥≠])\s*").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractSettings {
    pub start_page: u32,
    /// `None` means through the last page.
    pub end_page: Option<u32>,
    pub size_threshold_bytes: u64,
    pub max_chunk_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    Direct,
    Segmented,
}

/// A chunk ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedChunk {
    pub text: String,
    pub chunk_index: usize,
    pub has_formula: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub mode: ExtractionMode,
    /// Inclusive page range actually read; `None` when nothing was in range.
    pub pages: Option<(u32, u32)>,
    pub full_text: String,
    pub chunks: Vec<ProcessedChunk>,
}

/// Pages per group in segmented mode, by length of the page range.
pub fn pages_per_group(total_pages: u32) -> u32 {
    match total_pages {
        0..=50 => 10,
        51..=200 => 20,
        _ => 50,
    }
}

pub fn mode_for(byte_size: u64, threshold: u64) -> ExtractionMode {
    if byte_size > threshold {
        ExtractionMode::Segmented
    } else {
        ExtractionMode::Direct
    }
}

/// Extract and chunk the configured page range of `doc`.
///
/// `end_page` is clamped to the last page. A `start_page` past the end of
/// the document is not an error: the result is empty.
pub fn extract(doc: &dyn PagedSource, settings: &ExtractSettings) -> Result<Extraction, ExtractError> {
    let mode = mode_for(doc.byte_size(), settings.size_threshold_bytes);
    let total = doc.page_count();
    let start = settings.start_page.max(1);
    let end = settings.end_page.unwrap_or(total).min(total);

    if start > total || start > end {
        warn!(start, end, total, "start page beyond document; nothing to extract");
        return Ok(Extraction {
            mode,
            pages: None,
            full_text: String::new(),
            chunks: Vec::new(),
        });
    }

    info!(?mode, start, end, total, "extracting pages");
    let (full_text, raw_chunks) = match mode {
        ExtractionMode::Direct => {
            let text = doc.extract_pages(start, end)?;
            let chunks = chunk_text(&text, settings.max_chunk_size);
            (text, chunks)
        }
        ExtractionMode::Segmented => extract_segmented(doc, start, end, settings.max_chunk_size)?,
    };

    let chunks = raw_chunks.into_iter().map(process_chunk).collect();

    Ok(Extraction {
        mode,
        pages: Some((start, end)),
        full_text,
        chunks,
    })
}

fn extract_segmented(
    doc: &dyn PagedSource,
    start: u32,
    end: u32,
    max_chunk_size: usize,
) -> Result<(String, Vec<ChunkInfo>), ExtractError> {
    let group = pages_per_group(end - start + 1);
    let mut full_text = String::new();
    let mut all_chunks: Vec<ChunkInfo> = Vec::new();

    let mut group_start = start;
    while group_start <= end {
        let group_end = group_start.saturating_add(group - 1).min(end);
        let text = doc.extract_pages(group_start, group_end)?;
        if group_start > start {
            full_text.push('\n');
        }
        full_text.push_str(&text);

        // Indices continue across groups.
        for chunk in chunk_text(&text, max_chunk_size) {
            all_chunks.push(ChunkInfo {
                text: chunk.text,
                chunk_index: all_chunks.len(),
            });
        }

        group_start = group_end + 1;
    }

    Ok((full_text, all_chunks))
}

fn process_chunk(chunk: ChunkInfo) -> ProcessedChunk {
    ProcessedChunk {
        has_formula: has_formula(&chunk.text),
        text: process_text(&chunk.text),
        chunk_index: chunk.chunk_index,
    }
}

/// Display cleanup for a chunk. Falls back to the input when cleaning
/// would leave nothing.
pub fn process_text(text: &str) -> String {
    if text.trim().is_empty() {
        return text.to_string();
    }
    match clean(Some(text), CleanOptions::STRUCTURAL) {
        Some(cleaned) if !cleaned.trim().is_empty() => {
            normalize_whitespace(&normalize_operators(&cleaned))
        }
        _ => text.to_string(),
    }
}

fn normalize_operators(text: &str) -> String {
    OPERATOR.replace_all(text, " $1 ").into_owned()
}

fn normalize_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Document title: declared metadata first, then the first plausible
/// line of page 1, then [`UNKNOWN_TITLE`].
pub fn extract_title(doc: &dyn PagedSource) -> String {
    if let Some(title) = doc.metadata_title() {
        return title;
    }
    if doc.page_count() == 0 {
        return UNKNOWN_TITLE.to_string();
    }

    match doc.extract_pages(1, 1) {
        Ok(first_page) => first_page
            .lines()
            .map(str::trim)
            .find(|line| is_title_candidate(line))
            .map(str::to_string)
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
        Err(e) => {
            warn!(error = %e, "title extraction failed");
            UNKNOWN_TITLE.to_string()
        }
    }
}

fn is_title_candidate(line: &str) -> bool {
    let len = line.chars().count();
    len > 10
        && len < 200
        && !line.to_lowercase().contains("page")
        && !line.chars().any(|c| c.is_ascii_digit())
}
