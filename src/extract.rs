//! Paginated document sources.
//!
//! A [`PagedSource`] exposes a page count, document-level metadata, and
//! text for an inclusive 1-based page range. [`PdfSource`] implements it
//! for PDF bytes: `lopdf` reads the page tree and the Info dictionary,
//! `pdf-extract` produces per-page text once at open time.

use std::path::Path;

use lopdf::{Dictionary, Object};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("page range {start}-{end} outside document with {pages} pages")]
    PageRange { start: u32, end: u32, pages: u32 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub trait PagedSource: Send + Sync {
    fn page_count(&self) -> u32;

    /// Declared size of the underlying file, in bytes.
    fn byte_size(&self) -> u64;

    /// Title from document metadata, if one is declared.
    fn metadata_title(&self) -> Option<String>;

    /// Text of pages `start..=end` (1-based), pages separated by newlines.
    fn extract_pages(&self, start: u32, end: u32) -> Result<String, ExtractError>;
}

/// A PDF loaded fully into memory.
pub struct PdfSource {
    pages: Vec<String>,
    title: Option<String>,
    byte_size: u64,
}

impl PdfSource {
    pub fn open(path: &Path) -> Result<Self, ExtractError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ExtractError> {
        let doc = lopdf::Document::load_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;
        let title = info_title(&doc);
        let page_count = doc.get_pages().len();

        let mut pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
            .map_err(|e| ExtractError::Pdf(e.to_string()))?;
        // Keep the page tree as the source of truth for the count.
        pages.resize(page_count, String::new());

        Ok(Self {
            pages,
            title,
            byte_size: bytes.len() as u64,
        })
    }
}

impl PagedSource for PdfSource {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn byte_size(&self) -> u64 {
        self.byte_size
    }

    fn metadata_title(&self) -> Option<String> {
        self.title.clone()
    }

    fn extract_pages(&self, start: u32, end: u32) -> Result<String, ExtractError> {
        page_slice(&self.pages, start, end).map(|pages| pages.join("\n"))
    }
}

/// Bounds-checked 1-based inclusive slice of page texts.
pub fn page_slice(pages: &[String], start: u32, end: u32) -> Result<&[String], ExtractError> {
    let total = pages.len() as u32;
    if start == 0 || start > end || end > total {
        return Err(ExtractError::PageRange {
            start,
            end,
            pages: total,
        });
    }
    Ok(&pages[(start - 1) as usize..end as usize])
}

fn info_title(doc: &lopdf::Document) -> Option<String> {
    let info = match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let dict: &Dictionary = info.as_dict().ok()?;
    let raw = match dict.get(b"Title").ok()? {
        Object::String(bytes, _) => decode_pdf_string(bytes),
        _ => return None,
    };
    let title = raw.trim();
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}

/// PDF text strings are UTF-16BE with a BOM, or a Latin-1 superset.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}
