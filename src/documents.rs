//! Document extraction and lookup.
//!
//! [`process_document`] takes one paginated file from disk to persisted
//! chunks: it records the document, opens it, extracts the configured
//! page range through [`crate::paged`], archives the full text of large
//! files in the blob store, and writes the chunk records. A path that
//! was already completed is returned as-is.
//!
//! The `run_*` functions back the `corpus extract`, `docs`, `show`,
//! `chunks`, `search`, and `delete` commands.

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{TimeZone, Utc};
use thiserror::Error;
use tracing::{error, info};

use crate::blob::{BlobStore, FsBlobStore};
use crate::config::{Config, ExtractConfig};
use crate::db;
use crate::extract::{ExtractError, PagedSource, PdfSource};
use crate::models::{DocumentChunk, DocumentRecord, ProcessingStatus};
use crate::paged::{self, ExtractSettings, ExtractionMode};
use crate::store::DocumentStore;

pub const CONTENT_TYPE_TEXT: &str = "text/plain";

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("failed to parse document: {0}")]
    Parsing(String),

    #[error(transparent)]
    Processing(#[from] anyhow::Error),
}

impl ExtractSettings {
    pub fn from_config(config: &ExtractConfig) -> Self {
        Self {
            start_page: config.start_page,
            end_page: config.end_page,
            size_threshold_bytes: config.large_file_threshold_bytes,
            max_chunk_size: config.max_chunk_size,
        }
    }
}

/// Extract a PDF at `path` into `store`.
pub async fn process_document(
    path: &Path,
    config: &ExtractConfig,
    store: &dyn DocumentStore,
    blobs: &dyn BlobStore,
) -> Result<DocumentRecord, DocumentError> {
    process_document_with(path, config, store, blobs, |p| {
        PdfSource::open(p).map(|s| Box::new(s) as Box<dyn PagedSource>)
    })
    .await
}

/// Same as [`process_document`], with the paged source produced by `open`.
pub async fn process_document_with<F>(
    path: &Path,
    config: &ExtractConfig,
    store: &dyn DocumentStore,
    blobs: &dyn BlobStore,
    open: F,
) -> Result<DocumentRecord, DocumentError>
where
    F: FnOnce(&Path) -> Result<Box<dyn PagedSource>, ExtractError>,
{
    let path_str = path.display().to_string();
    let file_size = match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => meta.len(),
        _ => return Err(DocumentError::NotFound(path_str)),
    };

    let existing = store.find_document_by_path(&path_str).await?;
    if let Some(doc) = &existing {
        if doc.status == ProcessingStatus::Completed {
            info!(id = %doc.id, path = %path_str, "document already processed");
            return Ok(doc.clone());
        }
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_str.clone());
    let is_large_file = file_size > config.large_file_threshold_bytes;

    let mut doc = match existing {
        Some(mut doc) => {
            doc.file_size = file_size;
            doc.is_large_file = is_large_file;
            doc
        }
        None => DocumentRecord::pending(&file_name, &path_str, file_size, is_large_file),
    };
    doc.set_status(ProcessingStatus::Processing, None);
    store.upsert_document(&doc).await?;
    info!(id = %doc.id, path = %path_str, file_size, is_large_file, "processing document");

    let source = match open(path) {
        Ok(source) => source,
        Err(e) => {
            let message = e.to_string();
            error!(id = %doc.id, error = %message, "failed to open document");
            doc.set_status(ProcessingStatus::Failed, Some(message.clone()));
            store.upsert_document(&doc).await?;
            return Err(DocumentError::Parsing(message));
        }
    };

    match extract_into(&mut doc, source.as_ref(), config, store, blobs).await {
        Ok(()) => {
            info!(id = %doc.id, pages = ?doc.page_count, "document completed");
            Ok(doc)
        }
        Err(e) => {
            let message = format!("{:#}", e);
            error!(id = %doc.id, error = %message, "document processing failed");
            doc.set_status(ProcessingStatus::Failed, Some(message));
            store.upsert_document(&doc).await?;
            Err(DocumentError::Processing(e))
        }
    }
}

async fn extract_into(
    doc: &mut DocumentRecord,
    source: &dyn PagedSource,
    config: &ExtractConfig,
    store: &dyn DocumentStore,
    blobs: &dyn BlobStore,
) -> Result<()> {
    doc.title = Some(paged::extract_title(source));
    doc.page_count = Some(source.page_count());

    let extraction = paged::extract(source, &ExtractSettings::from_config(config))
        .context("page extraction failed")?;

    let blob_id = match extraction.mode {
        ExtractionMode::Segmented => {
            let name = format!("{}_content", doc.file_name);
            let id = blobs
                .store(extraction.full_text.as_bytes(), &name, CONTENT_TYPE_TEXT)
                .await
                .context("failed to archive document text")?;
            Some(id)
        }
        ExtractionMode::Direct => None,
    };

    let chunks: Vec<DocumentChunk> = extraction
        .chunks
        .into_iter()
        .map(|c| DocumentChunk::new(&doc.id, c.chunk_index, c.text, c.has_formula))
        .collect();
    store.replace_chunks(&doc.id, &chunks).await?;
    info!(id = %doc.id, mode = ?extraction.mode, chunks = chunks.len(), "chunks written");

    doc.complete(blob_id);
    store.upsert_document(doc).await?;
    Ok(())
}

/// Documents, optionally only those in status `status` (case-insensitive).
pub async fn list(store: &dyn DocumentStore, status: Option<&str>) -> Result<Vec<DocumentRecord>> {
    let filter = match status {
        Some(s) => match ProcessingStatus::parse(s) {
            Some(parsed) => Some(parsed),
            None => bail!("unknown status '{}': expected pending, processing, completed, or failed", s),
        },
        None => None,
    };
    store.list_documents(filter).await
}

pub async fn get(store: &dyn DocumentStore, id: &str) -> Result<DocumentRecord> {
    match store.get_document(id).await? {
        Some(doc) => Ok(doc),
        None => bail!("document not found: {}", id),
    }
}

pub async fn chunks(store: &dyn DocumentStore, id: &str) -> Result<Vec<DocumentChunk>> {
    let doc = get(store, id).await?;
    store.list_chunks(&doc.id).await
}

/// Chunks whose text contains `needle` literally.
pub async fn search(store: &dyn DocumentStore, needle: &str) -> Result<Vec<DocumentChunk>> {
    if needle.trim().is_empty() {
        bail!("search text must not be empty");
    }
    store.search_chunks(needle).await
}

pub async fn delete(store: &dyn DocumentStore, id: &str) -> Result<()> {
    if !store.delete_document(id).await? {
        bail!("document not found: {}", id);
    }
    info!(%id, "document deleted");
    Ok(())
}

pub async fn run_extract(config: &Config, path: &Path, json: bool) -> Result<()> {
    let store = db::open_store(config).await?;
    let blobs = FsBlobStore::new(config.blob_dir());
    let result = process_document(path, &config.extract, &store, &blobs).await;
    store.close().await;

    let doc = result?;
    if json {
        println!("{}", serde_json::to_string_pretty(&doc)?);
    } else {
        print_document(&doc);
    }
    Ok(())
}

pub async fn run_docs(config: &Config, status: Option<&str>, json: bool) -> Result<()> {
    let store = db::open_store(config).await?;
    let result = list(&store, status).await;
    store.close().await;
    let docs = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&docs)?);
        return Ok(());
    }
    if docs.is_empty() {
        println!("No documents.");
        return Ok(());
    }
    for doc in &docs {
        println!(
            "{}  {:<10}  {}  {}",
            doc.id,
            doc.status,
            doc.file_name,
            doc.title.as_deref().unwrap_or("(untitled)")
        );
    }
    Ok(())
}

pub async fn run_show(config: &Config, id: &str) -> Result<()> {
    let store = db::open_store(config).await?;
    let result = async {
        let doc = get(&store, id).await?;
        let count = store.count_chunks(&doc.id).await?;
        Ok::<_, anyhow::Error>((doc, count))
    }
    .await;
    store.close().await;

    let (doc, count) = result?;
    print_document(&doc);
    println!("chunks:       {}", count);
    Ok(())
}

pub async fn run_chunks(config: &Config, id: &str, json: bool) -> Result<()> {
    let store = db::open_store(config).await?;
    let result = chunks(&store, id).await;
    store.close().await;
    print_chunks(&result?, json)
}

pub async fn run_search(config: &Config, needle: &str, json: bool) -> Result<()> {
    let store = db::open_store(config).await?;
    let result = search(&store, needle).await;
    store.close().await;
    print_chunks(&result?, json)
}

pub async fn run_delete(config: &Config, id: &str) -> Result<()> {
    let store = db::open_store(config).await?;
    let result = delete(&store, id).await;
    store.close().await;
    result?;
    println!("deleted {}", id);
    Ok(())
}

fn print_chunks(chunks: &[DocumentChunk], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(chunks)?);
        return Ok(());
    }
    if chunks.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for chunk in chunks {
        let marker = if chunk.has_formulas { " [formula]" } else { "" };
        println!(
            "[{}:{}] ({} chars){}",
            chunk.document_id, chunk.chunk_index, chunk.chunk_size, marker
        );
        println!("    {}", chunk.text);
    }
    Ok(())
}

fn print_document(doc: &DocumentRecord) {
    println!("--- Document ---");
    println!("id:           {}", doc.id);
    println!("title:        {}", doc.title.as_deref().unwrap_or("(untitled)"));
    println!("file:         {}", doc.file_path);
    println!("status:       {}", doc.status);
    if let Some(pages) = doc.page_count {
        println!("pages:        {}", pages);
    }
    println!(
        "size:         {} bytes{}",
        doc.file_size,
        if doc.is_large_file { " (large)" } else { "" }
    );
    if let Some(ref blob) = doc.blob_id {
        println!("blob:         {}", blob);
    }
    if let Some(ref message) = doc.error_message {
        println!("error:        {}", message);
    }
    println!("updated_at:   {}", format_ts_iso(doc.updated_at));
}

fn format_ts_iso(ts: i64) -> String {
    Utc.timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paged::tests::FakePages;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingBlobs {
        stored: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl BlobStore for RecordingBlobs {
        async fn store(&self, bytes: &[u8], name: &str, content_type: &str) -> Result<String> {
            let mut stored = self.stored.lock().unwrap();
            stored.push((
                String::from_utf8_lossy(bytes).into_owned(),
                name.to_string(),
                content_type.to_string(),
            ));
            Ok(format!("blob-{}", stored.len()))
        }
    }

    fn touch(dir: &TempDir, name: &str, bytes: usize) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, vec![b'x'; bytes]).unwrap();
        path
    }

    fn fake(
        pages: Vec<&'static str>,
        byte_size: u64,
    ) -> impl FnOnce(&Path) -> Result<Box<dyn PagedSource>, ExtractError> {
        move |_: &Path| Ok(Box::new(FakePages::new(pages, byte_size)) as Box<dyn PagedSource>)
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let store = MemoryStore::new();
        let blobs = RecordingBlobs::default();
        let err = process_document(
            Path::new("/nonexistent/book.pdf"),
            &ExtractConfig::default(),
            &store,
            &blobs,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DocumentError::NotFound(_)));
        assert!(store.list_documents(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_direct_mode_completes_without_blob() {
        let tmp = TempDir::new().unwrap();
        let path = touch(&tmp, "notes.pdf", 10);
        let store = MemoryStore::new();
        let blobs = RecordingBlobs::default();

        let doc = process_document_with(
            &path,
            &ExtractConfig::default(),
            &store,
            &blobs,
            fake(vec!["A Short Study of Tides\nFirst point. Second point."], 10),
        )
        .await
        .unwrap();

        assert_eq!(doc.status, ProcessingStatus::Completed);
        assert_eq!(doc.title.as_deref(), Some("A Short Study of Tides"));
        assert_eq!(doc.page_count, Some(1));
        assert!(!doc.is_large_file);
        assert_eq!(doc.blob_id, None);
        assert!(blobs.stored.lock().unwrap().is_empty());

        let chunks = store.list_chunks(&doc.id).await.unwrap();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["A Short Study of Tides First point.", "Second point."]);
    }

    #[tokio::test]
    async fn test_large_file_archives_full_text() {
        let tmp = TempDir::new().unwrap();
        let path = touch(&tmp, "big.pdf", 64);
        let store = MemoryStore::new();
        let blobs = RecordingBlobs::default();
        let config = ExtractConfig {
            large_file_threshold_bytes: 32,
            ..ExtractConfig::default()
        };

        let doc = process_document_with(&path, &config, &store, &blobs, fake(vec!["one.", "two."], 64))
            .await
            .unwrap();

        assert!(doc.is_large_file);
        assert_eq!(doc.blob_id.as_deref(), Some("blob-1"));
        let stored = blobs.stored.lock().unwrap();
        assert_eq!(stored[0].0, "one.\ntwo.");
        assert_eq!(stored[0].1, "big.pdf_content");
        assert_eq!(stored[0].2, CONTENT_TYPE_TEXT);
    }

    #[tokio::test]
    async fn test_parse_failure_marks_failed() {
        let tmp = TempDir::new().unwrap();
        let path = touch(&tmp, "broken.pdf", 5);
        let store = MemoryStore::new();
        let blobs = RecordingBlobs::default();

        let err = process_document(&path, &ExtractConfig::default(), &store, &blobs)
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::Parsing(_)));

        let docs = store.list_documents(Some(ProcessingStatus::Failed)).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].error_message.is_some());
    }

    #[tokio::test]
    async fn test_completed_document_is_returned_unchanged() {
        let tmp = TempDir::new().unwrap();
        let path = touch(&tmp, "again.pdf", 10);
        let store = MemoryStore::new();
        let blobs = RecordingBlobs::default();
        let config = ExtractConfig::default();

        let first = process_document_with(&path, &config, &store, &blobs, fake(vec!["Only one."], 10))
            .await
            .unwrap();
        let second = process_document_with(&path, &config, &store, &blobs, |_: &Path| {
            Err(ExtractError::Pdf("should not be opened".into()))
        })
        .await
        .unwrap();

        assert_eq!(first, second);
        assert_eq!(store.list_documents(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_document_is_reprocessed_under_same_id() {
        let tmp = TempDir::new().unwrap();
        let path = touch(&tmp, "retry.pdf", 10);
        let store = MemoryStore::new();
        let blobs = RecordingBlobs::default();
        let config = ExtractConfig::default();

        let _ = process_document_with(&path, &config, &store, &blobs, |_: &Path| {
            Err(ExtractError::Pdf("bad xref".into()))
        })
        .await;
        let failed = store.list_documents(None).await.unwrap().remove(0);

        let doc = process_document_with(&path, &config, &store, &blobs, fake(vec!["Fixed now."], 10))
            .await
            .unwrap();
        assert_eq!(doc.id, failed.id);
        assert_eq!(doc.status, ProcessingStatus::Completed);
        assert_eq!(doc.error_message, None);
    }

    #[tokio::test]
    async fn test_lookup_helpers() {
        let tmp = TempDir::new().unwrap();
        let path = touch(&tmp, "doc.pdf", 10);
        let store = MemoryStore::new();
        let blobs = RecordingBlobs::default();
        let doc = process_document_with(
            &path,
            &ExtractConfig::default(),
            &store,
            &blobs,
            fake(vec!["Water boils at 100 C. Ice melts at zero."], 10),
        )
        .await
        .unwrap();

        assert_eq!(list(&store, Some("completed")).await.unwrap().len(), 1);
        assert!(list(&store, Some("pending")).await.unwrap().is_empty());
        assert!(list(&store, Some("bogus")).await.is_err());

        assert_eq!(chunks(&store, &doc.id).await.unwrap().len(), 2);
        let hits = search(&store, "Ice").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_index, 1);
        assert!(search(&store, "  ").await.is_err());

        delete(&store, &doc.id).await.unwrap();
        assert!(get(&store, &doc.id).await.is_err());
        assert!(delete(&store, &doc.id).await.is_err());
        assert_eq!(store.count_chunks(&doc.id).await.unwrap(), 0);
    }
}
