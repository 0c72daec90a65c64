//! Storage abstraction for imported records and extracted documents.
//!
//! [`RecordSink`] is the batch persistence boundary used by the importer.
//! [`DocumentStore`] covers document metadata and chunk records. Both are
//! implemented by [`SqliteStore`] for the CLI and [`MemoryStore`] for tests.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{DocumentChunk, DocumentRecord, ProcessingStatus, TextRecord};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Batch sink for cleaned rows.
///
/// One call persists one flushed buffer. A failure propagates to the
/// importer as a source-level failure; partial writes are not rolled back
/// by the caller.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Persist `records` and return how many were written.
    async fn save_all(&self, records: &[TextRecord]) -> Result<usize>;
}

/// Document metadata and chunk persistence.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert_document`](DocumentStore::upsert_document) | Insert or update by id |
/// | [`find_document_by_path`](DocumentStore::find_document_by_path) | Lookup for idempotent re-runs |
/// | [`replace_chunks`](DocumentStore::replace_chunks) | Swap all chunks of a document |
/// | [`list_chunks`](DocumentStore::list_chunks) | Chunks ordered by index |
/// | [`search_chunks`](DocumentStore::search_chunks) | Substring match over chunk text |
/// | [`delete_document`](DocumentStore::delete_document) | Remove chunks, then the document |
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn upsert_document(&self, doc: &DocumentRecord) -> Result<()>;

    async fn get_document(&self, id: &str) -> Result<Option<DocumentRecord>>;

    async fn find_document_by_path(&self, path: &str) -> Result<Option<DocumentRecord>>;

    /// All documents, oldest first, optionally filtered by status.
    async fn list_documents(
        &self,
        status: Option<ProcessingStatus>,
    ) -> Result<Vec<DocumentRecord>>;

    async fn replace_chunks(&self, document_id: &str, chunks: &[DocumentChunk]) -> Result<()>;

    async fn list_chunks(&self, document_id: &str) -> Result<Vec<DocumentChunk>>;

    async fn search_chunks(&self, needle: &str) -> Result<Vec<DocumentChunk>>;

    async fn count_chunks(&self, document_id: &str) -> Result<i64>;

    /// Returns `false` when no document had this id.
    async fn delete_document(&self, id: &str) -> Result<bool>;
}
