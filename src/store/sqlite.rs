//! SQLite-backed [`RecordSink`] and [`DocumentStore`].
//!
//! Wraps a [`SqlitePool`] and maps each operation onto the schema created
//! by [`crate::migrate`] (text_records, documents, document_chunks).

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::models::{DocumentChunk, DocumentRecord, ProcessingStatus, TextRecord};

use super::{DocumentStore, RecordSink};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

const DOCUMENT_COLUMNS: &str = "id, file_name, file_path, title, page_count, file_size, \
     is_large_file, blob_id, processing_status, error_message, created_at, updated_at";

fn row_to_document(row: &SqliteRow) -> Result<DocumentRecord> {
    let status: String = row.get("processing_status");
    let page_count: Option<i64> = row.get("page_count");
    let file_size: i64 = row.get("file_size");
    Ok(DocumentRecord {
        id: row.get("id"),
        file_name: row.get("file_name"),
        file_path: row.get("file_path"),
        title: row.get("title"),
        page_count: page_count.map(|p| p as u32),
        file_size: file_size as u64,
        is_large_file: row.get("is_large_file"),
        blob_id: row.get("blob_id"),
        status: ProcessingStatus::parse(&status)
            .ok_or_else(|| anyhow!("unknown processing status in database: {}", status))?,
        error_message: row.get("error_message"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_chunk(row: &SqliteRow) -> DocumentChunk {
    DocumentChunk {
        id: row.get("id"),
        document_id: row.get("document_id"),
        chunk_index: row.get("chunk_index"),
        text: row.get("text"),
        chunk_size: row.get("chunk_size"),
        has_formulas: row.get("has_formulas"),
    }
}

#[async_trait]
impl RecordSink for SqliteStore {
    async fn save_all(&self, records: &[TextRecord]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        for record in records {
            sqlx::query(
                "INSERT INTO text_records (id, text, source, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(&record.id)
            .bind(&record.text)
            .bind(&record.source)
            .bind(record.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(records.len())
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn upsert_document(&self, doc: &DocumentRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, file_name, file_path, title, page_count, file_size,
                                   is_large_file, blob_id, processing_status, error_message,
                                   created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                file_name = excluded.file_name,
                file_path = excluded.file_path,
                title = excluded.title,
                page_count = excluded.page_count,
                file_size = excluded.file_size,
                is_large_file = excluded.is_large_file,
                blob_id = excluded.blob_id,
                processing_status = excluded.processing_status,
                error_message = excluded.error_message,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.file_name)
        .bind(&doc.file_path)
        .bind(&doc.title)
        .bind(doc.page_count.map(|p| p as i64))
        .bind(doc.file_size as i64)
        .bind(doc.is_large_file)
        .bind(&doc.blob_id)
        .bind(doc.status.as_str())
        .bind(&doc.error_message)
        .bind(doc.created_at)
        .bind(doc.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<DocumentRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE id = ?",
            DOCUMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_document).transpose()
    }

    async fn find_document_by_path(&self, path: &str) -> Result<Option<DocumentRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE file_path = ?",
            DOCUMENT_COLUMNS
        ))
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_document).transpose()
    }

    async fn list_documents(
        &self,
        status: Option<ProcessingStatus>,
    ) -> Result<Vec<DocumentRecord>> {
        let rows = match status {
            Some(s) => {
                sqlx::query(&format!(
                    "SELECT {} FROM documents WHERE processing_status = ? ORDER BY created_at, id",
                    DOCUMENT_COLUMNS
                ))
                .bind(s.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM documents ORDER BY created_at, id",
                    DOCUMENT_COLUMNS
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(row_to_document).collect()
    }

    async fn replace_chunks(&self, document_id: &str, chunks: &[DocumentChunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM document_chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        for chunk in chunks {
            sqlx::query(
                "INSERT INTO document_chunks (id, document_id, chunk_index, text, chunk_size, has_formulas) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(&chunk.document_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(chunk.chunk_size)
            .bind(chunk.has_formulas)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_chunks(&self, document_id: &str) -> Result<Vec<DocumentChunk>> {
        let rows = sqlx::query(
            "SELECT id, document_id, chunk_index, text, chunk_size, has_formulas \
             FROM document_chunks WHERE document_id = ? ORDER BY chunk_index",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_chunk).collect())
    }

    async fn search_chunks(&self, needle: &str) -> Result<Vec<DocumentChunk>> {
        // instr() keeps the match literal; LIKE would treat % and _ as wildcards.
        let rows = sqlx::query(
            "SELECT id, document_id, chunk_index, text, chunk_size, has_formulas \
             FROM document_chunks WHERE instr(text, ?) > 0 ORDER BY document_id, chunk_index",
        )
        .bind(needle)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_chunk).collect())
    }

    async fn count_chunks(&self, document_id: &str) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM document_chunks WHERE document_id = ?")
                .bind(document_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn delete_document(&self, id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM document_chunks WHERE document_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}
