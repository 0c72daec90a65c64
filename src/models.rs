//! Records persisted by the import and extraction pipelines.

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

/// A cleaned row from a tabular import, ready for the record sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextRecord {
    pub id: String,
    pub text: String,
    pub source: String,
    pub created_at: i64,
}

impl TextRecord {
    pub fn new(text: String, source: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text,
            source: source.to_string(),
            created_at: Utc::now().timestamp(),
        }
    }
}

/// Lifecycle of a document extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "PENDING",
            ProcessingStatus::Processing => "PROCESSING",
            ProcessingStatus::Completed => "COMPLETED",
            ProcessingStatus::Failed => "FAILED",
        }
    }

    /// Case-insensitive parse, used for stored values and the `--status` flag.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Some(ProcessingStatus::Pending),
            "PROCESSING" => Some(ProcessingStatus::Processing),
            "COMPLETED" => Some(ProcessingStatus::Completed),
            "FAILED" => Some(ProcessingStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata for one extracted document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentRecord {
    pub id: String,
    pub file_name: String,
    pub file_path: String,
    pub title: Option<String>,
    pub page_count: Option<u32>,
    pub file_size: u64,
    pub is_large_file: bool,
    pub blob_id: Option<String>,
    pub status: ProcessingStatus,
    pub error_message: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl DocumentRecord {
    pub fn pending(file_name: &str, file_path: &str, file_size: u64, is_large_file: bool) -> Self {
        let now = Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            file_name: file_name.to_string(),
            file_path: file_path.to_string(),
            title: None,
            page_count: None,
            file_size,
            is_large_file,
            blob_id: None,
            status: ProcessingStatus::Pending,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_status(&mut self, status: ProcessingStatus, error_message: Option<String>) {
        self.status = status;
        self.error_message = error_message;
        self.updated_at = Utc::now().timestamp();
    }

    pub fn complete(&mut self, blob_id: Option<String>) {
        self.blob_id = blob_id;
        self.set_status(ProcessingStatus::Completed, None);
    }
}

/// A persisted chunk of document text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentChunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub chunk_size: i64,
    pub has_formulas: bool,
}

impl DocumentChunk {
    /// `chunk_size` is the character count of the processed text.
    pub fn new(document_id: &str, chunk_index: usize, text: String, has_formulas: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            chunk_index: chunk_index as i64,
            chunk_size: text.chars().count() as i64,
            text,
            has_formulas,
        }
    }
}
