//! Large-object storage for archived document text.
//!
//! Objects are content-addressed: the id is the SHA-256 of the bytes, so
//! storing the same text twice returns the same id. [`FsBlobStore`] writes
//! the bytes plus a small JSON sidecar (`<id>.json`) with the name and
//! content type. The sidecar is written once: a later store of the same
//! bytes under another name keeps the first name.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` and return an opaque id.
    async fn store(&self, bytes: &[u8], name: &str, content_type: &str) -> Result<String>;
}

#[derive(Debug, Serialize, Deserialize)]
struct BlobMeta {
    name: String,
    content_type: String,
    size: usize,
}

pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }
}

fn content_id(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn store(&self, bytes: &[u8], name: &str, content_type: &str) -> Result<String> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Failed to create blob dir: {}", self.root.display()))?;

        let id = content_id(bytes);
        let path = self.path_for(&id);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write blob: {}", path.display()))?;

        let meta_path = self.root.join(format!("{}.json", id));
        if tokio::fs::try_exists(&meta_path).await.unwrap_or(false) {
            tracing::debug!(%id, name, "blob already stored; keeping existing metadata");
        } else {
            let meta = BlobMeta {
                name: name.to_string(),
                content_type: content_type.to_string(),
                size: bytes.len(),
            };
            tokio::fs::write(&meta_path, serde_json::to_vec(&meta)?)
                .await
                .with_context(|| format!("Failed to write blob metadata for {}", id))?;
        }

        tracing::debug!(%id, name, size = bytes.len(), "stored blob");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_store_writes_bytes_and_meta() {
        let tmp = TempDir::new().unwrap();
        let store = FsBlobStore::new(tmp.path().join("blobs"));
        let id = store.store(b"full text", "book.pdf_content", "text/plain").await.unwrap();

        assert_eq!(std::fs::read(store.path_for(&id)).unwrap(), b"full text");
        let meta: BlobMeta =
            serde_json::from_slice(&std::fs::read(tmp.path().join("blobs").join(format!("{}.json", id))).unwrap())
                .unwrap();
        assert_eq!(meta.name, "book.pdf_content");
        assert_eq!(meta.content_type, "text/plain");
        assert_eq!(meta.size, 9);
    }

    #[tokio::test]
    async fn test_same_content_same_id() {
        let tmp = TempDir::new().unwrap();
        let store = FsBlobStore::new(tmp.path().to_path_buf());
        let a = store.store(b"same", "a", "text/plain").await.unwrap();
        let b = store.store(b"same", "b", "text/plain").await.unwrap();
        let c = store.store(b"other", "c", "text/plain").await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_duplicate_content_keeps_first_metadata() {
        let tmp = TempDir::new().unwrap();
        let store = FsBlobStore::new(tmp.path().to_path_buf());
        let id = store.store(b"shared text", "first.pdf_content", "text/plain").await.unwrap();
        store.store(b"shared text", "second.pdf_content", "text/plain").await.unwrap();

        let meta: BlobMeta =
            serde_json::from_slice(&std::fs::read(tmp.path().join(format!("{}.json", id))).unwrap())
                .unwrap();
        assert_eq!(meta.name, "first.pdf_content");
    }
}
