//! In-memory store for tests.
//!
//! Uses `Vec` and `HashMap` behind `std::sync::RwLock`. Every `save_all`
//! call is recorded so tests can assert flush sizes, and the sink can be
//! armed to fail a given call to exercise persistence errors.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::models::{DocumentChunk, DocumentRecord, ProcessingStatus, TextRecord};

use super::{DocumentStore, RecordSink};

#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<TextRecord>>,
    save_calls: RwLock<Vec<usize>>,
    fail_on_call: RwLock<Option<usize>>,
    docs: RwLock<Vec<DocumentRecord>>,
    chunks: RwLock<HashMap<String, Vec<DocumentChunk>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `n`-th `save_all` call (1-based) fail.
    pub fn fail_on_save(mut self, n: usize) -> Self {
        if let Ok(slot) = self.fail_on_call.get_mut() {
            *slot = Some(n);
        }
        self
    }

    /// Sizes of every `save_all` call, in order.
    pub fn save_calls(&self) -> Vec<usize> {
        self.save_calls.read().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn records(&self) -> Vec<TextRecord> {
        self.records.read().map(|r| r.clone()).unwrap_or_default()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("memory store lock poisoned")
}

#[async_trait]
impl RecordSink for MemoryStore {
    async fn save_all(&self, records: &[TextRecord]) -> Result<usize> {
        let call = {
            let mut calls = self.save_calls.write().map_err(poisoned)?;
            calls.push(records.len());
            calls.len()
        };
        if *self.fail_on_call.read().map_err(poisoned)? == Some(call) {
            bail!("simulated write failure on save call {}", call);
        }
        self.records
            .write()
            .map_err(poisoned)?
            .extend_from_slice(records);
        Ok(records.len())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn upsert_document(&self, doc: &DocumentRecord) -> Result<()> {
        let mut docs = self.docs.write().map_err(poisoned)?;
        match docs.iter_mut().find(|d| d.id == doc.id) {
            Some(existing) => *existing = doc.clone(),
            None => docs.push(doc.clone()),
        }
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<DocumentRecord>> {
        let docs = self.docs.read().map_err(poisoned)?;
        Ok(docs.iter().find(|d| d.id == id).cloned())
    }

    async fn find_document_by_path(&self, path: &str) -> Result<Option<DocumentRecord>> {
        let docs = self.docs.read().map_err(poisoned)?;
        Ok(docs.iter().find(|d| d.file_path == path).cloned())
    }

    async fn list_documents(
        &self,
        status: Option<ProcessingStatus>,
    ) -> Result<Vec<DocumentRecord>> {
        let docs = self.docs.read().map_err(poisoned)?;
        Ok(docs
            .iter()
            .filter(|d| status.map_or(true, |s| d.status == s))
            .cloned()
            .collect())
    }

    async fn replace_chunks(&self, document_id: &str, chunks: &[DocumentChunk]) -> Result<()> {
        self.chunks
            .write()
            .map_err(poisoned)?
            .insert(document_id.to_string(), chunks.to_vec());
        Ok(())
    }

    async fn list_chunks(&self, document_id: &str) -> Result<Vec<DocumentChunk>> {
        let chunks = self.chunks.read().map_err(poisoned)?;
        let mut out = chunks.get(document_id).cloned().unwrap_or_default();
        out.sort_by_key(|c| c.chunk_index);
        Ok(out)
    }

    async fn search_chunks(&self, needle: &str) -> Result<Vec<DocumentChunk>> {
        let chunks = self.chunks.read().map_err(poisoned)?;
        let mut out: Vec<DocumentChunk> = chunks
            .values()
            .flatten()
            .filter(|c| c.text.contains(needle))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            a.document_id
                .cmp(&b.document_id)
                .then(a.chunk_index.cmp(&b.chunk_index))
        });
        Ok(out)
    }

    async fn count_chunks(&self, document_id: &str) -> Result<i64> {
        let chunks = self.chunks.read().map_err(poisoned)?;
        Ok(chunks.get(document_id).map_or(0, |c| c.len() as i64))
    }

    async fn delete_document(&self, id: &str) -> Result<bool> {
        self.chunks.write().map_err(poisoned)?.remove(id);
        let mut docs = self.docs.write().map_err(poisoned)?;
        let before = docs.len();
        docs.retain(|d| d.id != id);
        Ok(docs.len() != before)
    }
}
