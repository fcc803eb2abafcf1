// File: src/store.rs
//! Field store abstraction and the in-memory implementation.
use crate::model::{FieldPatch, Fields};
use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::future::Future;
#[cfg(any(test, feature = "test_hooks"))]
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// Where documents' structured fields live.
///
/// `write` must apply the whole patch or nothing: a concurrent reader never
/// sees some of its assignments without the others.
pub trait FieldStore: Send + Sync {
    fn read(&self, document: &str) -> impl Future<Output = Result<Fields>> + Send;

    fn write(&self, document: &str, patch: &FieldPatch) -> impl Future<Output = Result<()>> + Send;
}

impl<S: FieldStore> FieldStore for std::sync::Arc<S> {
    fn read(&self, document: &str) -> impl Future<Output = Result<Fields>> + Send {
        (**self).read(document)
    }

    fn write(&self, document: &str, patch: &FieldPatch) -> impl Future<Output = Result<()>> + Send {
        (**self).write(document, patch)
    }
}

#[derive(Debug, Default)]
pub struct MemoryFieldStore {
    documents: RwLock<HashMap<String, Fields>>,
    #[cfg(any(test, feature = "test_hooks"))]
    fail_next_write: AtomicBool,
}

impl MemoryFieldStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, document: &str, fields: Fields) {
        self.documents
            .write()
            .await
            .insert(document.to_string(), fields);
    }

    pub async fn documents(&self) -> Vec<String> {
        let mut names: Vec<String> = self.documents.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Makes the next write fail after it has staged part of its patch.
    #[cfg(any(test, feature = "test_hooks"))]
    pub fn fail_next_write(&self) {
        self.fail_next_write.store(true, Ordering::SeqCst);
    }

    #[cfg(any(test, feature = "test_hooks"))]
    fn take_injected_failure(&self) -> bool {
        self.fail_next_write.swap(false, Ordering::SeqCst)
    }

    #[cfg(not(any(test, feature = "test_hooks")))]
    fn take_injected_failure(&self) -> bool {
        false
    }
}

impl FieldStore for MemoryFieldStore {
    async fn read(&self, document: &str) -> Result<Fields> {
        self.documents
            .read()
            .await
            .get(document)
            .cloned()
            .ok_or_else(|| anyhow!("Document not found: {}", document))
    }

    async fn write(&self, document: &str, patch: &FieldPatch) -> Result<()> {
        let mut documents = self.documents.write().await;
        let current = documents
            .get(document)
            .ok_or_else(|| anyhow!("Document not found: {}", document))?;

        // Stage on a copy; the map only changes once every update is in.
        let mut staged = current.clone();
        for (i, (key, value)) in patch.updates.iter().enumerate() {
            staged.insert(key.clone(), value.clone());
            if i == 0 && self.take_injected_failure() {
                anyhow::bail!("Injected write failure for {}", document);
            }
        }

        documents.insert(document.to_string(), staged);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldSchema, Mutation};
    use chrono::NaiveDate;
    use serde_json::json;

    fn done_task() -> Fields {
        json!({"kind": "task", "status": "done", "repeat": "every day", "scheduled": "2026-01-01"})
            .as_object()
            .cloned()
            .unwrap()
    }

    #[tokio::test]
    async fn test_write_applies_whole_patch() {
        let store = MemoryFieldStore::new();
        store.insert("a", done_task()).await;

        let schema = FieldSchema::default();
        let patch = Mutation::new(NaiveDate::from_ymd_opt(2026, 1, 2).unwrap(), &schema)
            .to_patch(&schema);
        store.write("a", &patch).await.unwrap();

        let fields = store.read("a").await.unwrap();
        assert_eq!(fields["status"], json!("todo"));
        assert_eq!(fields["scheduled"], json!("2026-01-02"));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_record_untouched() {
        let store = MemoryFieldStore::new();
        store.insert("a", done_task()).await;
        store.fail_next_write();

        let schema = FieldSchema::default();
        let patch = Mutation::new(NaiveDate::from_ymd_opt(2026, 1, 2).unwrap(), &schema)
            .to_patch(&schema);
        assert!(store.write("a", &patch).await.is_err());

        // Neither the status reset nor the date is visible.
        let fields = store.read("a").await.unwrap();
        assert_eq!(fields, done_task());

        // The hook is one-shot.
        store.write("a", &patch).await.unwrap();
        assert_eq!(store.read("a").await.unwrap()["status"], json!("todo"));
    }

    #[tokio::test]
    async fn test_unknown_document() {
        let store = MemoryFieldStore::new();
        assert!(store.read("missing").await.is_err());
        assert!(store.write("missing", &FieldPatch::default()).await.is_err());
    }
}
