// Manages file-backed storage of document fields.
//
// Each document is one JSON object in `<root>/<document>.json`. Writers take an
// exclusive lock on a sidecar `.lock` file and replace the document through a
// temp file + rename, so readers only ever see the old or the new fields.
use crate::model::{FieldPatch, Fields};
use crate::store::FieldStore;
use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs;
use std::path::{Path, PathBuf};

pub const DOCUMENT_EXTENSION: &str = "json";

pub struct LocalStorage;

impl LocalStorage {
    /// Helper to get a sidecar lock file path
    fn get_lock_path(file_path: &Path) -> PathBuf {
        let mut lock_path = file_path.to_path_buf();
        if let Some(ext) = lock_path.extension() {
            let mut new_ext = ext.to_os_string();
            new_ext.push(".lock");
            lock_path.set_extension(new_ext);
        } else {
            lock_path.set_extension("lock");
        }
        lock_path
    }

    /// Runs `f` while holding an exclusive advisory lock for `file_path`.
    pub fn with_lock<F, T>(file_path: &Path, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let lock_path = Self::get_lock_path(file_path);
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file {:?}", lock_path))?;

        file.lock_exclusive()?;
        let result = f();
        file.unlock()?;
        result
    }

    /// Atomic write: Write to .tmp file then rename
    pub fn atomic_write<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> Result<()> {
        let path = path.as_ref();
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, contents)?;
        fs::rename(tmp_path, path)?;
        Ok(())
    }

    fn read_fields(path: &Path) -> Result<Fields> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read document {:?}", path))?;
        serde_json::from_str::<Fields>(&json)
            .with_context(|| format!("Document {:?} is not a JSON object", path))
    }
}

/// Field store over a directory of JSON documents.
#[derive(Debug, Clone)]
pub struct JsonFieldStore {
    root: PathBuf,
}

impl JsonFieldStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<document>.json`. Ids that could name anything outside the
    /// root (separators, `.`, `..`) are rejected, never rewritten.
    pub fn get_path(&self, document: &str) -> Result<PathBuf> {
        validate_document_id(document)?;
        Ok(self
            .root
            .join(format!("{}.{}", document, DOCUMENT_EXTENSION)))
    }

    /// Ids of all documents in the root, sorted. Files whose stem is not a
    /// valid id are skipped.
    pub fn list_documents(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("Failed to list directory {:?}", self.root))?;

        let mut ids = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(DOCUMENT_EXTENSION)
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                match validate_document_id(stem) {
                    Ok(()) => ids.push(stem.to_string()),
                    Err(e) => log::debug!("Skipping {:?}: {}", path, e),
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Creates or replaces a whole document.
    pub fn save(&self, document: &str, fields: &Fields) -> Result<()> {
        let path = self.get_path(document)?;
        LocalStorage::with_lock(&path, || {
            let json = serde_json::to_string_pretty(fields)?;
            LocalStorage::atomic_write(&path, json)
        })
    }

    pub fn load(&self, document: &str) -> Result<Fields> {
        let path = self.get_path(document)?;
        if !path.exists() {
            anyhow::bail!("Document not found: {}", document);
        }
        LocalStorage::with_lock(&path, || LocalStorage::read_fields(&path))
    }

    /// Read-modify-write of one document under its lock.
    pub fn apply(&self, document: &str, patch: &FieldPatch) -> Result<()> {
        let path = self.get_path(document)?;
        if !path.exists() {
            anyhow::bail!("Document not found: {}", document);
        }
        LocalStorage::with_lock(&path, || {
            let mut fields = LocalStorage::read_fields(&path)?;
            patch.apply_to(&mut fields);
            let json = serde_json::to_string_pretty(&fields)?;
            LocalStorage::atomic_write(&path, json)
        })
        .with_context(|| format!("Failed to update document {}", document))
    }
}

fn validate_document_id(document: &str) -> Result<()> {
    if document.trim().is_empty()
        || document == "."
        || document == ".."
        || document.contains(['/', '\\', '\0'])
    {
        anyhow::bail!("Invalid document id: {:?}", document);
    }
    Ok(())
}

// File locks and reads block, so both run on the blocking pool.
impl FieldStore for JsonFieldStore {
    async fn read(&self, document: &str) -> Result<Fields> {
        let store = self.clone();
        let document = document.to_string();
        tokio::task::spawn_blocking(move || store.load(&document))
            .await
            .context("Document read task failed")?
    }

    async fn write(&self, document: &str, patch: &FieldPatch) -> Result<()> {
        let store = self.clone();
        let document = document.to_string();
        let patch = patch.clone();
        tokio::task::spawn_blocking(move || store.apply(&document, &patch))
            .await
            .context("Document write task failed")?
    }
}
