//! Generic record store with file-based JSON persistence
//!
//! One JSON file per record under the store's directory:
//! ```text
//! ~/.cropsense/<collection>/
//! ├── <record-id>.json
//! └── ...
//! ```
//!
//! Records live in memory behind a `tokio::sync::RwLock`; every mutation is
//! written through to disk before returning so callers can observe
//! persistence failure (the upload path relies on this to clean up orphaned
//! binaries).

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A record that can live in a [`RecordStore`]
pub trait StoredRecord:
    Clone + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Unique record identifier
    fn id(&self) -> &str;
}

/// JSON-file-backed record store
pub struct RecordStore<T: StoredRecord> {
    dir: PathBuf,
    records: Arc<RwLock<Vec<T>>>,
}

impl<T: StoredRecord> RecordStore<T> {
    /// Open a store at the given directory, loading existing records
    pub async fn open(dir: PathBuf) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        let records = load_json_files(&dir);
        Ok(Self {
            dir,
            records: Arc::new(RwLock::new(records)),
        })
    }

    /// Insert a new record, persisting it before returning
    pub async fn create(&self, record: T) -> Result<T> {
        self.write_to_disk(&record).await?;
        self.records.write().await.push(record.clone());
        Ok(record)
    }

    /// Get a record by ID
    pub async fn find_by_id(&self, id: &str) -> Option<T> {
        self.records.read().await.iter().find(|r| r.id() == id).cloned()
    }

    /// Get the first record matching a predicate
    pub async fn find_one(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        self.records.read().await.iter().find(|r| pred(r)).cloned()
    }

    /// List records matching a predicate, sorted and paginated
    ///
    /// `sort` orders the matched set before `skip`/`limit` are applied.
    pub async fn find_many(
        &self,
        pred: impl Fn(&T) -> bool,
        sort: impl Fn(&T, &T) -> std::cmp::Ordering,
        skip: usize,
        limit: usize,
    ) -> Vec<T> {
        let records = self.records.read().await;
        let mut matched: Vec<T> = records.iter().filter(|r| pred(r)).cloned().collect();
        matched.sort_by(|a, b| sort(a, b));
        matched.into_iter().skip(skip).take(limit).collect()
    }

    /// Count records matching a predicate
    pub async fn count(&self, pred: impl Fn(&T) -> bool) -> usize {
        self.records.read().await.iter().filter(|r| pred(r)).count()
    }

    /// Apply a mutation to the record with the given ID, persisting the result
    ///
    /// Returns the updated record, or `NotFound` if no record has that ID.
    pub async fn update_by_id(
        &self,
        id: &str,
        mutate: impl FnOnce(&mut T),
    ) -> Result<T> {
        self.update_if(id, |_| true, mutate)
            .await?
            .ok_or_else(|| Error::NotFound(format!("record {} not found", id)))
    }

    /// Guarded update: mutate only if `guard` accepts the stored record
    ///
    /// This is the optimistic compare-and-set used by the analysis lifecycle
    /// to refuse status transitions when the stored status no longer matches
    /// the expected pre-state. Returns `Ok(None)` when the guard rejects,
    /// `NotFound` when the record does not exist.
    pub async fn update_if(
        &self,
        id: &str,
        guard: impl FnOnce(&T) -> bool,
        mutate: impl FnOnce(&mut T),
    ) -> Result<Option<T>> {
        let updated = {
            let mut records = self.records.write().await;
            let record = records
                .iter_mut()
                .find(|r| r.id() == id)
                .ok_or_else(|| Error::NotFound(format!("record {} not found", id)))?;
            if !guard(record) {
                return Ok(None);
            }
            mutate(record);
            record.clone()
        };

        self.write_to_disk(&updated).await?;
        Ok(Some(updated))
    }

    /// Remove a record by ID, returning it if it existed
    pub async fn delete_by_id(&self, id: &str) -> Option<T> {
        let removed = {
            let mut records = self.records.write().await;
            let pos = records.iter().position(|r| r.id() == id)?;
            records.remove(pos)
        };

        let path = self.record_path(removed.id());
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove {}: {}", path.display(), e);
            }
        }

        Some(removed)
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    async fn write_to_disk(&self, record: &T) -> Result<()> {
        let path = self.record_path(record.id());
        let json = serde_json::to_string_pretty(record)?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| Error::Storage(format!("failed to persist {}: {}", path.display(), e)))
    }
}

/// Load all JSON files from a directory, skipping corrupt entries
fn load_json_files<T: DeserializeOwned>(dir: &Path) -> Vec<T> {
    let mut items = Vec::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to read directory {}: {}", dir.display(), e);
            }
            return items;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        match std::fs::read_to_string(&path) {
            Ok(data) => match serde_json::from_str(&data) {
                Ok(item) => items.push(item),
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}", path.display(), e);
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", path.display(), e);
            }
        }
    }

    items
}
