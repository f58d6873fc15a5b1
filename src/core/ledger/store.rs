use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::types::{EntryStatus, ExecutionRecord, LedgerEntry, RunStatus};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Ledger corrupted: {0}")]
    Corrupted(String),
}

/// Persistence for execution ledgers. Implementations must be safe to share
/// between concurrently running flows.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Append one entry. Creates an in-progress record when none exists yet.
    async fn append(&self, execution_id: &str, entry: &LedgerEntry) -> Result<(), LedgerError>;

    async fn load(&self, execution_id: &str) -> Result<Option<ExecutionRecord>, LedgerError>;

    /// Replace the whole record (entries, status and runtime state).
    async fn overwrite(&self, record: &ExecutionRecord) -> Result<(), LedgerError>;

    /// Drop a trailing ERROR entry that directly follows a STOPPED entry.
    /// Returns whether an entry was discarded.
    ///
    /// The default is a plain load then overwrite. Stores that accept
    /// concurrent writers for one execution id should override it and hold
    /// their write lock across both steps.
    async fn discard_trailing_error(&self, execution_id: &str) -> Result<bool, LedgerError> {
        let Some(mut record) = self.load(execution_id).await? else {
            return Ok(false);
        };
        if !pop_trailing_error(&mut record) {
            return Ok(false);
        }
        self.overwrite(&record).await?;
        Ok(true)
    }
}

pub(crate) fn ends_with_error_after_stop(entries: &[LedgerEntry]) -> bool {
    matches!(
        entries,
        [.., previous, last]
            if previous.status == EntryStatus::Stopped && last.status == EntryStatus::Error
    )
}

/// Pops the trailing ERROR entry in place and relabels the record STOPPED.
fn pop_trailing_error(record: &mut ExecutionRecord) -> bool {
    if !ends_with_error_after_stop(&record.entries) {
        return false;
    }
    record.entries.pop();
    record.status = RunStatus::Stopped;
    true
}

fn new_record(execution_id: &str, entry: &LedgerEntry) -> ExecutionRecord {
    ExecutionRecord {
        execution_id: execution_id.to_string(),
        status: RunStatus::InProgress,
        entries: Vec::new(),
        runtime_state: Default::default(),
        updated_at: entry.recorded_at,
    }
}

#[derive(Default)]
pub struct MemoryLedgerStore {
    data: RwLock<HashMap<String, ExecutionRecord>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn append(&self, execution_id: &str, entry: &LedgerEntry) -> Result<(), LedgerError> {
        let mut data = self.data.write();
        let record = data
            .entry(execution_id.to_string())
            .or_insert_with(|| new_record(execution_id, entry));
        record.entries.push(entry.clone());
        record.updated_at = entry.recorded_at;
        Ok(())
    }

    async fn load(&self, execution_id: &str) -> Result<Option<ExecutionRecord>, LedgerError> {
        Ok(self.data.read().get(execution_id).cloned())
    }

    async fn overwrite(&self, record: &ExecutionRecord) -> Result<(), LedgerError> {
        self.data
            .write()
            .insert(record.execution_id.clone(), record.clone());
        Ok(())
    }

    async fn discard_trailing_error(&self, execution_id: &str) -> Result<bool, LedgerError> {
        Ok(self
            .data
            .write()
            .get_mut(execution_id)
            .is_some_and(pop_trailing_error))
    }
}

/// One JSON document per execution id under `dir`.
pub struct FileLedgerStore {
    dir: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileLedgerStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| LedgerError::StorageError(e.to_string()))?;
        Ok(Self {
            dir,
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    fn path_for(&self, execution_id: &str) -> Result<PathBuf, LedgerError> {
        if execution_id.is_empty()
            || execution_id.contains(['/', '\\'])
            || execution_id.starts_with('.')
        {
            return Err(LedgerError::StorageError(format!(
                "invalid execution id: {:?}",
                execution_id
            )));
        }
        Ok(self.dir.join(format!("{}.ledger.json", execution_id)))
    }

    async fn read_record(&self, path: &Path) -> Result<Option<ExecutionRecord>, LedgerError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LedgerError::StorageError(e.to_string())),
        };
        serde_json::from_slice::<ExecutionRecord>(&bytes)
            .map(Some)
            .map_err(|e| LedgerError::Corrupted(e.to_string()))
    }

    async fn write_record(&self, path: &Path, record: &ExecutionRecord) -> Result<(), LedgerError> {
        let bytes = serde_json::to_vec_pretty(record)
            .map_err(|e| LedgerError::SerializationError(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| LedgerError::StorageError(e.to_string()))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| LedgerError::StorageError(e.to_string()))
    }
}

#[async_trait]
impl LedgerStore for FileLedgerStore {
    async fn append(&self, execution_id: &str, entry: &LedgerEntry) -> Result<(), LedgerError> {
        let path = self.path_for(execution_id)?;
        let _guard = self.write_lock.lock().await;
        let mut record = self
            .read_record(&path)
            .await?
            .unwrap_or_else(|| new_record(execution_id, entry));
        record.entries.push(entry.clone());
        record.updated_at = entry.recorded_at;
        self.write_record(&path, &record).await
    }

    async fn load(&self, execution_id: &str) -> Result<Option<ExecutionRecord>, LedgerError> {
        let path = self.path_for(execution_id)?;
        self.read_record(&path).await
    }

    async fn overwrite(&self, record: &ExecutionRecord) -> Result<(), LedgerError> {
        let path = self.path_for(&record.execution_id)?;
        let _guard = self.write_lock.lock().await;
        self.write_record(&path, record).await
    }

    async fn discard_trailing_error(&self, execution_id: &str) -> Result<bool, LedgerError> {
        let path = self.path_for(execution_id)?;
        let _guard = self.write_lock.lock().await;
        let Some(mut record) = self.read_record(&path).await? else {
            return Ok(false);
        };
        if !pop_trailing_error(&mut record) {
            return Ok(false);
        }
        self.write_record(&path, &record).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ledger::types::sample_entry;
    use std::sync::Arc;

    fn record(entries: Vec<LedgerEntry>, status: RunStatus) -> ExecutionRecord {
        ExecutionRecord {
            execution_id: "exec-1".to_string(),
            status,
            entries,
            runtime_state: Default::default(),
            updated_at: 1,
        }
    }

    #[tokio::test]
    async fn test_memory_store_append_load_overwrite() {
        let store = MemoryLedgerStore::new();
        assert!(store.load("exec-1").await.unwrap().is_none());

        store
            .append("exec-1", &sample_entry("a", EntryStatus::Finished))
            .await
            .unwrap();
        store
            .append("exec-1", &sample_entry("b", EntryStatus::Finished))
            .await
            .unwrap();
        let loaded = store.load("exec-1").await.unwrap().unwrap();
        assert_eq!(loaded.status, RunStatus::InProgress);
        assert_eq!(loaded.entries.len(), 2);
        assert_eq!(loaded.entries[1].node_id, "b");

        store
            .overwrite(&record(vec![], RunStatus::Finished))
            .await
            .unwrap();
        let loaded = store.load("exec-1").await.unwrap().unwrap();
        assert_eq!(loaded.status, RunStatus::Finished);
        assert!(loaded.entries.is_empty());
    }

    #[tokio::test]
    async fn test_discard_trailing_error_after_stop() {
        let store = MemoryLedgerStore::new();
        store
            .overwrite(&record(
                vec![
                    sample_entry("a", EntryStatus::Finished),
                    sample_entry("h", EntryStatus::Stopped),
                    sample_entry("h", EntryStatus::Error),
                ],
                RunStatus::Error,
            ))
            .await
            .unwrap();

        assert!(store.discard_trailing_error("exec-1").await.unwrap());
        let loaded = store.load("exec-1").await.unwrap().unwrap();
        assert_eq!(loaded.entries.len(), 2);
        assert_eq!(loaded.entries[1].status, EntryStatus::Stopped);
        assert_eq!(loaded.status, RunStatus::Stopped);

        assert!(!store.discard_trailing_error("exec-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_discard_leaves_plain_error_alone() {
        let store = MemoryLedgerStore::new();
        store
            .overwrite(&record(
                vec![
                    sample_entry("a", EntryStatus::Finished),
                    sample_entry("b", EntryStatus::Error),
                ],
                RunStatus::Error,
            ))
            .await
            .unwrap();
        assert!(!store.discard_trailing_error("exec-1").await.unwrap());
        assert_eq!(store.load("exec-1").await.unwrap().unwrap().entries.len(), 2);
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLedgerStore::new(dir.path()).unwrap();

        store
            .append("exec-1", &sample_entry("a", EntryStatus::Finished))
            .await
            .unwrap();
        store
            .append("exec-1", &sample_entry("h", EntryStatus::Stopped))
            .await
            .unwrap();

        let mut loaded = store.load("exec-1").await.unwrap().unwrap();
        assert_eq!(loaded.entries.len(), 2);

        loaded.status = RunStatus::Stopped;
        store.overwrite(&loaded).await.unwrap();
        let reloaded = store.load("exec-1").await.unwrap().unwrap();
        assert_eq!(reloaded.status, RunStatus::Stopped);
        assert!(dir.path().join("exec-1.ledger.json").exists());
    }

    #[tokio::test]
    async fn test_file_store_discard_races_with_append() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileLedgerStore::new(dir.path()).unwrap());
        store
            .overwrite(&record(
                vec![
                    sample_entry("h", EntryStatus::Stopped),
                    sample_entry("h", EntryStatus::Error),
                ],
                RunStatus::Error,
            ))
            .await
            .unwrap();

        let discard = {
            let store = store.clone();
            tokio::spawn(async move { store.discard_trailing_error("exec-1").await })
        };
        let append = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .append("exec-1", &sample_entry("late", EntryStatus::Finished))
                    .await
            })
        };
        let discarded = discard.await.unwrap().unwrap();
        append.await.unwrap().unwrap();

        let loaded = store.load("exec-1").await.unwrap().unwrap();
        assert!(loaded.entries.iter().any(|e| e.node_id == "late"));
        let expected = if discarded { 2 } else { 3 };
        assert_eq!(loaded.entries.len(), expected);
    }

    #[tokio::test]
    async fn test_file_store_rejects_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLedgerStore::new(dir.path()).unwrap();
        assert!(store.load("../escape").await.is_err());
    }

    #[tokio::test]
    async fn test_file_store_corrupted_document() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.ledger.json"), b"not json").unwrap();
        let store = FileLedgerStore::new(dir.path()).unwrap();
        assert!(matches!(
            store.load("bad").await,
            Err(LedgerError::Corrupted(_))
        ));
    }
}
