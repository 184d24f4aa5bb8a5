use async_trait::async_trait;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::memory::StorageData;
use super::{Backend, BackendError, BackendResult};
use crate::metadata::DATA_DIR_NAME;
use crate::period::Granularity;
use crate::types::{Goal, Snapshot};

pub const DATA_FILE_NAME: &str = "data.json";

/// Write `value` as pretty JSON through a temporary file and an atomic
/// rename, creating the parent directory if needed.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> BackendResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp = path.with_extension("tmp");
    let mut f = File::create(&temp)?;
    let content = serde_json::to_string_pretty(value)?;
    f.write_all(content.as_bytes())?;
    f.sync_all()?;
    fs::rename(temp, path)?;
    Ok(())
}

/// Single JSON document on disk holding every owner's rows.
///
/// The cached copy only changes after the new document has been written,
/// so a failed write leaves both views at the previous state.
pub struct JsonFileBackend {
    storage_path: PathBuf,
    data: Mutex<StorageData>,
}

impl JsonFileBackend {
    /// `~/.life-wheel` unless a directory is given.
    pub fn default_dir() -> BackendResult<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| BackendError::Unavailable("couldn't find home dir".to_string()))?;
        Ok(home.join(DATA_DIR_NAME))
    }

    pub async fn open_in(dir: impl AsRef<Path>) -> BackendResult<Self> {
        Self::open(dir.as_ref().join(DATA_FILE_NAME)).await
    }

    /// Load the document at `storage_path`, creating an empty one if absent.
    pub async fn open(storage_path: impl Into<PathBuf>) -> BackendResult<Self> {
        let storage_path = storage_path.into();
        let path = storage_path.clone();
        let data = tokio::task::spawn_blocking(move || Self::load_or_init(&path))
            .await
            .map_err(|e| {
                BackendError::Io(std::io::Error::other(format!(
                    "spawn_blocking failed: {}",
                    e
                )))
            })??;
        tracing::debug!(
            path = %storage_path.display(),
            snapshots = data.snapshots.len(),
            goals = data.goals.len(),
            "opened data file"
        );
        Ok(Self {
            storage_path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.storage_path
    }

    fn load_or_init(storage_path: &Path) -> BackendResult<StorageData> {
        if storage_path.exists() {
            let contents = fs::read_to_string(storage_path)?;
            if contents.trim().is_empty() {
                return Ok(StorageData::default());
            }
            Ok(serde_json::from_str(&contents)?)
        } else {
            let data = StorageData::default();
            write_json_atomic(storage_path, &data)?;
            Ok(data)
        }
    }

    async fn persist(storage_path: PathBuf, data: StorageData) -> BackendResult<()> {
        tokio::task::spawn_blocking(move || write_json_atomic(&storage_path, &data))
            .await
            .map_err(|e| {
                BackendError::Io(std::io::Error::other(format!(
                    "spawn_blocking failed: {}",
                    e
                )))
            })?
    }

    /// Apply `f` to a copy, write it, then swap it in.
    async fn mutate<T>(&self, f: impl FnOnce(&mut StorageData) -> T) -> BackendResult<T> {
        let mut guard = self.data.lock().await;
        let mut next = guard.clone();
        let out = f(&mut next);
        Self::persist(self.storage_path.clone(), next.clone()).await?;
        *guard = next;
        Ok(out)
    }
}

#[async_trait]
impl Backend for JsonFileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn insert_snapshot(&self, owner: &str, snapshot: &Snapshot) -> BackendResult<()> {
        self.mutate(|data| data.insert_snapshot(owner, snapshot)).await
    }

    async fn list_snapshots(
        &self,
        owner: &str,
        period_type: Option<Granularity>,
    ) -> BackendResult<Vec<Snapshot>> {
        Ok(self.data.lock().await.snapshots_for(owner, period_type))
    }

    async fn delete_snapshot(&self, owner: &str, id: &str) -> BackendResult<()> {
        let removed = self.mutate(|data| data.delete_snapshot(owner, id)).await?;
        tracing::debug!(id, removed, "deleted snapshot rows");
        Ok(())
    }

    async fn delete_snapshots_by_period(
        &self,
        owner: &str,
        period_type: Granularity,
    ) -> BackendResult<()> {
        let removed = self
            .mutate(|data| data.delete_snapshots_by_period(owner, period_type))
            .await?;
        tracing::debug!(%period_type, removed, "deleted snapshot rows by period");
        Ok(())
    }

    async fn list_goals(&self, owner: &str) -> BackendResult<Vec<Goal>> {
        Ok(self.data.lock().await.goals_for(owner))
    }

    async fn upsert_goal(&self, owner: &str, goal: &Goal) -> BackendResult<()> {
        self.mutate(|data| data.upsert_goal(owner, goal)).await
    }
}
