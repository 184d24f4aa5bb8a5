use std::sync::Arc;

use crate::backend::{Backend, BackendResult};
use crate::clock::Clock;
use crate::error::StoreResult;
use crate::period::Granularity;
use crate::scores::Scores;
use crate::types::Snapshot;

/// History of saved scores for one owner, newest first.
///
/// The in-memory collection only changes after the backend has confirmed
/// the write.
pub struct SnapshotStore {
    backend: Arc<dyn Backend>,
    clock: Arc<dyn Clock>,
    owner: String,
    snapshots: Vec<Snapshot>,
    last_error: Option<String>,
}

impl SnapshotStore {
    pub fn new(backend: Arc<dyn Backend>, clock: Arc<dyn Clock>, owner: impl Into<String>) -> Self {
        Self {
            backend,
            clock,
            owner: owner.into(),
            snapshots: Vec::new(),
            last_error: None,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub async fn load(&mut self) -> StoreResult<()> {
        let result = self.backend.list_snapshots(&self.owner, None).await;
        let snapshots = self.record("load snapshots", result)?;
        tracing::debug!(count = snapshots.len(), "loaded snapshots");
        self.snapshots = snapshots;
        Ok(())
    }

    pub async fn add(&mut self, scores: &Scores, granularity: Granularity) -> StoreResult<Snapshot> {
        self.add_with_note(scores, granularity, None).await
    }

    pub async fn add_with_note(
        &mut self,
        scores: &Scores,
        granularity: Granularity,
        overall_note: Option<String>,
    ) -> StoreResult<Snapshot> {
        let snapshot = Snapshot::new(scores.clone(), granularity, self.clock.now(), overall_note);
        let result = self.backend.insert_snapshot(&self.owner, &snapshot).await;
        self.record("save snapshot", result)?;
        tracing::info!(
            id = %snapshot.id,
            period_type = %snapshot.period_type,
            period_key = %snapshot.period_key,
            "saved snapshot"
        );
        self.snapshots.insert(0, snapshot.clone());
        Ok(snapshot)
    }

    /// Remove one snapshot. Unknown ids are ignored.
    pub async fn delete_one(&mut self, id: &str) -> StoreResult<()> {
        if self.by_id(id).is_none() {
            tracing::debug!(id, "delete of unknown snapshot ignored");
            return Ok(());
        }
        let result = self.backend.delete_snapshot(&self.owner, id).await;
        self.record("delete snapshot", result)?;
        self.snapshots.retain(|s| s.id != id);
        tracing::info!(id, "deleted snapshot");
        Ok(())
    }

    /// Remove every snapshot tagged with `granularity`.
    pub async fn delete_by_granularity(&mut self, granularity: Granularity) -> StoreResult<()> {
        if !self.snapshots.iter().any(|s| s.period_type == granularity) {
            return Ok(());
        }
        let result = self
            .backend
            .delete_snapshots_by_period(&self.owner, granularity)
            .await;
        self.record("delete snapshots by period", result)?;
        let before = self.snapshots.len();
        self.snapshots.retain(|s| s.period_type != granularity);
        tracing::info!(
            period_type = %granularity,
            removed = before - self.snapshots.len(),
            "deleted snapshots by period"
        );
        Ok(())
    }

    /// Most recently created snapshot, regardless of period key.
    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.first()
    }

    pub fn by_id(&self, id: &str) -> Option<&Snapshot> {
        self.snapshots.iter().find(|s| s.id == id)
    }

    pub fn all(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.snapshots.iter()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Snapshots per selectable granularity, in display order.
    pub fn grouped(&self) -> Vec<(Granularity, Vec<&Snapshot>)> {
        Granularity::SELECTABLE
            .into_iter()
            .map(|g| (g, self.iter().filter(|s| s.period_type == g).collect()))
            .collect()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn record<T>(&mut self, action: &str, result: BackendResult<T>) -> StoreResult<T> {
        match result {
            Ok(value) => {
                self.last_error = None;
                Ok(value)
            }
            Err(err) => {
                tracing::error!(action, backend = self.backend.name(), error = %err, "snapshot store call failed");
                self.last_error = Some(format!("Failed to {action}: {err}"));
                Err(err.into())
            }
        }
    }
}
