use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{Backend, BackendError, BackendResult, sort_newest_first};
use crate::period::Granularity;
use crate::types::{Goal, Row, Snapshot};

/// Row tables shared by the in-memory and JSON file backends.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct StorageData {
    #[serde(default)]
    pub snapshots: Vec<Row<Snapshot>>,
    #[serde(default)]
    pub goals: Vec<Row<Goal>>,
}

impl StorageData {
    pub fn insert_snapshot(&mut self, owner: &str, snapshot: &Snapshot) {
        self.snapshots.push(Row::new(owner, snapshot.clone()));
    }

    pub fn snapshots_for(&self, owner: &str, period_type: Option<Granularity>) -> Vec<Snapshot> {
        let mut out: Vec<Snapshot> = self
            .snapshots
            .iter()
            .filter(|row| row.user_id == owner)
            .filter(|row| period_type.is_none_or(|p| row.record.period_type == p))
            .map(|row| row.record.clone())
            .collect();
        sort_newest_first(&mut out);
        out
    }

    pub fn delete_snapshot(&mut self, owner: &str, id: &str) -> usize {
        let before = self.snapshots.len();
        self.snapshots
            .retain(|row| !(row.user_id == owner && row.record.id == id));
        before - self.snapshots.len()
    }

    pub fn delete_snapshots_by_period(&mut self, owner: &str, period_type: Granularity) -> usize {
        let before = self.snapshots.len();
        self.snapshots
            .retain(|row| !(row.user_id == owner && row.record.period_type == period_type));
        before - self.snapshots.len()
    }

    pub fn goals_for(&self, owner: &str) -> Vec<Goal> {
        self.goals
            .iter()
            .filter(|row| row.user_id == owner)
            .map(|row| row.record.clone())
            .collect()
    }

    /// Replace by `(owner, period_type, period_key, area_id)`, insert otherwise.
    pub fn upsert_goal(&mut self, owner: &str, goal: &Goal) {
        let key = goal.key();
        match self
            .goals
            .iter_mut()
            .find(|row| row.user_id == owner && row.record.key() == key)
        {
            Some(row) => row.record = goal.clone(),
            None => self.goals.push(Row::new(owner, goal.clone())),
        }
    }
}

/// In-process backend. Failures can be switched on to exercise error paths.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: Mutex<StorageData>,
    failing: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn data(&self) -> StorageData {
        match self.data.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut StorageData) -> T) -> BackendResult<T> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable(
                "memory backend set to fail".to_string(),
            ));
        }
        let mut guard = self
            .data
            .lock()
            .map_err(|_| BackendError::Unavailable("memory backend lock poisoned".to_string()))?;
        Ok(f(&mut guard))
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn insert_snapshot(&self, owner: &str, snapshot: &Snapshot) -> BackendResult<()> {
        self.with(|data| data.insert_snapshot(owner, snapshot))
    }

    async fn list_snapshots(
        &self,
        owner: &str,
        period_type: Option<Granularity>,
    ) -> BackendResult<Vec<Snapshot>> {
        self.with(|data| data.snapshots_for(owner, period_type))
    }

    async fn delete_snapshot(&self, owner: &str, id: &str) -> BackendResult<()> {
        self.with(|data| {
            data.delete_snapshot(owner, id);
        })
    }

    async fn delete_snapshots_by_period(
        &self,
        owner: &str,
        period_type: Granularity,
    ) -> BackendResult<()> {
        self.with(|data| {
            data.delete_snapshots_by_period(owner, period_type);
        })
    }

    async fn list_goals(&self, owner: &str) -> BackendResult<Vec<Goal>> {
        self.with(|data| data.goals_for(owner))
    }

    async fn upsert_goal(&self, owner: &str, goal: &Goal) -> BackendResult<()> {
        self.with(|data| data.upsert_goal(owner, goal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scores::Scores;
    use crate::types::{Area, GoalKey};
    use chrono::{Duration, TimeZone, Utc};

    fn snapshot_at(minutes: i64, period: Granularity) -> Snapshot {
        let at = Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap() + Duration::minutes(minutes);
        Snapshot::new(Scores::new(), period, at, None)
    }

    #[tokio::test]
    async fn lists_are_scoped_to_owner_and_newest_first() {
        let backend = MemoryBackend::new();
        let older = snapshot_at(0, Granularity::Month);
        let newer = snapshot_at(5, Granularity::Year);
        backend.insert_snapshot("a", &newer).await.unwrap();
        backend.insert_snapshot("a", &older).await.unwrap();
        backend
            .insert_snapshot("b", &snapshot_at(9, Granularity::Month))
            .await
            .unwrap();

        let listed = backend.list_snapshots("a", None).await.unwrap();
        assert_eq!(listed, vec![newer.clone(), older.clone()]);

        let months = backend
            .list_snapshots("a", Some(Granularity::Month))
            .await
            .unwrap();
        assert_eq!(months, vec![older]);
    }

    #[tokio::test]
    async fn delete_by_period_leaves_other_owners_alone() {
        let backend = MemoryBackend::new();
        backend
            .insert_snapshot("a", &snapshot_at(0, Granularity::Month))
            .await
            .unwrap();
        backend
            .insert_snapshot("b", &snapshot_at(1, Granularity::Month))
            .await
            .unwrap();
        backend
            .delete_snapshots_by_period("a", Granularity::Month)
            .await
            .unwrap();
        assert!(backend.list_snapshots("a", None).await.unwrap().is_empty());
        assert_eq!(backend.list_snapshots("b", None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn upsert_replaces_on_compound_key() {
        let backend = MemoryBackend::new();
        let key = GoalKey {
            period_type: Granularity::Quarter,
            period_key: "2025-Q2".into(),
            area_id: Area::Career,
        };
        let mut goal = Goal::empty(&key);
        backend.upsert_goal("a", &goal).await.unwrap();

        goal.objective = "ship it".into();
        backend.upsert_goal("a", &goal).await.unwrap();

        let mut other = Goal::empty(&key);
        other.objective = "someone else".into();
        backend.upsert_goal("b", &other).await.unwrap();

        let goals = backend.list_goals("a").await.unwrap();
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].objective, "ship it");
        assert_eq!(backend.data().goals.len(), 2);
    }

    #[tokio::test]
    async fn failing_backend_reports_unavailable() {
        let backend = MemoryBackend::new();
        backend.set_failing(true);
        let err = backend.list_goals("a").await.unwrap_err();
        assert!(matches!(err, BackendError::Unavailable(_)));
        backend.set_failing(false);
        assert!(backend.list_goals("a").await.is_ok());
    }
}
