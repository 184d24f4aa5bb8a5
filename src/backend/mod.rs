//! Persistence collaborators.
//!
//! A backend stores snapshot and goal rows per owner. Stores only ever talk
//! to the [`Backend`] trait; which implementation sits behind it is chosen
//! once when the session is built.

pub mod file;
pub mod memory;
pub mod rest;

use async_trait::async_trait;
use thiserror::Error;

use crate::period::Granularity;
use crate::types::{Goal, Snapshot};

pub use file::JsonFileBackend;
pub use memory::MemoryBackend;
pub use rest::{RestBackend, RestConfig};

pub type BackendResult<T> = core::result::Result<T, BackendError>;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Network error: {0}")]
    Network(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Short name used in logs and status output.
    fn name(&self) -> &'static str;

    async fn insert_snapshot(&self, owner: &str, snapshot: &Snapshot) -> BackendResult<()>;

    /// Owner's snapshots, newest first, optionally restricted to one period type.
    async fn list_snapshots(
        &self,
        owner: &str,
        period_type: Option<Granularity>,
    ) -> BackendResult<Vec<Snapshot>>;

    async fn delete_snapshot(&self, owner: &str, id: &str) -> BackendResult<()>;

    async fn delete_snapshots_by_period(
        &self,
        owner: &str,
        period_type: Granularity,
    ) -> BackendResult<()>;

    async fn list_goals(&self, owner: &str) -> BackendResult<Vec<Goal>>;

    /// Insert or replace the goal stored under the same
    /// `(period_type, period_key, area_id)` for this owner.
    async fn upsert_goal(&self, owner: &str, goal: &Goal) -> BackendResult<()>;
}

/// Newest-first ordering used by every backend for snapshot reads. Equal
/// timestamps fall back to the id, which grows in creation order.
pub(crate) fn sort_newest_first(snapshots: &mut [Snapshot]) {
    snapshots.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scores::Scores;
    use chrono::{TimeZone, Utc};

    #[test]
    fn equal_timestamps_order_by_id() {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let older = Snapshot::new(Scores::new(), Granularity::Month, at, None);
        let newer = Snapshot::new(Scores::uniform(9), Granularity::Year, at, None);
        let mut snapshots = vec![older.clone(), newer.clone()];
        sort_newest_first(&mut snapshots);
        assert_eq!(snapshots, vec![newer, older]);
    }
}
