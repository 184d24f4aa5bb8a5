use crate::scores::Scores;
use crate::snapshots::SnapshotStore;
use crate::types::Snapshot;

/// Chooses which saved snapshot is overlaid on the live scores.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComparisonState {
    enabled: bool,
    selected: Option<String>,
}

impl ComparisonState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn select(&mut self, id: Option<String>) {
        self.selected = id;
    }

    /// Clear a selection that no longer points at a stored snapshot.
    /// Call after every change to the snapshot collection.
    pub fn observe(&mut self, store: &SnapshotStore) {
        let stale = match &self.selected {
            Some(id) => store.by_id(id).is_none(),
            None => false,
        };
        if stale {
            tracing::debug!(id = ?self.selected, "comparison snapshot gone, clearing selection");
            self.selected = None;
        }
    }

    /// Snapshot to compare against: the selected one if it still exists,
    /// otherwise the latest. Nothing while comparison is off.
    pub fn resolve_snapshot<'a>(&self, store: &'a SnapshotStore) -> Option<&'a Snapshot> {
        if !self.enabled {
            return None;
        }
        self.selected
            .as_deref()
            .and_then(|id| store.by_id(id))
            .or_else(|| store.latest())
    }

    pub fn resolve<'a>(&self, store: &'a SnapshotStore) -> Option<&'a Scores> {
        self.resolve_snapshot(store).map(|s| &s.scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::clock::ManualClock;
    use crate::period::Granularity;
    use crate::types::Area;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;

    fn setup() -> (Arc<ManualClock>, SnapshotStore) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 8, 1, 10, 0, 0).unwrap(),
        ));
        let store = SnapshotStore::new(Arc::new(MemoryBackend::new()), clock.clone(), "me");
        (clock, store)
    }

    #[tokio::test]
    async fn scenario_from_empty_store() {
        let (_, mut store) = setup();
        let mut state = ComparisonState::new();
        assert_eq!(state.resolve(&store), None);

        state.set_enabled(true);
        assert_eq!(state.resolve(&store), None);

        let scores = Scores::new().with(Area::Health, 7);
        store.add(&scores, Granularity::Month).await.unwrap();
        state.observe(&store);
        assert_eq!(state.resolve(&store), Some(&scores));
    }

    #[tokio::test]
    async fn selected_snapshot_wins_over_latest() {
        let (clock, mut store) = setup();
        let old = store.add(&Scores::uniform(2), Granularity::Month).await.unwrap();
        clock.advance(Duration::minutes(1));
        store.add(&Scores::uniform(9), Granularity::Month).await.unwrap();

        let mut state = ComparisonState::new();
        state.set_enabled(true);
        state.select(Some(old.id.clone()));
        assert_eq!(state.resolve(&store), Some(&Scores::uniform(2)));

        state.set_enabled(false);
        assert_eq!(state.resolve(&store), None);
        assert_eq!(state.selected(), Some(old.id.as_str()));
    }

    #[tokio::test]
    async fn deleting_selected_snapshot_falls_back_to_latest() {
        let (clock, mut store) = setup();
        let old = store.add(&Scores::uniform(2), Granularity::Month).await.unwrap();
        clock.advance(Duration::minutes(1));
        store.add(&Scores::uniform(9), Granularity::Year).await.unwrap();

        let mut state = ComparisonState::new();
        state.set_enabled(true);
        state.select(Some(old.id.clone()));

        store.delete_one(&old.id).await.unwrap();
        state.observe(&store);

        assert_eq!(state.selected(), None);
        assert_eq!(state.resolve(&store), Some(&Scores::uniform(9)));
    }

    #[tokio::test]
    async fn observe_keeps_a_valid_selection() {
        let (_, mut store) = setup();
        let snap = store.add(&Scores::new(), Granularity::Quarter).await.unwrap();
        let mut state = ComparisonState::new();
        state.select(Some(snap.id.clone()));
        state.observe(&store);
        assert_eq!(state.selected(), Some(snap.id.as_str()));
    }

    #[tokio::test]
    async fn bulk_delete_clears_selection_in_that_period() {
        let (_, mut store) = setup();
        let snap = store.add(&Scores::new(), Granularity::Quarter).await.unwrap();
        let mut state = ComparisonState::new();
        state.select(Some(snap.id));
        store.delete_by_granularity(Granularity::Quarter).await.unwrap();
        state.observe(&store);
        assert_eq!(state.selected(), None);
        state.set_enabled(true);
        assert_eq!(state.resolve(&store), None);
    }
}
