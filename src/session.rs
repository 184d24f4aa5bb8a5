use chrono::NaiveDate;
use std::sync::Arc;

use crate::auth::AuthProvider;
use crate::backend::Backend;
use crate::clock::Clock;
use crate::compare::ComparisonState;
use crate::error::{StoreError, StoreResult};
use crate::export::{ExportSummary, Theme};
use crate::goals::GoalStore;
use crate::period::Granularity;
use crate::scores::Scores;
use crate::snapshots::SnapshotStore;
use crate::types::{Area, Snapshot, User};

/// Per-user working set: live scores, both stores and the comparison
/// selection. Built once after sign-in and handed to whatever needs it.
pub struct Session {
    user: User,
    clock: Arc<dyn Clock>,
    scores: Scores,
    snapshots: SnapshotStore,
    goals: GoalStore,
    comparison: ComparisonState,
    theme: Theme,
}

impl Session {
    /// Open a session for the signed-in user and load their rows.
    pub async fn start(
        auth: &dyn AuthProvider,
        backend: Arc<dyn Backend>,
        clock: Arc<dyn Clock>,
    ) -> StoreResult<Self> {
        let user = auth.current_user().await.ok_or(StoreError::NotSignedIn)?;
        let mut session = Self::new(user, backend, clock);
        session.snapshots.load().await?;
        session.goals.load().await?;
        tracing::info!(
            user_id = %session.user.id,
            snapshots = session.snapshots.len(),
            goals = session.goals.len(),
            "session started"
        );
        Ok(session)
    }

    /// Session with empty stores; call [`Session::reload`] to fetch rows.
    pub fn new(user: User, backend: Arc<dyn Backend>, clock: Arc<dyn Clock>) -> Self {
        Self {
            snapshots: SnapshotStore::new(backend.clone(), clock.clone(), user.id.clone()),
            goals: GoalStore::new(backend, clock.clone(), user.id.clone()),
            user,
            clock,
            scores: Scores::new(),
            comparison: ComparisonState::new(),
            theme: Theme::default(),
        }
    }

    pub async fn reload(&mut self) -> StoreResult<()> {
        self.snapshots.load().await?;
        self.goals.load().await?;
        self.comparison.observe(&self.snapshots);
        Ok(())
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn scores(&self) -> &Scores {
        &self.scores
    }

    pub fn set_score(&mut self, area: Area, value: u8) {
        self.scores.set_score(area, value);
    }

    pub fn replace_scores(&mut self, scores: Scores) {
        self.scores = scores;
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    pub fn goals(&self) -> &GoalStore {
        &self.goals
    }

    pub fn goals_mut(&mut self) -> &mut GoalStore {
        &mut self.goals
    }

    pub fn comparison(&self) -> &ComparisonState {
        &self.comparison
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    pub fn set_compare(&mut self, enabled: bool) {
        self.comparison.set_enabled(enabled);
    }

    /// Select a snapshot to compare against; ids that do not resolve are
    /// dropped right away.
    pub fn select_snapshot(&mut self, id: Option<String>) {
        self.comparison.select(id);
        self.comparison.observe(&self.snapshots);
    }

    pub async fn save_snapshot(
        &mut self,
        granularity: Granularity,
        note: Option<String>,
    ) -> StoreResult<Snapshot> {
        let saved = self
            .snapshots
            .add_with_note(&self.scores, granularity, note)
            .await?;
        self.comparison.observe(&self.snapshots);
        Ok(saved)
    }

    pub async fn delete_snapshot(&mut self, id: &str) -> StoreResult<()> {
        let result = self.snapshots.delete_one(id).await;
        self.comparison.observe(&self.snapshots);
        result
    }

    pub async fn delete_snapshots_by_period(&mut self, granularity: Granularity) -> StoreResult<()> {
        let result = self.snapshots.delete_by_granularity(granularity).await;
        self.comparison.observe(&self.snapshots);
        result
    }

    /// Scores to draw next to the live ones, if any.
    pub fn comparison_scores(&self) -> Option<&Scores> {
        self.comparison.resolve(&self.snapshots)
    }

    pub fn comparison_snapshot(&self) -> Option<&Snapshot> {
        self.comparison.resolve_snapshot(&self.snapshots)
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }

    pub fn export_summary(&self) -> ExportSummary {
        ExportSummary::new(&self.scores, self.today())
    }
}
