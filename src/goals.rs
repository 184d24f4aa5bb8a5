use std::collections::HashMap;
use std::sync::Arc;

use ulid::Ulid;

use crate::backend::Backend;
use crate::clock::Clock;
use crate::error::StoreResult;
use crate::period::Granularity;
use crate::progress::{Overview, goal_progress};
use crate::types::{Area, Goal, GoalKey, MAX_SUB_GOALS, MAX_TASKS, SubGoal, Task, TaskPatch};

/// Goals of one owner, addressed by granularity and area within the
/// period that contains "now".
///
/// Every mutation writes the whole goal tree with a single upsert and only
/// then updates the cached copy.
pub struct GoalStore {
    backend: Arc<dyn Backend>,
    clock: Arc<dyn Clock>,
    owner: String,
    goals: HashMap<GoalKey, Goal>,
    last_error: Option<String>,
}

impl GoalStore {
    pub fn new(backend: Arc<dyn Backend>, clock: Arc<dyn Clock>, owner: impl Into<String>) -> Self {
        Self {
            backend,
            clock,
            owner: owner.into(),
            goals: HashMap::new(),
            last_error: None,
        }
    }

    pub async fn load(&mut self) -> StoreResult<()> {
        match self.backend.list_goals(&self.owner).await {
            Ok(goals) => {
                tracing::debug!(count = goals.len(), "loaded goals");
                self.goals = goals.into_iter().map(|g| (g.key(), g)).collect();
                self.last_error = None;
                Ok(())
            }
            Err(err) => {
                tracing::error!(backend = self.backend.name(), error = %err, "failed to load goals");
                self.last_error = Some(format!("Failed to load goals: {err}"));
                Err(err.into())
            }
        }
    }

    /// Key of the current period for `granularity` and `area`.
    pub fn current_key(&self, granularity: Granularity, area: Area) -> GoalKey {
        GoalKey::current(granularity, area, self.clock.now())
    }

    /// Stored goal, or a fresh empty one that is not persisted.
    pub fn get(&self, granularity: Granularity, area: Area) -> Goal {
        let key = self.current_key(granularity, area);
        self.goals
            .get(&key)
            .cloned()
            .unwrap_or_else(|| Goal::empty(&key))
    }

    pub async fn set_objective(
        &mut self,
        granularity: Granularity,
        area: Area,
        objective: &str,
    ) -> StoreResult<()> {
        self.mutate(granularity, area, "update objective", |goal| {
            goal.objective = objective.to_string();
            Some(())
        })
        .await?;
        Ok(())
    }

    /// Returns `false` without changing anything when the goal is full.
    pub async fn add_sub_goal(
        &mut self,
        granularity: Granularity,
        area: Area,
        title: &str,
    ) -> StoreResult<bool> {
        let added = self
            .mutate(granularity, area, "add sub-goal", |goal| {
                if goal.sub_goals.len() >= MAX_SUB_GOALS {
                    return None;
                }
                goal.sub_goals.push(SubGoal {
                    id: Ulid::new().to_string(),
                    title: title.to_string(),
                    tasks: Vec::new(),
                });
                Some(())
            })
            .await?;
        if added.is_none() {
            tracing::debug!(%area, %granularity, "sub-goal limit reached");
        }
        Ok(added.is_some())
    }

    pub async fn update_sub_goal_title(
        &mut self,
        granularity: Granularity,
        area: Area,
        sub_goal_id: &str,
        title: &str,
    ) -> StoreResult<()> {
        self.mutate(granularity, area, "rename sub-goal", |goal| {
            goal.sub_goal_mut(sub_goal_id)?.title = title.to_string();
            Some(())
        })
        .await?;
        Ok(())
    }

    /// Removes the sub-goal together with its tasks.
    pub async fn delete_sub_goal(
        &mut self,
        granularity: Granularity,
        area: Area,
        sub_goal_id: &str,
    ) -> StoreResult<()> {
        self.mutate(granularity, area, "delete sub-goal", |goal| {
            let index = goal.sub_goals.iter().position(|sg| sg.id == sub_goal_id)?;
            goal.sub_goals.remove(index);
            Some(())
        })
        .await?;
        Ok(())
    }

    /// Returns `false` when the sub-goal is missing or already has
    /// `MAX_TASKS` tasks.
    pub async fn add_task(
        &mut self,
        granularity: Granularity,
        area: Area,
        sub_goal_id: &str,
        text: &str,
    ) -> StoreResult<bool> {
        let added = self
            .mutate(granularity, area, "add task", |goal| {
                let sub_goal = goal.sub_goal_mut(sub_goal_id)?;
                if sub_goal.tasks.len() >= MAX_TASKS {
                    return None;
                }
                sub_goal.tasks.push(Task {
                    id: Ulid::new().to_string(),
                    text: text.to_string(),
                    done: false,
                });
                Some(())
            })
            .await?;
        Ok(added.is_some())
    }

    pub async fn update_task(
        &mut self,
        granularity: Granularity,
        area: Area,
        sub_goal_id: &str,
        task_id: &str,
        patch: &TaskPatch,
    ) -> StoreResult<()> {
        self.mutate(granularity, area, "update task", |goal| {
            let task = goal
                .sub_goal_mut(sub_goal_id)?
                .tasks
                .iter_mut()
                .find(|t| t.id == task_id)?;
            patch.apply(task);
            Some(())
        })
        .await?;
        Ok(())
    }

    pub async fn delete_task(
        &mut self,
        granularity: Granularity,
        area: Area,
        sub_goal_id: &str,
        task_id: &str,
    ) -> StoreResult<()> {
        self.mutate(granularity, area, "delete task", |goal| {
            let tasks = &mut goal.sub_goal_mut(sub_goal_id)?.tasks;
            let index = tasks.iter().position(|t| t.id == task_id)?;
            tasks.remove(index);
            Some(())
        })
        .await?;
        Ok(())
    }

    pub async fn toggle_task(
        &mut self,
        granularity: Granularity,
        area: Area,
        sub_goal_id: &str,
        task_id: &str,
    ) -> StoreResult<()> {
        self.mutate(granularity, area, "toggle task", |goal| {
            let task = goal
                .sub_goal_mut(sub_goal_id)?
                .tasks
                .iter_mut()
                .find(|t| t.id == task_id)?;
            task.done = !task.done;
            Some(())
        })
        .await?;
        Ok(())
    }

    /// Percentage of done tasks, 0..=100.
    pub fn progress(&self, granularity: Granularity, area: Area) -> u8 {
        let key = self.current_key(granularity, area);
        self.goals.get(&key).map(goal_progress).unwrap_or(0)
    }

    /// Every area's goal for the current period of `granularity`.
    pub fn overview(&self, granularity: Granularity) -> Overview {
        let now = self.clock.now();
        let goals = Area::ALL
            .into_iter()
            .map(|area| {
                let key = GoalKey::current(granularity, area, now);
                self.goals
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(|| Goal::empty(&key))
            })
            .collect();
        Overview::from_goals(granularity, granularity.key_at(now), goals)
    }

    pub fn len(&self) -> usize {
        self.goals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Run `edit` on a copy of the current goal. `None` from `edit` means
    /// nothing changed and nothing is written.
    async fn mutate<T>(
        &mut self,
        granularity: Granularity,
        area: Area,
        action: &str,
        edit: impl FnOnce(&mut Goal) -> Option<T>,
    ) -> StoreResult<Option<T>> {
        let mut goal = self.get(granularity, area);
        let Some(out) = edit(&mut goal) else {
            return Ok(None);
        };

        if let Err(err) = self.backend.upsert_goal(&self.owner, &goal).await {
            tracing::error!(
                action,
                key = %goal.key(),
                backend = self.backend.name(),
                error = %err,
                "goal upsert failed"
            );
            self.last_error = Some(format!("Failed to {action}: {err}"));
            return Err(err.into());
        }

        tracing::debug!(action, key = %goal.key(), "goal saved");
        self.last_error = None;
        self.goals.insert(goal.key(), goal);
        Ok(Some(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};

    const G: Granularity = Granularity::Month;
    const A: Area = Area::Health;

    fn store() -> (Arc<MemoryBackend>, Arc<ManualClock>, GoalStore) {
        let backend = Arc::new(MemoryBackend::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 4, 15, 12, 0, 0).unwrap(),
        ));
        let store = GoalStore::new(backend.clone(), clock.clone(), "me");
        (backend, clock, store)
    }

    async fn with_sub_goal(store: &mut GoalStore) -> String {
        assert!(store.add_sub_goal(G, A, "move").await.unwrap());
        store.get(G, A).sub_goals.last().unwrap().id.clone()
    }

    #[tokio::test]
    async fn get_returns_empty_goal_without_persisting() {
        let (backend, _, store) = store();
        let goal = store.get(G, A);
        assert!(goal.is_empty());
        assert_eq!(goal.period_key, "2025-04");
        assert_eq!(goal.area_id, A);
        assert!(backend.data().goals.is_empty());
    }

    #[tokio::test]
    async fn objective_upsert_preserves_sub_goals() {
        let (backend, _, mut store) = store();
        with_sub_goal(&mut store).await;
        store.set_objective(G, A, "feel strong").await.unwrap();

        let goal = store.get(G, A);
        assert_eq!(goal.objective, "feel strong");
        assert_eq!(goal.sub_goals.len(), 1);
        assert_eq!(backend.list_goals("me").await.unwrap(), vec![goal]);
    }

    #[tokio::test]
    async fn fourth_sub_goal_is_rejected() {
        let (backend, _, mut store) = store();
        for title in ["a", "b", "c"] {
            assert!(store.add_sub_goal(G, A, title).await.unwrap());
        }
        let persisted = backend.data();

        assert!(!store.add_sub_goal(G, A, "d").await.unwrap());
        assert_eq!(store.get(G, A).sub_goals.len(), 3);
        assert_eq!(backend.data().goals[0].record.sub_goals.len(), 3);
        assert_eq!(backend.data().goals, persisted.goals);
    }

    #[tokio::test]
    async fn fourth_task_is_rejected() {
        let (_, _, mut store) = store();
        let sg = with_sub_goal(&mut store).await;
        for text in ["1", "2", "3"] {
            assert!(store.add_task(G, A, &sg, text).await.unwrap());
        }
        assert!(!store.add_task(G, A, &sg, "4").await.unwrap());
        assert_eq!(store.get(G, A).sub_goal(&sg).unwrap().tasks.len(), 3);
    }

    #[tokio::test]
    async fn add_task_to_missing_sub_goal_fails() {
        let (backend, _, mut store) = store();
        assert!(!store.add_task(G, A, "nope", "x").await.unwrap());
        assert!(backend.data().goals.is_empty());
    }

    #[tokio::test]
    async fn progress_counts_tasks_not_sub_goals() {
        let (_, _, mut store) = store();
        let first = with_sub_goal(&mut store).await;
        let second = with_sub_goal(&mut store).await;
        store.add_task(G, A, &first, "a").await.unwrap();
        store.add_task(G, A, &first, "b").await.unwrap();
        store.add_task(G, A, &second, "c").await.unwrap();

        let done_id = store.get(G, A).sub_goal(&first).unwrap().tasks[0].id.clone();
        store.toggle_task(G, A, &first, &done_id).await.unwrap();

        assert_eq!(store.progress(G, A), 33);
        assert_eq!(store.progress(G, Area::Career), 0);
    }

    #[tokio::test]
    async fn toggle_and_update_task() {
        let (_, _, mut store) = store();
        let sg = with_sub_goal(&mut store).await;
        store.add_task(G, A, &sg, "stretch").await.unwrap();
        let task_id = store.get(G, A).sub_goal(&sg).unwrap().tasks[0].id.clone();

        store.toggle_task(G, A, &sg, &task_id).await.unwrap();
        assert!(store.get(G, A).sub_goal(&sg).unwrap().tasks[0].done);
        store.toggle_task(G, A, &sg, &task_id).await.unwrap();
        assert!(!store.get(G, A).sub_goal(&sg).unwrap().tasks[0].done);

        store
            .update_task(G, A, &sg, &task_id, &TaskPatch::text("yoga"))
            .await
            .unwrap();
        let task = store.get(G, A).sub_goal(&sg).unwrap().tasks[0].clone();
        assert_eq!(task.text, "yoga");
        assert!(!task.done);

        // Missing ids are ignored.
        store.toggle_task(G, A, &sg, "missing").await.unwrap();
        store.delete_task(G, A, &sg, "missing").await.unwrap();
        assert_eq!(store.get(G, A).sub_goal(&sg).unwrap().tasks.len(), 1);

        store.delete_task(G, A, &sg, &task_id).await.unwrap();
        assert!(store.get(G, A).sub_goal(&sg).unwrap().tasks.is_empty());
    }

    #[tokio::test]
    async fn delete_sub_goal_cascades() {
        let (backend, _, mut store) = store();
        let sg = with_sub_goal(&mut store).await;
        store.add_task(G, A, &sg, "x").await.unwrap();
        store
            .update_sub_goal_title(G, A, &sg, "move daily")
            .await
            .unwrap();
        assert_eq!(store.get(G, A).sub_goal(&sg).unwrap().title, "move daily");

        store.delete_sub_goal(G, A, &sg).await.unwrap();
        assert!(store.get(G, A).sub_goals.is_empty());
        assert!(backend.data().goals[0].record.sub_goals.is_empty());
    }

    #[tokio::test]
    async fn failed_upsert_leaves_goal_untouched() {
        let (backend, _, mut store) = store();
        store.set_objective(G, A, "before").await.unwrap();
        backend.set_failing(true);

        assert!(store.set_objective(G, A, "after").await.is_err());
        assert!(store.add_sub_goal(G, A, "x").await.is_err());
        assert_eq!(store.get(G, A).objective, "before");
        assert!(store.get(G, A).sub_goals.is_empty());
        assert!(store.last_error().unwrap().starts_with("Failed to add sub-goal"));
    }

    #[tokio::test]
    async fn goals_follow_the_current_period() {
        let (_, clock, mut store) = store();
        store.set_objective(G, A, "april").await.unwrap();
        store
            .set_objective(Granularity::Quarter, A, "q2")
            .await
            .unwrap();

        clock.set(Utc.with_ymd_and_hms(2025, 5, 2, 0, 0, 0).unwrap());
        assert!(store.get(G, A).is_empty());
        assert_eq!(store.get(Granularity::Quarter, A).objective, "q2");
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn load_restores_goals_by_key() {
        let (backend, clock, mut store) = store();
        store.set_objective(G, Area::Finance, "save 10%").await.unwrap();

        let mut fresh = GoalStore::new(backend.clone(), clock.clone(), "me");
        fresh.load().await.unwrap();
        assert_eq!(fresh.get(G, Area::Finance).objective, "save 10%");
    }

    #[tokio::test]
    async fn overview_covers_every_area() {
        let (_, _, mut store) = store();
        let sg = with_sub_goal(&mut store).await;
        store.add_task(G, A, &sg, "a").await.unwrap();
        let overview = store.overview(G);
        assert_eq!(overview.period_key, "2025-04");
        assert_eq!(overview.areas.len(), Area::COUNT);
        assert_eq!(overview.total_tasks, 1);
        assert_eq!(overview.overall_progress, 0);
    }
}
