use serde::Serialize;

use crate::period::Granularity;
use crate::types::{Area, Goal};

/// `round(100 * done / total)`, 0 when there is nothing to do.
pub fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    (100.0 * done as f64 / total as f64).round() as u8
}

/// Share of done tasks across all sub-goals of `goal`, counted per task.
pub fn goal_progress(goal: &Goal) -> u8 {
    if goal.sub_goals.is_empty() {
        return 0;
    }
    percent(goal.done_count(), goal.task_count())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressTier {
    Low,
    Medium,
    High,
}

impl ProgressTier {
    pub fn of(progress: u8) -> Self {
        match progress {
            70.. => ProgressTier::High,
            40..=69 => ProgressTier::Medium,
            _ => ProgressTier::Low,
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            ProgressTier::High => "#22c55e",
            ProgressTier::Medium => "#eab308",
            ProgressTier::Low => "#f87171",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct AreaProgress {
    pub area: Area,
    pub goal: Goal,
    pub progress: u8,
    pub total_tasks: usize,
    pub done_tasks: usize,
}

/// Dashboard view of every area's goal in the current period.
#[derive(Clone, Debug, Serialize)]
pub struct Overview {
    pub period_type: Granularity,
    pub period_key: String,
    pub areas: Vec<AreaProgress>,
    pub total_tasks: usize,
    pub done_tasks: usize,
    pub overall_progress: u8,
}

impl Overview {
    /// `goals` must hold one goal per area, in area order.
    pub fn from_goals(period_type: Granularity, period_key: String, goals: Vec<Goal>) -> Self {
        let areas: Vec<AreaProgress> = goals
            .into_iter()
            .map(|goal| AreaProgress {
                area: goal.area_id,
                progress: goal_progress(&goal),
                total_tasks: goal.task_count(),
                done_tasks: goal.done_count(),
                goal,
            })
            .collect();
        let total_tasks = areas.iter().map(|a| a.total_tasks).sum();
        let done_tasks = areas.iter().map(|a| a.done_tasks).sum();
        Self {
            period_type,
            period_key,
            areas,
            total_tasks,
            done_tasks,
            overall_progress: percent(done_tasks, total_tasks),
        }
    }

    pub fn tier(&self) -> ProgressTier {
        ProgressTier::of(self.overall_progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GoalKey, SubGoal, Task};

    fn task(done: bool) -> Task {
        Task {
            id: ulid::Ulid::new().to_string(),
            text: "t".into(),
            done,
        }
    }

    fn goal_with(area: Area, sub_goals: Vec<Vec<bool>>) -> Goal {
        let key = GoalKey {
            period_type: Granularity::Month,
            period_key: "2025-06".into(),
            area_id: area,
        };
        let mut goal = Goal::empty(&key);
        goal.sub_goals = sub_goals
            .into_iter()
            .map(|tasks| SubGoal {
                id: ulid::Ulid::new().to_string(),
                title: "sg".into(),
                tasks: tasks.into_iter().map(task).collect(),
            })
            .collect();
        goal
    }

    #[test]
    fn progress_is_flattened_over_tasks() {
        let goal = goal_with(Area::Health, vec![vec![true, false], vec![false]]);
        assert_eq!(goal_progress(&goal), 33);
    }

    #[test]
    fn progress_rounds_half_up() {
        let goal = goal_with(Area::Health, vec![vec![true, true], vec![false]]);
        assert_eq!(goal_progress(&goal), 67);
        assert_eq!(percent(1, 2), 50);
        assert_eq!(percent(1, 8), 13);
    }

    #[test]
    fn no_tasks_means_zero() {
        assert_eq!(goal_progress(&goal_with(Area::Career, vec![])), 0);
        assert_eq!(goal_progress(&goal_with(Area::Career, vec![vec![], vec![]])), 0);
    }

    #[test]
    fn tiers() {
        assert_eq!(ProgressTier::of(100), ProgressTier::High);
        assert_eq!(ProgressTier::of(70), ProgressTier::High);
        assert_eq!(ProgressTier::of(69), ProgressTier::Medium);
        assert_eq!(ProgressTier::of(40), ProgressTier::Medium);
        assert_eq!(ProgressTier::of(39), ProgressTier::Low);
        assert_eq!(ProgressTier::of(0), ProgressTier::Low);
    }

    #[test]
    fn overview_sums_across_areas() {
        let goals = Area::ALL
            .into_iter()
            .map(|area| match area {
                Area::Health => goal_with(area, vec![vec![true, true, true]]),
                Area::Finance => goal_with(area, vec![vec![false]]),
                _ => goal_with(area, vec![]),
            })
            .collect();
        let overview = Overview::from_goals(Granularity::Month, "2025-06".into(), goals);
        assert_eq!(overview.areas.len(), Area::COUNT);
        assert_eq!(overview.total_tasks, 4);
        assert_eq!(overview.done_tasks, 3);
        assert_eq!(overview.overall_progress, 75);
        assert_eq!(overview.tier(), ProgressTier::High);
        assert_eq!(overview.areas[0].progress, 100);
        assert_eq!(overview.areas[2].progress, 0);
    }
}
