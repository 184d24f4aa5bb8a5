use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{LazyLock, Mutex};
use ulid::{Generator, Ulid};

use crate::period::Granularity;
use crate::scores::Scores;

pub const MAX_SUB_GOALS: usize = 3;
pub const MAX_TASKS: usize = 3;

/// One of the fixed life areas. Declaration order is the wheel order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Area {
    Health,
    Career,
    Finance,
    Family,
    Growth,
    Recreation,
    Spiritual,
    Contribution,
}

impl Area {
    pub const ALL: [Area; 8] = [
        Area::Health,
        Area::Career,
        Area::Finance,
        Area::Family,
        Area::Growth,
        Area::Recreation,
        Area::Spiritual,
        Area::Contribution,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn id(&self) -> &'static str {
        match self {
            Area::Health => "health",
            Area::Career => "career",
            Area::Finance => "finance",
            Area::Family => "family",
            Area::Growth => "growth",
            Area::Recreation => "recreation",
            Area::Spiritual => "spiritual",
            Area::Contribution => "contribution",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Area::Health => "Health",
            Area::Career => "Career",
            Area::Finance => "Finance",
            Area::Family => "Family",
            Area::Growth => "Growth",
            Area::Recreation => "Recreation",
            Area::Spiritual => "Spiritual",
            Area::Contribution => "Contribution",
        }
    }

    /// Display colour as a `#rrggbb` hex string.
    pub fn color(&self) -> &'static str {
        match self {
            Area::Health => "#22c55e",
            Area::Career => "#3b82f6",
            Area::Finance => "#eab308",
            Area::Family => "#ec4899",
            Area::Growth => "#8b5cf6",
            Area::Recreation => "#f97316",
            Area::Spiritual => "#06b6d4",
            Area::Contribution => "#14b8a6",
        }
    }

    /// Display colour split into RGB channels.
    pub fn rgb(&self) -> (u8, u8, u8) {
        let hex = &self.color()[1..];
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).unwrap_or(0);
        (channel(0), channel(2), channel(4))
    }

    /// Position on the wheel, starting at 0.
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Area {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Area::ALL
            .into_iter()
            .find(|a| a.id() == needle)
            .ok_or_else(|| format!("Unknown area: {s}"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

impl User {
    pub fn display_name(&self) -> &str {
        match &self.full_name {
            Some(name) if !name.trim().is_empty() => name,
            _ => self.email.split('@').next().unwrap_or(&self.email),
        }
    }
}

/// Saved copy of all area scores. Never modified after creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub period_type: Granularity,
    pub period_key: String,
    pub scores: Scores,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_note: Option<String>,
}

static SNAPSHOT_IDS: LazyLock<Mutex<Generator>> = LazyLock::new(|| Mutex::new(Generator::new()));

/// Ids minted by one process increase strictly, also within a millisecond.
fn next_snapshot_id() -> Ulid {
    SNAPSHOT_IDS
        .lock()
        .ok()
        .and_then(|mut ids| ids.generate().ok())
        .unwrap_or_else(Ulid::new)
}

impl Snapshot {
    pub fn new(
        scores: Scores,
        period_type: Granularity,
        created_at: DateTime<Utc>,
        overall_note: Option<String>,
    ) -> Self {
        Self {
            id: next_snapshot_id().to_string(),
            created_at,
            period_type,
            period_key: period_type.key_at(created_at),
            scores,
            overall_note,
        }
    }

    pub fn average(&self) -> f64 {
        self.scores.average()
    }
}

/// Compound key of a goal: one per area and period instance.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GoalKey {
    pub period_type: Granularity,
    pub period_key: String,
    pub area_id: Area,
}

impl GoalKey {
    pub fn current(period_type: Granularity, area_id: Area, now: DateTime<Utc>) -> Self {
        Self {
            period_type,
            period_key: period_type.key_at(now),
            area_id,
        }
    }
}

impl fmt::Display for GoalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.period_type, self.period_key, self.area_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub done: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubGoal {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl SubGoal {
    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn done_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.done).count()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub period_type: Granularity,
    pub period_key: String,
    pub area_id: Area,
    #[serde(default)]
    pub objective: String,
    #[serde(default)]
    pub sub_goals: Vec<SubGoal>,
}

impl Goal {
    pub fn empty(key: &GoalKey) -> Self {
        Self {
            id: Ulid::new().to_string(),
            period_type: key.period_type,
            period_key: key.period_key.clone(),
            area_id: key.area_id,
            objective: String::new(),
            sub_goals: Vec::new(),
        }
    }

    pub fn key(&self) -> GoalKey {
        GoalKey {
            period_type: self.period_type,
            period_key: self.period_key.clone(),
            area_id: self.area_id,
        }
    }

    pub fn sub_goal(&self, sub_goal_id: &str) -> Option<&SubGoal> {
        self.sub_goals.iter().find(|sg| sg.id == sub_goal_id)
    }

    pub fn sub_goal_mut(&mut self, sub_goal_id: &str) -> Option<&mut SubGoal> {
        self.sub_goals.iter_mut().find(|sg| sg.id == sub_goal_id)
    }

    pub fn task_count(&self) -> usize {
        self.sub_goals.iter().map(|sg| sg.tasks.len()).sum()
    }

    pub fn done_count(&self) -> usize {
        self.sub_goals.iter().map(SubGoal::done_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.objective.is_empty() && self.sub_goals.is_empty()
    }
}

/// Fields to merge into an existing task. `None` leaves the field as is.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    pub text: Option<String>,
    pub done: Option<bool>,
}

impl TaskPatch {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            done: None,
        }
    }

    pub fn done(done: bool) -> Self {
        Self {
            text: None,
            done: Some(done),
        }
    }

    pub fn apply(&self, task: &mut Task) {
        if let Some(text) = &self.text {
            task.text = text.clone();
        }
        if let Some(done) = self.done {
            task.done = done;
        }
    }
}

/// A persisted row: the record plus its owner column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Row<T> {
    pub user_id: String,
    #[serde(flatten)]
    pub record: T,
}

impl<T> Row<T> {
    pub fn new(user_id: impl Into<String>, record: T) -> Self {
        Self {
            user_id: user_id.into(),
            record,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn area_order_and_count() {
        assert_eq!(Area::COUNT, 8);
        assert_eq!(Area::ALL[0], Area::Health);
        assert_eq!(Area::ALL[7], Area::Contribution);
        for (i, area) in Area::ALL.iter().enumerate() {
            assert_eq!(area.index(), i);
        }
    }

    #[test]
    fn area_ids_round_trip() {
        for area in Area::ALL {
            assert_eq!(area.id().parse::<Area>().unwrap(), area);
            assert_eq!(
                serde_json::to_string(&area).unwrap(),
                format!("\"{}\"", area.id())
            );
        }
        assert!("hobbies".parse::<Area>().is_err());
    }

    #[test]
    fn area_rgb_parses_hex() {
        assert_eq!(Area::Health.rgb(), (0x22, 0xc5, 0x5e));
    }

    #[test]
    fn task_patch_merges_only_given_fields() {
        let mut task = Task {
            id: "t".into(),
            text: "run".into(),
            done: false,
        };
        TaskPatch::done(true).apply(&mut task);
        assert_eq!(task.text, "run");
        assert!(task.done);
        TaskPatch::text("walk").apply(&mut task);
        assert_eq!(task.text, "walk");
        assert!(task.done);
    }

    #[test]
    fn row_flattens_owner_into_record() {
        let key = GoalKey {
            period_type: Granularity::Month,
            period_key: "2025-01".into(),
            area_id: Area::Finance,
        };
        let row = Row::new("user-1", Goal::empty(&key));
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["user_id"], "user-1");
        assert_eq!(value["period_type"], "month");
        assert_eq!(value["area_id"], "finance");
        assert!(value["sub_goals"].as_array().unwrap().is_empty());
    }

    #[test]
    fn snapshot_ids_follow_creation_order() {
        let at = Utc::now();
        let ids: Vec<String> = (0..50)
            .map(|_| Snapshot::new(Scores::new(), Granularity::Month, at, None).id)
            .collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn display_name_falls_back_to_email_local_part() {
        let user = User {
            id: "1".into(),
            email: "lan@example.com".into(),
            full_name: None,
        };
        assert_eq!(user.display_name(), "lan");
    }
}
