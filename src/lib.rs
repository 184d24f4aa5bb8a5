//! Life wheel self-assessment.
//!
//! Eight life areas rated 0-10, saved as period snapshots, with per-area
//! goals broken into sub-goals and tasks. Persistence, authentication and
//! image export sit behind traits so the stores stay independent of where
//! rows live.

pub mod auth;
pub mod backend;
pub mod cli;
pub mod clock;
pub mod compare;
pub mod error;
pub mod export;
pub mod goals;
pub mod handler;
pub mod metadata;
pub mod period;
pub mod progress;
pub mod scores;
pub mod session;
pub mod snapshots;
pub mod types;

pub use backend::{Backend, BackendError, JsonFileBackend, MemoryBackend, RestBackend};
pub use compare::ComparisonState;
pub use error::{StoreError, StoreResult};
pub use goals::GoalStore;
pub use period::{Granularity, period_key};
pub use scores::Scores;
pub use session::Session;
pub use snapshots::SnapshotStore;
pub use types::{Area, Goal, GoalKey, Snapshot, SubGoal, Task, TaskPatch, User};
