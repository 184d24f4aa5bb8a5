use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::backend::JsonFileBackend;
use crate::export::Theme;
use crate::metadata::{PKG_DESCRIPTION, PKG_NAME, PKG_VERSION};
use crate::period::Granularity;
use crate::scores::MAX_SCORE;
use crate::types::Area;

#[derive(Parser, Debug, Clone)]
#[command(name = PKG_NAME)]
#[command(version = PKG_VERSION)]
#[command(about = PKG_DESCRIPTION, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub settings: Settings,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// JSON document in the data directory
    File,
    /// Hosted row store over HTTP
    Rest,
}

#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Directory holding the data file and the live session file
    #[arg(long, env = "LIFE_WHEEL_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Where snapshots and goals are stored
    #[arg(long, env = "LIFE_WHEEL_BACKEND", value_enum, default_value_t = BackendKind::File, global = true)]
    pub backend: BackendKind,

    /// Base URL of the hosted row store (rest backend)
    #[arg(long, env = "LIFE_WHEEL_REST_URL", global = true)]
    pub rest_url: Option<String>,

    /// Project api key of the hosted row store (rest backend)
    #[arg(long, env = "LIFE_WHEEL_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Session token of the signed-in user (rest backend)
    #[arg(long, env = "LIFE_WHEEL_ACCESS_TOKEN", hide_env_values = true, global = true)]
    pub access_token: Option<String>,

    /// Profile whose rows are read and written
    #[arg(long, env = "LIFE_WHEEL_USER", default_value = "local", global = true)]
    pub user: String,

    /// Colour theme used for exports
    #[arg(long, env = "LIFE_WHEEL_THEME", global = true)]
    pub theme: Option<Theme>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "LIFE_WHEEL_LOG", default_value = "warn", global = true)]
    pub log_level: String,

    /// Answer yes to confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

impl Settings {
    pub fn default_settings() -> Self {
        Self {
            data_dir: None,
            backend: BackendKind::File,
            rest_url: None,
            api_key: None,
            access_token: None,
            user: "local".to_string(),
            theme: None,
            log_level: "warn".to_string(),
            yes: false,
        }
    }

    /// Validate CLI/environment-derived settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.user.trim().is_empty() {
            return Err("LIFE_WHEEL_USER cannot be empty".to_string());
        }
        if self.backend == BackendKind::Rest {
            let url = self
                .rest_url
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .ok_or_else(|| {
                    "LIFE_WHEEL_REST_URL is required for the rest backend".to_string()
                })?;
            if url.contains(char::is_whitespace) {
                return Err(format!("Invalid LIFE_WHEEL_REST_URL '{url}'"));
            }
            if self.api_key.as_deref().is_none_or(|k| k.trim().is_empty()) {
                return Err("LIFE_WHEEL_API_KEY is required for the rest backend".to_string());
            }
        }
        Ok(())
    }

    /// Explicit data directory, or `~/.life-wheel`.
    pub fn resolved_data_dir(&self) -> Result<PathBuf, String> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => JsonFileBackend::default_dir().map_err(|e| e.to_string()),
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show the live scores, the comparison overlay and the average
    Show,
    /// Set one area's score
    Set {
        area: Area,
        #[arg(value_parser = clap::value_parser!(u8).range(0..=MAX_SCORE as i64))]
        value: u8,
    },
    /// Reset every area to the default score
    Reset,
    /// Save the live scores as a snapshot
    Save {
        #[arg(long, short, default_value = "month", value_parser = parse_selectable)]
        period: Granularity,
        /// Optional note stored with the snapshot
        #[arg(long)]
        note: Option<String>,
    },
    /// List saved snapshots grouped by period type
    Snapshots,
    /// Delete one snapshot
    Delete { id: String },
    /// Delete every snapshot of one period type
    DeletePeriod {
        #[arg(value_parser = parse_selectable)]
        period: Granularity,
    },
    /// Configure the comparison overlay
    Compare {
        #[command(subcommand)]
        action: CompareAction,
    },
    /// Edit the goal of one area for the current period
    Goal {
        #[arg(long, short, default_value = "month", value_parser = parse_selectable)]
        period: Granularity,
        #[arg(long, short)]
        area: Area,
        #[command(subcommand)]
        action: GoalAction,
    },
    /// Progress of every area's goal for the current period
    Dashboard {
        #[arg(long, short, default_value = "month", value_parser = parse_selectable)]
        period: Granularity,
    },
    /// Write a summary of the live scores
    Export {
        /// Output directory (defaults to the current directory)
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
    /// Show the resolved configuration
    Status,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CompareAction {
    /// Turn the overlay on
    On,
    /// Turn the overlay off
    Off,
    /// Compare against a specific snapshot
    Select { id: String },
    /// Go back to comparing against the latest snapshot
    Clear,
}

#[derive(Subcommand, Debug, Clone)]
pub enum GoalAction {
    /// Print the goal with its sub-goals and tasks
    Show,
    /// Replace the objective text
    Objective { text: String },
    /// Add a sub-goal (at most 3)
    AddSubGoal { title: String },
    /// Rename a sub-goal
    RenameSubGoal { sub_goal: String, title: String },
    /// Delete a sub-goal and its tasks
    DeleteSubGoal { sub_goal: String },
    /// Add a task to a sub-goal (at most 3)
    AddTask { sub_goal: String, text: String },
    /// Change a task's text and/or done flag
    EditTask {
        sub_goal: String,
        task: String,
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        done: Option<bool>,
    },
    /// Delete a task
    DeleteTask { sub_goal: String, task: String },
    /// Flip a task's done flag
    Toggle { sub_goal: String, task: String },
}

fn parse_selectable(s: &str) -> Result<Granularity, String> {
    let granularity: Granularity = s.parse()?;
    if Granularity::SELECTABLE.contains(&granularity) {
        Ok(granularity)
    } else {
        Err(format!(
            "period must be one of: {}",
            Granularity::SELECTABLE.map(|g| g.as_str()).join(", ")
        ))
    }
}
