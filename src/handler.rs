//! Command dispatch for the terminal front-end
//!
//! Each invocation opens the configured backend, starts a [`Session`] for the
//! profile, restores the live state (unsaved scores, comparison selection and
//! theme) from `session.json`, runs one command and writes the live state back.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use colored::{Color, Colorize};
use dialoguer::Confirm;
use serde::{Deserialize, Serialize};

use crate::auth::LocalAuth;
use crate::backend::file::write_json_atomic;
use crate::backend::{Backend, JsonFileBackend, RestBackend, RestConfig};
use crate::cli::{BackendKind, Cli, Command, CompareAction, GoalAction, Settings};
use crate::clock::SystemClock;
use crate::error::{ServiceError, ServiceResult};
use crate::export::{SummaryTextExporter, Theme, export_to_dir};
use crate::metadata::{PKG_NAME, PKG_VERSION};
use crate::period::Granularity;
use crate::progress::ProgressTier;
use crate::scores::{MAX_SCORE, Scores};
use crate::session::Session;
use crate::types::{Area, Goal, Snapshot, TaskPatch, User};

pub const SESSION_FILE_NAME: &str = "session.json";

const BAR_WIDTH: usize = 20;

/// Unsaved working state carried between invocations.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveState {
    pub user_id: String,
    pub scores: Scores,
    #[serde(default)]
    pub compare_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_snapshot: Option<String>,
    #[serde(default)]
    pub theme: Theme,
}

impl LiveState {
    /// State stored at `path`, or the defaults for `user_id` when the file is
    /// missing or belongs to another profile.
    pub fn load(path: &Path, user_id: &str) -> ServiceResult<Self> {
        let fresh = Self {
            user_id: user_id.to_string(),
            ..Self::default()
        };
        if !path.exists() {
            return Ok(fresh);
        }
        let content = fs::read_to_string(path)?;
        let state: LiveState = match serde_json::from_str(&content) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable live state");
                return Ok(fresh);
            }
        };
        if state.user_id != user_id {
            tracing::debug!(stored = %state.user_id, user_id, "live state belongs to another profile");
            return Ok(fresh);
        }
        Ok(state)
    }

    pub fn save(&self, path: &Path) -> ServiceResult<()> {
        write_json_atomic(path, self)?;
        Ok(())
    }

    pub fn capture(session: &Session) -> Self {
        Self {
            user_id: session.user().id.clone(),
            scores: session.scores().clone(),
            compare_enabled: session.comparison().is_enabled(),
            selected_snapshot: session.comparison().selected().map(str::to_string),
            theme: session.theme(),
        }
    }

    /// Restore into a freshly started session. A selection whose snapshot is
    /// gone is dropped.
    pub fn apply(self, session: &mut Session) {
        session.replace_scores(self.scores);
        session.set_compare(self.compare_enabled);
        session.set_theme(self.theme);
        session.select_snapshot(self.selected_snapshot);
    }
}

fn profile_user(profile: &str) -> User {
    User {
        id: profile.to_string(),
        email: format!("{profile}@localhost"),
        full_name: None,
    }
}

async fn open_backend(settings: &Settings, data_dir: &Path) -> ServiceResult<Arc<dyn Backend>> {
    let backend: Arc<dyn Backend> = match settings.backend {
        BackendKind::File => Arc::new(JsonFileBackend::open_in(data_dir).await?),
        BackendKind::Rest => {
            let mut config = RestConfig::from_connection_string(
                settings.rest_url.as_deref().unwrap_or_default(),
                settings.api_key.clone().unwrap_or_default(),
            );
            config.access_token = settings.access_token.clone();
            Arc::new(RestBackend::new(config))
        }
    };
    tracing::debug!(backend = backend.name(), "backend ready");
    Ok(backend)
}

/// Run one parsed command line.
pub async fn run(cli: Cli) -> ServiceResult<()> {
    let Cli { settings, command } = cli;
    settings.validate()?;
    let data_dir = settings.resolved_data_dir()?;

    if let Command::Status = command {
        print_status(&settings, &data_dir);
        return Ok(());
    }

    let backend = open_backend(&settings, &data_dir).await?;
    let auth = LocalAuth::signed_in(profile_user(settings.user.trim()));
    let mut session = Session::start(&auth, backend, Arc::new(SystemClock)).await?;

    let live_path = data_dir.join(SESSION_FILE_NAME);
    LiveState::load(&live_path, &session.user().id)?.apply(&mut session);
    if let Some(theme) = settings.theme {
        session.set_theme(theme);
    }

    let before = LiveState::capture(&session);
    dispatch(&mut session, command, settings.yes).await?;
    let after = LiveState::capture(&session);
    if after != before {
        after.save(&live_path)?;
        tracing::debug!(path = %live_path.display(), "live state saved");
    }
    Ok(())
}

async fn dispatch(session: &mut Session, command: Command, yes: bool) -> ServiceResult<()> {
    match command {
        Command::Show => print_wheel(session),
        Command::Set { area, value } => {
            session.set_score(area, value);
            println!("{} set to {}/{}", area_label(area), value, MAX_SCORE);
            println!("Average: {:.1}", session.scores().average_display());
        }
        Command::Reset => {
            session.replace_scores(Scores::new());
            println!("Scores reset");
        }
        Command::Save { period, note } => {
            let note = note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
            let saved = session.save_snapshot(period, note).await?;
            println!(
                "{} {} snapshot {} ({})",
                "Saved".green(),
                period.label(),
                saved.period_key.bold(),
                saved.id.dimmed()
            );
        }
        Command::Snapshots => print_snapshots(session),
        Command::Delete { id } => {
            let Some(snapshot) = session.snapshots().by_id(&id) else {
                return Err(ServiceError::FromString(format!("No snapshot with id {id}")));
            };
            let prompt = format!(
                "Delete {} snapshot {} from {}?",
                snapshot.period_type.label(),
                snapshot.period_key,
                snapshot.created_at.format("%d/%m/%Y")
            );
            if confirm(&prompt, yes)? {
                session.delete_snapshot(&id).await?;
                println!("{} snapshot {}", "Deleted".red(), id);
            }
        }
        Command::DeletePeriod { period } => {
            let count = session
                .snapshots()
                .iter()
                .filter(|s| s.period_type == period)
                .count();
            if count == 0 {
                println!("No {} snapshots", period.label());
                return Ok(());
            }
            let prompt = format!("Delete all {count} {} snapshots?", period.label());
            if confirm(&prompt, yes)? {
                session.delete_snapshots_by_period(period).await?;
                println!("{} {count} {} snapshots", "Deleted".red(), period.label());
            }
        }
        Command::Compare { action } => compare(session, action)?,
        Command::Goal {
            period,
            area,
            action,
        } => goal(session, period, area, action, yes).await?,
        Command::Dashboard { period } => print_dashboard(session, period),
        Command::Export { out } => {
            let dir = match out {
                Some(dir) => dir,
                None => std::env::current_dir()?,
            };
            let summary = session.export_summary();
            let path = export_to_dir(
                &SummaryTextExporter::new(BAR_WIDTH),
                &summary,
                session.theme(),
                &dir,
            )?;
            println!("{} {}", "Exported".green(), path.display());
        }
        Command::Status => {}
    }
    Ok(())
}

fn confirm(prompt: &str, yes: bool) -> ServiceResult<bool> {
    if yes {
        return Ok(true);
    }
    Ok(Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}

fn compare(session: &mut Session, action: CompareAction) -> ServiceResult<()> {
    match action {
        CompareAction::On => {
            session.set_compare(true);
            match session.comparison_snapshot() {
                Some(snapshot) => println!("Comparing with {}", describe_snapshot(snapshot)),
                None => println!("Comparison on; no snapshots saved yet"),
            }
        }
        CompareAction::Off => {
            session.set_compare(false);
            println!("Comparison off");
        }
        CompareAction::Select { id } => {
            if session.snapshots().by_id(&id).is_none() {
                return Err(ServiceError::FromString(format!("No snapshot with id {id}")));
            }
            session.set_compare(true);
            session.select_snapshot(Some(id));
            if let Some(snapshot) = session.comparison_snapshot() {
                println!("Comparing with {}", describe_snapshot(snapshot));
            }
        }
        CompareAction::Clear => {
            session.select_snapshot(None);
            println!("Comparing with the latest snapshot");
        }
    }
    Ok(())
}

/// Resolve a sub-goal reference: a 1-based position or an id.
pub fn resolve_sub_goal(goal: &Goal, reference: &str) -> Option<String> {
    let reference = reference.trim();
    if let Ok(position) = reference.parse::<usize>() {
        return position
            .checked_sub(1)
            .and_then(|i| goal.sub_goals.get(i))
            .map(|sg| sg.id.clone());
    }
    goal.sub_goal(reference).map(|sg| sg.id.clone())
}

/// Resolve a task reference inside a sub-goal, same rules as sub-goals.
pub fn resolve_task(goal: &Goal, sub_goal_id: &str, reference: &str) -> Option<String> {
    let sub_goal = goal.sub_goal(sub_goal_id)?;
    let reference = reference.trim();
    if let Ok(position) = reference.parse::<usize>() {
        return position
            .checked_sub(1)
            .and_then(|i| sub_goal.tasks.get(i))
            .map(|t| t.id.clone());
    }
    sub_goal.task(reference).map(|t| t.id.clone())
}

async fn goal(
    session: &mut Session,
    period: Granularity,
    area: Area,
    action: GoalAction,
    yes: bool,
) -> ServiceResult<()> {
    let current = session.goals().get(period, area);
    let sub_goal_ref = |reference: &str| {
        resolve_sub_goal(&current, reference)
            .ok_or_else(|| ServiceError::FromString(format!("No sub-goal {reference}")))
    };
    let task_ref = |sub_goal_id: &str, reference: &str| {
        resolve_task(&current, sub_goal_id, reference)
            .ok_or_else(|| ServiceError::FromString(format!("No task {reference}")))
    };

    let goals = session.goals_mut();
    match action {
        GoalAction::Show => {}
        GoalAction::Objective { text } => {
            goals.set_objective(period, area, text.trim()).await?;
        }
        GoalAction::AddSubGoal { title } => {
            if !goals.add_sub_goal(period, area, title.trim()).await? {
                println!("{}", "A goal holds at most 3 sub-goals".yellow());
            }
        }
        GoalAction::RenameSubGoal { sub_goal, title } => {
            let id = sub_goal_ref(&sub_goal)?;
            goals
                .update_sub_goal_title(period, area, &id, title.trim())
                .await?;
        }
        GoalAction::DeleteSubGoal { sub_goal } => {
            let id = sub_goal_ref(&sub_goal)?;
            let title = current
                .sub_goal(&id)
                .map(|sg| sg.title.clone())
                .unwrap_or_default();
            if confirm(&format!("Delete sub-goal \"{title}\" and its tasks?"), yes)? {
                goals.delete_sub_goal(period, area, &id).await?;
            }
        }
        GoalAction::AddTask { sub_goal, text } => {
            let id = sub_goal_ref(&sub_goal)?;
            if !goals.add_task(period, area, &id, text.trim()).await? {
                println!("{}", "A sub-goal holds at most 3 tasks".yellow());
            }
        }
        GoalAction::EditTask {
            sub_goal,
            task,
            text,
            done,
        } => {
            let sub_goal_id = sub_goal_ref(&sub_goal)?;
            let task_id = task_ref(&sub_goal_id, &task)?;
            let patch = TaskPatch {
                text: text.map(|t| t.trim().to_string()),
                done,
            };
            goals
                .update_task(period, area, &sub_goal_id, &task_id, &patch)
                .await?;
        }
        GoalAction::DeleteTask { sub_goal, task } => {
            let sub_goal_id = sub_goal_ref(&sub_goal)?;
            let task_id = task_ref(&sub_goal_id, &task)?;
            goals.delete_task(period, area, &sub_goal_id, &task_id).await?;
        }
        GoalAction::Toggle { sub_goal, task } => {
            let sub_goal_id = sub_goal_ref(&sub_goal)?;
            let task_id = task_ref(&sub_goal_id, &task)?;
            goals.toggle_task(period, area, &sub_goal_id, &task_id).await?;
        }
    }

    print_goal(&session.goals().get(period, area), session.goals().progress(period, area));
    Ok(())
}

fn area_label(area: Area) -> String {
    let (r, g, b) = area.rgb();
    area.name().truecolor(r, g, b).bold().to_string()
}

fn tier_color(tier: ProgressTier) -> Color {
    match tier {
        ProgressTier::High => Color::Green,
        ProgressTier::Medium => Color::Yellow,
        ProgressTier::Low => Color::Red,
    }
}

fn bar(value: u8, max: u8, width: usize) -> String {
    let filled = width * usize::from(value.min(max)) / usize::from(max.max(1));
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

fn describe_snapshot(snapshot: &Snapshot) -> String {
    format!(
        "{} {} ({}, {})",
        snapshot.period_type.label(),
        snapshot.period_key,
        snapshot.created_at.format("%d/%m/%Y %H:%M"),
        snapshot.id
    )
}

/// Signed difference shown next to a compared score.
pub fn delta_label(current: u8, previous: u8) -> String {
    let delta = i16::from(current) - i16::from(previous);
    match delta {
        0 => "=".to_string(),
        d if d > 0 => format!("+{d}"),
        d => d.to_string(),
    }
}

fn print_wheel(session: &Session) {
    println!(
        "{} {}",
        "Life Wheel".bold(),
        format!("({})", session.user().display_name()).dimmed()
    );
    let previous = session.comparison_scores();
    if let Some(snapshot) = session.comparison_snapshot() {
        println!("Comparing with {}", describe_snapshot(snapshot).dimmed());
    }
    for (area, score) in session.scores().iter() {
        let (r, g, b) = area.rgb();
        let mut line = format!(
            "{:<13} {} {:>2}/{}",
            area.name(),
            bar(score, MAX_SCORE, BAR_WIDTH).truecolor(r, g, b),
            score,
            MAX_SCORE
        );
        if let Some(previous) = previous {
            let before = previous.get(area);
            let delta = delta_label(score, before);
            let delta = if score > before {
                delta.green()
            } else if score < before {
                delta.red()
            } else {
                delta.dimmed()
            };
            line.push_str(&format!("  was {before:>2} {delta}"));
        }
        println!("{line}");
    }
    let mut average = format!("Average: {:.1}", session.scores().average_display());
    if let Some(previous) = previous {
        average.push_str(&format!(" (was {:.1})", previous.average_display()));
    }
    println!("{}", average.bold());
}

fn print_snapshots(session: &Session) {
    if session.snapshots().is_empty() {
        println!("No snapshots saved yet");
        return;
    }
    let compared = session.comparison_snapshot().map(|s| s.id.clone());
    for (granularity, snapshots) in session.snapshots().grouped() {
        if snapshots.is_empty() {
            continue;
        }
        println!("{} ({})", granularity.label().bold(), snapshots.len());
        for snapshot in snapshots {
            let marker = if compared.as_deref() == Some(snapshot.id.as_str()) {
                "*".cyan().to_string()
            } else {
                " ".to_string()
            };
            println!(
                "{} {:<10} {}  avg {:.1}  {}",
                marker,
                snapshot.period_key,
                snapshot.created_at.format("%d/%m/%Y %H:%M"),
                snapshot.average(),
                snapshot.id.dimmed()
            );
            if let Some(note) = &snapshot.overall_note {
                println!("    {}", note.italic());
            }
        }
    }
}

fn print_goal(goal: &Goal, progress: u8) {
    let tier = ProgressTier::of(progress);
    println!(
        "{} {} {}",
        area_label(goal.area_id),
        goal.period_key.dimmed(),
        format!("{progress}%").color(tier_color(tier))
    );
    if goal.objective.is_empty() {
        println!("  {}", "no objective".dimmed());
    } else {
        println!("  {}", goal.objective);
    }
    for (i, sub_goal) in goal.sub_goals.iter().enumerate() {
        println!(
            "  {}. {} ({}/{})",
            i + 1,
            sub_goal.title,
            sub_goal.done_count(),
            sub_goal.tasks.len()
        );
        for (j, task) in sub_goal.tasks.iter().enumerate() {
            let check = if task.done { "[x]".green() } else { "[ ]".normal() };
            println!("     {}.{} {} {}", i + 1, j + 1, check, task.text);
        }
    }
}

fn print_dashboard(session: &Session, period: Granularity) {
    let overview = session.goals().overview(period);
    println!(
        "{} {} {}",
        period.label().bold(),
        overview.period_key,
        format!(
            "{}% ({}/{} tasks)",
            overview.overall_progress, overview.done_tasks, overview.total_tasks
        )
        .color(tier_color(overview.tier()))
    );
    for entry in &overview.areas {
        let tier = ProgressTier::of(entry.progress);
        let objective = if entry.goal.objective.is_empty() {
            "-".dimmed().to_string()
        } else {
            entry.goal.objective.clone()
        };
        println!(
            "{:<13} {} {:>3}%  {}/{}  {}",
            entry.area.name(),
            bar(entry.progress, 100, BAR_WIDTH).color(tier_color(tier)),
            entry.progress,
            entry.done_tasks,
            entry.total_tasks,
            objective
        );
    }
}

fn print_status(settings: &Settings, data_dir: &Path) {
    println!("{} {}", PKG_NAME.bold(), PKG_VERSION);
    println!("profile:  {}", settings.user.trim());
    match settings.backend {
        BackendKind::File => println!(
            "backend:  file ({})",
            data_dir.join(crate::backend::file::DATA_FILE_NAME).display()
        ),
        BackendKind::Rest => println!(
            "backend:  rest ({})",
            settings.rest_url.as_deref().unwrap_or_default()
        ),
    }
    println!("session:  {}", data_dir.join(SESSION_FILE_NAME).display());
    let theme = settings.theme.unwrap_or_default();
    println!("theme:    {theme:?} ({})", theme.background());
}
