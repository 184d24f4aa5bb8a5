//! Summary export
//!
//! The exporter receives the content of the exported region (title, date,
//! per-area scores and the average) plus the background fill of the active
//! theme, and returns the encoded image bytes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use crate::scores::{MAX_SCORE, Scores};
use crate::types::Area;

pub const EXPORT_TITLE: &str = "Life Wheel";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Render failed: {0}")]
    Render(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    /// Background fill passed to the exporter.
    pub fn background(&self) -> &'static str {
        match self {
            Theme::Dark => "#0f172a",
            Theme::Light => "#f8fafc",
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dark" => Ok(Theme::Dark),
            "light" => Ok(Theme::Light),
            _ => Err(format!("Unknown theme: {s}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AreaScore {
    pub area: Area,
    pub name: &'static str,
    pub color: &'static str,
    pub score: u8,
}

/// Everything drawn inside the exported region.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExportSummary {
    pub title: String,
    pub date: NaiveDate,
    pub areas: Vec<AreaScore>,
    pub average: f64,
}

impl ExportSummary {
    pub fn new(scores: &Scores, date: NaiveDate) -> Self {
        Self {
            title: EXPORT_TITLE.to_string(),
            date,
            areas: scores
                .iter()
                .map(|(area, score)| AreaScore {
                    area,
                    name: area.name(),
                    color: area.color(),
                    score,
                })
                .collect(),
            average: scores.average_display(),
        }
    }

    pub fn file_name(&self) -> String {
        export_file_name(self.date)
    }
}

/// `life-wheel-YYYY-MM-DD.png`
pub fn export_file_name(date: NaiveDate) -> String {
    export_file_name_with(date, "png")
}

pub fn export_file_name_with(date: NaiveDate, extension: &str) -> String {
    format!("life-wheel-{}.{}", date.format("%Y-%m-%d"), extension)
}

pub trait ImageExporter {
    /// Content type of the produced bytes.
    fn media_type(&self) -> &'static str;

    fn extension(&self) -> &'static str {
        "png"
    }

    fn render(&self, summary: &ExportSummary, background: &str) -> Result<Vec<u8>, ExportError>;
}

/// Plain-text rendition of the summary, used by the terminal front-end.
#[derive(Clone, Copy, Debug, Default)]
pub struct SummaryTextExporter {
    pub bar_width: usize,
}

impl SummaryTextExporter {
    pub fn new(bar_width: usize) -> Self {
        Self { bar_width }
    }
}

impl ImageExporter for SummaryTextExporter {
    fn media_type(&self) -> &'static str {
        "text/plain"
    }

    fn extension(&self) -> &'static str {
        "txt"
    }

    fn render(&self, summary: &ExportSummary, background: &str) -> Result<Vec<u8>, ExportError> {
        let width = if self.bar_width == 0 { 20 } else { self.bar_width };
        let mut out = String::new();
        let fmt_err = |e: std::fmt::Error| ExportError::Render(e.to_string());
        writeln!(out, "{} ({})", summary.title, summary.date.format("%d/%m/%Y")).map_err(fmt_err)?;
        writeln!(out, "background: {background}").map_err(fmt_err)?;
        for entry in &summary.areas {
            let filled = width * usize::from(entry.score.min(MAX_SCORE)) / usize::from(MAX_SCORE);
            writeln!(
                out,
                "{:<13} {}{} {:>2}/{}",
                entry.name,
                "#".repeat(filled),
                ".".repeat(width - filled),
                entry.score,
                MAX_SCORE
            )
            .map_err(fmt_err)?;
        }
        writeln!(out, "Average: {:.1}", summary.average).map_err(fmt_err)?;
        Ok(out.into_bytes())
    }
}

/// Render `summary` and write it under `dir` as `life-wheel-<date>.<ext>`.
pub fn export_to_dir(
    exporter: &dyn ImageExporter,
    summary: &ExportSummary,
    theme: Theme,
    dir: &Path,
) -> Result<PathBuf, ExportError> {
    let bytes = exporter.render(summary, theme.background())?;
    std::fs::create_dir_all(dir)?;
    let path = dir.join(export_file_name_with(summary.date, exporter.extension()));
    std::fs::write(&path, bytes)?;
    tracing::info!(path = %path.display(), media_type = exporter.media_type(), "exported summary");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 9).unwrap()
    }

    #[test]
    fn file_name_uses_iso_date() {
        assert_eq!(export_file_name(day()), "life-wheel-2025-03-09.png");
    }

    #[test]
    fn summary_lists_areas_in_wheel_order() {
        let summary = ExportSummary::new(&Scores::new().with(Area::Career, 9), day());
        assert_eq!(summary.areas.len(), Area::COUNT);
        assert_eq!(summary.areas[1].area, Area::Career);
        assert_eq!(summary.areas[1].score, 9);
        assert_eq!(summary.average, 5.5);
    }

    #[test]
    fn theme_backgrounds() {
        assert_eq!(Theme::Dark.background(), "#0f172a");
        assert_eq!(Theme::Light.background(), "#f8fafc");
        assert_eq!("LIGHT".parse::<Theme>().unwrap(), Theme::Light);
    }

    #[test]
    fn text_exporter_draws_bars() {
        let summary = ExportSummary::new(&Scores::uniform(10).with(Area::Health, 0), day());
        let bytes = SummaryTextExporter::new(10)
            .render(&summary, Theme::Dark.background())
            .unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("Life Wheel (09/03/2025)"));
        assert!(text.contains("background: #0f172a"));
        assert!(text.contains("Health        ..........  0/10"));
        assert!(text.contains("Career        ########## 10/10"));
        assert!(text.contains("Average: 8.8"));
    }

    #[test]
    fn export_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let summary = ExportSummary::new(&Scores::new(), day());
        let path = export_to_dir(&SummaryTextExporter::default(), &summary, Theme::Light, dir.path())
            .unwrap();
        assert_eq!(path.file_name().unwrap(), "life-wheel-2025-03-09.txt");
        assert!(std::fs::read_to_string(path).unwrap().contains("#f8fafc"));
    }
}
