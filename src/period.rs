use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bucketing unit for snapshots and goals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Week,
    Month,
    Quarter,
    Year,
}

impl Granularity {
    /// Granularities offered when saving snapshots and editing goals, in display order.
    pub const SELECTABLE: [Granularity; 3] =
        [Granularity::Month, Granularity::Quarter, Granularity::Year];

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Week => "week",
            Granularity::Month => "month",
            Granularity::Quarter => "quarter",
            Granularity::Year => "year",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Granularity::Week => "Week",
            Granularity::Month => "Month",
            Granularity::Quarter => "Quarter",
            Granularity::Year => "Year",
        }
    }

    pub fn key_for(&self, date: NaiveDate) -> String {
        period_key(*self, date)
    }

    pub fn key_at(&self, instant: DateTime<Utc>) -> String {
        self.key_for(instant.date_naive())
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "week" => Ok(Granularity::Week),
            "month" => Ok(Granularity::Month),
            "quarter" => Ok(Granularity::Quarter),
            "year" => Ok(Granularity::Year),
            _ => Err(format!("Unknown period type: {s}")),
        }
    }
}

/// Canonical, sortable key of the period containing `date`.
///
/// Weeks follow ISO-8601: the week belongs to the year of its Thursday, so
/// the last days of December can key into week 1 of the next year.
pub fn period_key(granularity: Granularity, date: NaiveDate) -> String {
    match granularity {
        Granularity::Week => {
            let week = date.iso_week();
            format!("{}-W{:02}", week.year(), week.week())
        }
        Granularity::Month => format!("{}-{:02}", date.year(), date.month()),
        Granularity::Quarter => format!("{}-Q{}", date.year(), date.month().div_ceil(3)),
        Granularity::Year => date.year().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_key_is_zero_padded() {
        assert_eq!(period_key(Granularity::Month, date(2025, 3, 14)), "2025-03");
        assert_eq!(period_key(Granularity::Month, date(2025, 11, 1)), "2025-11");
    }

    #[test]
    fn quarter_boundaries() {
        assert_eq!(period_key(Granularity::Quarter, date(2025, 1, 1)), "2025-Q1");
        assert_eq!(period_key(Granularity::Quarter, date(2025, 3, 31)), "2025-Q1");
        assert_eq!(period_key(Granularity::Quarter, date(2025, 4, 1)), "2025-Q2");
        assert_eq!(period_key(Granularity::Quarter, date(2025, 9, 30)), "2025-Q3");
        assert_eq!(period_key(Granularity::Quarter, date(2025, 12, 31)), "2025-Q4");
    }

    #[test]
    fn year_key() {
        assert_eq!(period_key(Granularity::Year, date(1999, 12, 31)), "1999");
    }

    #[test]
    fn iso_week_rolls_into_next_year() {
        assert_eq!(period_key(Granularity::Week, date(2024, 12, 31)), "2025-W01");
        assert_eq!(period_key(Granularity::Week, date(2024, 12, 30)), "2025-W01");
    }

    #[test]
    fn iso_week_rolls_back_into_previous_year() {
        // 2021-01-03 is a Sunday in the last ISO week of 2020.
        assert_eq!(period_key(Granularity::Week, date(2021, 1, 3)), "2020-W53");
        assert_eq!(period_key(Granularity::Week, date(2021, 1, 4)), "2021-W01");
    }

    #[test]
    fn keys_are_deterministic() {
        let d = date(2026, 7, 19);
        for g in [
            Granularity::Week,
            Granularity::Month,
            Granularity::Quarter,
            Granularity::Year,
        ] {
            assert_eq!(period_key(g, d), period_key(g, d));
        }
    }

    #[test]
    fn parse_and_display_round_trip_names() {
        assert_eq!("Quarter".parse::<Granularity>().unwrap(), Granularity::Quarter);
        assert_eq!(Granularity::Month.to_string(), "month");
        assert!("decade".parse::<Granularity>().is_err());
    }
}
