use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::Area;

pub const DEFAULT_SCORE: u8 = 5;
pub const MAX_SCORE: u8 = 10;

/// Rating of every area, always fully populated.
///
/// Values are expected in `0..=MAX_SCORE`; the input side is responsible for
/// keeping them there.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, u8>", into = "BTreeMap<Area, u8>")]
pub struct Scores {
    values: [u8; Area::COUNT],
}

impl Scores {
    pub fn new() -> Self {
        Self::uniform(DEFAULT_SCORE)
    }

    pub fn uniform(value: u8) -> Self {
        Self {
            values: [value; Area::COUNT],
        }
    }

    pub fn get(&self, area: Area) -> u8 {
        self.values[area.index()]
    }

    pub fn set_score(&mut self, area: Area, value: u8) {
        self.values[area.index()] = value;
    }

    pub fn with(mut self, area: Area, value: u8) -> Self {
        self.set_score(area, value);
        self
    }

    /// Sum divided by the number of areas.
    pub fn average(&self) -> f64 {
        let sum: u32 = self.values.iter().map(|&v| u32::from(v)).sum();
        f64::from(sum) / Area::COUNT as f64
    }

    /// Average rounded to one decimal place.
    pub fn average_display(&self) -> f64 {
        (self.average() * 10.0).round() / 10.0
    }

    pub fn iter(&self) -> impl Iterator<Item = (Area, u8)> + '_ {
        Area::ALL.into_iter().map(|a| (a, self.get(a)))
    }
}

impl Default for Scores {
    fn default() -> Self {
        Self::new()
    }
}

// Unknown area ids in stored rows are dropped; missing ones take the default.
impl From<BTreeMap<String, u8>> for Scores {
    fn from(map: BTreeMap<String, u8>) -> Self {
        let mut scores = Scores::new();
        for (id, value) in map {
            if let Ok(area) = id.parse::<Area>() {
                scores.set_score(area, value);
            }
        }
        scores
    }
}

impl From<Scores> for BTreeMap<Area, u8> {
    fn from(scores: Scores) -> Self {
        scores.iter().collect()
    }
}
