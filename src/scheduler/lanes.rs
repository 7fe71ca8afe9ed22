//! Lane classification.
//!
//! Maps a numeric priority onto a named bucket. Ranges are evaluated
//! highest-`min` first; a priority that falls into a configuration gap lands
//! in the lane with the smallest `min`.

use std::collections::BTreeMap;

use crate::config::LaneRange;

/// A named priority range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lane {
    pub name: String,
    pub range: LaneRange,
}

/// Classifies priorities into lanes.
#[derive(Debug, Clone)]
pub struct LaneClassifier {
    /// Sorted by descending `min`; never empty.
    lanes: Vec<Lane>,
}

impl LaneClassifier {
    /// Build a classifier from the configured lanes.
    ///
    /// An empty map yields a single catch-all `default` lane; validated configs
    /// never produce one.
    pub fn new(lanes: &BTreeMap<String, LaneRange>) -> Self {
        let mut lanes: Vec<Lane> = lanes
            .iter()
            .map(|(name, range)| Lane {
                name: name.clone(),
                range: *range,
            })
            .collect();

        if lanes.is_empty() {
            lanes.push(Lane {
                name: "default".to_string(),
                range: LaneRange::new(i64::MIN, None),
            });
        }

        // Ties on min resolve by name so classification is deterministic
        lanes.sort_by(|a, b| b.range.min.cmp(&a.range.min).then_with(|| a.name.cmp(&b.name)));

        Self { lanes }
    }

    /// Name of the lane for `priority`.
    pub fn classify(&self, priority: i64) -> &str {
        self.lanes
            .iter()
            .find(|lane| lane.range.contains(priority))
            .unwrap_or_else(|| self.fallback())
            .name
            .as_str()
    }

    /// Lanes in evaluation order
    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    /// Lane names in evaluation order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.lanes.iter().map(|lane| lane.name.as_str())
    }

    fn fallback(&self) -> &Lane {
        // Sorted descending, so the smallest min is last
        &self.lanes[self.lanes.len() - 1]
    }
}
