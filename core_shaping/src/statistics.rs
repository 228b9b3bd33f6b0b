use std::collections::BTreeMap;

use serde::Serialize;

pub const INTRINSIC_REWARD_KEY: &str = "intrinsic_reward";
pub const EXTRINSIC_REWARD_KEY: &str = "extrinsic_reward";
/// Prefix of the keys holding the buffered per-episode mean of an event.
pub const MEAN_KEY_PREFIX: &str = "mean_";

/// Named scalars handed to a logging collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ShapingStatistics(BTreeMap<String, f64>);

impl ShapingStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn intrinsic_reward(&self) -> f64 {
        self.get(INTRINSIC_REWARD_KEY).unwrap_or_default()
    }

    pub fn extrinsic_reward(&self) -> f64 {
        self.get(EXTRINSIC_REWARD_KEY).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(name, value)| (name.as_str(), *value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Key-wise mean across vectorized environments. A key missing from some
    /// environments is averaged over the ones that report it.
    pub fn average(stats: &[ShapingStatistics]) -> ShapingStatistics {
        let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
        for entry in stats {
            for (name, value) in &entry.0 {
                let slot = sums.entry(name.clone()).or_insert((0.0, 0));
                slot.0 += value;
                slot.1 += 1;
            }
        }

        ShapingStatistics(
            sums.into_iter()
                .map(|(name, (total, count))| (name, total / count as f64))
                .collect(),
        )
    }
}

impl<'a> FromIterator<(&'a str, f64)> for ShapingStatistics {
    fn from_iter<T: IntoIterator<Item = (&'a str, f64)>>(iter: T) -> Self {
        ShapingStatistics(
            iter.into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        )
    }
}
