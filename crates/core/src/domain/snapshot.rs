use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Symbol -> plausible mention count for one cycle.
pub type MentionCounts = BTreeMap<String, u32>;

/// Source id -> per-source mention counts.
pub type SourceCounts = BTreeMap<String, MentionCounts>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
    pub counts: MentionCounts,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub per_source: SourceCounts,
}

impl Snapshot {
    pub fn count(&self, symbol: &str) -> u32 {
        self.counts.get(symbol).copied().unwrap_or(0)
    }

    pub fn age_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.timestamp
    }
}

/// Persisted form of the whole history: `{ "snapshots": [ ... ] }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotState {
    #[serde(default)]
    pub snapshots: Vec<Snapshot>,
}

/// One point of a symbol's mention series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub timestamp: DateTime<Utc>,
    pub count: u32,
}

impl SnapshotState {
    /// Count of `symbol` in every stored snapshot, oldest first. Absent means zero.
    pub fn history(&self, symbol: &str) -> Vec<HistoryPoint> {
        let mut points: Vec<HistoryPoint> = self
            .snapshots
            .iter()
            .map(|s| HistoryPoint {
                timestamp: s.timestamp,
                count: s.count(symbol),
            })
            .collect();
        points.sort_by_key(|p| p.timestamp);
        points
    }
}
