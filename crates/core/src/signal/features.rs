use crate::domain::candidate::FeatureRecord;
use crate::domain::snapshot::Snapshot;
use crate::signal::params::FeatureParams;
use crate::snapshot::SnapshotStore;
use chrono::{DateTime, Utc};

/// Derives per-symbol features from the history as it stood before this cycle's append.
///
/// Everything is a pure function of the history slice, `now` and the parameters, so computing
/// the same symbol twice yields the same record.
#[derive(Debug, Clone, Copy)]
pub struct FeatureCalculator<'a> {
    history: &'a [Snapshot],
    novelty: &'a [Snapshot],
    params: &'a FeatureParams,
}

impl<'a> FeatureCalculator<'a> {
    pub fn from_store(store: &'a SnapshotStore, now: DateTime<Utc>, params: &'a FeatureParams) -> Self {
        Self::over(store.all(), now, params)
    }

    /// `history` must be ordered oldest first.
    pub fn over(history: &'a [Snapshot], now: DateTime<Utc>, params: &'a FeatureParams) -> Self {
        let end = history.partition_point(|s| s.timestamp <= now);
        let history = &history[..end];
        let novelty_start = history.partition_point(|s| s.timestamp < now - params.novelty_window);

        Self {
            history,
            novelty: &history[novelty_start..],
            params,
        }
    }

    pub fn compute(&self, symbol: &str, current: u32) -> FeatureRecord {
        let previous = self.history.last().map(|s| s.count(symbol)).unwrap_or(0);
        let delta = i64::from(current) - i64::from(previous);

        FeatureRecord {
            current,
            previous,
            delta,
            momentum: self.momentum(symbol, current),
            is_new: self.is_new(symbol),
            is_spiking: self.is_spiking(delta, previous, current),
        }
    }

    // Slope between the oldest and newest of the last K points, the current count being the newest.
    fn momentum(&self, symbol: &str, current: u32) -> f64 {
        let k = self.params.momentum_points;
        if k < 2 {
            return 0.0;
        }

        let trailing = &self.history[self.history.len().saturating_sub(k - 1)..];
        let Some(oldest) = trailing.first() else {
            return 0.0;
        };

        let intervals = trailing.len() as f64;
        (f64::from(current) - f64::from(oldest.count(symbol))) / intervals
    }

    // Vacuously true when the novelty window holds no snapshots (cold start).
    fn is_new(&self, symbol: &str) -> bool {
        self.novelty.iter().all(|s| s.count(symbol) == 0)
    }

    fn is_spiking(&self, delta: i64, previous: u32, current: u32) -> bool {
        delta >= self.params.spike_abs
            || (previous > 0 && f64::from(current) >= f64::from(previous) * self.params.spike_mult)
    }
}
