//! Rolling, time-bounded history of per-cycle mention counts.
//!
//! The store is the only state that survives between cycles. It is loaded once at the start of a
//! cycle, read for feature computation, then appended to (which purges expired snapshots and
//! writes the history back through the injected [`SnapshotBlob`]). Storage problems never abort
//! a cycle: an unreadable history loads as empty and a failed write is logged and skipped.

pub mod blob;

use crate::domain::snapshot::{MentionCounts, Snapshot, SnapshotState, SourceCounts};
use blob::{MemoryBlob, SnapshotBlob};
use chrono::{DateTime, Duration, SubsecRound, Utc};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended { purged: usize, persisted: bool },
    /// The timestamp was not newer than the latest stored snapshot; nothing changed.
    StaleTimestamp,
}

pub struct SnapshotStore {
    blob: Arc<dyn SnapshotBlob>,
    retention: Duration,
    snapshots: Vec<Snapshot>,
}

impl std::fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("blob", &self.blob.describe())
            .field("retention", &self.retention)
            .field("snapshots", &self.snapshots.len())
            .finish()
    }
}

impl SnapshotStore {
    pub fn in_memory(retention: Duration) -> Self {
        Self {
            blob: Arc::new(MemoryBlob::new()),
            retention,
            snapshots: Vec::new(),
        }
    }

    /// Load the persisted history. Missing or corrupt state yields an empty store.
    pub async fn load(blob: Arc<dyn SnapshotBlob>, retention: Duration, now: DateTime<Utc>) -> Self {
        let snapshots = match blob.load().await {
            Ok(Some(payload)) => match serde_json::from_value::<SnapshotState>(payload) {
                Ok(state) => normalize(state.snapshots),
                Err(err) => {
                    tracing::warn!(
                        blob = %blob.describe(),
                        error = %err,
                        "snapshot state is corrupt; starting with empty history"
                    );
                    Vec::new()
                }
            },
            Ok(None) => {
                tracing::info!(blob = %blob.describe(), "no snapshot state yet; starting fresh");
                Vec::new()
            }
            Err(err) => {
                tracing::warn!(
                    blob = %blob.describe(),
                    error = %err,
                    "snapshot state unreadable; starting with empty history"
                );
                Vec::new()
            }
        };

        let mut store = Self {
            blob,
            retention,
            snapshots,
        };
        let future = store.drop_future(now);
        if future > 0 {
            tracing::warn!(
                future,
                %now,
                "dropped snapshots stamped after the current cycle"
            );
        }
        let purged = store.purge(now);
        tracing::debug!(
            snapshots = store.snapshots.len(),
            purged,
            "snapshot history loaded"
        );
        store
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Most recently appended snapshot.
    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }

    /// Snapshots with `now - lookback <= timestamp <= now`, oldest first.
    pub fn windowed(&self, lookback: Duration, now: DateTime<Utc>) -> &[Snapshot] {
        let start_ts = now - lookback;
        let start = self.snapshots.partition_point(|s| s.timestamp < start_ts);
        let end = self.snapshots.partition_point(|s| s.timestamp <= now);
        &self.snapshots[start..end.max(start)]
    }

    /// The `n` most recent snapshots, oldest first.
    pub fn recent(&self, n: usize) -> &[Snapshot] {
        let start = self.snapshots.len().saturating_sub(n);
        &self.snapshots[start..]
    }

    pub fn all(&self) -> &[Snapshot] {
        &self.snapshots
    }

    /// Append this cycle's counts, purge snapshots older than the retention window and persist.
    ///
    /// Callers must capture everything they need from `latest`/`windowed` before calling this.
    pub async fn append(
        &mut self,
        counts: MentionCounts,
        per_source: SourceCounts,
        at: DateTime<Utc>,
    ) -> AppendOutcome {
        // Stored with second precision; truncate up front so the in-memory and persisted copies agree.
        let at = at.trunc_subsecs(0);
        if let Some(last) = self.snapshots.last() {
            if at <= last.timestamp {
                tracing::warn!(
                    %at,
                    latest = %last.timestamp,
                    "snapshot timestamp not newer than latest; skipping append"
                );
                return AppendOutcome::StaleTimestamp;
            }
        }

        self.snapshots.push(Snapshot {
            timestamp: at,
            counts,
            per_source,
        });
        let purged = self.purge(at);
        let persisted = self.persist().await;

        AppendOutcome::Appended { purged, persisted }
    }

    // A snapshot from the future would make every append stale until the clock caught up.
    fn drop_future(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.snapshots.len();
        self.snapshots.retain(|s| s.timestamp <= now);
        before - self.snapshots.len()
    }

    fn purge(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.retention;
        let before = self.snapshots.len();
        self.snapshots.retain(|s| s.timestamp >= cutoff);
        before - self.snapshots.len()
    }

    async fn persist(&self) -> bool {
        let state = SnapshotState {
            snapshots: self.snapshots.clone(),
        };
        let payload = match serde_json::to_value(&state) {
            Ok(v) => v,
            Err(err) => {
                tracing::warn!(error = %err, "serialize snapshot state failed");
                return false;
            }
        };

        match self.blob.save(&payload).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(
                    blob = %self.blob.describe(),
                    error = %err,
                    "persist snapshot state failed; history kept in memory only"
                );
                false
            }
        }
    }
}

/// Sort by timestamp and drop duplicate timestamps (last one wins).
fn normalize(mut snapshots: Vec<Snapshot>) -> Vec<Snapshot> {
    snapshots.sort_by_key(|s| s.timestamp);
    let mut out: Vec<Snapshot> = Vec::with_capacity(snapshots.len());
    for snap in snapshots {
        match out.last_mut() {
            Some(last) if last.timestamp == snap.timestamp => *last = snap,
            _ => out.push(snap),
        }
    }
    out
}
