//! Expiring set of issue dedup keys.
//!
//! A dedup key is `(station, issue type, floor(timestamp / window))`. Keys
//! are grouped by the registry-clock window in which they were received,
//! and only the newest `retention` receive windows are kept. Expiry never
//! depends on the reported timestamp, so a station whose clock is skewed is
//! still deduplicated, and memory stays bounded no matter how long the
//! service runs.

use std::collections::{BTreeMap, HashSet};

use hydrowatch_types::station::StationId;

type DedupKey = (StationId, String, u64);

/// Verdict for a single dedup check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupVerdict {
    /// First time this key is seen; it is now recorded.
    Fresh,
    /// Key already recorded in a retained receive window.
    Seen,
}

/// Ring of per-receive-window key sets.
#[derive(Debug)]
pub struct DedupWindow {
    window_secs: u64,
    retention: u64,
    received: BTreeMap<u64, HashSet<DedupKey>>,
}

impl DedupWindow {
    /// Both `window_secs` and `retention` are clamped to at least 1.
    pub fn new(window_secs: u64, retention: u64) -> Self {
        Self {
            window_secs: window_secs.max(1),
            retention: retention.max(1),
            received: BTreeMap::new(),
        }
    }

    /// Window index of a float unix timestamp. Negative and non-finite
    /// timestamps fall into window 0.
    pub fn window_of(&self, timestamp: f64) -> u64 {
        if !timestamp.is_finite() || timestamp <= 0.0 {
            return 0;
        }
        (timestamp / self.window_secs as f64).floor() as u64
    }

    /// Oldest receive window still retained relative to `now`.
    fn horizon(&self, now: f64) -> u64 {
        self.window_of(now).saturating_sub(self.retention - 1)
    }

    /// Check a report observed at `timestamp` and received at `now`, and
    /// record its key if it was not seen before.
    pub fn check_and_record(
        &mut self,
        station_id: &StationId,
        issue_type: &str,
        timestamp: f64,
        now: f64,
    ) -> DedupVerdict {
        self.prune(now);

        let key = (
            station_id.clone(),
            issue_type.to_string(),
            self.window_of(timestamp),
        );
        if self.received.values().any(|keys| keys.contains(&key)) {
            return DedupVerdict::Seen;
        }

        self.received
            .entry(self.window_of(now))
            .or_default()
            .insert(key);
        DedupVerdict::Fresh
    }

    /// Drop every receive window older than the horizon. Returns how many
    /// windows were dropped.
    pub fn prune(&mut self, now: f64) -> usize {
        let horizon = self.horizon(now);
        let before = self.received.len();
        self.received = self.received.split_off(&horizon);
        before - self.received.len()
    }

    pub fn window_count(&self) -> usize {
        self.received.len()
    }

    pub fn key_count(&self) -> usize {
        self.received.values().map(HashSet::len).sum()
    }
}
