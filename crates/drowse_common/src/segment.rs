//! Segment accounting
//!
//! A segment is the window between two successful reports. The daemon ticks
//! it once per second; the sampler reads the stored averages as its fallback
//! and the report builder snapshots it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

/// Running totals for the current segment
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentStats {
    /// Seconds the managed server was awake
    pub seconds: u64,
    /// Seconds the managed server was hibernating
    pub seconds_hibe: u64,
    /// Average of the process tree CPU totals over the awake seconds
    pub cpu_usage: f64,
    /// Average of the process tree memory totals over the awake seconds
    pub mem_usage: f64,
    /// Cumulative player-connection-seconds
    pub player_sec: u64,
}

impl SegmentStats {
    /// Account `secs` awake seconds with the tree totals sampled for them.
    /// The averages are weighted by awake seconds.
    pub fn record_awake(&mut self, secs: u64, cpu: f64, mem: f64) {
        if secs == 0 {
            return;
        }
        let before = self.seconds as f64;
        self.seconds += secs;
        let after = self.seconds as f64;
        let weight = secs as f64;
        self.cpu_usage = (self.cpu_usage * before + cpu * weight) / after;
        self.mem_usage = (self.mem_usage * before + mem * weight) / after;
    }

    /// Account `secs` hibernating seconds
    pub fn record_hibernating(&mut self, secs: u64) {
        self.seconds_hibe += secs;
    }

    /// Add `secs` for each connected player
    pub fn add_player_seconds(&mut self, players: u64, secs: u64) {
        self.player_sec += players * secs;
    }

    /// Total seconds covered by the segment
    pub fn total_seconds(&self) -> u64 {
        self.seconds + self.seconds_hibe
    }

    /// Fold `other` into these totals, averages weighted by awake seconds
    pub fn merge(&mut self, other: &SegmentStats) {
        let awake = self.seconds + other.seconds;
        if awake > 0 {
            let mine = self.seconds as f64;
            let theirs = other.seconds as f64;
            let total = awake as f64;
            self.cpu_usage = (self.cpu_usage * mine + other.cpu_usage * theirs) / total;
            self.mem_usage = (self.mem_usage * mine + other.mem_usage * theirs) / total;
        }
        self.seconds = awake;
        self.seconds_hibe += other.seconds_hibe;
        self.player_sec += other.player_sec;
    }
}

/// A segment taken out of a [`SharedSegment`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentWindow {
    pub stats: SegmentStats,
    pub started_at: DateTime<Utc>,
}

impl SegmentWindow {
    /// Wall-clock seconds from the segment start until now
    pub fn elapsed_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds().max(0)
    }
}

#[derive(Debug)]
struct SegmentState {
    stats: SegmentStats,
    started_at: DateTime<Utc>,
}

/// Lock-guarded segment handle shared by the sampler and the report builder
#[derive(Debug, Clone)]
pub struct SharedSegment {
    inner: Arc<Mutex<SegmentState>>,
}

impl Default for SharedSegment {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedSegment {
    pub fn new() -> Self {
        Self::with_stats(SegmentStats::default())
    }

    pub fn with_stats(stats: SegmentStats) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SegmentState {
                stats,
                started_at: Utc::now(),
            })),
        }
    }

    // A poisoned lock still holds plain counters, keep using them
    fn lock(&self) -> MutexGuard<'_, SegmentState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Copy of the current totals
    pub fn snapshot(&self) -> SegmentStats {
        self.lock().stats
    }

    /// Stored CPU and memory averages
    pub fn averages(&self) -> (f64, f64) {
        let state = self.lock();
        (state.stats.cpu_usage, state.stats.mem_usage)
    }

    /// Mutate the totals under the lock
    pub fn update<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut SegmentStats) -> R,
    {
        f(&mut self.lock().stats)
    }

    /// Start a new segment, returning the one that ended
    pub fn take(&self) -> SegmentWindow {
        let mut state = self.lock();
        let finished = SegmentWindow {
            stats: state.stats,
            started_at: state.started_at,
        };
        state.stats = SegmentStats::default();
        state.started_at = Utc::now();
        finished
    }

    /// Put back a segment whose report was not delivered. Seconds accounted
    /// since it was taken are kept.
    pub fn restore(&self, window: SegmentWindow) {
        let mut state = self.lock();
        state.stats.merge(&window.stats);
        state.started_at = state.started_at.min(window.started_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_record_awake_running_average() {
        let mut stats = SegmentStats::default();
        stats.record_awake(1, 10.0, 4.0);
        stats.record_awake(1, 20.0, 8.0);
        stats.record_awake(1, 30.0, 12.0);
        assert_eq!(stats.seconds, 3);
        assert_relative_eq!(stats.cpu_usage, 20.0);
        assert_relative_eq!(stats.mem_usage, 8.0);
    }

    #[test]
    fn test_record_awake_weighted_by_seconds() {
        let mut stats = SegmentStats::default();
        stats.record_awake(1, 10.0, 0.0);
        stats.record_awake(3, 30.0, 0.0);
        assert_eq!(stats.seconds, 4);
        assert_relative_eq!(stats.cpu_usage, 25.0);

        stats.record_awake(0, 1000.0, 1000.0);
        assert_eq!(stats.seconds, 4);
        assert_relative_eq!(stats.cpu_usage, 25.0);
    }

    #[test]
    fn test_hibernating_does_not_touch_averages() {
        let mut stats = SegmentStats::default();
        stats.record_awake(1, 50.0, 5.0);
        stats.record_hibernating(1);
        stats.record_hibernating(1);
        assert_eq!(stats.seconds, 1);
        assert_eq!(stats.seconds_hibe, 2);
        assert_eq!(stats.total_seconds(), 3);
        assert_relative_eq!(stats.cpu_usage, 50.0);
    }

    #[test]
    fn test_take_returns_finished_segment() {
        let segment = SharedSegment::new();
        segment.update(|s| {
            s.record_awake(1, 1.0, 2.0);
            s.add_player_seconds(3, 1);
        });
        let finished = segment.take();
        assert_eq!(finished.stats.seconds, 1);
        assert_eq!(finished.stats.player_sec, 3);
        assert!(finished.elapsed_secs() >= 0);
        assert_eq!(segment.snapshot(), SegmentStats::default());
    }

    #[test]
    fn test_restore_keeps_seconds_accounted_meanwhile() {
        let segment = SharedSegment::new();
        segment.update(|s| {
            s.record_awake(2, 10.0, 4.0);
            s.record_hibernating(100);
        });
        let taken = segment.take();

        segment.update(|s| {
            s.record_awake(2, 30.0, 8.0);
            s.record_hibernating(3);
        });
        segment.restore(taken);

        let stats = segment.snapshot();
        assert_eq!(stats.seconds, 4);
        assert_eq!(stats.seconds_hibe, 103);
        assert_relative_eq!(stats.cpu_usage, 20.0);
        assert_relative_eq!(stats.mem_usage, 6.0);
        assert_eq!(segment.take().started_at, taken.started_at);
    }

    #[test]
    fn test_merge_into_empty_segment() {
        let mut stats = SegmentStats::default();
        stats.merge(&SegmentStats {
            seconds: 5,
            seconds_hibe: 1,
            cpu_usage: 12.5,
            mem_usage: 8.0,
            player_sec: 9,
        });
        assert_eq!(stats.seconds, 5);
        assert_relative_eq!(stats.cpu_usage, 12.5);
        assert_eq!(stats.player_sec, 9);

        let before = stats;
        stats.merge(&SegmentStats::default());
        assert_eq!(stats, before);
    }

    #[test]
    fn test_clones_share_state() {
        let segment = SharedSegment::new();
        let other = segment.clone();
        other.update(|s| s.record_hibernating(1));
        assert_eq!(segment.snapshot().seconds_hibe, 1);
    }

    #[test]
    fn test_wire_names() {
        let stats = SegmentStats {
            seconds: 1,
            seconds_hibe: 2,
            cpu_usage: 0.5,
            mem_usage: 0.25,
            player_sec: 3,
        };
        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["secondsHibe"], 2);
        assert_eq!(json["playerSec"], 3);
        assert_eq!(json["cpuUsage"], 0.5);
    }
}
