use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Pacing counters.
///
/// Updated by the scheduler on the refresh loop; safe to read from any thread (e.g. a HUD or a
/// telemetry exporter) through a shared `Arc`.
#[derive(Debug, Default)]
pub struct PacingStats {
    frames_requested: AtomicU64,
    frames_completed: AtomicU64,
    frames_presented: AtomicU64,
    /// Completed frames overwritten by a newer frame before they could be shown.
    frames_dropped: AtomicU64,
    catch_up_rebases: AtomicU64,
    fast_path_dispatches: AtomicU64,
    present_failures: AtomicU64,
    stalls: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PacingStatsSnapshot {
    pub frames_requested: u64,
    pub frames_completed: u64,
    pub frames_presented: u64,
    pub frames_dropped: u64,
    pub catch_up_rebases: u64,
    pub fast_path_dispatches: u64,
    pub present_failures: u64,
    pub stalls: u64,
}

impl PacingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_frames_requested(&self) {
        self.frames_requested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_frames_completed(&self) {
        self.frames_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_frames_presented(&self) {
        self.frames_presented.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_frames_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_catch_up_rebases(&self) {
        self.catch_up_rebases.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_fast_path_dispatches(&self) {
        self.fast_path_dispatches
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_present_failures(&self) {
        self.present_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_stalls(&self) {
        self.stalls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PacingStatsSnapshot {
        PacingStatsSnapshot {
            frames_requested: self.frames_requested.load(Ordering::Relaxed),
            frames_completed: self.frames_completed.load(Ordering::Relaxed),
            frames_presented: self.frames_presented.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            catch_up_rebases: self.catch_up_rebases.load(Ordering::Relaxed),
            fast_path_dispatches: self.fast_path_dispatches.load(Ordering::Relaxed),
            present_failures: self.present_failures.load(Ordering::Relaxed),
            stalls: self.stalls.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_increments() {
        let stats = PacingStats::new();
        stats.inc_frames_requested();
        stats.inc_frames_requested();
        stats.inc_frames_presented();
        stats.inc_stalls();

        let snap = stats.snapshot();
        assert_eq!(snap.frames_requested, 2);
        assert_eq!(snap.frames_presented, 1);
        assert_eq!(snap.stalls, 1);
        assert_eq!(snap.frames_dropped, 0);
    }

    #[test]
    fn snapshot_serializes_with_field_names() {
        let stats = PacingStats::new();
        stats.inc_frames_dropped();
        let json = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(json["frames_dropped"], 1);
        assert_eq!(json["catch_up_rebases"], 0);
    }
}
