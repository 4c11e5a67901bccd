use core::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::PacingStatsSnapshot;

/// Emulation and presentation rates over one measurement window.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FpsReport {
    pub window_ms: u64,
    /// Simulation steps completed per second.
    pub run_fps: f64,
    /// Frames presented per second.
    pub render_fps: f64,
}

impl fmt::Display for FpsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "running at {:.1}fps, rendering at {:.1}fps",
            self.run_fps, self.render_fps
        )
    }
}

/// Rolling frame-rate meter fed from [`PacingStatsSnapshot`]s.
#[derive(Debug, Clone)]
pub struct FpsMeter {
    window: Duration,
    last: Option<(Duration, PacingStatsSnapshot)>,
}

impl FpsMeter {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Returns a report once at least one window has elapsed since the previous report.
    pub fn sample(&mut self, now: Duration, stats: PacingStatsSnapshot) -> Option<FpsReport> {
        let Some((at, prev)) = self.last else {
            self.last = Some((now, stats));
            return None;
        };

        let elapsed = now.saturating_sub(at);
        if elapsed < self.window || elapsed.is_zero() {
            return None;
        }
        self.last = Some((now, stats));

        let secs = elapsed.as_secs_f64();
        let completed = stats.frames_completed.saturating_sub(prev.frames_completed);
        let presented = stats.frames_presented.saturating_sub(prev.frames_presented);
        Some(FpsReport {
            window_ms: elapsed.as_millis() as u64,
            run_fps: completed as f64 / secs,
            render_fps: presented as f64 / secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(completed: u64, presented: u64) -> PacingStatsSnapshot {
        PacingStatsSnapshot {
            frames_completed: completed,
            frames_presented: presented,
            ..PacingStatsSnapshot::default()
        }
    }

    #[test]
    fn first_sample_only_primes_the_window() {
        let mut meter = FpsMeter::new(Duration::from_secs(1));
        assert_eq!(meter.sample(Duration::ZERO, snap(0, 0)), None);
        assert_eq!(meter.sample(Duration::from_millis(500), snap(25, 25)), None);
    }

    #[test]
    fn reports_rates_over_the_window() {
        let mut meter = FpsMeter::new(Duration::from_secs(1));
        meter.sample(Duration::ZERO, snap(0, 0));
        let report = meter
            .sample(Duration::from_secs(2), snap(100, 60))
            .unwrap();
        assert_eq!(report.window_ms, 2000);
        assert_eq!(report.run_fps, 50.0);
        assert_eq!(report.render_fps, 30.0);
        assert_eq!(
            report.to_string(),
            "running at 50.0fps, rendering at 30.0fps"
        );

        // The next window starts from the last report.
        let report = meter
            .sample(Duration::from_secs(3), snap(150, 110))
            .unwrap();
        assert_eq!(report.run_fps, 50.0);
        assert_eq!(report.render_fps, 50.0);
    }
}
