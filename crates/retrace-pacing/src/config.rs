use std::time::Duration;

use crate::PacingError;

/// One frame of a 50 Hz device.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacingConfig {
    /// Simulated time covered by one production step.
    pub target_interval: Duration,
    /// Report [`PacingError::StalledProduction`] once a step has been outstanding this long.
    ///
    /// `None` waits forever.
    pub stall_timeout: Option<Duration>,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            target_interval: DEFAULT_FRAME_INTERVAL,
            stall_timeout: None,
        }
    }
}

impl PacingConfig {
    /// Pacing for a device producing `hz` frames per second.
    pub fn for_device_hz(hz: u32) -> Result<Self, PacingError> {
        let target_interval = retrace_time::frame_interval_for_hz(hz)
            .ok_or(PacingError::InvalidConfig("device frame rate must be non-zero"))?;
        Ok(Self {
            target_interval,
            ..Self::default()
        })
    }

    pub fn with_stall_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stall_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), PacingError> {
        if self.target_interval.is_zero() {
            return Err(PacingError::InvalidConfig(
                "target frame interval must be non-zero",
            ));
        }
        if self.stall_timeout.is_some_and(|t| t.is_zero()) {
            return Err(PacingError::InvalidConfig("stall timeout must be non-zero"));
        }
        Ok(())
    }
}
