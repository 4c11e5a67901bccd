use std::time::Duration;

use retrace_time::HostClock;
use tokio::time::Instant;

/// [`HostClock`] on the Tokio timer's time base.
///
/// Shares the time source of [`tokio::time::interval`], so it follows paused/advanced time in
/// tests.
#[derive(Debug, Clone, Copy)]
pub struct TokioHostClock {
    origin: Instant,
}

impl TokioHostClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for TokioHostClock {
    fn default() -> Self {
        Self::new()
    }
}

impl HostClock for TokioHostClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn follows_paused_time() {
        let clock = TokioHostClock::new();
        assert_eq!(clock.now(), Duration::ZERO);
        tokio::time::advance(Duration::from_millis(20)).await;
        assert_eq!(clock.now(), Duration::from_millis(20));
    }
}
