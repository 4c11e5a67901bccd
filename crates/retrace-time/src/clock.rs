use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time source.
///
/// `now()` must never go backwards.
pub trait HostClock {
    fn now(&self) -> Duration;
}

impl<C: HostClock + ?Sized> HostClock for &C {
    fn now(&self) -> Duration {
        (**self).now()
    }
}

impl<C: HostClock + ?Sized> HostClock for Arc<C> {
    fn now(&self) -> Duration {
        (**self).now()
    }
}

/// [`HostClock`] backed by [`Instant`], measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct StdHostClock {
    origin: Instant,
}

impl StdHostClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for StdHostClock {
    fn default() -> Self {
        Self::new()
    }
}

impl HostClock for StdHostClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Manually advanced clock for deterministic tests.
///
/// Clones share the same underlying time, so a test can keep one handle while the code under test
/// owns another.
#[derive(Debug, Clone, Default)]
pub struct FakeHostClock {
    now_ns: Arc<AtomicU64>,
}

impl FakeHostClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(now: Duration) -> Self {
        let clock = Self::new();
        clock.set(now);
        clock
    }

    pub fn advance(&self, delta: Duration) {
        self.now_ns
            .fetch_add(duration_to_ns(delta), Ordering::SeqCst);
    }

    /// Jumps to `now`. Attempts to move backwards are ignored to keep the clock monotonic.
    pub fn set(&self, now: Duration) {
        self.now_ns
            .fetch_max(duration_to_ns(now), Ordering::SeqCst);
    }
}

impl HostClock for FakeHostClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.now_ns.load(Ordering::SeqCst))
    }
}

fn duration_to_ns(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}
