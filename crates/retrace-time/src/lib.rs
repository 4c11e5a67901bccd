//! Host time sources for the frame pacing loop.
//!
//! All pacing decisions are made against a **monotonic host time** expressed as a [`Duration`]
//! since the clock's origin. In production this is derived from [`std::time::Instant`]; unit tests
//! drive the scheduler deterministically via [`FakeHostClock`].
//!
//! [`Duration`]: std::time::Duration

#![forbid(unsafe_code)]

mod clock;

pub use clock::{FakeHostClock, HostClock, StdHostClock};

/// Converts a device frame rate into the interval between frames.
///
/// A 50 Hz device (PAL) yields exactly 20 ms. Returns `None` for a zero rate.
pub fn frame_interval_for_hz(hz: u32) -> Option<std::time::Duration> {
    if hz == 0 {
        return None;
    }
    Some(std::time::Duration::from_nanos(1_000_000_000 / u64::from(hz)))
}
