//! Triple-buffered frame handoff between a simulation worker and a display refresh loop.
//!
//! - [`pool`]: the three-slot buffer pool and its role state machine.
//! - [`pacing`]: the refresh-driven scheduler (deadlines, catch-up, fast path).
//! - [`worker`]: the producer thread, its channel protocol and the async host loop.
//! - [`time`]: host clocks.

#![forbid(unsafe_code)]

pub use retrace_pacing as pacing;
pub use retrace_pool as pool;
pub use retrace_time as time;
pub use retrace_worker as worker;
