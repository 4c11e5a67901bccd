//! Display-cadence frame pacing.
//!
//! The [`Scheduler`] runs once per display refresh. Each tick it
//!
//! 1. presents the most recently completed frame (if any) and releases it straight back to the
//!    pool,
//! 2. requests the next simulation step once the frame deadline has passed and no step is in
//!    flight.
//!
//! Deadlines normally advance by exactly one target interval so the long-run frame rate matches
//! the simulated device. After a stall (more than one full interval late) the deadline is re-based
//! to `now + interval` instead of queueing the missed frames. When a step completes after its
//! successor's deadline has already passed, the next step is dispatched straight from the
//! completion handler.
//!
//! The scheduler never blocks: requests go out through a [`StepDispatcher`] and completions are fed
//! back with [`Scheduler::on_step_completed`] whenever the host observes them.

#![forbid(unsafe_code)]

mod config;
mod dispatch;
mod error;
mod fps;
mod scheduler;
mod stats;

pub use config::{PacingConfig, DEFAULT_FRAME_INTERVAL};
pub use dispatch::{
    DispatchError, DispatchErrorKind, FrameId, FramePresenter, PresentedFrame, StepDispatcher,
};
pub use error::PacingError;
pub use fps::{FpsMeter, FpsReport};
pub use scheduler::{Scheduler, TickOutcome};
pub use stats::{PacingStats, PacingStatsSnapshot};

pub use retrace_pool::{
    BufferRole, FrameBuffer, FramePool, PoolError, ReleaseError, SlotId, POOL_SIZE,
};
