//! Production side of the frame pipeline.
//!
//! A [`FrameProducer`] runs on a dedicated OS thread and talks to the display loop only through
//! channels:
//!
//! - a request slot of capacity 1 carrying [`StepRequest`]s (frame buffers move in by value),
//! - an unbounded control channel carrying [`Control`] messages, served first,
//! - an event channel carrying [`Event`]s back (filled buffers move out by value).
//!
//! [`run_host_loop`] drives a [`retrace_pacing::Scheduler`] from a periodic refresh ticker and
//! merges worker events as they arrive.

#![forbid(unsafe_code)]

mod clock;
mod error;
mod host;
mod producer;
mod protocol;
mod worker;

pub use clock::TokioHostClock;
pub use error::HostError;
pub use host::{run_host_loop, HostLoopConfig, HostLoopExit};
pub use producer::{read_frame_stamp, FrameProducer, TestPatternProducer, FRAME_STAMP_LEN};
pub use protocol::{Control, Event, StepRequest};
pub use worker::{spawn_worker, StepSender, WorkerEvents, WorkerLink, WorkerThread};
