use std::time::Duration;

use retrace_pool::{PoolError, SlotId};
use thiserror::Error;

use crate::{DispatchErrorKind, FrameId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PacingError {
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("failed to dispatch production request: {0}")]
    Dispatch(#[from] DispatchErrorKind),

    /// Reported once per request when a stall timeout is configured.
    #[error("frame {frame_id} has not completed after {waited:?}")]
    StalledProduction { frame_id: FrameId, waited: Duration },

    /// A completion that does not pair with the outstanding request.
    #[error("unexpected completion for frame {frame_id} (outstanding: {outstanding:?})")]
    UnexpectedCompletion {
        frame_id: FrameId,
        outstanding: Option<FrameId>,
    },

    /// The pool queued a frame the scheduler has no request on record for. The slot is released
    /// without being shown.
    #[error("slot {slot} was queued for display without a completed request")]
    UntrackedFrame { slot: SlotId },

    #[error("invalid pacing config: {0}")]
    InvalidConfig(&'static str),
}
