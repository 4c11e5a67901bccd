use thiserror::Error;

use crate::{BufferRole, FrameBuffer, SlotId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// A write lock was requested while another slot still holds one. This is a scheduler bug.
    #[error("slot {locked} is already locked for writing")]
    ConcurrentWriteViolation { locked: SlotId },

    #[error("no free frame buffer available")]
    NoFreeSlot,

    #[error("slot {slot} is not locked for writing (role: {role:?})")]
    NotLocked { slot: SlotId, role: BufferRole },

    #[error("slot {slot} is not being shown (role: {role:?})")]
    NotShown { slot: SlotId, role: BufferRole },

    #[error("frame buffer for slot {slot} is {found} bytes, expected {expected}")]
    LengthMismatch {
        slot: SlotId,
        expected: usize,
        found: usize,
    },

    #[error("frame length must be non-zero")]
    EmptyFrame,
}

/// A buffer the pool refused to take back. Ownership returns to the caller.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct ReleaseError {
    pub error: PoolError,
    pub buffer: FrameBuffer,
}
