use tracing::trace;

use crate::{FrameBuffer, PoolError, ReleaseError, SlotId};

/// Number of frame buffers in the pool.
///
/// Three is the smallest count for which a writable buffer always exists while one frame is on
/// screen and another is queued. Slot selection depends on it; it is not a tunable.
pub const POOL_SIZE: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferRole {
    Free,
    /// Owned by the producer; the pool holds no storage for the slot.
    Locked,
    AwaitingShow,
    BeingShown,
}

/// Role bookkeeping plus storage for the three frame buffers.
///
/// Roles other than `Free` are each tracked by a single `Option<SlotId>`, so at most one slot can
/// hold any of them. Transitions check that a slot never ends up in two roles at once.
pub struct FramePool {
    frame_len: usize,
    storage: [Option<Box<[u8]>>; POOL_SIZE],
    locked: Option<SlotId>,
    awaiting_show: Option<SlotId>,
    being_shown: Option<SlotId>,
    last_locked: Option<SlotId>,
}

impl FramePool {
    /// Allocates all three buffers up front. They are never reallocated.
    pub fn new(frame_len: usize) -> Result<Self, PoolError> {
        if frame_len == 0 {
            return Err(PoolError::EmptyFrame);
        }
        Ok(Self {
            frame_len,
            storage: std::array::from_fn(|_| Some(vec![0u8; frame_len].into_boxed_slice())),
            locked: None,
            awaiting_show: None,
            being_shown: None,
            last_locked: None,
        })
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    pub fn role(&self, slot: SlotId) -> BufferRole {
        if self.locked == Some(slot) {
            BufferRole::Locked
        } else if self.awaiting_show == Some(slot) {
            BufferRole::AwaitingShow
        } else if self.being_shown == Some(slot) {
            BufferRole::BeingShown
        } else {
            BufferRole::Free
        }
    }

    pub fn roles(&self) -> [BufferRole; POOL_SIZE] {
        let mut roles = [BufferRole::Free; POOL_SIZE];
        for slot in SlotId::all() {
            roles[slot.index()] = self.role(slot);
        }
        roles
    }

    pub fn locked(&self) -> Option<SlotId> {
        self.locked
    }

    pub fn awaiting_show(&self) -> Option<SlotId> {
        self.awaiting_show
    }

    pub fn being_shown(&self) -> Option<SlotId> {
        self.being_shown
    }

    /// Locks a buffer that is neither on screen nor queued for display and moves its storage to
    /// the caller.
    ///
    /// The search starts after the most recently locked slot so consecutive frames rotate through
    /// the pool.
    pub fn acquire_for_write(&mut self) -> Result<FrameBuffer, PoolError> {
        if let Some(locked) = self.locked {
            return Err(PoolError::ConcurrentWriteViolation { locked });
        }

        let mut candidate = self.last_locked.map_or(SlotId::FIRST, SlotId::next);
        for _ in 0..POOL_SIZE {
            if self.role(candidate) == BufferRole::Free {
                if let Some(pixels) = self.storage[candidate.index()].take() {
                    self.locked = Some(candidate);
                    self.last_locked = Some(candidate);
                    trace!(slot = %candidate, "frame buffer locked for writing");
                    return Ok(FrameBuffer::new(candidate, pixels));
                }
            }
            candidate = candidate.next();
        }

        Err(PoolError::NoFreeSlot)
    }

    /// Returns a written buffer and queues it for display.
    ///
    /// If an older frame was still waiting to be shown it is dropped back to `Free`; its slot is
    /// returned so callers can account for the skipped frame.
    pub fn release_from_write(
        &mut self,
        buffer: FrameBuffer,
    ) -> Result<Option<SlotId>, ReleaseError> {
        let slot = self.unlock(buffer)?;
        let dropped = self.awaiting_show.replace(slot);
        match dropped {
            Some(old) => trace!(slot = %slot, dropped = %old, "frame awaiting show (older frame dropped)"),
            None => trace!(slot = %slot, "frame awaiting show"),
        }
        Ok(dropped)
    }

    /// Returns a locked buffer without queueing it (its contents are not a finished frame).
    pub fn cancel_write(&mut self, buffer: FrameBuffer) -> Result<(), ReleaseError> {
        let slot = self.unlock(buffer)?;
        trace!(slot = %slot, "write lock cancelled");
        Ok(())
    }

    /// Moves the queued frame on screen. Returns `None` when nothing is queued, or while the
    /// previously shown frame has not been released yet.
    pub fn promote_to_show(&mut self) -> Option<SlotId> {
        if self.being_shown.is_some() {
            return None;
        }
        let slot = self.awaiting_show.take()?;
        self.being_shown = Some(slot);
        trace!(slot = %slot, "frame being shown");
        Some(slot)
    }

    pub fn shown_pixels(&self, slot: SlotId) -> Result<&[u8], PoolError> {
        match self.storage[slot.index()].as_deref() {
            Some(pixels) if self.being_shown == Some(slot) => Ok(pixels),
            _ => Err(PoolError::NotShown {
                slot,
                role: self.role(slot),
            }),
        }
    }

    pub fn release_from_show(&mut self, slot: SlotId) -> Result<(), PoolError> {
        if self.being_shown != Some(slot) {
            return Err(PoolError::NotShown {
                slot,
                role: self.role(slot),
            });
        }
        self.being_shown = None;
        trace!(slot = %slot, "frame released from show");
        Ok(())
    }

    /// Puts a locked buffer's storage back into its slot and clears the write lock. A buffer that
    /// does not belong in the locked slot is handed back untouched.
    fn unlock(&mut self, buffer: FrameBuffer) -> Result<SlotId, ReleaseError> {
        let slot = buffer.slot();
        let error = if self.locked != Some(slot) {
            Some(PoolError::NotLocked {
                slot,
                role: self.role(slot),
            })
        } else if buffer.len() != self.frame_len {
            Some(PoolError::LengthMismatch {
                slot,
                expected: self.frame_len,
                found: buffer.len(),
            })
        } else {
            None
        };
        if let Some(error) = error {
            return Err(ReleaseError { error, buffer });
        }

        let (_, pixels) = buffer.into_parts();
        self.storage[slot.index()] = Some(pixels);
        self.locked = None;
        Ok(slot)
    }
}

impl core::fmt::Debug for FramePool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FramePool")
            .field("frame_len", &self.frame_len)
            .field("roles", &self.roles())
            .finish()
    }
}
