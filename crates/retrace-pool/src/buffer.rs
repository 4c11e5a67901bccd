use core::fmt;

use crate::POOL_SIZE;

/// Identity of a pool slot (`0..POOL_SIZE`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(u8);

impl SlotId {
    pub(crate) const FIRST: SlotId = SlotId(0);

    pub const fn new(index: usize) -> Option<Self> {
        if index < POOL_SIZE {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub fn all() -> impl Iterator<Item = SlotId> {
        (0..POOL_SIZE as u8).map(SlotId)
    }

    /// Slot following `self`, wrapping at the end of the pool.
    pub(crate) fn next(self) -> SlotId {
        SlotId((self.0 + 1) % POOL_SIZE as u8)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Exclusively owned frame storage, tagged with the slot it belongs to.
///
/// Obtained from [`FramePool::acquire_for_write`](crate::FramePool::acquire_for_write) and
/// returned through [`FramePool::release_from_write`](crate::FramePool::release_from_write). The
/// length is fixed for the lifetime of the pool.
pub struct FrameBuffer {
    slot: SlotId,
    pixels: Box<[u8]>,
}

impl FrameBuffer {
    pub(crate) fn new(slot: SlotId, pixels: Box<[u8]>) -> Self {
        Self { slot, pixels }
    }

    pub(crate) fn into_parts(self) -> (SlotId, Box<[u8]>) {
        (self.slot, self.pixels)
    }

    pub fn slot(&self) -> SlotId {
        self.slot
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("slot", &self.slot)
            .field("len", &self.pixels.len())
            .finish()
    }
}
