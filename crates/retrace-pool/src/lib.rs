//! Fixed pool of three frame buffers rotating through display roles.
//!
//! Each buffer is in exactly one [`BufferRole`] at a time:
//!
//! ```text
//!            acquire_for_write            release_from_write
//!   Free ───────────────────────▶ Locked ───────────────────▶ AwaitingShow
//!    ▲                                                           │
//!    │  release_from_show                      promote_to_show   │
//!    └──────────────────────── BeingShown ◀──────────────────────┘
//! ```
//!
//! A newer `release_from_write` demotes an unpromoted `AwaitingShow` buffer straight back to
//! `Free` (latest frame wins). Buffer storage moves by value: while a slot is `Locked` the pool
//! does not hold its bytes at all, so the writer's buffer can never be handed to a presenter.

#![forbid(unsafe_code)]

mod buffer;
mod error;
mod pool;

pub use buffer::{FrameBuffer, SlotId};
pub use error::{PoolError, ReleaseError};
pub use pool::{BufferRole, FramePool, POOL_SIZE};
