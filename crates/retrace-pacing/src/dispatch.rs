use core::fmt;

use retrace_pool::{FrameBuffer, SlotId};
use thiserror::Error;

/// Sequence number of a production request. Starts at 1 and increments per dispatched step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub u64);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum DispatchErrorKind {
    /// A request is already waiting in the production slot. Requests and completions are paired
    /// 1:1, so this is a pacing bug.
    #[error("production request slot is occupied")]
    Busy,
    #[error("production channel is closed")]
    Closed,
}

/// A rejected request. The buffer comes back so the pool can reclaim it.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct DispatchError {
    pub kind: DispatchErrorKind,
    pub buffer: FrameBuffer,
}

/// Sending side of the production channel.
///
/// `dispatch_step` must return immediately; the filled buffer comes back later through
/// [`Scheduler::on_step_completed`](crate::Scheduler::on_step_completed).
pub trait StepDispatcher {
    fn dispatch_step(&mut self, frame_id: FrameId, buffer: FrameBuffer)
        -> Result<(), DispatchError>;
}

impl<D: StepDispatcher + ?Sized> StepDispatcher for &mut D {
    fn dispatch_step(
        &mut self,
        frame_id: FrameId,
        buffer: FrameBuffer,
    ) -> Result<(), DispatchError> {
        (**self).dispatch_step(frame_id, buffer)
    }
}

impl<D: StepDispatcher + ?Sized> StepDispatcher for Box<D> {
    fn dispatch_step(
        &mut self,
        frame_id: FrameId,
        buffer: FrameBuffer,
    ) -> Result<(), DispatchError> {
        (**self).dispatch_step(frame_id, buffer)
    }
}

/// A completed frame on its way to the screen. The pixels are borrowed for the duration of the
/// call only.
#[derive(Clone, Copy)]
pub struct PresentedFrame<'a> {
    pub frame_id: FrameId,
    pub slot: SlotId,
    pub pixels: &'a [u8],
}

/// Rendering collaborator. Presentation is synchronous; failures are logged and not retried.
pub trait FramePresenter {
    type Error: fmt::Display;

    fn present(&mut self, frame: PresentedFrame<'_>) -> Result<(), Self::Error>;
}

impl<P: FramePresenter + ?Sized> FramePresenter for &mut P {
    type Error = P::Error;

    fn present(&mut self, frame: PresentedFrame<'_>) -> Result<(), Self::Error> {
        (**self).present(frame)
    }
}
