use retrace_pacing::{FrameBuffer, FrameId};

/// Host -> worker, through the single-step request slot.
///
/// The worker owns `buffer` until it sends [`Event::FrameCompleted`] with the same `frame_id`.
#[derive(Debug)]
pub struct StepRequest {
    pub frame_id: FrameId,
    pub buffer: FrameBuffer,
}

/// Host -> worker, out of band. Served ahead of any step waiting in the request slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Reset the simulated machine.
    Reset,
    /// Stop the worker loop. A step already waiting in the request slot still runs.
    Shutdown,
}

/// Worker -> host.
#[derive(Debug)]
pub enum Event {
    /// The worker is running and accepting requests.
    Ready,
    FrameCompleted {
        frame_id: FrameId,
        buffer: FrameBuffer,
    },
    /// The producer panicked; the worker has exited and the in-flight buffer is lost.
    Panicked { message: String },
    /// The worker loop exited.
    Stopped,
}
