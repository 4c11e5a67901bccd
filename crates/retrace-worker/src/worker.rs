use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use retrace_pacing::{DispatchError, DispatchErrorKind, FrameBuffer, FrameId, StepDispatcher};
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tracing::{debug, error, info};

use crate::{Control, Event, FrameProducer, HostError, StepRequest};

const WORKER_THREAD_NAME: &str = "retrace-frame-worker";

/// Host-side handles for a running worker.
pub struct WorkerLink {
    pub requests: StepSender,
    pub events: WorkerEvents,
    pub thread: WorkerThread,
}

/// Starts `producer` on its own thread.
///
/// The request channel holds a single step: at most one step can be waiting for the worker.
/// Resets and shutdown travel separately and never occupy that slot.
pub fn spawn_worker<P: FrameProducer>(producer: P) -> Result<WorkerLink, HostError> {
    let (frame_tx, frame_rx) = mpsc::channel(1);
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let (evt_tx, evt_rx) = mpsc::unbounded_channel();

    // Channel-only runtime: the worker never touches timers or sockets.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .map_err(HostError::Spawn)?;

    let handle = thread::Builder::new()
        .name(WORKER_THREAD_NAME.to_string())
        .spawn(move || runtime.block_on(worker_main(producer, frame_rx, control_rx, evt_tx)))
        .map_err(HostError::Spawn)?;

    Ok(WorkerLink {
        requests: StepSender {
            frames: frame_tx,
            control: control_tx,
        },
        events: WorkerEvents { rx: evt_rx },
        thread: WorkerThread { handle },
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerExit {
    Shutdown,
    HostGone,
    Panicked,
}

async fn worker_main<P: FrameProducer>(
    mut producer: P,
    mut frames: mpsc::Receiver<StepRequest>,
    mut control: mpsc::UnboundedReceiver<Control>,
    events: mpsc::UnboundedSender<Event>,
) {
    if events.send(Event::Ready).is_err() {
        return;
    }
    debug!("frame worker ready");

    let exit = loop {
        tokio::select! {
            biased;

            msg = control.recv() => match msg {
                Some(Control::Reset) => {
                    info!("resetting frame producer");
                    producer.reset();
                }
                Some(Control::Shutdown) | None => {
                    // A step already in the slot still runs so its buffer goes back.
                    break match frames.try_recv() {
                        Ok(req) => run_step(&mut producer, req, &events)
                            .err()
                            .unwrap_or(WorkerExit::Shutdown),
                        Err(_) => WorkerExit::Shutdown,
                    };
                }
            },
            req = frames.recv() => match req {
                Some(req) => {
                    if let Err(exit) = run_step(&mut producer, req, &events) {
                        break exit;
                    }
                }
                None => break WorkerExit::Shutdown,
            },
        }
    };

    if exit != WorkerExit::Panicked {
        let _ = events.send(Event::Stopped);
    }
    debug!(?exit, "frame worker stopped");
}

fn run_step<P: FrameProducer>(
    producer: &mut P,
    req: StepRequest,
    events: &mpsc::UnboundedSender<Event>,
) -> Result<(), WorkerExit> {
    let StepRequest {
        frame_id,
        mut buffer,
    } = req;
    let step = panic::catch_unwind(AssertUnwindSafe(|| producer.run_frame(buffer.pixels_mut())));
    if let Err(payload) = step {
        let message = panic_message(payload.as_ref());
        error!(frame = %frame_id, "frame producer panicked: {message}");
        let _ = events.send(Event::Panicked { message });
        return Err(WorkerExit::Panicked);
    }
    if events
        .send(Event::FrameCompleted { frame_id, buffer })
        .is_err()
    {
        debug!("host went away; stopping frame worker");
        return Err(WorkerExit::HostGone);
    }
    Ok(())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Host-side sender for the worker. This is the scheduler's [`StepDispatcher`].
#[derive(Debug, Clone)]
pub struct StepSender {
    frames: mpsc::Sender<StepRequest>,
    control: mpsc::UnboundedSender<Control>,
}

impl StepSender {
    /// Resets the producer before it runs any step still waiting in the request slot.
    pub fn reset(&self) -> Result<(), HostError> {
        self.control
            .send(Control::Reset)
            .map_err(|_| HostError::WorkerUnavailable)
    }

    /// Asks the worker to exit once it has finished its current step and any step already
    /// queued. Succeeds if the worker has already gone.
    pub fn shutdown(&self) {
        let _ = self.control.send(Control::Shutdown);
    }
}

impl StepDispatcher for StepSender {
    fn dispatch_step(
        &mut self,
        frame_id: FrameId,
        buffer: FrameBuffer,
    ) -> Result<(), DispatchError> {
        let (kind, req) = match self.frames.try_send(StepRequest { frame_id, buffer }) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(req)) => (DispatchErrorKind::Busy, req),
            Err(TrySendError::Closed(req)) => (DispatchErrorKind::Closed, req),
        };
        Err(DispatchError {
            kind,
            buffer: req.buffer,
        })
    }
}

/// Receiving half of the worker's event channel.
#[derive(Debug)]
pub struct WorkerEvents {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl WorkerEvents {
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Non-blocking poll. `None` means nothing is pending right now (or the worker is gone).
    pub fn try_recv(&mut self) -> Option<Event> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Waits for [`Event::Ready`].
    pub async fn wait_ready(&mut self) -> Result<(), HostError> {
        loop {
            match self.rx.recv().await {
                Some(Event::Ready) => return Ok(()),
                Some(Event::Panicked { message }) => return Err(HostError::WorkerPanicked(message)),
                Some(other) => debug!(?other, "ignoring worker event before ready"),
                None => return Err(HostError::WorkerUnavailable),
            }
        }
    }
}

/// Owner of the worker's OS thread.
#[derive(Debug)]
pub struct WorkerThread {
    handle: JoinHandle<()>,
}

impl WorkerThread {
    /// Waits for the thread to exit without blocking the async runtime.
    pub async fn join(self) -> Result<(), HostError> {
        let handle = self.handle;
        tokio::task::spawn_blocking(move || handle.join())
            .await
            .map_err(|_| HostError::Join)?
            .map_err(|_| HostError::Join)
    }
}
