use std::sync::Arc;
use std::time::Duration;

use retrace_pool::{FrameBuffer, FramePool, SlotId};
use tracing::{debug, info, trace, warn};

use crate::{
    FrameId, FramePresenter, PacingConfig, PacingError, PacingStats, PresentedFrame,
    StepDispatcher,
};

/// What a single [`Scheduler::tick`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub presented: Option<FrameId>,
    pub dispatched: Option<FrameId>,
}

#[derive(Clone, Copy, Debug)]
struct InFlight {
    frame_id: FrameId,
    dispatched_at: Duration,
    stall_reported: bool,
}

/// Refresh-driven controller for the frame pool and the production channel.
///
/// Times passed to the scheduler are monotonic host times (see [`retrace_time::HostClock`]).
pub struct Scheduler<D> {
    cfg: PacingConfig,
    pool: FramePool,
    dispatcher: D,
    next_frame_time: Duration,
    in_flight: Option<InFlight>,
    /// Frame currently queued for display (pairs with the pool's `AwaitingShow` slot).
    awaiting_show: Option<FrameId>,
    next_frame_id: u64,
    shut_down: bool,
    stats: Arc<PacingStats>,
}

impl<D: StepDispatcher> Scheduler<D> {
    /// Creates a scheduler whose first frame is due at `start`.
    pub fn new(
        cfg: PacingConfig,
        pool: FramePool,
        dispatcher: D,
        start: Duration,
    ) -> Result<Self, PacingError> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            pool,
            dispatcher,
            next_frame_time: start,
            in_flight: None,
            awaiting_show: None,
            next_frame_id: 1,
            shut_down: false,
            stats: Arc::new(PacingStats::new()),
        })
    }

    pub fn config(&self) -> &PacingConfig {
        &self.cfg
    }

    pub fn pool(&self) -> &FramePool {
        &self.pool
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut D {
        &mut self.dispatcher
    }

    pub fn stats(&self) -> &Arc<PacingStats> {
        &self.stats
    }

    pub fn next_frame_time(&self) -> Duration {
        self.next_frame_time
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn outstanding(&self) -> Option<FrameId> {
        self.in_flight.map(|f| f.frame_id)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Stops issuing production requests. An outstanding request is abandoned; if its completion
    /// still arrives the buffer is reclaimed without being shown.
    pub fn shutdown(&mut self) {
        if !self.shut_down {
            info!(outstanding = ?self.outstanding(), "frame pacing shut down");
            self.shut_down = true;
        }
    }

    /// Runs one display refresh.
    ///
    /// Presentation happens before the deadline check, so a frame completed before this tick is
    /// always on screen before its successor is requested. A stall report is made before anything
    /// else: that tick presents nothing and the queued frame is shown on the next one.
    pub fn tick<P: FramePresenter>(
        &mut self,
        now: Duration,
        presenter: &mut P,
    ) -> Result<TickOutcome, PacingError> {
        if !self.shut_down {
            self.check_stall(now)?;
        }

        let mut outcome = TickOutcome {
            presented: self.present_pending(presenter)?,
            dispatched: None,
        };

        if self.shut_down || self.in_flight.is_some() {
            return Ok(outcome);
        }

        if now >= self.next_frame_time {
            let behind = now > self.next_frame_time + self.cfg.target_interval;
            outcome.dispatched = Some(self.dispatch_next(now)?);
            if behind {
                debug!(
                    late_by = ?now - self.next_frame_time,
                    "frame deadline re-based after stall"
                );
                self.next_frame_time = now + self.cfg.target_interval;
                self.stats.inc_catch_up_rebases();
            } else {
                self.next_frame_time += self.cfg.target_interval;
            }
        }

        Ok(outcome)
    }

    /// Merges a finished production step.
    ///
    /// The buffer is queued for display, replacing any frame that has not been shown yet. If the
    /// deadline has already passed the next step is dispatched immediately and returned.
    pub fn on_step_completed(
        &mut self,
        now: Duration,
        frame_id: FrameId,
        buffer: FrameBuffer,
    ) -> Result<Option<FrameId>, PacingError> {
        match self.in_flight {
            Some(flight) if flight.frame_id == frame_id => {}
            other => {
                return Err(PacingError::UnexpectedCompletion {
                    frame_id,
                    outstanding: other.map(|f| f.frame_id),
                });
            }
        }
        self.in_flight = None;

        if self.shut_down {
            debug!(frame = %frame_id, "discarding frame completed after shutdown");
            self.pool.cancel_write(buffer).map_err(|r| r.error)?;
            return Ok(None);
        }

        if let Some(dropped) = self
            .pool
            .release_from_write(buffer)
            .map_err(|r| r.error)?
        {
            self.stats.inc_frames_dropped();
            debug!(
                frame = ?self.awaiting_show,
                slot = %dropped,
                "unshown frame replaced by a newer one"
            );
        }
        self.awaiting_show = Some(frame_id);
        self.stats.inc_frames_completed();
        trace!(frame = %frame_id, "frame completed");

        if now >= self.next_frame_time {
            // Running flat out: start the next step right away and give it a full interval.
            let next = self.dispatch_next(now)?;
            self.next_frame_time = now + self.cfg.target_interval;
            self.stats.inc_fast_path_dispatches();
            return Ok(Some(next));
        }
        Ok(None)
    }

    /// Reports the outstanding request once it has been in flight longer than the stall timeout.
    fn check_stall(&mut self, now: Duration) -> Result<(), PacingError> {
        let (Some(timeout), Some(flight)) = (self.cfg.stall_timeout, self.in_flight.as_mut()) else {
            return Ok(());
        };
        let waited = now.saturating_sub(flight.dispatched_at);
        if waited <= timeout || flight.stall_reported {
            return Ok(());
        }
        flight.stall_reported = true;
        self.stats.inc_stalls();
        warn!(frame = %flight.frame_id, ?waited, "production step stalled");
        Err(PacingError::StalledProduction {
            frame_id: flight.frame_id,
            waited,
        })
    }

    fn present_pending<P: FramePresenter>(
        &mut self,
        presenter: &mut P,
    ) -> Result<Option<FrameId>, PacingError> {
        let Some(slot) = self.pool.promote_to_show() else {
            return Ok(None);
        };
        let Some(frame_id) = self.awaiting_show.take() else {
            self.pool.release_from_show(slot)?;
            return Err(PacingError::UntrackedFrame { slot });
        };

        let result = presenter.present(PresentedFrame {
            frame_id,
            slot,
            pixels: self.pool.shown_pixels(slot)?,
        });
        self.pool.release_from_show(slot)?;

        match result {
            Ok(()) => {
                self.stats.inc_frames_presented();
                trace!(frame = %frame_id, slot = %slot, "frame presented");
            }
            Err(err) => {
                self.stats.inc_present_failures();
                warn!(frame = %frame_id, slot = %slot, "failed to present frame: {err}");
            }
        }
        Ok(Some(frame_id))
    }

    fn dispatch_next(&mut self, now: Duration) -> Result<FrameId, PacingError> {
        let buffer = self.pool.acquire_for_write()?;
        let slot: SlotId = buffer.slot();
        let frame_id = FrameId(self.next_frame_id);

        if let Err(err) = self.dispatcher.dispatch_step(frame_id, buffer) {
            warn!(frame = %frame_id, "production request rejected: {}", err.kind);
            self.pool.cancel_write(err.buffer).map_err(|r| r.error)?;
            return Err(err.kind.into());
        }

        self.next_frame_id += 1;
        self.in_flight = Some(InFlight {
            frame_id,
            dispatched_at: now,
            stall_reported: false,
        });
        self.stats.inc_frames_requested();
        trace!(frame = %frame_id, slot = %slot, "production step dispatched");
        Ok(frame_id)
    }
}

impl<D> core::fmt::Debug for Scheduler<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Scheduler")
            .field("cfg", &self.cfg)
            .field("pool", &self.pool)
            .field("next_frame_time", &self.next_frame_time)
            .field("in_flight", &self.in_flight)
            .field("shut_down", &self.shut_down)
            .finish()
    }
}
