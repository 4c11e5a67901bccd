use std::time::Duration;

use retrace_pacing::{FpsMeter, FramePresenter, PacingError, Scheduler};
use retrace_time::HostClock;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::{Event, HostError, StepSender, WorkerEvents};

#[derive(Debug, Clone)]
pub struct HostLoopConfig {
    /// Display refresh period; the scheduler is ticked once per period.
    pub refresh_interval: Duration,
    /// Stop after this long. `None` runs until the worker stops.
    pub run_for: Option<Duration>,
    /// Log an fps line this often.
    pub report_interval: Option<Duration>,
    /// Treat a stalled production step as fatal instead of waiting for it.
    pub abort_on_stall: bool,
}

impl Default for HostLoopConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_micros(16_667),
            run_for: None,
            report_interval: Some(Duration::from_secs(1)),
            abort_on_stall: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostLoopExit {
    /// `run_for` elapsed. The worker has been told to stop and its last step reclaimed.
    Elapsed,
    /// The worker stopped on its own.
    WorkerStopped,
}

/// Drives `scheduler` from a refresh ticker and feeds worker completions back as they arrive.
///
/// Completions are merged as soon as they are received rather than on the next refresh, so the
/// fast path can dispatch the following step without waiting a display period.
pub async fn run_host_loop<C, P>(
    scheduler: &mut Scheduler<StepSender>,
    events: &mut WorkerEvents,
    clock: &C,
    presenter: &mut P,
    cfg: &HostLoopConfig,
) -> Result<HostLoopExit, HostError>
where
    C: HostClock,
    P: FramePresenter,
{
    let mut ticker = tokio::time::interval(cfg.refresh_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let stop_at = cfg.run_for.map(|d| clock.now() + d);
    let mut meter = cfg.report_interval.map(FpsMeter::new);

    info!(
        refresh = ?cfg.refresh_interval,
        target = ?scheduler.config().target_interval,
        "host loop started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = clock.now();
                if stop_at.is_some_and(|at| now >= at) {
                    finish(scheduler, events, clock).await?;
                    return Ok(HostLoopExit::Elapsed);
                }

                match scheduler.tick(now, presenter) {
                    Ok(_) => {}
                    Err(err @ PacingError::StalledProduction { .. }) if cfg.abort_on_stall => {
                        return Err(err.into());
                    }
                    Err(PacingError::StalledProduction { .. }) => {}
                    Err(err) => return Err(err.into()),
                }

                if let Some(meter) = meter.as_mut() {
                    if let Some(report) = meter.sample(now, scheduler.stats().snapshot()) {
                        info!(run_fps = report.run_fps, render_fps = report.render_fps, "{report}");
                    }
                }
            }
            event = events.recv() => match event {
                Some(Event::FrameCompleted { frame_id, buffer }) => {
                    scheduler.on_step_completed(clock.now(), frame_id, buffer)?;
                }
                Some(Event::Panicked { message }) => {
                    scheduler.shutdown();
                    return Err(HostError::WorkerPanicked(message));
                }
                Some(Event::Ready) => debug!("late worker ready event"),
                Some(Event::Stopped) | None => {
                    warn!("frame worker stopped; leaving host loop");
                    scheduler.shutdown();
                    return Ok(HostLoopExit::WorkerStopped);
                }
            },
        }
    }
}

/// Stops pacing, asks the worker to exit and reclaims any buffer it still holds.
async fn finish<C: HostClock>(
    scheduler: &mut Scheduler<StepSender>,
    events: &mut WorkerEvents,
    clock: &C,
) -> Result<(), HostError> {
    scheduler.shutdown();
    scheduler.dispatcher().shutdown();

    while let Some(event) = events.recv().await {
        match event {
            Event::FrameCompleted { frame_id, buffer } => {
                scheduler.on_step_completed(clock.now(), frame_id, buffer)?;
            }
            Event::Panicked { message } => return Err(HostError::WorkerPanicked(message)),
            Event::Ready => {}
            Event::Stopped => break,
        }
    }
    debug!(pool = ?scheduler.pool(), "host loop drained");
    Ok(())
}
