#![forbid(unsafe_code)]

// The frame worker needs OS threads; there is nothing to run on wasm32. Keep a stub so
// `--workspace` builds for that target still succeed.
#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::time::Duration;

    use anyhow::{bail, Context, Result};
    use clap::Parser;
    use retrace_pacing::{
        FramePool, FramePresenter, PacingConfig, PacingStatsSnapshot, PresentedFrame, Scheduler,
    };
    use retrace_time::HostClock;
    use retrace_worker::{
        read_frame_stamp, run_host_loop, spawn_worker, HostLoopConfig, HostLoopExit,
        TestPatternProducer, TokioHostClock, FRAME_STAMP_LEN,
    };
    use serde::Serialize;
    use tracing::{info, warn};
    use tracing_subscriber::EnvFilter;

    /// 320x240 at one byte per pixel.
    const DEFAULT_FRAME_LEN: usize = 320 * 240;

    #[derive(Debug, Parser)]
    #[command(
        name = "retrace",
        about = "Run a test-pattern producer through the triple-buffered frame pipeline and report pacing statistics"
    )]
    pub struct Args {
        /// Display refresh rate the host loop ticks at.
        #[arg(long, env = "RETRACE_REFRESH_HZ", default_value_t = 60)]
        refresh_hz: u32,

        /// Frame rate of the simulated device (one production step per frame).
        #[arg(long, env = "RETRACE_DEVICE_HZ", default_value_t = 50)]
        device_hz: u32,

        /// Size of each frame buffer in bytes.
        #[arg(long, env = "RETRACE_FRAME_LEN", value_name = "BYTES", default_value_t = DEFAULT_FRAME_LEN)]
        frame_len: usize,

        /// Stop after this many milliseconds. Runs until Ctrl+C when omitted.
        #[arg(long, env = "RETRACE_DURATION_MS", value_name = "MS")]
        duration_ms: Option<u64>,

        /// Simulated cost of one production step.
        #[arg(long, env = "RETRACE_STEP_COST_MS", value_name = "MS", default_value_t = 0)]
        step_cost_ms: u64,

        /// Report a production step outstanding for longer than this.
        #[arg(long, env = "RETRACE_STALL_TIMEOUT_MS", value_name = "MS")]
        stall_timeout_ms: Option<u64>,

        /// Exit with an error on the first stalled step instead of waiting for it.
        #[arg(long, requires = "stall_timeout_ms")]
        abort_on_stall: bool,

        /// Interval between fps log lines; 0 disables them.
        #[arg(long, env = "RETRACE_REPORT_MS", value_name = "MS", default_value_t = 1000)]
        report_ms: u64,

        /// Print a JSON run summary to stdout on exit.
        #[arg(long, action = clap::ArgAction::SetTrue)]
        stats_json: bool,
    }

    impl Args {
        fn pacing_config(&self) -> Result<PacingConfig> {
            let cfg = PacingConfig::for_device_hz(self.device_hz)
                .context("invalid --device-hz")?
                .with_stall_timeout(self.stall_timeout_ms.map(Duration::from_millis));
            cfg.validate().context("invalid pacing configuration")?;
            Ok(cfg)
        }

        fn host_loop_config(&self) -> Result<HostLoopConfig> {
            let Some(refresh_interval) = retrace_time::frame_interval_for_hz(self.refresh_hz)
            else {
                bail!("--refresh-hz must be non-zero");
            };
            Ok(HostLoopConfig {
                refresh_interval,
                run_for: self.duration_ms.map(Duration::from_millis),
                report_interval: (self.report_ms > 0).then(|| Duration::from_millis(self.report_ms)),
                abort_on_stall: self.abort_on_stall,
            })
        }
    }

    /// Stands in for a real display: checks that frames arrive in production order and folds
    /// their contents into a checksum.
    #[derive(Debug, Default)]
    struct ChecksumPresenter {
        frames: u64,
        last_stamp: Option<u64>,
        checksum: u64,
    }

    impl FramePresenter for ChecksumPresenter {
        type Error = anyhow::Error;

        fn present(&mut self, frame: PresentedFrame<'_>) -> Result<()> {
            let stamp = read_frame_stamp(frame.pixels)
                .with_context(|| format!("frame {} shorter than its stamp", frame.frame_id))?;
            if let Some(last) = self.last_stamp {
                if stamp <= last {
                    bail!("frame {} went backwards (stamp {stamp} after {last})", frame.frame_id);
                }
            }
            self.last_stamp = Some(stamp);
            self.frames += 1;
            self.checksum = frame
                .pixels
                .iter()
                .fold(self.checksum.rotate_left(5), |acc, b| {
                    (acc ^ u64::from(*b)).wrapping_mul(0x0100_0000_01b3)
                });
            Ok(())
        }
    }

    #[derive(Debug, Serialize)]
    struct RunSummary {
        exit: &'static str,
        elapsed_ms: u64,
        frames_shown: u64,
        last_frame_stamp: Option<u64>,
        checksum: String,
        stats: PacingStatsSnapshot,
    }

    pub async fn main() -> Result<()> {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();

        let args = Args::parse();
        let pacing = args.pacing_config()?;
        let host_cfg = args.host_loop_config()?;
        if args.frame_len < FRAME_STAMP_LEN {
            bail!("--frame-len must be at least {FRAME_STAMP_LEN} bytes");
        }
        let pool = FramePool::new(args.frame_len).context("failed to allocate frame buffers")?;

        let producer =
            TestPatternProducer::new().with_step_cost(Duration::from_millis(args.step_cost_ms));
        let mut link = spawn_worker(producer).context("failed to start frame worker")?;
        link.events
            .wait_ready()
            .await
            .context("frame worker did not start")?;

        let clock = TokioHostClock::new();
        let mut scheduler = Scheduler::new(pacing, pool, link.requests.clone(), clock.now())
            .context("failed to create frame scheduler")?;
        let mut presenter = ChecksumPresenter::default();

        info!(
            refresh_hz = args.refresh_hz,
            device_hz = args.device_hz,
            frame_len = args.frame_len,
            "retrace started"
        );

        let exit = if host_cfg.run_for.is_some() {
            run_host_loop(&mut scheduler, &mut link.events, &clock, &mut presenter, &host_cfg)
                .await?
        } else {
            tokio::select! {
                exit = run_host_loop(&mut scheduler, &mut link.events, &clock, &mut presenter, &host_cfg) => exit?,
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted");
                    scheduler.shutdown();
                    link.requests.shutdown();
                    HostLoopExit::Elapsed
                }
            }
        };
        if exit == HostLoopExit::WorkerStopped {
            warn!("frame worker exited early");
        }
        let elapsed = clock.now();
        link.thread
            .join()
            .await
            .context("frame worker did not exit cleanly")?;

        let stats = scheduler.stats().snapshot();
        info!(
            presented = stats.frames_presented,
            completed = stats.frames_completed,
            dropped = stats.frames_dropped,
            "retrace finished"
        );

        if args.stats_json {
            let summary = RunSummary {
                exit: match exit {
                    HostLoopExit::Elapsed => "elapsed",
                    HostLoopExit::WorkerStopped => "worker-stopped",
                },
                elapsed_ms: elapsed.as_millis() as u64,
                frames_shown: presenter.frames,
                last_frame_stamp: presenter.last_stamp,
                checksum: format!("{:016x}", presenter.checksum),
                stats,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("failed to encode run summary")?
            );
        }
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    native::main().await
}
