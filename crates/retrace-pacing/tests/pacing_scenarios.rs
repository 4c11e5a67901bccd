#![cfg(not(target_arch = "wasm32"))]

use std::collections::VecDeque;
use std::time::Duration;

use proptest::prelude::*;
use retrace_pacing::{
    BufferRole, DispatchError, DispatchErrorKind, FrameBuffer, FrameId, FramePool, FramePresenter,
    PacingConfig, PacingError, PresentedFrame, Scheduler, SlotId, StepDispatcher, TickOutcome,
};

const FRAME_LEN: usize = 16;
const INTERVAL: Duration = Duration::from_millis(20);

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

fn slot(i: usize) -> SlotId {
    SlotId::new(i).unwrap()
}

/// Holds dispatched buffers until the test "runs" them.
#[derive(Default)]
struct FakeProducer {
    pending: VecDeque<(FrameId, FrameBuffer)>,
    dispatched: Vec<(FrameId, SlotId)>,
    reject_with: Option<DispatchErrorKind>,
}

impl StepDispatcher for FakeProducer {
    fn dispatch_step(
        &mut self,
        frame_id: FrameId,
        buffer: FrameBuffer,
    ) -> Result<(), DispatchError> {
        if let Some(kind) = self.reject_with {
            return Err(DispatchError { kind, buffer });
        }
        assert!(
            self.pending.is_empty(),
            "second request dispatched while one is in flight"
        );
        self.dispatched.push((frame_id, buffer.slot()));
        self.pending.push_back((frame_id, buffer));
        Ok(())
    }
}

impl FakeProducer {
    /// Fills the outstanding buffer with its frame number.
    fn run_step(&mut self) -> (FrameId, FrameBuffer) {
        let (id, mut buf) = self.pending.pop_front().expect("no step in flight");
        buf.pixels_mut().fill(id.0 as u8);
        (id, buf)
    }
}

#[derive(Default)]
struct RecordingPresenter {
    shown: Vec<(FrameId, SlotId, u8)>,
    fail: bool,
}

impl FramePresenter for RecordingPresenter {
    type Error = &'static str;

    fn present(&mut self, frame: PresentedFrame<'_>) -> Result<(), Self::Error> {
        if self.fail {
            return Err("surface lost");
        }
        self.shown.push((frame.frame_id, frame.slot, frame.pixels[0]));
        Ok(())
    }
}

fn scheduler_at(start: Duration) -> Scheduler<FakeProducer> {
    Scheduler::new(
        PacingConfig::default(),
        FramePool::new(FRAME_LEN).unwrap(),
        FakeProducer::default(),
        start,
    )
    .unwrap()
}

fn complete(sched: &mut Scheduler<FakeProducer>, now: Duration) -> Option<FrameId> {
    let (id, buf) = sched.dispatcher_mut().run_step();
    sched.on_step_completed(now, id, buf).unwrap()
}

#[test]
fn end_to_end_first_two_frames() {
    let mut sched = scheduler_at(ms(0));
    let mut screen = RecordingPresenter::default();

    let out = sched.tick(ms(0), &mut screen).unwrap();
    assert_eq!(
        out,
        TickOutcome {
            presented: None,
            dispatched: Some(FrameId(1)),
        }
    );
    assert_eq!(sched.pool().role(slot(0)), BufferRole::Locked);
    assert_eq!(sched.next_frame_time(), ms(20));

    assert_eq!(complete(&mut sched, ms(5)), None);
    assert!(!sched.is_in_flight());
    assert_eq!(sched.pool().role(slot(0)), BufferRole::AwaitingShow);

    // A vsync between completion and the deadline shows the frame but requests nothing.
    let out = sched.tick(ms(16), &mut screen).unwrap();
    assert_eq!(out.presented, Some(FrameId(1)));
    assert_eq!(out.dispatched, None);

    let out = sched.tick(ms(20), &mut screen).unwrap();
    assert_eq!(out.presented, None);
    assert_eq!(out.dispatched, Some(FrameId(2)));

    assert_eq!(screen.shown, vec![(FrameId(1), slot(0), 1)]);
    assert_eq!(
        sched.dispatcher().dispatched,
        vec![(FrameId(1), slot(0)), (FrameId(2), slot(1))]
    );
    assert_eq!(sched.pool().role(slot(0)), BufferRole::Free);
    assert_eq!(sched.pool().role(slot(1)), BufferRole::Locked);
    assert_eq!(sched.next_frame_time(), ms(40));
}

#[test]
fn deadline_tick_presents_then_requests_in_the_same_refresh() {
    let mut sched = scheduler_at(ms(0));
    let mut screen = RecordingPresenter::default();

    sched.tick(ms(0), &mut screen).unwrap();
    complete(&mut sched, ms(5));

    let out = sched.tick(ms(20), &mut screen).unwrap();
    assert_eq!(out.presented, Some(FrameId(1)));
    assert_eq!(out.dispatched, Some(FrameId(2)));
    assert_eq!(screen.shown.len(), 1);
    assert_eq!(sched.dispatcher().dispatched.len(), 2);
    assert_eq!(sched.dispatcher().dispatched[1].1, slot(1));
    assert_eq!(sched.pool().role(slot(0)), BufferRole::Free);
}

#[test]
fn burst_of_completions_shows_only_the_latest() {
    let mut sched = scheduler_at(ms(0));
    let mut screen = RecordingPresenter::default();

    sched.tick(ms(0), &mut screen).unwrap();

    // Frame 1 finishes late, so frame 2 is dispatched straight from the completion.
    assert_eq!(complete(&mut sched, ms(25)), Some(FrameId(2)));
    let first_slot = sched.dispatcher().dispatched[0].1;
    assert_eq!(sched.pool().role(first_slot), BufferRole::AwaitingShow);

    // Frame 2 finishes before any refresh.
    assert_eq!(complete(&mut sched, ms(30)), None);
    assert_eq!(sched.pool().role(first_slot), BufferRole::Free);

    sched.tick(ms(33), &mut screen).unwrap();
    let second_slot = sched.dispatcher().dispatched[1].1;
    assert_eq!(screen.shown, vec![(FrameId(2), second_slot, 2)]);

    let stats = sched.stats().snapshot();
    assert_eq!(stats.frames_completed, 2);
    assert_eq!(stats.frames_dropped, 1);
    assert_eq!(stats.frames_presented, 1);
    assert_eq!(stats.fast_path_dispatches, 1);
}

#[test]
fn no_second_request_while_in_flight() {
    let mut sched = scheduler_at(ms(0));
    let mut screen = RecordingPresenter::default();

    sched.tick(ms(0), &mut screen).unwrap();
    for t in [20, 40, 60, 80] {
        let out = sched.tick(ms(t), &mut screen).unwrap();
        assert_eq!(out.dispatched, None);
    }
    assert_eq!(sched.dispatcher().dispatched.len(), 1);
    assert_eq!(sched.outstanding(), Some(FrameId(1)));
}

#[test]
fn stall_rebases_the_deadline() {
    let mut sched = scheduler_at(ms(0));
    let mut screen = RecordingPresenter::default();

    sched.tick(ms(0), &mut screen).unwrap();
    complete(&mut sched, ms(5));

    // The host stopped ticking (e.g. a backgrounded tab) for half a second.
    let out = sched.tick(ms(500), &mut screen).unwrap();
    assert_eq!(out.dispatched, Some(FrameId(2)));
    assert_eq!(sched.next_frame_time(), ms(520));
    assert_eq!(sched.stats().snapshot().catch_up_rebases, 1);

    // No burst of missed frames afterwards.
    complete(&mut sched, ms(505));
    let out = sched.tick(ms(510), &mut screen).unwrap();
    assert_eq!(out.dispatched, None);
}

#[test]
fn slightly_late_tick_keeps_fixed_increments() {
    let mut sched = scheduler_at(ms(0));
    let mut screen = RecordingPresenter::default();

    sched.tick(ms(0), &mut screen).unwrap();
    complete(&mut sched, ms(5));

    // Late, but by less than one interval.
    sched.tick(ms(33), &mut screen).unwrap();
    assert_eq!(sched.next_frame_time(), ms(40));
    assert_eq!(sched.stats().snapshot().catch_up_rebases, 0);
}

#[test]
fn fast_path_gives_the_next_step_a_full_interval() {
    let mut sched = scheduler_at(ms(0));
    let mut screen = RecordingPresenter::default();

    sched.tick(ms(0), &mut screen).unwrap();
    assert_eq!(complete(&mut sched, ms(22)), Some(FrameId(2)));
    assert_eq!(sched.next_frame_time(), ms(42));
}

#[test]
fn stall_timeout_is_reported_once() {
    let cfg = PacingConfig::default().with_stall_timeout(Some(ms(100)));
    let mut sched = Scheduler::new(
        cfg,
        FramePool::new(FRAME_LEN).unwrap(),
        FakeProducer::default(),
        ms(0),
    )
    .unwrap();
    let mut screen = RecordingPresenter::default();

    sched.tick(ms(0), &mut screen).unwrap();
    sched.tick(ms(100), &mut screen).unwrap();

    let err = sched.tick(ms(120), &mut screen).unwrap_err();
    assert_eq!(
        err,
        PacingError::StalledProduction {
            frame_id: FrameId(1),
            waited: ms(120),
        }
    );
    assert!(sched.tick(ms(140), &mut screen).is_ok());
    assert_eq!(sched.stats().snapshot().stalls, 1);

    // A late completion is still accepted.
    complete(&mut sched, ms(150));
    let out = sched.tick(ms(160), &mut screen).unwrap();
    assert_eq!(out.presented, Some(FrameId(1)));
}

#[test]
fn stall_report_leaves_the_queued_frame_for_the_next_tick() {
    let cfg = PacingConfig::default().with_stall_timeout(Some(ms(30)));
    let mut sched = Scheduler::new(
        cfg,
        FramePool::new(FRAME_LEN).unwrap(),
        FakeProducer::default(),
        ms(0),
    )
    .unwrap();
    let mut screen = RecordingPresenter::default();

    sched.tick(ms(0), &mut screen).unwrap();
    // Frame 1 lands late, so frame 2 goes out on the fast path and then hangs.
    assert_eq!(complete(&mut sched, ms(25)), Some(FrameId(2)));
    assert_eq!(sched.pool().role(slot(0)), BufferRole::AwaitingShow);

    let err = sched.tick(ms(60), &mut screen).unwrap_err();
    assert_eq!(
        err,
        PacingError::StalledProduction {
            frame_id: FrameId(2),
            waited: ms(35),
        }
    );
    assert!(screen.shown.is_empty());
    assert_eq!(sched.pool().role(slot(0)), BufferRole::AwaitingShow);
    assert_eq!(sched.stats().snapshot().frames_presented, 0);

    let out = sched.tick(ms(61), &mut screen).unwrap();
    assert_eq!(
        out,
        TickOutcome {
            presented: Some(FrameId(1)),
            dispatched: None,
        }
    );
    assert_eq!(screen.shown, vec![(FrameId(1), slot(0), 1)]);
}

#[test]
fn without_stall_timeout_an_outstanding_step_just_waits() {
    let mut sched = scheduler_at(ms(0));
    let mut screen = RecordingPresenter::default();

    sched.tick(ms(0), &mut screen).unwrap();
    for t in (20..10_000).step_by(20) {
        assert_eq!(
            sched.tick(ms(t), &mut screen).unwrap(),
            TickOutcome::default()
        );
    }
}

#[test]
fn mismatched_completion_is_rejected() {
    let mut sched = scheduler_at(ms(0));
    let mut screen = RecordingPresenter::default();
    sched.tick(ms(0), &mut screen).unwrap();

    let (_, buf) = sched.dispatcher_mut().run_step();
    let err = sched.on_step_completed(ms(5), FrameId(7), buf).unwrap_err();
    assert_eq!(
        err,
        PacingError::UnexpectedCompletion {
            frame_id: FrameId(7),
            outstanding: Some(FrameId(1)),
        }
    );
}

#[test]
fn rejected_dispatch_returns_buffer_to_pool() {
    let mut sched = scheduler_at(ms(0));
    let mut screen = RecordingPresenter::default();
    sched.dispatcher_mut().reject_with = Some(DispatchErrorKind::Closed);

    let err = sched.tick(ms(0), &mut screen).unwrap_err();
    assert_eq!(err, PacingError::Dispatch(DispatchErrorKind::Closed));
    assert!(!sched.is_in_flight());
    assert_eq!(sched.pool().roles(), [BufferRole::Free; 3]);
    assert_eq!(sched.next_frame_time(), ms(0));
}

#[test]
fn present_failure_still_frees_the_buffer() {
    let mut sched = scheduler_at(ms(0));
    let mut screen = RecordingPresenter {
        fail: true,
        ..RecordingPresenter::default()
    };

    sched.tick(ms(0), &mut screen).unwrap();
    complete(&mut sched, ms(5));
    let out = sched.tick(ms(10), &mut screen).unwrap();

    assert_eq!(out.presented, Some(FrameId(1)));
    assert_eq!(sched.pool().roles(), [BufferRole::Free; 3]);
    let stats = sched.stats().snapshot();
    assert_eq!(stats.present_failures, 1);
    assert_eq!(stats.frames_presented, 0);
}

#[test]
fn shutdown_abandons_outstanding_step() {
    let mut sched = scheduler_at(ms(0));
    let mut screen = RecordingPresenter::default();

    sched.tick(ms(0), &mut screen).unwrap();
    sched.shutdown();
    assert!(sched.is_shut_down());

    assert_eq!(complete(&mut sched, ms(30)), None);
    let out = sched.tick(ms(40), &mut screen).unwrap();
    assert_eq!(out, TickOutcome::default());
    assert!(screen.shown.is_empty());
    assert_eq!(sched.pool().roles(), [BufferRole::Free; 3]);
}

proptest! {
    #[test]
    fn on_time_ticks_accumulate_exact_deadlines(
        t0_ms in 0u64..10_000,
        k in 1u64..200,
        completion_ms in 0u64..20,
    ) {
        let t0 = ms(t0_ms);
        let mut sched = scheduler_at(t0);
        let mut screen = RecordingPresenter::default();

        for i in 0..k {
            let deadline = t0 + INTERVAL * i as u32;
            let out = sched.tick(deadline, &mut screen).unwrap();
            prop_assert_eq!(out.dispatched, Some(FrameId(i + 1)));
            // Completion lands before the next deadline, so there is no fast path.
            let (id, buf) = sched.dispatcher_mut().run_step();
            prop_assert_eq!(
                sched.on_step_completed(deadline + ms(completion_ms), id, buf).unwrap(),
                None
            );
        }

        prop_assert_eq!(sched.next_frame_time(), t0 + INTERVAL * k as u32);
        prop_assert_eq!(sched.stats().snapshot().catch_up_rebases, 0);
    }

    #[test]
    fn late_tick_rebases_to_now_plus_interval(
        k in 1u64..20,
        extra_ms in 1u64..5_000,
    ) {
        let mut sched = scheduler_at(ms(0));
        let mut screen = RecordingPresenter::default();
        for i in 0..k {
            sched.tick(INTERVAL * i as u32, &mut screen).unwrap();
            let (id, buf) = sched.dispatcher_mut().run_step();
            sched.on_step_completed(INTERVAL * i as u32, id, buf).unwrap();
        }

        let deadline = sched.next_frame_time();
        let late = deadline + INTERVAL + ms(extra_ms);
        sched.tick(late, &mut screen).unwrap();
        prop_assert_eq!(sched.next_frame_time(), late + INTERVAL);
    }

    #[test]
    fn writer_and_presenter_never_share_a_slot(
        events in proptest::collection::vec((0u8..3, 1u64..30), 1..150)
    ) {
        let mut sched = scheduler_at(ms(0));
        let mut screen = RecordingPresenter::default();
        let mut now = ms(0);

        for (kind, step) in events {
            now += ms(step);
            match kind {
                0 | 1 => {
                    sched.tick(now, &mut screen).unwrap();
                }
                _ => {
                    if sched.is_in_flight() {
                        complete(&mut sched, now);
                    }
                }
            }

            let roles = sched.pool().roles();
            for role in [BufferRole::Locked, BufferRole::AwaitingShow, BufferRole::BeingShown] {
                prop_assert!(roles.iter().filter(|r| **r == role).count() <= 1);
            }
            // Presentation is synchronous, so nothing stays on screen between calls.
            prop_assert!(!roles.contains(&BufferRole::BeingShown));
            if let Some((_, buf)) = sched.dispatcher().pending.front() {
                prop_assert_eq!(roles[buf.slot().index()], BufferRole::Locked);
            }
        }

        // Every presented frame is newer than the one before it.
        for pair in screen.shown.windows(2) {
            prop_assert!(pair[0].0 < pair[1].0);
        }
        // Frames carry their own number, so nothing was presented while half-written.
        for (id, _, first_byte) in &screen.shown {
            prop_assert_eq!(*first_byte, id.0 as u8);
        }
    }
}
