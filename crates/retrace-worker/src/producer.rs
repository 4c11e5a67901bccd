use std::time::Duration;

/// One simulation step's worth of video output.
///
/// Implementations run on the worker thread and only ever see the buffer they were handed.
pub trait FrameProducer: Send + 'static {
    /// Renders exactly one frame into `pixels`. The whole buffer is considered overwritten.
    fn run_frame(&mut self, pixels: &mut [u8]);

    fn reset(&mut self) {}
}

impl<P: FrameProducer + ?Sized> FrameProducer for Box<P> {
    fn run_frame(&mut self, pixels: &mut [u8]) {
        (**self).run_frame(pixels)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// Bytes at the start of every [`TestPatternProducer`] frame holding the frame counter.
pub const FRAME_STAMP_LEN: usize = 8;

const BAR_WIDTH: u64 = 8;

/// Deterministic stand-in for an emulated machine: scrolling bars, with the frame counter stamped
/// little-endian into the first [`FRAME_STAMP_LEN`] bytes.
#[derive(Debug, Clone, Default)]
pub struct TestPatternProducer {
    frames: u64,
    step_cost: Duration,
}

impl TestPatternProducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps for `cost` per frame to mimic emulation work.
    pub fn with_step_cost(mut self, cost: Duration) -> Self {
        self.step_cost = cost;
        self
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl FrameProducer for TestPatternProducer {
    fn run_frame(&mut self, pixels: &mut [u8]) {
        if !self.step_cost.is_zero() {
            std::thread::sleep(self.step_cost);
        }
        self.frames += 1;

        let (stamp, body) = pixels.split_at_mut(FRAME_STAMP_LEN.min(pixels.len()));
        stamp.copy_from_slice(&self.frames.to_le_bytes()[..stamp.len()]);
        for (i, px) in body.iter_mut().enumerate() {
            let column = i as u64 + self.frames;
            *px = if (column / BAR_WIDTH) % 2 == 0 { 0xFF } else { 0x00 };
        }
    }

    fn reset(&mut self) {
        self.frames = 0;
    }
}

/// Frame counter written by [`TestPatternProducer`].
pub fn read_frame_stamp(pixels: &[u8]) -> Option<u64> {
    let stamp: [u8; FRAME_STAMP_LEN] = pixels.get(..FRAME_STAMP_LEN)?.try_into().ok()?;
    Some(u64::from_le_bytes(stamp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamps_frame_counter() {
        let mut producer = TestPatternProducer::new();
        let mut pixels = vec![0u8; 64];
        producer.run_frame(&mut pixels);
        producer.run_frame(&mut pixels);
        assert_eq!(read_frame_stamp(&pixels), Some(2));
        assert_eq!(producer.frames(), 2);
    }

    #[test]
    fn bars_scroll_by_one_column_per_frame() {
        let mut producer = TestPatternProducer::new();
        let mut a = vec![0u8; 64];
        let mut b = vec![0u8; 64];
        producer.run_frame(&mut a);
        producer.run_frame(&mut b);
        let body_a = &a[FRAME_STAMP_LEN..];
        let body_b = &b[FRAME_STAMP_LEN..];
        assert_eq!(&body_a[1..], &body_b[..body_b.len() - 1]);
    }

    #[test]
    fn reset_restarts_the_counter() {
        let mut producer = TestPatternProducer::new();
        let mut pixels = vec![0u8; 16];
        producer.run_frame(&mut pixels);
        producer.reset();
        producer.run_frame(&mut pixels);
        assert_eq!(read_frame_stamp(&pixels), Some(1));
    }

    #[test]
    fn tiny_buffers_are_tolerated() {
        let mut producer = TestPatternProducer::new();
        let mut pixels = vec![0u8; 3];
        producer.run_frame(&mut pixels);
        assert_eq!(pixels, vec![1, 0, 0]);
        assert_eq!(read_frame_stamp(&pixels), None);
    }
}
