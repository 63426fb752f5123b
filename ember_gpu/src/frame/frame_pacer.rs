/// Fixed-step frame pacing.
///
/// Frames that finish well ahead of the target interval are stretched to it
/// by sleeping in 1 µs steps. Frames that land between the check threshold
/// (`1 / (fps + 5)`) and the target are left alone, so a frame that is only
/// slightly short does not pay a full sleep granularity on top.

use std::time::{Duration, Instant};

const SLEEP_STEP: Duration = Duration::from_micros(1);
const CHECK_MARGIN_FPS: u32 = 5;

pub struct FramePacer {
    target: Duration,
    check: Duration,
    reference: Instant,
}

impl FramePacer {
    /// Pace to `fps` frames per second (`fps` must be non-zero)
    pub fn new(fps: u32) -> Self {
        let fps = fps.max(1);
        Self {
            target: Duration::from_secs_f64(1.0 / fps as f64),
            check: Duration::from_secs_f64(1.0 / (fps + CHECK_MARGIN_FPS) as f64),
            reference: Instant::now(),
        }
    }

    /// Wait out the rest of the frame if it was short, then start the next one
    ///
    /// Returns the frame duration measured before any sleep.
    pub fn pace(&mut self) -> Duration {
        let elapsed = self.reference.elapsed();
        if elapsed < self.check {
            while self.reference.elapsed() < self.target {
                std::thread::sleep(SLEEP_STEP);
            }
        }
        self.reference = Instant::now();
        elapsed
    }

    /// Restart the measurement from now
    pub fn reset(&mut self) {
        self.reference = Instant::now();
    }

    pub fn target(&self) -> Duration {
        self.target
    }

    pub fn check_threshold(&self) -> Duration {
        self.check
    }
}

#[cfg(test)]
#[path = "frame_pacer_tests.rs"]
mod tests;
