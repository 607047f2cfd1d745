//! Frame time measurement

use std::time::Instant;

/// Measures wall-clock time between frames
///
/// The delta is sampled once per frame and shared by everything that runs
/// during that frame.
pub struct FrameTimer {
    last_frame: Instant,
    delta_time: f32,
    total_time: f32,
    frame_count: u64,
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTimer {
    /// Create a new timer starting now
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            delta_time: 0.0,
            total_time: 0.0,
            frame_count: 0,
        }
    }

    /// Sample the clock (call once per frame) and return the delta in seconds
    pub fn update(&mut self) -> f32 {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.advance(elapsed)
    }

    /// Advance by an externally supplied delta instead of sampling the clock
    ///
    /// Negative deltas are treated as zero.
    pub fn advance(&mut self, delta_time: f32) -> f32 {
        self.delta_time = delta_time.max(0.0);
        self.total_time += self.delta_time;
        self.frame_count += 1;
        self.delta_time
    }

    /// Time since the previous frame in seconds
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Total elapsed time in seconds
    pub fn total_time(&self) -> f32 {
        self.total_time
    }

    /// Number of frames measured so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Average frames per second since creation
    pub fn average_fps(&self) -> f32 {
        if self.total_time > 0.0 {
            self.frame_count as f32 / self.total_time
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_advance_accumulates() {
        let mut timer = FrameTimer::new();
        timer.advance(0.5);
        timer.advance(0.25);
        assert_eq!(timer.frame_count(), 2);
        assert_relative_eq!(timer.delta_time(), 0.25);
        assert_relative_eq!(timer.total_time(), 0.75);
    }

    #[test]
    fn test_negative_delta_clamped() {
        let mut timer = FrameTimer::new();
        assert_eq!(timer.advance(-1.0), 0.0);
        assert_eq!(timer.total_time(), 0.0);
    }
}
