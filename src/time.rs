use std::time::{Duration, Instant};

/// Longest step handed to the sprite clock; longer stalls (debugger, window drag) are clipped.
const MAX_STEP: Duration = Duration::from_millis(250);

pub struct FrameTimer {
    start: Instant,
    last: Instant,
    frames_in_window: u32,
    window_start: Instant,
    fps: f32,
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTimer {
    pub fn new() -> Self {
        let now = Instant::now();
        Self { start: now, last: now, frames_in_window: 0, window_start: now, fps: 0.0 }
    }

    /// Marks a new frame and returns the clipped step in seconds.
    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> f32 {
        let step = now.saturating_duration_since(self.last).min(MAX_STEP);
        self.last = now;
        self.frames_in_window += 1;
        let window = now.saturating_duration_since(self.window_start);
        if window >= Duration::from_secs(1) {
            self.fps = self.frames_in_window as f32 / window.as_secs_f32();
            self.frames_in_window = 0;
            self.window_start = now;
        }
        step.as_secs_f32()
    }

    pub fn elapsed_seconds(&self) -> f32 {
        self.last.duration_since(self.start).as_secs_f32()
    }

    /// Frames per second over the last completed one-second window.
    pub fn fps(&self) -> f32 {
        self.fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_stalls_are_clipped() {
        let mut timer = FrameTimer::new();
        let later = timer.last + Duration::from_secs(3);
        let step = timer.tick_at(later);
        assert!((step - MAX_STEP.as_secs_f32()).abs() < 1e-6);
        assert!(timer.elapsed_seconds() >= 3.0);
    }

    #[test]
    fn fps_is_measured_per_window() {
        let mut timer = FrameTimer::new();
        let base = timer.last;
        for i in 1..=10 {
            timer.tick_at(base + Duration::from_millis(100 * i));
        }
        assert!((timer.fps() - 10.0).abs() < 0.5, "fps was {}", timer.fps());
    }
}
