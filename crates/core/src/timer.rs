//! Frame timing for the main loop.

use std::time::{Duration, Instant};

/// Measures per-frame delta time and reports a frame rate over fixed windows.
///
/// The main loop calls [`FrameTimer::tick`] once per frame. Every time the
/// reporting interval elapses, `tick` returns a [`FrameReport`] so callers
/// can log throughput without tracking their own counters.
#[derive(Debug)]
pub struct FrameTimer {
    start: Instant,
    last_tick: Instant,
    window_start: Instant,
    window_frames: u32,
    report_interval: Duration,
}

/// Summary of one reporting window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameReport {
    /// Frames counted in the window.
    pub frames: u32,
    /// Average frames per second over the window.
    pub fps: f32,
}

impl FrameTimer {
    /// Create a timer that reports once per second.
    pub fn new() -> Self {
        Self::with_interval(Duration::from_secs(1))
    }

    /// Create a timer with a custom reporting interval.
    pub fn with_interval(report_interval: Duration) -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
            window_start: now,
            window_frames: 0,
            report_interval,
        }
    }

    /// Total time since the timer was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Total time since the timer was created, in seconds.
    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed().as_secs_f32()
    }

    /// Marks the end of a frame.
    ///
    /// Returns the delta since the previous tick, and a report when the
    /// current window has closed.
    pub fn tick(&mut self) -> (Duration, Option<FrameReport>) {
        let now = Instant::now();
        let delta = now - self.last_tick;
        self.last_tick = now;
        self.window_frames += 1;

        let window = now - self.window_start;
        if window < self.report_interval {
            return (delta, None);
        }

        let report = FrameReport {
            frames: self.window_frames,
            fps: self.window_frames as f32 / window.as_secs_f32(),
        };
        self.window_start = now;
        self.window_frames = 0;
        (delta, Some(report))
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_report_before_interval() {
        let mut timer = FrameTimer::with_interval(Duration::from_secs(3600));
        let (_, report) = timer.tick();
        assert!(report.is_none());
    }

    #[test]
    fn test_report_after_interval() {
        let mut timer = FrameTimer::with_interval(Duration::ZERO);
        let (_, report) = timer.tick();
        let report = report.expect("zero interval reports every tick");
        assert_eq!(report.frames, 1);
    }

    #[test]
    fn test_window_counter_resets() {
        let mut timer = FrameTimer::with_interval(Duration::ZERO);
        timer.tick();
        let (_, report) = timer.tick();
        assert_eq!(report.map(|r| r.frames), Some(1));
    }
}
