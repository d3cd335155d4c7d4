//! Frame timing utilities
//!
//! The render managers schedule frames on an at-most-this-often basis: a
//! frame runs only when the minimum interval since the previous frame start
//! has elapsed, otherwise the attempt is skipped outright. Missed intervals
//! are never queued up.

use std::time::{Duration, Instant};

/// High-precision timer for frame statistics
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
    /// Create a new timer
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            delta_time: 0.0,
            total_time: 0.0,
            frame_count: 0,
        }
    }

    /// Update the timer (call once per rendered frame)
    pub fn update(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_frame);
        self.delta_time = elapsed.as_secs_f32();
        self.total_time += self.delta_time;
        self.last_frame = now;
        self.frame_count += 1;
    }

    /// Time since the last frame in seconds
    #[must_use]
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Total elapsed time since timer creation in seconds
    #[must_use]
    pub fn total_time(&self) -> f32 {
        self.total_time
    }

    /// Number of frames recorded so far
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Average FPS since timer creation
    #[must_use]
    pub fn average_fps(&self) -> f32 {
        if self.total_time > 0.0 {
            self.frame_count as f32 / self.total_time
        } else {
            0.0
        }
    }
}

/// Minimum-interval frame pacer
///
/// Decides whether a frame may start at a given instant. The interval is
/// measured from the start of the previous admitted frame, so a slow frame
/// eats into the following gap rather than shifting the whole cadence.
#[derive(Debug)]
pub struct FramePacer {
    minimum_interval: Duration,
    last_admitted: Option<Instant>,
}

impl FramePacer {
    /// Create a pacer with the given minimum frame interval
    #[must_use]
    pub fn new(minimum_interval: Duration) -> Self {
        Self {
            minimum_interval,
            last_admitted: None,
        }
    }

    /// Change the minimum frame interval
    pub fn set_minimum_interval(&mut self, interval: Duration) {
        self.minimum_interval = interval;
    }

    /// The configured minimum frame interval
    #[must_use]
    pub fn minimum_interval(&self) -> Duration {
        self.minimum_interval
    }

    /// Check whether a frame may start at `now`, admitting it if so
    ///
    /// Returns `true` when the interval has elapsed (or no frame has run
    /// yet). A `false` result means the caller should skip this attempt.
    pub fn try_admit(&mut self, now: Instant) -> bool {
        match self.last_admitted {
            Some(last) if now.duration_since(last) < self.minimum_interval => false,
            _ => {
                self.last_admitted = Some(now);
                true
            }
        }
    }

    /// Time remaining until the next frame may start, measured from `now`
    #[must_use]
    pub fn time_until_next(&self, now: Instant) -> Duration {
        match self.last_admitted {
            Some(last) => {
                let since = now.duration_since(last);
                self.minimum_interval.saturating_sub(since)
            }
            None => Duration::ZERO,
        }
    }

    /// Forget the previous admission so the next attempt runs immediately
    pub fn reset(&mut self) {
        self.last_admitted = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pacer_admits_first_frame() {
        let mut pacer = FramePacer::new(Duration::from_millis(20));
        assert!(pacer.try_admit(Instant::now()));
    }

    #[test]
    fn test_pacer_skips_inside_interval() {
        let mut pacer = FramePacer::new(Duration::from_millis(20));
        let t0 = Instant::now();
        assert!(pacer.try_admit(t0));
        assert!(!pacer.try_admit(t0 + Duration::from_millis(5)));
        assert!(pacer.try_admit(t0 + Duration::from_millis(25)));
    }

    #[test]
    fn test_pacer_does_not_queue_missed_intervals() {
        let mut pacer = FramePacer::new(Duration::from_millis(10));
        let t0 = Instant::now();
        assert!(pacer.try_admit(t0));
        // A long stall admits exactly one frame, not one per missed interval.
        let late = t0 + Duration::from_millis(100);
        assert!(pacer.try_admit(late));
        assert!(!pacer.try_admit(late + Duration::from_millis(1)));
    }

    #[test]
    fn test_frame_timer_counts_updates() {
        let mut timer = FrameTimer::new();
        assert_eq!(timer.frame_count(), 0);

        timer.update();
        timer.update();
        assert_eq!(timer.frame_count(), 2);
        assert!(timer.delta_time() >= 0.0);
        assert!(timer.total_time() >= timer.delta_time());
    }

    #[test]
    fn test_pacer_reset_allows_immediate_admission() {
        let mut pacer = FramePacer::new(Duration::from_millis(20));
        let t0 = Instant::now();
        assert!(pacer.try_admit(t0));
        assert!(!pacer.try_admit(t0 + Duration::from_millis(5)));

        pacer.reset();
        assert!(pacer.try_admit(t0 + Duration::from_millis(6)));
        assert_eq!(pacer.time_until_next(t0 + Duration::from_millis(6)), Duration::from_millis(20));
    }

    #[test]
    fn test_time_until_next() {
        let mut pacer = FramePacer::new(Duration::from_millis(20));
        let t0 = Instant::now();
        assert_eq!(pacer.time_until_next(t0), Duration::ZERO);
        pacer.try_admit(t0);
        let remaining = pacer.time_until_next(t0 + Duration::from_millis(5));
        assert_eq!(remaining, Duration::from_millis(15));
    }
}
