use std::time::Instant;

/// Nominal rate of the game logic.
pub const TARGET_FPS: u32 = 60;

const FPS_SAMPLE_COUNT: usize = 60;

/// Largest delta a single tick may observe, in seconds.
pub const MAX_DELTA: f64 = 0.25;

/// Clock of the main loop.
///
/// `tick()` is called once per TIMER event. Game code reads `delta()` (seconds,
/// capped) and `ticks()` (milliseconds since start). The clock can be driven
/// by wall time or advanced manually, which is how headless runs and tests
/// feed synthetic timer events.
pub struct Timer {
    pub fixed_dt: f64,
    pub max_delta: f64,
    delta: f64,
    elapsed: f64,
    pub tick_count: u64,
    last_instant: Instant,
    paused_at: Option<Instant>,

    fps_samples: [f64; FPS_SAMPLE_COUNT],
    fps_sample_index: usize,
    pub smoothed_fps: f64,
    pub smoothed_frame_time_ms: f64,
}

impl Timer {
    pub fn new() -> Self {
        let fixed_dt = 1.0 / TARGET_FPS as f64;
        Self {
            fixed_dt,
            max_delta: MAX_DELTA,
            delta: 0.0,
            elapsed: 0.0,
            tick_count: 0,
            last_instant: Instant::now(),
            paused_at: None,
            fps_samples: [fixed_dt; FPS_SAMPLE_COUNT],
            fps_sample_index: 0,
            smoothed_fps: TARGET_FPS as f64,
            smoothed_frame_time_ms: fixed_dt * 1000.0,
        }
    }

    /// Measures wall time since the previous tick.
    pub fn tick(&mut self) {
        let now = Instant::now();
        let real_dt = now.duration_since(self.last_instant).as_secs_f64();
        self.last_instant = now;
        self.advance(real_dt);
    }

    /// Advances the clock by `dt` seconds without looking at the wall clock.
    pub fn advance(&mut self, dt: f64) {
        let mut dt = dt.max(0.0);

        // Spiral-of-death cap
        if dt > self.max_delta {
            log::warn!(
                "Tick took {:.1}ms, capping delta to {}ms",
                dt * 1000.0,
                self.max_delta * 1000.0
            );
            dt = self.max_delta;
        }

        self.delta = dt;
        self.elapsed += dt;
        self.tick_count += 1;

        self.fps_samples[self.fps_sample_index] = dt;
        self.fps_sample_index = (self.fps_sample_index + 1) % FPS_SAMPLE_COUNT;
        let avg_dt: f64 = self.fps_samples.iter().sum::<f64>() / FPS_SAMPLE_COUNT as f64;
        self.smoothed_frame_time_ms = avg_dt * 1000.0;
        self.smoothed_fps = if avg_dt > 0.0 { 1.0 / avg_dt } else { 0.0 };
    }

    /// Seconds elapsed during the last tick.
    pub fn delta(&self) -> f32 {
        self.delta as f32
    }

    /// Milliseconds since the clock was created, paused time excluded.
    pub fn ticks(&self) -> u64 {
        (self.elapsed * 1000.0) as u64
    }

    pub fn pause(&mut self) {
        if self.paused_at.is_none() {
            self.paused_at = Some(Instant::now());
        }
    }

    /// Resumes after `pause()`; the time spent paused is not reported as delta.
    pub fn resume(&mut self) {
        if let Some(paused_at) = self.paused_at.take() {
            self.last_instant += Instant::now().duration_since(paused_at);
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_accumulates_ticks_in_milliseconds() {
        let mut timer = Timer::new();
        for _ in 0..60 {
            timer.advance(1.0 / 60.0);
        }
        assert_eq!(timer.tick_count, 60);
        assert!((999..=1000).contains(&timer.ticks()));
        assert!((timer.delta() - 1.0 / 60.0).abs() < 1e-6);
    }

    #[test]
    fn advance_caps_large_deltas() {
        let mut timer = Timer::new();
        timer.advance(3.0);
        assert!((timer.delta() as f64 - MAX_DELTA).abs() < 1e-6);
    }

    #[test]
    fn negative_delta_is_clamped_to_zero() {
        let mut timer = Timer::new();
        timer.advance(-1.0);
        assert_eq!(timer.delta(), 0.0);
    }

    #[test]
    fn smoothed_fps_tracks_constant_rate() {
        let mut timer = Timer::new();
        for _ in 0..FPS_SAMPLE_COUNT {
            timer.advance(1.0 / 30.0);
        }
        assert!((timer.smoothed_fps - 30.0).abs() < 0.01);
    }

    #[test]
    fn pause_and_resume_toggle_state() {
        let mut timer = Timer::new();
        assert!(!timer.is_paused());
        timer.pause();
        assert!(timer.is_paused());
        timer.resume();
        assert!(!timer.is_paused());
    }
}
