//! Simulated-time clock and time-scale bookkeeping (spec §4.1). The actual
//! wall-clock timer lives in [`crate::session::Session`]/the host's async
//! runtime; this module is the pure state the scheduler advances and the
//! snapshot reports, kept separate so it is trivially unit-testable without
//! a real timer.

use serde::{Deserialize, Serialize};

/// Permitted time-scale multipliers (spec §6, `setTimeScale`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeScale {
    X1,
    X2,
    X4,
}

impl TimeScale {
    pub fn from_multiplier(n: u32) -> Option<Self> {
        match n {
            1 => Some(TimeScale::X1),
            2 => Some(TimeScale::X2),
            4 => Some(TimeScale::X4),
            _ => None,
        }
    }

    pub fn multiplier(&self) -> u32 {
        match self {
            TimeScale::X1 => 1,
            TimeScale::X2 => 2,
            TimeScale::X4 => 4,
        }
    }

    /// Wall-clock interval between pipeline fires at this scale, ms.
    pub fn fire_interval_ms(&self) -> u64 {
        1000 / self.multiplier() as u64
    }
}

/// Simulated-time clock; advances by exactly 1 simulated second per fire
/// regardless of time scale (spec §4.1). Pausing preserves `sim_time_ms`
/// and `tick_count`; changing scale restarts the wall-clock timer without
/// touching either.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clock {
    pub sim_time_ms: u64,
    pub tick_count: u64,
    pub time_scale: TimeScale,
    pub running: bool,
    pub paused: bool,
}

impl Default for Clock {
    fn default() -> Self {
        Self { sim_time_ms: 0, tick_count: 0, time_scale: TimeScale::X1, running: false, paused: false }
    }
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.running = true;
        self.paused = false;
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.paused = false;
    }

    pub fn set_time_scale(&mut self, scale: TimeScale) {
        self.time_scale = scale;
    }

    /// Whether the pipeline should fire given `running`/`paused`.
    pub fn should_tick(&self) -> bool {
        self.running && !self.paused
    }

    /// Advance simulated time by exactly one logical tick (1 s), regardless
    /// of time scale, which governs only the wall-clock fire interval
    /// (spec §4.1).
    pub fn advance(&mut self) {
        self.sim_time_ms += 1000;
        self.tick_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_preserves_sim_time_and_tick_count() {
        let mut clock = Clock::new();
        clock.start();
        clock.advance();
        clock.advance();
        clock.pause();
        assert_eq!(clock.sim_time_ms, 2000);
        assert_eq!(clock.tick_count, 2);
        assert!(!clock.should_tick());
    }

    #[test]
    fn time_scale_change_does_not_touch_sim_time() {
        let mut clock = Clock::new();
        clock.start();
        clock.advance();
        clock.set_time_scale(TimeScale::X4);
        assert_eq!(clock.sim_time_ms, 1000);
        assert_eq!(clock.time_scale.fire_interval_ms(), 250);
    }

    #[test]
    fn resume_after_pause_allows_ticking_again() {
        let mut clock = Clock::new();
        clock.start();
        clock.pause();
        assert!(!clock.should_tick());
        clock.resume();
        assert!(clock.should_tick());
    }
}
