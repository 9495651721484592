//! Fixed-timestep accumulation.
//!
//! Render updates arrive at whatever cadence the platform delivers; the
//! simulation only ever advances in whole, fixed-length ticks. [`FrameClock`]
//! converts one into the other: feed it the (possibly throttle-scaled)
//! elapsed milliseconds each update and it answers how many simulation ticks
//! to run, banking the remainder for the next update.

/// Accumulates variable frame time into whole simulation ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameClock {
    step_ms: f64,
    elapsed_game_time_ms: f64,
    accumulator: f64,
}

impl FrameClock {
    /// Creates a clock with the given simulation timestep in milliseconds.
    #[must_use]
    pub fn new(step_ms: f64) -> Self {
        Self {
            step_ms,
            elapsed_game_time_ms: 0.0,
            accumulator: 0.0,
        }
    }

    /// The fixed simulation timestep in milliseconds.
    #[must_use]
    pub fn step_ms(&self) -> f64 {
        self.step_ms
    }

    /// Total simulated game time so far, in seconds.
    #[must_use]
    pub fn elapsed_game_time_seconds(&self) -> f64 {
        self.elapsed_game_time_ms / 1000.0
    }

    /// Clears accumulated and elapsed time.
    pub fn reset(&mut self) {
        self.elapsed_game_time_ms = 0.0;
        self.accumulator = 0.0;
    }

    /// Banks `frame_ms` of wall time and returns the number of whole
    /// simulation ticks now due.
    pub fn advance_and_count_ticks(&mut self, frame_ms: f64) -> u32 {
        self.accumulator += frame_ms;

        let mut ticks = 0;
        while self.accumulator >= self.step_ms {
            ticks += 1;
            self.accumulator -= self.step_ms;
            self.elapsed_game_time_ms += self.step_ms;
        }
        ticks
    }
}

// #########
// # TESTS #
// #########

#[cfg(test)]
mod frame_clock_tests {
    use super::*;

    #[test]
    fn sub_step_updates_accumulate() {
        let mut clock = FrameClock::new(16.0);
        assert_eq!(clock.advance_and_count_ticks(10.0), 0);
        assert_eq!(clock.advance_and_count_ticks(10.0), 1);
    }

    #[test]
    fn large_update_yields_multiple_ticks() {
        let mut clock = FrameClock::new(16.0);
        assert_eq!(clock.advance_and_count_ticks(50.0), 3);
        // 2 ms remainder stays banked.
        assert_eq!(clock.advance_and_count_ticks(14.0), 1);
    }

    #[test]
    fn elapsed_time_counts_only_consumed_steps() {
        let mut clock = FrameClock::new(10.0);
        clock.advance_and_count_ticks(35.0);
        assert!((clock.elapsed_game_time_seconds() - 0.03).abs() < 1e-9);
    }

    #[test]
    fn reset_clears_banked_time() {
        let mut clock = FrameClock::new(10.0);
        clock.advance_and_count_ticks(9.0);
        clock.reset();
        assert_eq!(clock.advance_and_count_ticks(9.0), 0);
        assert!((clock.elapsed_game_time_seconds()).abs() < f64::EPSILON);
    }
}
