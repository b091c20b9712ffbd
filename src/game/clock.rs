use chess::Color;
use std::time::Instant;

/// Which state the clock pair is in. `Expired` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockPhase {
    Running(Color),
    Paused(Color),
    Expired(Color),
}

/// Per-player countdown timers with increment-on-move semantics.
///
/// Elapsed time is always computed from wall-clock deltas against
/// `last_tick`, never as a fixed decrement, so scheduling jitter cannot
/// desync the clock from real time. Remaining time is clamped at zero;
/// crossing zero flags the active color and stops the clock for good.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockState {
    white_ms: u64,
    black_ms: u64,
    pub increment_ms: u64,
    last_tick: Instant,
    phase: ClockPhase,
}

impl ClockState {
    pub fn new(start_ms: u64, increment_ms: u64, active: Color, now: Instant) -> Self {
        ClockState {
            white_ms: start_ms,
            black_ms: start_ms,
            increment_ms,
            last_tick: now,
            phase: ClockPhase::Running(active),
        }
    }

    pub fn phase(&self) -> ClockPhase {
        self.phase
    }

    pub fn remaining(&self, color: Color) -> u64 {
        match color {
            Color::White => self.white_ms,
            Color::Black => self.black_ms,
        }
    }

    fn remaining_mut(&mut self, color: Color) -> &mut u64 {
        match color {
            Color::White => &mut self.white_ms,
            Color::Black => &mut self.black_ms,
        }
    }

    /// Charge wall time elapsed since the last tick to the active
    /// color. Returns the winner if that color's flag fell.
    pub fn tick(&mut self, now: Instant) -> Option<Color> {
        let active = match self.phase {
            ClockPhase::Running(color) => color,
            _ => return None,
        };
        let elapsed = now.duration_since(self.last_tick).as_millis() as u64;
        self.last_tick = now;
        let remaining = self.remaining_mut(active);
        if *remaining <= elapsed {
            *remaining = 0;
            self.phase = ClockPhase::Expired(active);
            Some(!active)
        } else {
            *remaining -= elapsed;
            None
        }
    }

    /// Settle the clock for a committed move: charge the mover's
    /// thinking time, add the increment to the mover (never to the
    /// color about to move), then start the opponent's clock from a
    /// fresh baseline. Returns the winner if the mover's flag fell
    /// while thinking.
    pub fn commit_move(&mut self, mover: Color, now: Instant) -> Option<Color> {
        match self.phase {
            ClockPhase::Expired(loser) => return Some(!loser),
            ClockPhase::Running(_) => {
                if let Some(winner) = self.tick(now) {
                    return Some(winner);
                }
            }
            // Moving while paused charges nothing.
            ClockPhase::Paused(_) => {}
        }
        *self.remaining_mut(mover) += self.increment_ms;
        self.phase = ClockPhase::Running(!mover);
        self.last_tick = now;
        None
    }

    /// Charge time up to `now`, then stop ticking. Returns the winner
    /// if the charge crossed zero.
    pub fn pause(&mut self, now: Instant) -> Option<Color> {
        if let ClockPhase::Running(active) = self.phase {
            if let Some(winner) = self.tick(now) {
                return Some(winner);
            }
            self.phase = ClockPhase::Paused(active);
        }
        None
    }

    /// Resume with a fresh baseline: no elapsed time carries over from
    /// across the pause.
    pub fn resume(&mut self, now: Instant) {
        if let ClockPhase::Paused(active) = self.phase {
            self.phase = ClockPhase::Running(active);
            self.last_tick = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn tick_charges_wall_time_to_the_active_color() {
        let t0 = Instant::now();
        let mut clock = ClockState::new(60_000, 0, Color::White, t0);
        assert_eq!(clock.tick(t0 + secs(3)), None);
        assert_eq!(clock.remaining(Color::White), 57_000);
        assert_eq!(clock.remaining(Color::Black), 60_000);
    }

    #[test]
    fn increment_goes_to_the_mover_not_the_opponent() {
        let t0 = Instant::now();
        let mut clock = ClockState::new(60_000, 5_000, Color::White, t0);
        let t1 = t0 + secs(2);
        assert_eq!(clock.commit_move(Color::White, t1), None);
        // 60s - 2s thinking + 5s increment.
        assert_eq!(clock.remaining(Color::White), 63_000);
        assert_eq!(clock.remaining(Color::Black), 60_000);
        assert_eq!(clock.phase(), ClockPhase::Running(Color::Black));
    }

    #[test]
    fn expiry_is_terminal_and_stops_further_decrement() {
        let t0 = Instant::now();
        let mut clock = ClockState::new(1_000, 0, Color::White, t0);
        // 1s remaining, 2s of real time elapse before the next tick.
        assert_eq!(clock.tick(t0 + secs(2)), Some(Color::Black));
        assert_eq!(clock.remaining(Color::White), 0);
        assert_eq!(clock.phase(), ClockPhase::Expired(Color::White));
        // Subsequent ticks are no-ops.
        assert_eq!(clock.tick(t0 + secs(10)), None);
        assert_eq!(clock.remaining(Color::White), 0);
        assert_eq!(clock.remaining(Color::Black), 1_000);
    }

    #[test]
    fn flag_falls_while_thinking_on_commit() {
        let t0 = Instant::now();
        let mut clock = ClockState::new(1_000, 5_000, Color::White, t0);
        assert_eq!(clock.commit_move(Color::White, t0 + secs(2)), Some(Color::Black));
        // No increment is granted after the flag fell.
        assert_eq!(clock.remaining(Color::White), 0);
    }

    #[test]
    fn pause_grants_no_free_time_across_resume() {
        let t0 = Instant::now();
        let mut clock = ClockState::new(60_000, 0, Color::White, t0);
        assert_eq!(clock.pause(t0 + secs(1)), None);
        assert_eq!(clock.remaining(Color::White), 59_000);
        assert_eq!(clock.phase(), ClockPhase::Paused(Color::White));

        // Ticks while paused change nothing.
        assert_eq!(clock.tick(t0 + secs(30)), None);
        assert_eq!(clock.remaining(Color::White), 59_000);

        // Resume re-baselines; only time after the resume is charged.
        clock.resume(t0 + secs(40));
        assert_eq!(clock.tick(t0 + secs(41)), None);
        assert_eq!(clock.remaining(Color::White), 58_000);
    }

    #[test]
    fn turn_switch_resets_the_tick_baseline() {
        let t0 = Instant::now();
        let mut clock = ClockState::new(60_000, 0, Color::White, t0);
        let t1 = t0 + secs(4);
        clock.commit_move(Color::White, t1);
        // Black's first tick only charges time elapsed since the switch.
        assert_eq!(clock.tick(t1 + secs(1)), None);
        assert_eq!(clock.remaining(Color::Black), 59_000);
        assert_eq!(clock.remaining(Color::White), 56_000);
    }
}
