//! Game Clock
//!
//! Tracks simulated time as in-game minutes plus a day counter, alongside the
//! real-world instant the session began. Game time and wall-clock time are
//! intentionally decoupled: the simulation advances in discrete minute
//! increments driven by the tick loop, not by the system clock.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Minutes in a full in-game day.
pub const MINUTES_PER_DAY: u32 = 1440;

/// A real-world instant, serialized as milliseconds since the Unix epoch.
///
/// `std::time::Instant` has no fixed epoch and cannot be serialized; saves
/// need a stable wall-clock reference, so this wraps `SystemTime` instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WallInstant(pub u64);

impl WallInstant {
    /// Captures the current wall-clock instant.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self(millis)
    }

    /// Milliseconds elapsed since `self`, saturating at zero if `other` is earlier.
    pub fn elapsed_millis_since(&self, other: WallInstant) -> u64 {
        self.0.saturating_sub(other.0)
    }
}

/// The simulation's in-game clock: elapsed minutes and the derived day counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameClock {
    /// Minutes elapsed since the session began, monotonically increasing.
    pub total_minutes: u64,
    /// Minutes elapsed within the current day, in `0..MINUTES_PER_DAY`.
    pub minute_of_day: u32,
    /// Day counter, starting at 1.
    pub day: u32,
    /// Wall-clock instant the session started.
    pub session_start: WallInstant,
}

impl GameClock {
    /// Starts a fresh clock at day 1, minute 0.
    pub fn start() -> Self {
        Self {
            total_minutes: 0,
            minute_of_day: 0,
            day: 1,
            session_start: WallInstant::now(),
        }
    }

    /// Advances the clock by `delta` minutes, rolling the day counter over at
    /// `MINUTES_PER_DAY`. Returns the number of day rollovers that occurred
    /// (normally 0 or 1, but a large `delta` may cross several days at once).
    pub fn advance(&mut self, delta: u32) -> u32 {
        self.total_minutes += delta as u64;
        let mut minute = self.minute_of_day + delta;
        let mut rollovers = 0;
        while minute >= MINUTES_PER_DAY {
            minute -= MINUTES_PER_DAY;
            self.day += 1;
            rollovers += 1;
        }
        self.minute_of_day = minute;
        rollovers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_within_day_does_not_roll_over() {
        let mut clock = GameClock::start();
        let rollovers = clock.advance(300);
        assert_eq!(rollovers, 0);
        assert_eq!(clock.minute_of_day, 300);
        assert_eq!(clock.day, 1);
        assert_eq!(clock.total_minutes, 300);
    }

    #[test]
    fn advance_past_midnight_rolls_day() {
        let mut clock = GameClock::start();
        clock.advance(1430);
        let rollovers = clock.advance(20);
        assert_eq!(rollovers, 1);
        assert_eq!(clock.day, 2);
        assert_eq!(clock.minute_of_day, 10);
    }

    #[test]
    fn advance_can_cross_multiple_days() {
        let mut clock = GameClock::start();
        let rollovers = clock.advance(MINUTES_PER_DAY * 3 + 5);
        assert_eq!(rollovers, 3);
        assert_eq!(clock.day, 4);
        assert_eq!(clock.minute_of_day, 5);
    }
}

