//! Search time allocation and the search timer.

use std::time::Instant;

/// Time controls reported by the front end, all in milliseconds.
#[derive(Clone, Copy, Default, Debug)]
pub struct TimeControls {
    /// Remaining time for the side to move.
    pub time: i64,
    /// Increment per move.
    pub increment: i64,
    /// Moves until the next time control; 0 for sudden death.
    pub moves_to_go: i64,
    /// Fixed time for this move; 0 when unset.
    pub move_time: i64,
    /// Safety margin subtracted from the remaining time.
    pub move_overhead: i64,
}

/// Milliseconds allocated to the next move.
///
/// With `moves_to_go` the budget is an even split plus the increment;
/// otherwise a thirtieth of the remaining time plus the increment,
/// capped at half the remaining time. A given `move_time` acts as an
/// upper bound. At least one millisecond is always allocated.
#[must_use]
pub fn allocate_time(controls: &TimeControls) -> i64 {
    let mut time_limit = controls.time - controls.move_overhead;

    let allocated = if controls.moves_to_go > 0 {
        time_limit / controls.moves_to_go + controls.increment
    } else {
        (time_limit / 30 + controls.increment).min(time_limit / 2)
    };

    if controls.move_time > 0 {
        time_limit = time_limit.min(controls.move_time);
    }

    allocated.min(time_limit).max(1)
}

/// Wall-clock timer for one search.
pub struct Timer {
    start: Instant,
}

impl Timer {
    #[must_use]
    pub fn start() -> Self {
        Timer {
            start: Instant::now(),
        }
    }

    #[inline]
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    #[inline]
    #[must_use]
    pub fn elapsed_ns(&self) -> u128 {
        self.start.elapsed().as_nanos()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Timer::start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controls(time: i64, increment: i64, moves_to_go: i64, move_time: i64) -> TimeControls {
        TimeControls {
            time,
            increment,
            moves_to_go,
            move_time,
            move_overhead: 10,
        }
    }

    #[test]
    fn splits_evenly_with_moves_to_go() {
        let c = controls(60_000, 1_000, 20, 0);
        assert_eq!(allocate_time(&c), (60_000 - 10) / 20 + 1_000);
    }

    #[test]
    fn sudden_death_uses_a_thirtieth_plus_increment() {
        let c = controls(30_000, 500, 0, 0);
        assert_eq!(allocate_time(&c), (30_000 - 10) / 30 + 500);
    }

    #[test]
    fn low_time_is_capped_at_half() {
        // A large increment with little time left must not overshoot.
        let c = controls(200, 5_000, 0, 0);
        assert_eq!(allocate_time(&c), (200 - 10) / 2);
    }

    #[test]
    fn move_time_bounds_the_allocation() {
        let c = controls(60_000, 0, 0, 100);
        assert!(allocate_time(&c) <= 100);
    }

    #[test]
    fn never_allocates_less_than_one_ms() {
        let c = controls(5, 0, 0, 0);
        assert_eq!(allocate_time(&c), 1);
    }
}
