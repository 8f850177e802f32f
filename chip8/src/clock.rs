//! Software clock.
use std::time::{Duration, Instant};

/// Counts how many fixed intervals elapsed on the wall clock.
///
/// It is designed to work with the yielding cooperative pattern
/// of the driver loop. The caller passes in the current time, and
/// the clock reports how many cycles fell due since it was last
/// asked, carrying over the remainder to the next call.
#[derive(Debug, Clone)]
pub(crate) struct Clock {
    interval: Duration,
    last: Instant,
    /// Most cycles reported in one call.
    max_cycles: u32,
}

impl Clock {
    /// Creates a new clock with the given time as internal state.
    ///
    /// A zero interval means unthrottled, reporting `max_cycles` on every call.
    pub(crate) fn new(interval: Duration, max_cycles: u32, now: Instant) -> Self {
        Self {
            interval,
            last: now,
            max_cycles,
        }
    }

    /// Set the clock state back to zero.
    pub(crate) fn reset(&mut self, now: Instant) {
        self.last = now;
    }

    /// Number of whole cycles that elapsed up to `now`.
    pub(crate) fn due(&mut self, now: Instant) -> u32 {
        if self.interval.is_zero() {
            self.last = now;
            return self.max_cycles;
        }

        let elapsed = now.saturating_duration_since(self.last);
        let cycles = elapsed.as_nanos() / self.interval.as_nanos();

        if cycles > self.max_cycles as u128 {
            // Reset back to zero, rather than trying to catch up.
            //
            // If the VM was paused for debugging, and a large
            // amount of time has elapsed until it is resumed,
            // it should simply continue at the next cycle running
            // at its usual speed.
            self.reset(now);
            return self.max_cycles;
        }

        // Keep the remainder so fractional cycles aren't lost.
        self.last += self.interval * cycles as u32;
        cycles as u32
    }
}
