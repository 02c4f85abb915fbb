//! Tick-based timing.
//!
//! Every timeout and pacing delay in POST is counted in timer ticks (100 Hz
//! once the PIT is programmed). The counter wraps, so elapsed time is always
//! `now.wrapping_sub(start)` and never a comparison of absolute values.

/// A monotonically advancing tick counter.
pub trait TickSource {
    fn now(&self) -> u32;

    /// Called inside every busy-wait loop while waiting for the next tick.
    #[inline]
    fn relax(&self) {
        core::hint::spin_loop();
    }
}

impl<T: TickSource + ?Sized> TickSource for &T {
    #[inline]
    fn now(&self) -> u32 {
        (**self).now()
    }

    #[inline]
    fn relax(&self) {
        (**self).relax()
    }
}

/// A tick count sampled at some point, for measuring elapsed time from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stopwatch {
    start: u32,
}

impl Stopwatch {
    pub fn start(clock: &dyn TickSource) -> Self {
        Self { start: clock.now() }
    }

    #[inline]
    pub fn elapsed(&self, clock: &dyn TickSource) -> u32 {
        clock.now().wrapping_sub(self.start)
    }

    /// Spin until at least `ticks` have elapsed.
    pub fn wait_for(&self, clock: &dyn TickSource, ticks: u32) {
        while self.elapsed(clock) < ticks {
            clock.relax();
        }
    }

    /// Spin until more than `ticks` have elapsed.
    pub fn wait_past(&self, clock: &dyn TickSource, ticks: u32) {
        while self.elapsed(clock) <= ticks {
            clock.relax();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SteppingClock;

    #[test]
    fn elapsed_survives_counter_wrap() {
        let clock = SteppingClock::starting_at(u32::MAX - 1);
        let watch = Stopwatch::start(&clock);
        watch.wait_past(&clock, 3);
        assert!(clock.now() < 10);
        assert!(watch.elapsed(&clock) > 3);
    }

    #[test]
    fn wait_for_stops_on_the_deadline_tick() {
        let clock = SteppingClock::new();
        let watch = Stopwatch::start(&clock);
        watch.wait_for(&clock, 5);
        assert_eq!(clock.now(), 5);
    }
}
