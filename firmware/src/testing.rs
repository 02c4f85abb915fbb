//! Test doubles shared by the unit tests.

use core::cell::Cell;

use crate::time::TickSource;

/// A clock that moves one tick every time a busy-wait relaxes.
pub struct SteppingClock {
    tick: Cell<u32>,
}

impl SteppingClock {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(tick: u32) -> Self {
        Self {
            tick: Cell::new(tick),
        }
    }
}

impl TickSource for SteppingClock {
    fn now(&self) -> u32 {
        self.tick.get()
    }

    fn relax(&self) {
        self.tick.set(self.tick.get().wrapping_add(1));
    }
}
