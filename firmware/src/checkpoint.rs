//! POST progress codes for the diagnostic port.
//!
//! A POST card on port 0x80 shows the last code written. If the board hangs,
//! the code on the card names the last stage that finished.

use khal::PortIo;
use khal::port::POST_CODE_PORT;

/// The ROM stub reports with codes below this.
const CODE_BASE: u8 = 0x10;

/// Stages of the boot sequence, in the order they complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Checkpoint {
    Entry = 0,
    VectorsReady = 1,
    CpuIdentified = 2,
    KeyboardCleared = 3,
    InterruptsAlive = 4,
    SplashDrawn = 5,
    StatusDrawn = 6,
    MemoryVerified = 7,
    StorageProbed = 8,
    ActionDispatched = 9,
    Handoff = 10,
}

impl Checkpoint {
    /// Byte written to the POST port.
    pub const fn code(self) -> u8 {
        CODE_BASE + self as u8
    }
}

/// Report `checkpoint` on the POST port.
pub fn emit<P: PortIo + ?Sized>(io: &P, checkpoint: Checkpoint) {
    io.outb(POST_CODE_PORT, checkpoint.code());
    log::trace!("[post] checkpoint {:#04x} {:?}", checkpoint.code(), checkpoint);
}
