//! 8253/8254 PIT (Programmable Interval Timer), channel 0.

use crate::port::PortIo;

/// Input clock of the PIT in Hz.
pub const INPUT_HZ: u32 = 1_193_180;

pub const CHANNEL0_DATA: u16 = 0x40;
pub const COMMAND: u16 = 0x43;

/// Channel 0, lobyte/hibyte access, mode 3 (square wave), binary.
const CH0_SQUARE_WAVE: u8 = 0x36;

/// Reload value for the requested interrupt rate.
///
/// # Panics
///
/// Panics if `hz` is zero. Frequencies above [`INPUT_HZ`] give a zero divisor,
/// which the chip treats as 65536.
#[inline]
pub const fn divisor(hz: u32) -> u32 {
    INPUT_HZ / hz
}

/// Program channel 0 to interrupt `hz` times per second.
pub fn set_frequency<P: PortIo>(io: &P, hz: u32) {
    let divisor = divisor(hz);
    io.outb(COMMAND, CH0_SQUARE_WAVE);
    io.outb(CHANNEL0_DATA, (divisor & 0xFF) as u8);
    io.outb(CHANNEL0_DATA, ((divisor >> 8) & 0xFF) as u8);
}
