//! CMOS / NVRAM index-data register pair.
//!
//! The RTC's battery-backed RAM is reached by writing a byte index to
//! [`CMOS_INDEX`] and then reading or writing [`CMOS_DATA`]. Bit 7 of the
//! index is the NMI gate on a stock AT; the M8SBC chipset ignores it, so
//! indices are written as-is.

use crate::port::PortIo;

pub const CMOS_INDEX: u16 = 0x70;
pub const CMOS_DATA: u16 = 0x71;

/// Byte access to CMOS RAM through a port capability.
pub struct Cmos<P> {
    io: P,
}

impl<P: PortIo> Cmos<P> {
    pub const fn new(io: P) -> Self {
        Self { io }
    }

    /// Read the byte at `index`.
    pub fn read(&self, index: u8) -> u8 {
        self.io.outb(CMOS_INDEX, index);
        self.io.inb(CMOS_DATA)
    }

    /// Write `value` at `index`.
    pub fn write(&self, index: u8, value: u8) {
        self.io.outb(CMOS_INDEX, index);
        self.io.outb(CMOS_DATA, value);
    }
}
