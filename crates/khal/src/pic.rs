//! 8259 PIC (Programmable Interrupt Controller) driver.
//!
//! The M8SBC-486 has a single master 8259 and no cascaded slave. At power-on
//! its IRQ 0-7 are mapped to vectors 0x08-0x0F, which overlap CPU exception
//! vectors in protected mode, so POST moves them to [`VECTOR_BASE`] and moves
//! them back to [`LEGACY_VECTOR_BASE`] before handing off to real mode.

use bitflags::bitflags;

use crate::port::PortIo;

/// I/O port addresses for the master PIC.
pub const PIC_COMMAND: u16 = 0x20;
pub const PIC_DATA: u16 = 0x21;

/// ICW1: Initialization Command Word 1 - begin initialization sequence.
const ICW1_INIT: u8 = 0x10;
/// ICW1: ICW4 will be sent.
const ICW1_ICW4: u8 = 0x01;
/// ICW3: no slave on any input.
const ICW3_NO_SLAVE: u8 = 0x00;
/// ICW4: 8086/88 mode (as opposed to MCS-80/85 mode).
const ICW4_8086: u8 = 0x01;

/// Non-specific end-of-interrupt command.
pub const EOI: u8 = 0x20;

/// Protected-mode vector base used during POST (IRQ0 → 0x20).
pub const VECTOR_BASE: u8 = 0x20;
/// Real-mode vector base expected by the next boot stage (IRQ0 → 0x08).
pub const LEGACY_VECTOR_BASE: u8 = 0x08;

/// Mask register value with every line masked.
pub const ALL_MASKED: u8 = 0xFF;

bitflags! {
    /// The IRQ lines POST installs handlers for. A set bit in the PIC mask
    /// register blocks the line.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Irq: u8 {
        /// IRQ0, PIT channel 0.
        const TIMER = 1 << 0;
        /// IRQ1, 8042 keyboard output buffer full.
        const KEYBOARD = 1 << 1;
    }
}

impl Irq {
    /// Interrupt vector this line is delivered on after [`remap`] to
    /// [`VECTOR_BASE`].
    pub const fn vector(self) -> u8 {
        VECTOR_BASE + self.bits().trailing_zeros() as u8
    }
}

/// Reprogram the PIC so IRQ0 is delivered on `base`, leaving every line
/// masked and any in-service request acknowledged.
pub fn remap<P: PortIo>(io: &P, base: u8) {
    // ICW1: Begin initialization (single PIC, ICW4 needed)
    io.outb(PIC_COMMAND, ICW1_INIT | ICW1_ICW4);
    io.io_wait();

    // ICW2: Vector offset
    io.outb(PIC_DATA, base);
    io.io_wait();

    // ICW3: Nothing is cascaded
    io.outb(PIC_DATA, ICW3_NO_SLAVE);
    io.io_wait();

    // ICW4: 8086 mode
    io.outb(PIC_DATA, ICW4_8086);
    io.io_wait();

    set_mask(io, ALL_MASKED);
    eoi(io);
}

/// Write the raw interrupt mask register.
#[inline]
pub fn set_mask<P: PortIo>(io: &P, mask: u8) {
    io.outb(PIC_DATA, mask);
}

/// Acknowledge the interrupt currently in service.
#[inline]
pub fn eoi<P: PortIo>(io: &P) {
    io.outb(PIC_COMMAND, EOI);
}
