//! Protected-mode Interrupt Descriptor Table (32-bit gates).
//!
//! POST only ever fills two entries, the remapped timer and keyboard
//! vectors. Every other vector stays not-present.

use core::mem::size_of;

use crate::cpu::DescriptorTablePointer;

/// Vectors covered by the table. The remapped PIC ends at 0x27.
pub const IDT_ENTRIES: usize = 64;

/// Flat code segment set up by the ROM's mode-switch stub.
pub const CODE_SELECTOR: u16 = 0x08;

/// Present, DPL 0, 32-bit interrupt gate.
pub const INTERRUPT_GATE_32: u8 = 0x8E;

/// An entry in the Interrupt Descriptor Table.
///
/// Format (64 bits / 8 bytes):
/// - Bits 0-15:  Offset bits 0-15
/// - Bits 16-31: Code segment selector
/// - Bits 32-39: Reserved (must be 0)
/// - Bits 40-47: Type and attributes (gate type, DPL, present)
/// - Bits 48-63: Offset bits 16-31
#[derive(Debug, Clone, Copy)]
#[repr(C, packed)]
pub struct IdtEntry {
    offset_low: u16,
    selector: u16,
    zero: u8,
    type_attr: u8,
    offset_high: u16,
}

impl IdtEntry {
    /// An entry that is not present.
    #[inline]
    pub const fn missing() -> Self {
        Self {
            offset_low: 0,
            selector: 0,
            zero: 0,
            type_attr: 0,
            offset_high: 0,
        }
    }

    /// An interrupt gate to `handler` in segment `selector`.
    #[inline]
    pub const fn interrupt_gate(handler: u32, selector: u16) -> Self {
        Self {
            offset_low: handler as u16,
            selector,
            zero: 0,
            type_attr: INTERRUPT_GATE_32,
            offset_high: (handler >> 16) as u16,
        }
    }

    #[inline]
    pub fn is_present(&self) -> bool {
        self.type_attr & 0x80 != 0
    }

    #[inline]
    pub fn handler(&self) -> u32 {
        (self.offset_low as u32) | ((self.offset_high as u32) << 16)
    }

    #[inline]
    pub fn selector(&self) -> u16 {
        self.selector
    }

    #[inline]
    pub fn type_attr(&self) -> u8 {
        self.type_attr
    }
}

#[repr(C, align(8))]
pub struct Idt {
    entries: [IdtEntry; IDT_ENTRIES],
}

impl Idt {
    /// A table with all entries marked as missing.
    pub const fn new() -> Self {
        Self {
            entries: [IdtEntry::missing(); IDT_ENTRIES],
        }
    }

    /// Install an interrupt gate for `vector`.
    pub fn set_handler(&mut self, vector: u8, handler: u32, selector: u16) {
        self.entries[vector as usize] = IdtEntry::interrupt_gate(handler, selector);
    }

    #[inline]
    pub fn entry(&self, vector: u8) -> &IdtEntry {
        &self.entries[vector as usize]
    }

    /// `lidt` operand for this table.
    pub fn pointer(&'static self) -> DescriptorTablePointer {
        DescriptorTablePointer {
            limit: (size_of::<Self>() - 1) as u16,
            base: self as *const _ as usize,
        }
    }
}

impl Default for Idt {
    fn default() -> Self {
        Self::new()
    }
}
