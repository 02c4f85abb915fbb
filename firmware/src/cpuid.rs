//! 486-family model names from the reset signature.
//!
//! Every 486 leaves its family/model/stepping in DX after reset. The ROM
//! stub saves it, POST reads it back through [`khal::Cpu::reset_signature`]
//! and maps the family and model nibbles to a marketing name. Cyrix and
//! Intel/AMD parts reuse some signatures, so the vendor probe result is part
//! of the lookup.

use core::fmt;

/// Stepping lives in the low nibble and does not change the name.
const MODEL_MASK: u16 = 0xFFF0;

/// Signatures at or above this are not 486-class and skip the "486" prefix.
const NON_486_SIGNATURE: u16 = 0x1500;

/// The processor as identified during POST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuModel {
    signature: u16,
    cyrix: bool,
}

impl CpuModel {
    pub const fn new(signature: u16, cyrix: bool) -> Self {
        Self { signature, cyrix }
    }

    pub const fn signature(&self) -> u16 {
        self.signature
    }

    pub const fn is_cyrix(&self) -> bool {
        self.cyrix
    }

    pub const fn vendor(&self) -> &'static str {
        if self.cyrix { "Cyrix" } else { "Intel/AMD" }
    }

    /// Suffix after the family, `"??"` for unknown signatures.
    pub const fn variant(&self) -> &'static str {
        match self.signature & MODEL_MASK {
            0x0400 | 0x0410 => "DX",
            0x0420 => "SX",
            0x0430 | 0x0470 => "DX2",
            0x0440 => "SL",
            0x0450 => "SX2",
            0x0480 if self.cyrix => "DX2",
            0x0480 | 0x0490 => "DX4",
            0x1480 => "DX4ODP",
            0x1530 => "Pentium OD",
            _ => "??",
        }
    }
}

/// `Intel/AMD 486DX2`. The alternate form appends the raw signature in hex:
/// `Intel/AMD 486DX2 (435h)`.
impl fmt::Display for CpuModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.vendor())?;
        f.write_str(" ")?;
        if self.signature < NON_486_SIGNATURE {
            f.write_str("486")?;
        }
        f.write_str(self.variant())?;
        if f.alternate() {
            write!(f, " ({:X}h)", self.signature)?;
        }
        Ok(())
    }
}
