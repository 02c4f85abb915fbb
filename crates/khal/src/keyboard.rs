//! 8042 keyboard controller and scancode decoding.
//!
//! The controller side is raw: POST buffers whatever bytes the keyboard
//! sends. Consumers that care about keys rather than bytes feed those bytes
//! through [`KeyDecoder`], which uses the `pc-keyboard` scancode set 1 state
//! machine so `0xE0`-prefixed keys (arrows) and break codes are handled.

use pc_keyboard::{KeyState, ScancodeSet, ScancodeSet1};

use crate::port::PortIo;

pub use pc_keyboard::KeyCode;

// ── 8042 controller ports ─────────────────────────────────────────

/// Data port: scancodes in, device commands out.
pub const PS2_DATA: u16 = 0x60;
/// Status / command port.
pub const PS2_STATUS: u16 = 0x64;

/// Status bit 0: output buffer full (a byte is waiting on [`PS2_DATA`]).
pub const STATUS_OUTPUT_FULL: u8 = 0x01;

/// Whether the controller holds a byte for us.
#[inline]
pub fn has_data<P: PortIo>(io: &P) -> bool {
    io.inb(PS2_STATUS) & STATUS_OUTPUT_FULL != 0
}

/// Read the byte waiting on the data port.
#[inline]
pub fn read_data<P: PortIo>(io: &P) -> u8 {
    io.inb(PS2_DATA)
}

/// Throw away everything the controller is holding.
pub fn drain<P: PortIo>(io: &P) {
    while has_data(io) {
        let _ = read_data(io);
    }
}

// ── Scancode decoding ─────────────────────────────────────────────

/// Turns raw set 1 bytes into key presses.
pub struct KeyDecoder {
    set: ScancodeSet1,
}

impl KeyDecoder {
    pub fn new() -> Self {
        Self {
            set: ScancodeSet1::new(),
        }
    }

    /// Feed one byte. Returns the key when the byte completes a make code.
    ///
    /// Break codes, prefixes and bytes the decoder rejects give `None`.
    pub fn key_down(&mut self, scancode: u8) -> Option<KeyCode> {
        match self.set.advance_state(scancode) {
            Ok(Some(event)) if matches!(event.state, KeyState::Down) => Some(event.code),
            _ => None,
        }
    }
}

impl Default for KeyDecoder {
    fn default() -> Self {
        Self::new()
    }
}
