//! Checksum-protected settings in CMOS RAM.
//!
//! The settings live in a fixed 32-byte blob at CMOS `0x40..=0x5F`. Byte 0
//! holds the option flags, bytes 1-30 are reserved and byte 31 is the
//! wrapping sum of bytes 0-30. A blob whose checksum does not match is
//! replaced with zeros on load.
//!
//! The top of CMOS belongs to the chipset: a board identity magic, the
//! chipset version and a write-only lock command.

use bitflags::bitflags;
use khal::PortIo;
use khal::cmos::Cmos;

/// First CMOS index of the settings blob.
pub const SETTINGS_BASE: u8 = 0x40;
pub const SETTINGS_LEN: usize = 32;
/// Offset of the checksum byte inside the blob.
pub const CHECKSUM_OFFSET: usize = SETTINGS_LEN - 1;

/// Board identity magic at [`BOARD_MAGIC_INDEX`] and the byte after it.
pub const BOARD_MAGIC: [u8; 2] = [0x48, 0x86];
pub const BOARD_MAGIC_INDEX: u8 = 0xFC;
/// Chipset version, high byte then low byte.
pub const CHIPSET_VERSION_HIGH: u8 = 0xFE;
pub const CHIPSET_VERSION_LOW: u8 = 0xFF;

/// Writing [`LOCK_COMMAND`] here write-protects the settings area until the
/// next power cycle. Reads of the same index return the low version byte.
pub const LOCK_INDEX: u8 = 0xFF;
pub const LOCK_COMMAND: u8 = 0x17;

bitflags! {
    /// Byte 0 of the settings blob.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SettingsFlags: u8 {
        /// Test every 32nd word instead of every word.
        const QUICK_MEMTEST = 1 << 0;
        /// Report LBA support to INT 13h callers.
        const LBA_REPORTING = 1 << 1;
        /// Lock the settings area before handoff.
        const LOCK_NVRAM = 1 << 2;
    }
}

/// The 32 raw settings bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsBlob(pub [u8; SETTINGS_LEN]);

impl SettingsBlob {
    pub const fn zeroed() -> Self {
        Self([0; SETTINGS_LEN])
    }

    /// Wrapping sum of every byte but the last.
    pub fn checksum(&self) -> u8 {
        self.0[..CHECKSUM_OFFSET]
            .iter()
            .fold(0u8, |sum, &b| sum.wrapping_add(b))
    }

    pub fn is_valid(&self) -> bool {
        self.checksum() == self.0[CHECKSUM_OFFSET]
    }

    /// Store the current checksum in the last byte.
    pub fn seal(&mut self) {
        self.0[CHECKSUM_OFFSET] = self.checksum();
    }

    pub fn flags(&self) -> SettingsFlags {
        SettingsFlags::from_bits_retain(self.0[0])
    }

    pub fn flag(&self, flag: SettingsFlags) -> bool {
        self.flags().contains(flag)
    }

    pub fn set_flag(&mut self, flag: SettingsFlags, on: bool) {
        let mut flags = self.flags();
        flags.set(flag, on);
        self.0[0] = flags.bits();
    }
}

impl Default for SettingsBlob {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// What [`NvramStore::load`] found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checksum {
    Valid,
    /// The stored blob was corrupt and has been reset to zeros.
    Repaired,
}

/// Who made the board, as far as CMOS can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardIdentity {
    /// The M8SBC magic is present.
    pub recognized: bool,
    pub chipset_version: u16,
}

/// In-memory copy of the settings blob plus access to CMOS.
///
/// [`get`](Self::get) and [`set`](Self::set) work on the copy only; nothing
/// reaches CMOS until [`save`](Self::save).
pub struct NvramStore<P> {
    cmos: Cmos<P>,
    blob: SettingsBlob,
}

impl<P: PortIo> NvramStore<P> {
    pub const fn new(io: P) -> Self {
        Self {
            cmos: Cmos::new(io),
            blob: SettingsBlob::zeroed(),
        }
    }

    /// Read the blob from CMOS and check it.
    pub fn load(&mut self) -> Checksum {
        for (i, byte) in self.blob.0.iter_mut().enumerate() {
            *byte = self.cmos.read(SETTINGS_BASE + i as u8);
        }

        if self.blob.is_valid() {
            log::debug!("[cmos] settings valid, flags {:?}", self.blob.flags());
            return Checksum::Valid;
        }

        log::warn!(
            "[cmos] checksum {:#04x} != stored {:#04x}, clearing settings",
            self.blob.checksum(),
            self.blob.0[CHECKSUM_OFFSET]
        );
        self.blob = SettingsBlob::zeroed();
        self.save();
        Checksum::Repaired
    }

    /// Seal the blob and write all 32 bytes.
    pub fn save(&mut self) {
        self.blob.seal();
        for (i, &byte) in self.blob.0.iter().enumerate() {
            self.cmos.write(SETTINGS_BASE + i as u8, byte);
        }
    }

    pub fn get(&self, flag: SettingsFlags) -> bool {
        self.blob.flag(flag)
    }

    pub fn set(&mut self, flag: SettingsFlags, on: bool) {
        self.blob.set_flag(flag, on);
    }

    pub fn blob(&self) -> &SettingsBlob {
        &self.blob
    }

    pub fn blob_mut(&mut self) -> &mut SettingsBlob {
        &mut self.blob
    }

    /// Write-protect the settings area. There is no unlock.
    pub fn lock(&self) {
        self.cmos.write(LOCK_INDEX, LOCK_COMMAND);
        log::info!("[cmos] settings area locked");
    }

    pub fn identity(&self) -> BoardIdentity {
        let magic = [
            self.cmos.read(BOARD_MAGIC_INDEX),
            self.cmos.read(BOARD_MAGIC_INDEX + 1),
        ];
        let high = self.cmos.read(CHIPSET_VERSION_HIGH);
        let low = self.cmos.read(CHIPSET_VERSION_LOW);
        BoardIdentity {
            recognized: magic == BOARD_MAGIC,
            chipset_version: u16::from_be_bytes([high, low]),
        }
    }
}
