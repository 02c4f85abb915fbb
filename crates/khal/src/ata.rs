//! Primary ATA (IDE) channel register map.

use bitflags::bitflags;

pub const DATA: u16 = 0x1F0;
pub const ERROR: u16 = 0x1F1;
pub const SECTOR_COUNT: u16 = 0x1F2;
pub const LBA_LOW: u16 = 0x1F3;
pub const LBA_MID: u16 = 0x1F4;
pub const LBA_HIGH: u16 = 0x1F5;
pub const DRIVE_HEAD: u16 = 0x1F6;
/// Status on read, command on write.
pub const STATUS: u16 = 0x1F7;
pub const COMMAND: u16 = 0x1F7;
/// Alternate status on read, device control on write.
pub const DEVICE_CONTROL: u16 = 0x3F6;

/// Drive/head value selecting the master device (CHS, bits 7 and 5 set).
pub const SELECT_MASTER: u8 = 0xA0;

pub const CMD_IDENTIFY: u8 = 0xEC;

/// Size of the IDENTIFY DEVICE response in 16-bit words.
pub const IDENTIFY_WORDS: usize = 256;

bitflags! {
    /// Status register bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u8 {
        const BUSY = 0x80;
        const READY = 0x40;
        const DEVICE_FAULT = 0x20;
        const SEEK_COMPLETE = 0x10;
        const DATA_REQUEST = 0x08;
        const CORRECTED = 0x04;
        const INDEX = 0x02;
        const ERROR = 0x01;
    }
}

bitflags! {
    /// Device control register bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DeviceControl: u8 {
        /// Software reset of both devices on the channel.
        const SOFT_RESET = 0x04;
        /// Disable INTRQ.
        const NO_INTERRUPT = 0x02;
    }
}
