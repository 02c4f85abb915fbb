//! Primary IDE master discovery.
//!
//! One transaction: soft-reset the channel, wait for BSY to drop, send
//! IDENTIFY DEVICE and sanity-check the 256-word answer. A floating bus reads
//! all ones and a missing device may echo a constant, so the answer is only
//! trusted when it looks like real identify data.

use core::fmt;

use khal::PortIo;
use khal::ata::{self, DeviceControl, Status};

use crate::time::{Stopwatch, TickSource};

/// Ticks SRST is held, and then released, before moving on.
pub const RESET_HOLD_TICKS: u32 = 2;
/// Ticks allowed for BSY to clear after reset.
pub const BUSY_TIMEOUT_TICKS: u32 = 500;
/// Ticks allowed for IDENTIFY to raise DRQ.
pub const IDENTIFY_TIMEOUT_TICKS: u32 = 500;

/// Position and length of the model string in IDENTIFY data.
const MODEL_FIRST_WORD: usize = 27;
const MODEL_WORDS: usize = 20;
pub const MODEL_LEN: usize = MODEL_WORDS * 2;

/// Where discovery is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Reset,
    WaitNotBusy,
    IssueIdentify,
    PollResult,
}

/// How discovery ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Timeout(Phase),
    SanityFailed(SanityError),
}

/// Why an IDENTIFY answer was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanityError {
    /// Word 0 bit 15 set: not an ATA device.
    NotAta,
    /// Word 0 is all zeros or all ones.
    FloatingBus,
    /// A model string byte outside printable ASCII.
    Unprintable { offset: usize, byte: u8 },
    /// At least 255 of 256 words equal word 0.
    Constant,
}

impl fmt::Display for SanityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAta => f.write_str("word 0 marks a non-ATA device"),
            Self::FloatingBus => f.write_str("word 0 reads as a floating bus"),
            Self::Unprintable { offset, byte } => {
                write!(f, "model byte {} is {:#04x}", offset, byte)
            }
            Self::Constant => f.write_str("response is one repeated word"),
        }
    }
}

/// Drive model string as reported by IDENTIFY, space padded.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ModelName([u8; MODEL_LEN]);

impl ModelName {
    /// Pull the model out of words 27..=46. ATA strings store the first
    /// character of each pair in the high byte.
    pub fn from_identify(words: &[u16; ata::IDENTIFY_WORDS]) -> Self {
        let mut name = [0u8; MODEL_LEN];
        for (pair, &word) in name
            .chunks_exact_mut(2)
            .zip(&words[MODEL_FIRST_WORD..MODEL_FIRST_WORD + MODEL_WORDS])
        {
            pair.copy_from_slice(&word.to_be_bytes());
        }
        Self(name)
    }

    pub fn bytes(&self) -> &[u8; MODEL_LEN] {
        &self.0
    }

    /// The name up to the first NUL with trailing padding removed.
    pub fn as_str(&self) -> &str {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(MODEL_LEN);
        core::str::from_utf8(&self.0[..end])
            .unwrap_or("?")
            .trim_end()
    }
}

impl fmt::Debug for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ModelName").field(&self.as_str()).finish()
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decide whether `words` is a believable IDENTIFY response.
pub fn check_identify(words: &[u16; ata::IDENTIFY_WORDS]) -> Result<ModelName, SanityError> {
    let first = words[0];
    if first & 0x8000 != 0 {
        return Err(SanityError::NotAta);
    }
    if first == 0x0000 || first == 0xFFFF {
        return Err(SanityError::FloatingBus);
    }

    let name = ModelName::from_identify(words);
    if let Some((offset, &byte)) = name
        .bytes()
        .iter()
        .enumerate()
        .find(|&(_, &b)| b != 0 && !(0x20..=0x7E).contains(&b))
    {
        return Err(SanityError::Unprintable { offset, byte });
    }

    if words.iter().filter(|&&w| w == first).count() >= ata::IDENTIFY_WORDS - 1 {
        return Err(SanityError::Constant);
    }

    Ok(name)
}

/// The primary channel's master device.
pub struct IdeProbe<'c, P> {
    io: P,
    clock: &'c dyn TickSource,
}

impl<'c, P: PortIo> IdeProbe<'c, P> {
    pub fn new(io: P, clock: &'c dyn TickSource) -> Self {
        Self { io, clock }
    }

    fn status(&self) -> Status {
        Status::from_bits_retain(self.io.inb(ata::STATUS))
    }

    fn hold(&self) {
        let watch = Stopwatch::start(self.clock);
        while watch.elapsed(self.clock) <= RESET_HOLD_TICKS {
            self.io.io_wait();
            self.clock.relax();
        }
    }

    /// Pulse SRST on the device control register.
    pub fn reset(&self) {
        self.io.outb(ata::DEVICE_CONTROL, DeviceControl::SOFT_RESET.bits());
        self.hold();
        self.io.outb(ata::DEVICE_CONTROL, DeviceControl::empty().bits());
        self.hold();
    }

    /// Poll until BSY clears. False once more than `timeout` ticks pass.
    pub fn wait_not_busy(&self, timeout: u32) -> bool {
        let watch = Stopwatch::start(self.clock);
        loop {
            if watch.elapsed(self.clock) > timeout {
                return false;
            }
            if !self.status().contains(Status::BUSY) {
                return true;
            }
            self.io.io_wait();
            self.clock.relax();
        }
    }

    /// Send IDENTIFY to the master and validate the answer.
    ///
    /// `progress` gets the elapsed tick count each time the counter moves
    /// while waiting for DRQ.
    pub fn detect(&self, progress: &mut dyn FnMut(u32)) -> Result<ModelName, Outcome> {
        self.io.outb(ata::DRIVE_HEAD, ata::SELECT_MASTER);
        self.io.io_wait();
        self.io.outb(ata::COMMAND, ata::CMD_IDENTIFY);
        self.io.io_wait();

        let watch = Stopwatch::start(self.clock);
        let mut last = None;
        loop {
            self.io.io_wait();
            let status = self.status();

            let elapsed = watch.elapsed(self.clock);
            if elapsed > IDENTIFY_TIMEOUT_TICKS {
                return Err(Outcome::Timeout(Phase::PollResult));
            }
            if last != Some(elapsed) {
                progress(elapsed);
                last = Some(elapsed);
            }

            if !status.contains(Status::BUSY) && status.contains(Status::DATA_REQUEST) {
                break;
            }
            self.clock.relax();
        }

        let mut words = [0u16; ata::IDENTIFY_WORDS];
        for word in words.iter_mut() {
            *word = self.io.inw(ata::DATA);
            self.io.io_wait();
        }

        check_identify(&words).map_err(Outcome::SanityFailed)
    }

    /// Reset, wait for the device, then identify it.
    pub fn discover(&self, progress: &mut dyn FnMut(u32)) -> Option<ModelName> {
        self.reset();
        let result = if self.wait_not_busy(BUSY_TIMEOUT_TICKS) {
            self.detect(progress)
        } else {
            Err(Outcome::Timeout(Phase::WaitNotBusy))
        };

        match result {
            Ok(name) => {
                log::info!("[ide] primary master: {}", name);
                Some(name)
            }
            Err(Outcome::SanityFailed(reason)) => {
                log::debug!("[ide] identify rejected: {}", reason);
                None
            }
            Err(outcome) => {
                log::debug!("[ide] no device: {:?}", outcome);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SteppingClock;
    use khal::sim::{Drive, SimBoard};
    use std::boxed::Box;
    use std::vec::Vec;

    /// A plausible IDENTIFY response naming the drive `model`.
    fn identify_words(model: &str) -> Box<[u16; 256]> {
        let mut words = Box::new([0u16; 256]);
        words[0] = 0x0040;
        words[1] = 1024;
        words[3] = 16;
        words[6] = 63;
        let mut padded = [b' '; MODEL_LEN];
        padded[..model.len()].copy_from_slice(model.as_bytes());
        for (i, pair) in padded.chunks_exact(2).enumerate() {
            words[MODEL_FIRST_WORD + i] = u16::from_be_bytes([pair[0], pair[1]]);
        }
        words
    }

    #[test]
    fn model_name_is_byte_swapped_and_trimmed() {
        let words = identify_words("QEMU HARDDISK");
        let name = check_identify(&words).unwrap();
        assert_eq!(name.as_str(), "QEMU HARDDISK");
        assert_eq!(&name.bytes()[..4], b"QEMU");
    }

    #[test]
    fn sanity_rejects_bad_responses() {
        assert_eq!(
            check_identify(&[0x0000; 256]),
            Err(SanityError::FloatingBus)
        );
        assert_eq!(check_identify(&[0xFFFF; 256]), Err(SanityError::NotAta));

        let mut high_bit = identify_words("DISK");
        high_bit[0] = 0x8040;
        assert_eq!(check_identify(&high_bit), Err(SanityError::NotAta));

        let mut constant = [0x2020u16; 256];
        constant[255] = 0x0001;
        assert_eq!(check_identify(&constant), Err(SanityError::Constant));

        let mut control = identify_words("DISK");
        control[MODEL_FIRST_WORD + 1] = 0x0741;
        assert_eq!(
            check_identify(&control),
            Err(SanityError::Unprintable {
                offset: 2,
                byte: 0x07
            })
        );
    }

    #[test]
    fn nul_bytes_in_the_name_are_allowed() {
        let mut words = identify_words("");
        for w in &mut words[MODEL_FIRST_WORD..MODEL_FIRST_WORD + MODEL_WORDS] {
            *w = 0;
        }
        words[MODEL_FIRST_WORD] = u16::from_be_bytes(*b"CF");
        assert_eq!(check_identify(&words).unwrap().as_str(), "CF");
    }

    #[test]
    fn reset_pulses_srst_for_more_than_two_ticks() {
        let board = SimBoard::new();
        let clock = SteppingClock::new();
        IdeProbe::new(&board, &clock).reset();
        assert_eq!(board.port_writes(ata::DEVICE_CONTROL), [0x04, 0x00]);
        assert_eq!(clock.now(), 2 * (RESET_HOLD_TICKS + 1));
    }

    #[test]
    fn stuck_busy_times_out() {
        let board = SimBoard::new();
        board.attach_drive(Drive::StuckBusy);
        let clock = SteppingClock::new();
        let probe = IdeProbe::new(&board, &clock);

        assert!(!probe.wait_not_busy(BUSY_TIMEOUT_TICKS));
        assert_eq!(clock.now(), BUSY_TIMEOUT_TICKS + 1);
        assert_eq!(probe.discover(&mut |_| {}), None);
        assert_eq!(board.identify_commands(), 0);
    }

    #[test]
    fn never_ready_device_times_out_in_identify() {
        let board = SimBoard::new();
        board.attach_drive(Drive::NeverReady);
        let clock = SteppingClock::new();
        let probe = IdeProbe::new(&board, &clock);

        let mut seen = Vec::new();
        assert_eq!(
            probe.detect(&mut |t| seen.push(t)),
            Err(Outcome::Timeout(Phase::PollResult))
        );
        assert_eq!(seen.len() as u32, IDENTIFY_TIMEOUT_TICKS + 1);
        assert_eq!(seen.last(), Some(&IDENTIFY_TIMEOUT_TICKS));
    }

    #[test]
    fn present_drive_is_found_after_busy_phase() {
        let board = SimBoard::new();
        board.attach_drive(Drive::Present {
            identify: identify_words("WDC AC2540H"),
            busy_polls: 3,
        });
        let clock = SteppingClock::new();
        let probe = IdeProbe::new(&board, &clock);

        let name = probe.discover(&mut |_| {}).unwrap();
        assert_eq!(name.to_string(), "WDC AC2540H");
        assert_eq!(board.port_writes(ata::DRIVE_HEAD), [0xA0]);
        assert_eq!(board.identify_commands(), 1);
    }

    #[test]
    fn absent_drive_reads_as_busy_and_is_not_found() {
        let board = SimBoard::new();
        let clock = SteppingClock::new();
        assert_eq!(IdeProbe::new(&board, &clock).discover(&mut |_| {}), None);
    }
}
