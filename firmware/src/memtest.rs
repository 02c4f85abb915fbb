//! RAM pattern test over the board's fixed memory map.
//!
//! Memory is walked in 64 KiB blocks. Each block gets two passes, one with
//! [`PATTERN_A`] and one with its complement [`PATTERN_B`]; each pass writes
//! every sampled word, flushes the cache so the read-back comes from DRAM,
//! then compares. A block never completes in fewer than [`BLOCK_MIN_TICKS`]
//! so the progress counter stays readable.

use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

use khal::MemoryBus;

use crate::time::{Stopwatch, TickSource};

pub const PATTERN_A: u32 = 0x55AA_55AA;
pub const PATTERN_B: u32 = 0xAA55_AA55;

pub const BLOCK_BYTES: u32 = 0x1_0000;
pub const BLOCK_KIB: u32 = BLOCK_BYTES / 1024;
const BLOCK_WORDS: u32 = BLOCK_BYTES / 4;

/// Shortest time one block may take.
pub const BLOCK_MIN_TICKS: u32 = 5;

/// The first 64 KiB hold the stack and vector tables. The ROM stub has
/// already checked them, so counting starts here.
pub const BASE_KIB: u32 = 64;

/// A run of 64 KiB blocks starting at `base`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub base: u32,
    pub blocks: u8,
}

impl Region {
    pub const fn end(&self) -> u32 {
        self.base + self.blocks as u32 * BLOCK_BYTES
    }
}

/// Conventional memory above the first block, then everything from 1 MiB up
/// to the 4 MiB hole, then the 384 KiB above it.
pub static MEMORY_MAP: [Region; 3] = [
    Region {
        base: 0x0001_0000,
        blocks: 9,
    },
    Region {
        base: 0x0010_0000,
        blocks: 48,
    },
    Region {
        base: 0x004A_0000,
        blocks: 6,
    },
];

/// How densely each block is sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage {
    /// Every word.
    Full,
    /// Every 32nd word.
    Quick,
}

impl Coverage {
    /// Distance between tested words, in words.
    pub const fn stride(self) -> u32 {
        match self {
            Coverage::Full => 1,
            Coverage::Quick => 32,
        }
    }
}

/// A word that did not hold its pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryFault {
    pub addr: u32,
    pub expected: u32,
    pub found: u32,
}

impl fmt::Display for MemoryFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "memory error at {:#010x}: wrote {:#010x}, read {:#010x}",
            self.addr, self.expected, self.found
        )
    }
}

/// Told about every completed block.
pub trait Progress {
    fn block_verified(&mut self, total_kib: u32, coverage: Coverage);
}

impl<F: FnMut(u32, Coverage)> Progress for F {
    fn block_verified(&mut self, total_kib: u32, coverage: Coverage) {
        self(total_kib, coverage)
    }
}

fn pass(bus: &dyn MemoryBus, base: u32, stride: u32, pattern: u32) -> Result<(), MemoryFault> {
    let sampled = (0..BLOCK_WORDS).step_by(stride as usize);

    for word in sampled.clone() {
        bus.write_u32(base + word * 4, pattern);
    }
    bus.flush_cache();
    for word in sampled {
        let addr = base + word * 4;
        let found = bus.read_u32(addr);
        if found != pattern {
            return Err(MemoryFault {
                addr,
                expected: pattern,
                found,
            });
        }
    }
    Ok(())
}

/// Test every block of `regions` in order.
///
/// Returns the KiB verified, counting [`BASE_KIB`]. When `abort` is seen set
/// after a block, the total so far is returned and nothing further is
/// touched.
pub fn verify(
    bus: &dyn MemoryBus,
    clock: &dyn TickSource,
    regions: &[Region],
    coverage: Coverage,
    abort: &AtomicBool,
    progress: &mut dyn Progress,
) -> Result<u32, MemoryFault> {
    let stride = coverage.stride();
    let mut total = BASE_KIB;

    for region in regions {
        log::debug!(
            "[mem] testing {:#010x}..{:#010x} ({:?})",
            region.base,
            region.end(),
            coverage
        );
        for block in 0..region.blocks as u32 {
            let watch = Stopwatch::start(clock);
            let base = region.base + block * BLOCK_BYTES;

            pass(bus, base, stride, PATTERN_A)?;
            pass(bus, base, stride, PATTERN_B)?;
            watch.wait_for(clock, BLOCK_MIN_TICKS);

            total += BLOCK_KIB;
            progress.block_verified(total, coverage);

            if abort.load(Ordering::Acquire) {
                log::info!("[mem] test skipped at {} KB", total);
                return Ok(total);
            }
        }
    }

    log::info!("[mem] {} KB ok", total);
    Ok(total)
}
