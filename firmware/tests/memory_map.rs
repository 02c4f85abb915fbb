use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};

use khal::MemoryBus;
use khal::sim::SimMemory;
use pretty_assertions::assert_eq;
use seapig_firmware::TickSource;
use seapig_firmware::memtest::{BLOCK_BYTES, Coverage, MEMORY_MAP, verify};

/// One tick per relax.
#[derive(Default)]
struct Stepping(Cell<u32>);

impl TickSource for Stepping {
    fn now(&self) -> u32 {
        self.0.get()
    }

    fn relax(&self) {
        self.0.set(self.0.get().wrapping_add(1));
    }
}

/// Raises `flag` the first time `trigger` is written, as if the operator
/// pressed ESC while that block was under test.
struct EscapeAt<'a> {
    ram: &'a SimMemory,
    trigger: u32,
    flag: &'a AtomicBool,
}

impl MemoryBus for EscapeAt<'_> {
    fn read_u32(&self, addr: u32) -> u32 {
        self.ram.read_u32(addr)
    }

    fn write_u32(&self, addr: u32, value: u32) {
        if addr == self.trigger {
            self.flag.store(true, Ordering::Release);
        }
        self.ram.write_u32(addr, value);
    }

    fn flush_cache(&self) {
        self.ram.flush_cache();
    }
}

fn board_ram() -> SimMemory {
    let end = MEMORY_MAP.iter().map(|r| r.end()).max().unwrap_or(0);
    SimMemory::new(end as usize)
}

#[test]
fn escape_in_the_third_extended_block_reports_832_kb() {
    let ram = board_ram();
    let abort = AtomicBool::new(false);
    let bus = EscapeAt {
        ram: &ram,
        trigger: 0x0010_0000 + 2 * BLOCK_BYTES,
        flag: &abort,
    };
    let mut seen = Vec::new();
    let mut progress = |kib: u32, _: Coverage| seen.push(kib);

    let result = verify(&bus, &Stepping::default(), &MEMORY_MAP, Coverage::Quick, &abort, &mut progress);

    assert_eq!(result, Ok(832));
    assert_eq!(seen.last(), Some(&832));
    assert!(ram.highest_write().is_some_and(|addr| addr < 0x0013_0000));
}

#[test]
fn whole_map_totals_the_board_ram() {
    let ram = board_ram();
    let abort = AtomicBool::new(false);
    let mut blocks = 0;
    let mut progress = |_: u32, _: Coverage| blocks += 1;

    let result = verify(&ram, &Stepping::default(), &MEMORY_MAP, Coverage::Quick, &abort, &mut progress);

    assert_eq!(result, Ok(64 + 63 * 64));
    assert_eq!(blocks, 63);
}
