//! Simulated M8SBC board for host-side tests.
//!
//! [`SimBoard`] answers port I/O for the devices POST talks to (PIC, PIT,
//! 8042, CMOS, primary IDE, POST card) and stands in for the CPU. Every byte
//! write and every CPU-level operation lands in one ordered event log, so
//! tests can assert on the exact sequence the firmware produced. Ports no
//! device claims behave as simple latches that read back 0xFF until written.
//!
//! [`SimMemory`] is word-addressed RAM with stuck-bit fault injection.

use std::boxed::Box;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::vec::Vec;

use crate::cpu::{Cpu, DescriptorTablePointer};
use crate::mem::MemoryBus;
use crate::port::{PortIo, POST_CODE_PORT};
use crate::{ata, cmos, keyboard, pic};

/// Something the firmware did to the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Out { port: u16, value: u8 },
    DisableInterrupts,
    EnableInterrupts,
    LoadIdt(DescriptorTablePointer),
    Halt,
}

/// What sits on the primary IDE channel.
#[derive(Debug, Clone)]
pub enum Drive {
    /// Nothing attached: the bus floats and every read returns all ones.
    Absent,
    /// A device whose BSY bit never clears.
    StuckBusy,
    /// Not busy, but IDENTIFY never raises DRQ.
    NeverReady,
    /// Answers IDENTIFY with `identify` after `busy_polls` busy status reads.
    Present {
        identify: Box<[u16; ata::IDENTIFY_WORDS]>,
        busy_polls: u32,
    },
}

#[derive(Debug, Default)]
struct PicState {
    /// 0 when idle, otherwise the ICW expected next on the data port.
    init_step: u8,
    vector_base: u8,
    mask: u8,
    eois: u32,
}

#[derive(Debug)]
struct IdeState {
    drive: Drive,
    busy_left: u32,
    data: VecDeque<u16>,
    identify_commands: u32,
}

pub struct SimBoard {
    events: RefCell<Vec<Event>>,
    latches: RefCell<HashMap<u16, u8>>,
    pic: RefCell<PicState>,
    kbc: RefCell<VecDeque<u8>>,
    cmos_index: Cell<u8>,
    cmos: RefCell<[u8; 256]>,
    cmos_writes: RefCell<Vec<(u8, u8)>>,
    ide: RefCell<IdeState>,
    interrupts_enabled: Cell<bool>,
    fpu: Cell<bool>,
    cyrix: Cell<bool>,
    signature: Cell<u16>,
}

impl SimBoard {
    /// A board with an Intel 486DX2 and FPU, empty CMOS, no drive, PIC in its
    /// power-on state (legacy base, all masked) and interrupts disabled.
    pub fn new() -> Self {
        Self {
            events: RefCell::new(Vec::new()),
            latches: RefCell::new(HashMap::new()),
            pic: RefCell::new(PicState {
                vector_base: pic::LEGACY_VECTOR_BASE,
                mask: pic::ALL_MASKED,
                ..PicState::default()
            }),
            kbc: RefCell::new(VecDeque::new()),
            cmos_index: Cell::new(0),
            cmos: RefCell::new([0; 256]),
            cmos_writes: RefCell::new(Vec::new()),
            ide: RefCell::new(IdeState {
                drive: Drive::Absent,
                busy_left: 0,
                data: VecDeque::new(),
                identify_commands: 0,
            }),
            interrupts_enabled: Cell::new(false),
            fpu: Cell::new(true),
            cyrix: Cell::new(false),
            signature: Cell::new(0x0435),
        }
    }

    // ── configuration ─────────────────────────────────────────────

    pub fn set_cpu(&self, signature: u16, cyrix: bool, fpu: bool) {
        self.signature.set(signature);
        self.cyrix.set(cyrix);
        self.fpu.set(fpu);
    }

    pub fn attach_drive(&self, drive: Drive) {
        let mut ide = self.ide.borrow_mut();
        ide.drive = drive;
        ide.busy_left = 0;
        ide.data.clear();
    }

    /// Queue bytes in the 8042 output buffer.
    pub fn press(&self, scancodes: &[u8]) {
        self.kbc.borrow_mut().extend(scancodes.iter().copied());
    }

    /// Set CMOS bytes without logging them as firmware writes.
    pub fn load_cmos(&self, index: u8, bytes: &[u8]) {
        let mut cmos = self.cmos.borrow_mut();
        for (i, &b) in bytes.iter().enumerate() {
            cmos[index as usize + i] = b;
        }
    }

    // ── inspection ────────────────────────────────────────────────

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    /// Index of the first logged event equal to `event`.
    pub fn position(&self, event: Event) -> Option<usize> {
        self.events.borrow().iter().position(|e| *e == event)
    }

    /// Bytes written to `port`, oldest first.
    pub fn port_writes(&self, port: u16) -> Vec<u8> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match *e {
                Event::Out { port: p, value } if p == port => Some(value),
                _ => None,
            })
            .collect()
    }

    /// Checkpoint codes seen by the POST card.
    pub fn post_codes(&self) -> Vec<u8> {
        self.port_writes(POST_CODE_PORT)
    }

    pub fn cmos(&self, index: u8) -> u8 {
        self.cmos.borrow()[index as usize]
    }

    /// `(index, value)` for every CMOS write the firmware made.
    pub fn cmos_writes(&self) -> Vec<(u8, u8)> {
        self.cmos_writes.borrow().clone()
    }

    pub fn pic_mask(&self) -> u8 {
        self.pic.borrow().mask
    }

    pub fn pic_vector_base(&self) -> u8 {
        self.pic.borrow().vector_base
    }

    pub fn pic_eois(&self) -> u32 {
        self.pic.borrow().eois
    }

    pub fn kbc_pending(&self) -> usize {
        self.kbc.borrow().len()
    }

    pub fn identify_commands(&self) -> u32 {
        self.ide.borrow().identify_commands
    }

    pub fn interrupts_enabled(&self) -> bool {
        self.interrupts_enabled.get()
    }

    // ── devices ───────────────────────────────────────────────────

    fn pic_write(&self, port: u16, value: u8) {
        let pic = &mut *self.pic.borrow_mut();
        match port {
            pic::PIC_COMMAND if value & 0x10 != 0 => pic.init_step = 2,
            pic::PIC_COMMAND if value == pic::EOI => pic.eois += 1,
            pic::PIC_COMMAND => {}
            _ => match pic.init_step {
                2 => {
                    pic.vector_base = value;
                    pic.init_step = 3;
                }
                3 => pic.init_step = 4,
                4 => pic.init_step = 0,
                _ => pic.mask = value,
            },
        }
    }

    fn ide_command(&self, value: u8) {
        let ide = &mut *self.ide.borrow_mut();
        if value != ata::CMD_IDENTIFY {
            return;
        }
        ide.identify_commands += 1;
        if let Drive::Present {
            identify,
            busy_polls,
        } = &ide.drive
        {
            let words: VecDeque<u16> = identify.iter().copied().collect();
            let busy = *busy_polls;
            ide.data = words;
            ide.busy_left = busy;
        }
    }

    fn ide_status(&self) -> u8 {
        let ide = &mut *self.ide.borrow_mut();
        match ide.drive {
            Drive::Absent => 0xFF,
            Drive::StuckBusy => ata::Status::BUSY.bits(),
            Drive::NeverReady => (ata::Status::READY | ata::Status::SEEK_COMPLETE).bits(),
            Drive::Present { .. } if ide.busy_left > 0 => {
                ide.busy_left -= 1;
                ata::Status::BUSY.bits()
            }
            Drive::Present { .. } if !ide.data.is_empty() => {
                (ata::Status::READY | ata::Status::SEEK_COMPLETE | ata::Status::DATA_REQUEST)
                    .bits()
            }
            Drive::Present { .. } => (ata::Status::READY | ata::Status::SEEK_COMPLETE).bits(),
        }
    }

    fn ide_data(&self) -> u16 {
        let ide = &mut *self.ide.borrow_mut();
        match ide.drive {
            Drive::Absent => 0xFFFF,
            _ => ide.data.pop_front().unwrap_or(0),
        }
    }
}

impl Default for SimBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl PortIo for SimBoard {
    fn inb(&self, port: u16) -> u8 {
        match port {
            pic::PIC_DATA => self.pic.borrow().mask,
            pic::PIC_COMMAND => 0,
            keyboard::PS2_STATUS => {
                if self.kbc.borrow().is_empty() {
                    0
                } else {
                    keyboard::STATUS_OUTPUT_FULL
                }
            }
            keyboard::PS2_DATA => self.kbc.borrow_mut().pop_front().unwrap_or(0),
            cmos::CMOS_DATA => self.cmos.borrow()[self.cmos_index.get() as usize],
            ata::STATUS | ata::DEVICE_CONTROL => self.ide_status(),
            POST_CODE_PORT => 0xFF,
            _ => self.latches.borrow().get(&port).copied().unwrap_or(0xFF),
        }
    }

    fn outb(&self, port: u16, value: u8) {
        self.events.borrow_mut().push(Event::Out { port, value });
        match port {
            pic::PIC_COMMAND | pic::PIC_DATA => self.pic_write(port, value),
            cmos::CMOS_INDEX => self.cmos_index.set(value),
            cmos::CMOS_DATA => {
                let index = self.cmos_index.get();
                self.cmos.borrow_mut()[index as usize] = value;
                self.cmos_writes.borrow_mut().push((index, value));
            }
            ata::COMMAND => self.ide_command(value),
            _ => {
                self.latches.borrow_mut().insert(port, value);
            }
        }
    }

    fn inw(&self, port: u16) -> u16 {
        match port {
            ata::DATA => self.ide_data(),
            _ => 0xFFFF,
        }
    }

    fn outw(&self, _port: u16, _value: u16) {}
}

impl Cpu for SimBoard {
    fn disable_interrupts(&self) {
        self.interrupts_enabled.set(false);
        self.events.borrow_mut().push(Event::DisableInterrupts);
    }

    fn enable_interrupts(&self) {
        self.interrupts_enabled.set(true);
        self.events.borrow_mut().push(Event::EnableInterrupts);
    }

    fn load_idt(&self, table: DescriptorTablePointer) {
        self.events.borrow_mut().push(Event::LoadIdt(table));
    }

    fn fpu_present(&self) -> bool {
        self.fpu.get()
    }

    fn is_cyrix(&self) -> bool {
        self.cyrix.get()
    }

    fn reset_signature(&self) -> u16 {
        self.signature.get()
    }

    fn halt_forever(&self) -> ! {
        self.events.borrow_mut().push(Event::Halt);
        panic!("machine halted");
    }
}

/// Word-addressed RAM starting at physical address 0.
pub struct SimMemory {
    words: RefCell<Vec<u32>>,
    stuck: Cell<Option<(u32, u32)>>,
    writes: Cell<u64>,
    flushes: Cell<u32>,
    highest_write: Cell<Option<u32>>,
}

impl SimMemory {
    pub fn new(bytes: usize) -> Self {
        Self {
            words: RefCell::new(std::vec![0; bytes / 4]),
            stuck: Cell::new(None),
            writes: Cell::new(0),
            flushes: Cell::new(0),
            highest_write: Cell::new(None),
        }
    }

    /// Make the bits in `mask` read as zero at `addr`.
    pub fn stick_low(&self, addr: u32, mask: u32) {
        self.stuck.set(Some((addr, mask)));
    }

    /// Current contents without counting as a firmware access.
    pub fn peek(&self, addr: u32) -> u32 {
        self.words.borrow()[addr as usize / 4]
    }

    pub fn writes(&self) -> u64 {
        self.writes.get()
    }

    pub fn flushes(&self) -> u32 {
        self.flushes.get()
    }

    pub fn highest_write(&self) -> Option<u32> {
        self.highest_write.get()
    }
}

impl MemoryBus for SimMemory {
    fn read_u32(&self, addr: u32) -> u32 {
        let value = self.words.borrow()[addr as usize / 4];
        match self.stuck.get() {
            Some((at, mask)) if at == addr => value & !mask,
            _ => value,
        }
    }

    fn write_u32(&self, addr: u32, value: u32) {
        self.words.borrow_mut()[addr as usize / 4] = value;
        self.writes.set(self.writes.get() + 1);
        let highest = self.highest_write.get().map_or(addr, |h| h.max(addr));
        self.highest_write.set(Some(highest));
    }

    fn flush_cache(&self) {
        self.flushes.set(self.flushes.get() + 1);
    }
}
