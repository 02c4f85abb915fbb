#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;

use kdisplay::CellBuffer;
use khal::ata;
use khal::idt::Idt;
use khal::pic::Irq;
use khal::sim::{Drive, SimBoard, SimMemory};
use seapig_firmware::boot::Machine;
use seapig_firmware::checkpoint::Checkpoint;
use seapig_firmware::memtest::Region;
use seapig_firmware::nvram::{NvramStore, SETTINGS_BASE, SettingsBlob, SettingsFlags};
use seapig_firmware::substrate::IrqEntryPoints;
use seapig_firmware::ui::ConsoleUi;
use seapig_firmware::{ActionUi, BootReport, Post, PostConfig, PostSelection, Substrate, SystemFacts, TickSource};
use spin::Once;

/// Set 1 make codes.
pub mod keys {
    pub const ESC: &[u8] = &[0x01];
    pub const ENTER: &[u8] = &[0x1C];
    pub const F1: &[u8] = &[0x3B];
    pub const F3: &[u8] = &[0x3D];
    pub const F10: &[u8] = &[0x44];
    pub const F1_RELEASE: &[u8] = &[0xBB];
    pub const DOWN: &[u8] = &[0xE0, 0x50];
    pub const LEFT: &[u8] = &[0xE0, 0x4B];
    pub const RIGHT: &[u8] = &[0xE0, 0x4D];
}

/// Two blocks: one below 640K, one above 1M.
pub static TINY_MAP: [Region; 2] = [
    Region {
        base: 0x0001_0000,
        blocks: 1,
    },
    Region {
        base: 0x0010_0000,
        blocks: 1,
    },
];
pub const TINY_MAP_KIB: u32 = 64 * 3;
pub const TINY_RAM_BYTES: usize = 0x0011_0000;

const ENTRY: IrqEntryPoints = IrqEntryPoints {
    timer: 0x000F_1000,
    keyboard: 0x000F_1040,
};

/// More ticks than any run needs. Reaching it means the firmware is waiting
/// on input the script never sends.
const RUNAWAY_TICKS: u32 = 100_000;

/// When a scripted byte may reach the controller.
#[derive(Debug, Clone, Copy)]
pub enum Gate {
    /// Once the tick counter reaches this value.
    Tick(u32),
    /// Once this checkpoint has been written to the POST port.
    After(Checkpoint),
}

/// Stands in for the interrupt controller: whenever the firmware idles with
/// interrupts enabled, deliver one timer tick and, if the keyboard line is
/// open, the next scripted scancode.
pub struct IrqPump<'a, 'h> {
    board: &'a SimBoard,
    substrate: &'a Substrate<'h, &'a SimBoard>,
    script: RefCell<VecDeque<(Gate, u8)>>,
    /// Number of POST codes already written when each tick fired.
    timer_fires: RefCell<Vec<usize>>,
}

impl<'a, 'h> IrqPump<'a, 'h> {
    pub fn new(board: &'a SimBoard, substrate: &'a Substrate<'h, &'a SimBoard>) -> Self {
        Self {
            board,
            substrate,
            script: RefCell::new(VecDeque::new()),
            timer_fires: RefCell::new(Vec::new()),
        }
    }

    pub fn script(&self, gate: Gate, bytes: &[u8]) {
        let mut script = self.script.borrow_mut();
        script.extend(bytes.iter().map(|&b| (gate, b)));
    }

    /// Ticks delivered before `checkpoint` was reported.
    pub fn ticks_before(&self, checkpoint: Checkpoint) -> usize {
        let codes = self.board.post_codes();
        let Some(at) = codes.iter().position(|&c| c == checkpoint.code()) else {
            return self.timer_fires.borrow().len();
        };
        self.timer_fires.borrow().iter().filter(|&&n| n <= at).count()
    }

    pub fn script_left(&self) -> usize {
        self.script.borrow().len()
    }

    fn gate_open(&self, gate: Gate) -> bool {
        match gate {
            Gate::Tick(tick) => self.substrate.ticks() >= tick,
            Gate::After(checkpoint) => self.board.post_codes().contains(&checkpoint.code()),
        }
    }

    fn feed(&self) {
        let mut script = self.script.borrow_mut();
        if let Some(&(gate, byte)) = script.front() {
            if self.gate_open(gate) {
                script.pop_front();
                self.board.press(&[byte]);
            }
        }
    }
}

impl TickSource for IrqPump<'_, '_> {
    fn now(&self) -> u32 {
        self.substrate.now()
    }

    fn relax(&self) {
        if !self.board.interrupts_enabled() {
            return;
        }
        let mask = self.board.pic_mask();
        if mask & Irq::TIMER.bits() == 0 {
            assert!(self.substrate.ticks() < RUNAWAY_TICKS, "clock ran away");
            self.timer_fires
                .borrow_mut()
                .push(self.board.post_codes().len());
            self.substrate.on_timer();
        }
        if self.board.kbc_pending() == 0 && !self.substrate.is_available() {
            self.feed();
        }
        if mask & Irq::KEYBOARD.bits() == 0 && self.board.kbc_pending() > 0 {
            self.substrate.on_keyboard();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiCall {
    Settings,
    Info,
}

/// Notes which screen POST asked for and returns at once.
#[derive(Default)]
pub struct RecordingUi {
    pub calls: Vec<(UiCall, SystemFacts)>,
}

impl<'b> ActionUi<&'b SimBoard> for RecordingUi {
    fn run_settings(&mut self, facts: &SystemFacts, _store: &mut NvramStore<&'b SimBoard>) {
        self.calls.push((UiCall::Settings, *facts));
    }

    fn show_info(&mut self, facts: &SystemFacts) {
        self.calls.push((UiCall::Info, *facts));
    }
}

/// Everything a POST run needs besides the firmware itself.
pub struct Rig {
    pub board: SimBoard,
    pub ram: SimMemory,
    pub cells: CellBuffer,
    pub selection: PostSelection,
    pub config: PostConfig,
}

impl Rig {
    /// A board with a drive attached, blank CMOS and RAM for [`TINY_MAP`].
    pub fn new() -> Self {
        let board = SimBoard::new();
        board.attach_drive(present_drive("QEMU HARDDISK"));
        Self {
            board,
            ram: SimMemory::new(TINY_RAM_BYTES),
            cells: CellBuffer::new(),
            selection: PostSelection::new(),
            config: PostConfig {
                memory_map: &TINY_MAP,
                ..PostConfig::default()
            },
        }
    }

    /// Store a valid settings blob with `flags` before POST runs.
    pub fn with_flags(self, flags: SettingsFlags) -> Self {
        let mut blob = SettingsBlob::zeroed();
        for flag in flags.iter() {
            blob.set_flag(flag, true);
        }
        blob.seal();
        self.board.load_cmos(SETTINGS_BASE, &blob.0);
        self
    }
}

/// How a run went, seen from outside the firmware.
pub struct Run {
    pub report: BootReport,
    pub ticks_before_alive: usize,
    pub unread_script: usize,
    pub ui_calls: Vec<(UiCall, SystemFacts)>,
}

fn leaked_table() -> &'static Once<Idt> {
    Box::leak(Box::new(Once::new()))
}

fn run(rig: &Rig, script: &[(Gate, &[u8])], console: bool) -> Run {
    let substrate = Substrate::new(&rig.board);
    let pump = IrqPump::new(&rig.board, &substrate);
    for &(gate, bytes) in script {
        pump.script(gate, bytes);
    }

    let machine = Machine {
        cpu: &rig.board,
        memory: &rig.ram,
        clock: &pump,
        display: &rig.cells,
    };
    let post = Post::new(&substrate, &rig.selection, machine, leaked_table(), ENTRY)
        .with_config(rig.config);
    let mut store = NvramStore::new(&rig.board);

    let mut console_ui = ConsoleUi::new(&substrate, &pump, &rig.cells);
    let mut recording = RecordingUi::default();
    let ui: &mut dyn ActionUi<&SimBoard> = if console {
        &mut console_ui
    } else {
        &mut recording
    };
    let report = post.run(&mut store, ui);

    Run {
        report,
        ticks_before_alive: pump.ticks_before(Checkpoint::InterruptsAlive),
        unread_script: pump.script_left(),
        ui_calls: recording.calls,
    }
}

/// Full POST with a UI that returns immediately.
pub fn boot(rig: &Rig, script: &[(Gate, &[u8])]) -> Run {
    run(rig, script, false)
}

/// Full POST where the settings and about screens read the scripted keys.
pub fn boot_interactive(rig: &Rig, script: &[(Gate, &[u8])]) -> Run {
    run(rig, script, true)
}

/// IDENTIFY data with `model` in words 27..=46, bytes swapped within each
/// word the way ATA stores strings.
pub fn identify_words(model: &str) -> Box<[u16; ata::IDENTIFY_WORDS]> {
    let mut words = Box::new([0u16; ata::IDENTIFY_WORDS]);
    words[0] = 0x0040;
    words[1] = 1024;
    words[3] = 16;
    words[6] = 63;
    let mut padded = [b' '; 40];
    padded[..model.len()].copy_from_slice(model.as_bytes());
    for (i, pair) in padded.chunks_exact(2).enumerate() {
        words[27 + i] = u16::from_be_bytes([pair[0], pair[1]]);
    }
    words
}

pub fn present_drive(model: &str) -> Drive {
    Drive::Present {
        identify: identify_words(model),
        busy_polls: 3,
    }
}
