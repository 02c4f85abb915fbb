//! The power-on self test sequence.
//!
//! [`Post::run`] walks the board from "interrupts off, nothing configured"
//! to "ready for the next boot stage". The steps and their order are fixed:
//!
//! ```text
//!   cli ─► vectors ─► CMOS + CPU ─► PIT + keyboard ─► sti, wait for ticks
//!       ─► hook on ─► splash + status ─► memory ─► IDE ─► hook off
//!       ─► settings / about / nothing ─► settle ─► lock CMOS? ─► legacy PIC
//! ```
//!
//! A checkpoint code goes to the POST port after each stage. The only way
//! out other than returning is a memory fault, which halts the machine.

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use kdisplay::{TextDisplay, attr};
use khal::idt::Idt;
use khal::keyboard::{KeyCode, KeyDecoder};
use khal::pic::Irq;
use khal::{Cpu, MemoryBus, PortIo};
use spin::{Mutex, Once};

use crate::checkpoint::{self, Checkpoint};
use crate::cpuid::CpuModel;
use crate::ide::{IdeProbe, ModelName};
use crate::input::{InputHook, ScancodeRing};
use crate::memtest::{self, Coverage, MEMORY_MAP, Region};
use crate::nvram::{Checksum, NvramStore, SettingsFlags};
use crate::screen::PostScreen;
use crate::substrate::{IrqEntryPoints, Substrate};
use crate::time::{Stopwatch, TickSource};

/// Timer rate while POST runs.
pub const PIT_HZ: u32 = 100;
/// Ticks that must arrive after `sti` before POST trusts the interrupt path.
pub const LIVENESS_TICKS: u32 = 3;
/// Settle time after the settings or about screen closes.
pub const SHORT_SETTLE_TICKS: u32 = 10;
/// Settle time on a normal boot, long enough to read the status screen.
pub const BOOT_SETTLE_TICKS: u32 = 100;

/// Tunables for one POST run. `Default` is what the board uses.
#[derive(Debug, Clone, Copy)]
pub struct PostConfig {
    pub timer_hz: u32,
    pub liveness_ticks: u32,
    pub short_settle_ticks: u32,
    pub boot_settle_ticks: u32,
    pub memory_map: &'static [Region],
}

impl Default for PostConfig {
    fn default() -> Self {
        Self {
            timer_hz: PIT_HZ,
            liveness_ticks: LIVENESS_TICKS,
            short_settle_ticks: SHORT_SETTLE_TICKS,
            boot_settle_ticks: BOOT_SETTLE_TICKS,
            memory_map: &MEMORY_MAP,
        }
    }
}

/// What happens after the hardware checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BootAction {
    Normal = 0,
    OpenSettings = 1,
    ShowInfo = 2,
}

impl BootAction {
    const fn from_raw(raw: u8) -> Self {
        match raw {
            1 => BootAction::OpenSettings,
            2 => BootAction::ShowInfo,
            _ => BootAction::Normal,
        }
    }
}

/// The operator's keyboard input during POST.
///
/// Installed as the substrate's input hook while the checks run. ESC asks
/// the memory test to stop; F1 and F3 choose the settings and about screens
/// and only the first choice counts.
pub struct PostSelection {
    action: AtomicU8,
    abort_memtest: AtomicBool,
    decoder: Mutex<KeyDecoder>,
}

impl PostSelection {
    pub fn new() -> Self {
        Self {
            action: AtomicU8::new(BootAction::Normal as u8),
            abort_memtest: AtomicBool::new(false),
            decoder: Mutex::new(KeyDecoder::new()),
        }
    }

    pub fn reset(&self) {
        self.action.store(BootAction::Normal as u8, Ordering::Release);
        self.abort_memtest.store(false, Ordering::Release);
    }

    pub fn action(&self) -> BootAction {
        BootAction::from_raw(self.action.load(Ordering::Acquire))
    }

    /// Overrides whatever the operator picked.
    pub fn force(&self, action: BootAction) {
        self.action.store(action as u8, Ordering::Release);
    }

    pub fn abort_flag(&self) -> &AtomicBool {
        &self.abort_memtest
    }

    fn choose(&self, action: BootAction) {
        let _ = self.action.compare_exchange(
            BootAction::Normal as u8,
            action as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    fn on_key(&self, key: KeyCode) {
        match key {
            KeyCode::Escape => self.abort_memtest.store(true, Ordering::Release),
            KeyCode::F1 => self.choose(BootAction::OpenSettings),
            KeyCode::F3 => self.choose(BootAction::ShowInfo),
            // F2 is reserved for a system test screen.
            _ => {}
        }
    }
}

impl Default for PostSelection {
    fn default() -> Self {
        Self::new()
    }
}

impl InputHook for PostSelection {
    fn on_input(&self, scancodes: &ScancodeRing) {
        let Some(mut decoder) = self.decoder.try_lock() else {
            return;
        };
        while let Some(scancode) = scancodes.pop() {
            if let Some(key) = decoder.key_down(scancode) {
                self.on_key(key);
            }
        }
    }
}

/// What POST learned about the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemFacts {
    pub cpu: CpuModel,
    pub fpu_present: bool,
    pub memory_kib: u32,
    pub drive: Option<ModelName>,
}

/// The interactive screens POST can hand control to. Both block until the
/// operator leaves them.
pub trait ActionUi<P> {
    fn run_settings(&mut self, facts: &SystemFacts, store: &mut NvramStore<P>);
    fn show_info(&mut self, facts: &SystemFacts);
}

/// How a POST run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootReport {
    pub action: BootAction,
    pub facts: SystemFacts,
    pub checksum: Checksum,
    pub nvram_locked: bool,
}

/// CPU-side capabilities POST runs on.
#[derive(Clone, Copy)]
pub struct Machine<'a> {
    pub cpu: &'a dyn Cpu,
    pub memory: &'a dyn MemoryBus,
    pub clock: &'a dyn TickSource,
    pub display: &'a dyn TextDisplay,
}

pub struct Post<'a, 'h, P> {
    substrate: &'a Substrate<'h, P>,
    selection: &'h PostSelection,
    machine: Machine<'a>,
    table: &'static Once<Idt>,
    entry: IrqEntryPoints,
    config: PostConfig,
}

impl<'a, 'h, P: PortIo> Post<'a, 'h, P> {
    pub fn new(
        substrate: &'a Substrate<'h, P>,
        selection: &'h PostSelection,
        machine: Machine<'a>,
        table: &'static Once<Idt>,
        entry: IrqEntryPoints,
    ) -> Self {
        Self {
            substrate,
            selection,
            machine,
            table,
            entry,
            config: PostConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PostConfig) -> Self {
        self.config = config;
        self
    }

    fn checkpoint(&self, checkpoint: Checkpoint) {
        checkpoint::emit(self.substrate.io(), checkpoint);
    }

    /// Redraw the selection line if the operator changed it since `shown`.
    fn refresh_selection(&self, screen: &PostScreen, shown: &mut BootAction) {
        let current = self.selection.action();
        if current != *shown {
            screen.selection(current);
            *shown = current;
        }
    }

    /// Run the whole sequence. Returns with interrupts disabled, the PIC at
    /// its legacy base with every line masked and the real-mode vector table
    /// loaded.
    pub fn run<Q: PortIo>(&self, store: &mut NvramStore<Q>, ui: &mut dyn ActionUi<Q>) -> BootReport {
        let Machine {
            cpu,
            memory,
            clock,
            display,
        } = self.machine;
        let substrate = self.substrate;
        let config = &self.config;
        let screen = PostScreen::new(display);

        cpu.disable_interrupts();
        self.checkpoint(Checkpoint::Entry);

        substrate.initialize(cpu, self.table, self.entry);
        self.checkpoint(Checkpoint::VectorsReady);

        let checksum = store.load();
        let fpu_present = cpu.fpu_present();
        let model = CpuModel::new(cpu.reset_signature(), cpu.is_cyrix());
        log::info!("[post] cpu: {:#}, fpu: {}", model, fpu_present);
        self.checkpoint(Checkpoint::CpuIdentified);

        substrate.set_timer_frequency(config.timer_hz);
        substrate.clear();
        self.checkpoint(Checkpoint::KeyboardCleared);

        substrate.unmask_all();
        cpu.enable_interrupts();
        Stopwatch::start(clock).wait_past(clock, config.liveness_ticks);
        self.checkpoint(Checkpoint::InterruptsAlive);

        self.selection.reset();
        substrate.register_hook(Some(self.selection));
        cpu.disable_interrupts();

        screen.draw_splash();
        self.checkpoint(Checkpoint::SplashDrawn);
        screen.draw_status(&model, fpu_present);
        if checksum == Checksum::Repaired {
            screen.cmos_repaired();
        }
        cpu.enable_interrupts();
        self.checkpoint(Checkpoint::StatusDrawn);

        let coverage = if store.get(SettingsFlags::QUICK_MEMTEST) {
            Coverage::Quick
        } else {
            Coverage::Full
        };
        let mut shown = BootAction::Normal;
        let mut on_block = |total: u32, coverage: Coverage| {
            screen.memory_progress(total, coverage);
            self.refresh_selection(&screen, &mut shown);
        };
        let verified = memtest::verify(
            memory,
            clock,
            config.memory_map,
            coverage,
            self.selection.abort_flag(),
            &mut on_block,
        );
        let memory_kib = match verified {
            Ok(kib) => kib,
            Err(fault) => {
                log::error!("[post] {}", fault);
                screen.memory_error();
                cpu.disable_interrupts();
                cpu.halt_forever();
            }
        };
        self.checkpoint(Checkpoint::MemoryVerified);

        screen.ide_detecting();
        let probe = IdeProbe::new(substrate.io(), clock);
        let drive = probe.discover(&mut |elapsed| {
            screen.ide_elapsed(elapsed, config.timer_hz);
            self.refresh_selection(&screen, &mut shown);
        });
        screen.ide_result(drive.as_ref());
        self.refresh_selection(&screen, &mut shown);
        self.checkpoint(Checkpoint::StorageProbed);

        substrate.register_hook(None);
        if drive.is_none() {
            log::warn!("[post] no boot drive, opening settings");
            self.selection.force(BootAction::OpenSettings);
        }
        let action = self.selection.action();

        let facts = SystemFacts {
            cpu: model,
            fpu_present,
            memory_kib,
            drive,
        };

        let settle = Stopwatch::start(clock);
        let settle_ticks = match action {
            BootAction::ShowInfo => {
                ui.show_info(&facts);
                config.short_settle_ticks
            }
            BootAction::OpenSettings => {
                ui.run_settings(&facts, store);
                config.short_settle_ticks
            }
            BootAction::Normal => config.boot_settle_ticks,
        };
        settle.wait_past(clock, settle_ticks);
        self.checkpoint(Checkpoint::ActionDispatched);

        let nvram_locked = store.get(SettingsFlags::LOCK_NVRAM);
        if nvram_locked {
            substrate.masked(Irq::all(), || store.lock());
        }

        cpu.disable_interrupts();
        substrate.restore_legacy_vector_table(cpu);
        substrate.mask_all();
        self.checkpoint(Checkpoint::Handoff);
        display.clear(attr::NORMAL);

        log::info!("[post] handoff after {:?}, {} KB", action, memory_kib);
        BootReport {
            action,
            facts,
            checksum,
            nvram_locked,
        }
    }
}
