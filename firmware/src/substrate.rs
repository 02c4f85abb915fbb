//! Timer tick and keyboard substrate.
//!
//! [`Substrate`] owns the state both interrupt handlers touch: the tick
//! counter, the scancode ring, the registered input hook and a shadow of the
//! PIC mask register. The ISR trampolines call [`Substrate::on_timer`] and
//! [`Substrate::on_keyboard`] and send the EOI themselves; the foreground
//! uses the rest.
//!
//! Exactly two interrupt sources exist while POST runs, IRQ0 (PIT) and IRQ1
//! (8042). Every other vector in the table is left not present.

use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use khal::cpu::DescriptorTablePointer;
use khal::idt::{CODE_SELECTOR, Idt};
use khal::pic::{self, Irq};
use khal::{Cpu, PortIo, keyboard, pit};
use spin::{Mutex, Once};

use crate::input::{InputHook, ScancodeRing};
use crate::time::TickSource;

/// Linear addresses of the two ISR trampolines.
#[derive(Debug, Clone, Copy)]
pub struct IrqEntryPoints {
    pub timer: u32,
    pub keyboard: u32,
}

pub struct Substrate<'h, P> {
    io: P,
    ticks: AtomicU32,
    scancodes: ScancodeRing,
    hook: Mutex<Option<&'h dyn InputHook>>,
    /// Last value written to the PIC mask register.
    mask: AtomicU8,
}

impl<'h, P: PortIo> Substrate<'h, P> {
    pub const fn new(io: P) -> Self {
        Self {
            io,
            ticks: AtomicU32::new(0),
            scancodes: ScancodeRing::new(),
            hook: Mutex::new(None),
            mask: AtomicU8::new(pic::ALL_MASKED),
        }
    }

    pub fn io(&self) -> &P {
        &self.io
    }

    // ── setup ─────────────────────────────────────────────────────

    /// Build and load the interrupt table and move the PIC to
    /// [`pic::VECTOR_BASE`] with every line masked.
    ///
    /// Interrupts must be disabled. The table is built on the first call
    /// only; later calls reload the same one.
    pub fn initialize(&self, cpu: &dyn Cpu, table: &'static Once<Idt>, entry: IrqEntryPoints) {
        let idt = table.call_once(|| {
            let mut idt = Idt::new();
            idt.set_handler(Irq::TIMER.vector(), entry.timer, CODE_SELECTOR);
            idt.set_handler(Irq::KEYBOARD.vector(), entry.keyboard, CODE_SELECTOR);
            idt
        });

        pic::remap(&self.io, pic::VECTOR_BASE);
        self.mask.store(pic::ALL_MASKED, Ordering::Release);
        cpu.load_idt(idt.pointer());
        log::debug!(
            "[irq] table loaded, timer vector {:#04x}, keyboard vector {:#04x}",
            Irq::TIMER.vector(),
            Irq::KEYBOARD.vector()
        );
    }

    /// Program PIT channel 0. `hz` is not validated.
    pub fn set_timer_frequency(&self, hz: u32) {
        pit::set_frequency(&self.io, hz);
        log::debug!("[irq] timer at {} Hz (divisor {})", hz, pit::divisor(hz));
    }

    /// Put the PIC back at [`pic::LEGACY_VECTOR_BASE`] and load the real-mode
    /// vector table descriptor. Nothing in this crate can undo it.
    pub fn restore_legacy_vector_table(&self, cpu: &dyn Cpu) {
        pic::remap(&self.io, pic::LEGACY_VECTOR_BASE);
        self.mask.store(pic::ALL_MASKED, Ordering::Release);
        cpu.load_idt(DescriptorTablePointer::REAL_MODE_IVT);
    }

    // ── masking ───────────────────────────────────────────────────

    fn write_mask(&self, mask: u8) {
        self.mask.store(mask, Ordering::Release);
        pic::set_mask(&self.io, mask);
    }

    /// Current PIC mask as last written.
    pub fn mask_bits(&self) -> u8 {
        self.mask.load(Ordering::Acquire)
    }

    pub fn unmask(&self, irq: Irq) {
        self.write_mask(self.mask_bits() & !irq.bits());
    }

    pub fn mask(&self, irq: Irq) {
        self.write_mask(self.mask_bits() | irq.bits());
    }

    /// Unmask both handled sources.
    pub fn unmask_all(&self) {
        self.unmask(Irq::all());
    }

    /// Mask all eight lines.
    pub fn mask_all(&self) {
        self.write_mask(pic::ALL_MASKED);
    }

    /// Run `f` with `irq` masked, then put the previous mask back.
    pub fn masked<R>(&self, irq: Irq, f: impl FnOnce() -> R) -> R {
        let saved = self.mask_bits();
        self.write_mask(saved | irq.bits());
        let result = f();
        self.write_mask(saved);
        result
    }

    // ── interrupt side ────────────────────────────────────────────

    /// IRQ0 occurrence.
    #[inline]
    pub fn on_timer(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// IRQ1 occurrence: move everything the controller holds into the ring,
    /// then run the hook once.
    pub fn on_keyboard(&self) {
        while keyboard::has_data(&self.io) {
            self.scancodes.push(keyboard::read_data(&self.io));
        }

        // The slot is only written with IRQ1 masked, so the lock is free
        // whenever this runs. Give up rather than spin if it is not.
        let hook = self.hook.try_lock().and_then(|slot| *slot);
        if let Some(hook) = hook {
            hook.on_input(&self.scancodes);
        }
    }

    // ── foreground side ───────────────────────────────────────────

    pub fn ticks(&self) -> u32 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn is_available(&self) -> bool {
        !self.scancodes.is_empty()
    }

    /// Next buffered scancode, or 0 when there is none.
    pub fn pop_scancode(&self) -> u8 {
        self.pop().unwrap_or(0)
    }

    pub fn pop(&self) -> Option<u8> {
        self.scancodes.pop()
    }

    /// Throw away buffered scancodes and anything still in the controller.
    pub fn clear(&self) {
        self.masked(Irq::KEYBOARD, || {
            self.scancodes.reset();
            keyboard::drain(&self.io);
        });
    }

    /// Replace the input hook. `None` unregisters.
    pub fn register_hook(&self, hook: Option<&'h dyn InputHook>) {
        self.masked(Irq::KEYBOARD, || {
            *self.hook.lock() = hook;
        });
    }
}

impl<P: PortIo> TickSource for Substrate<'_, P> {
    #[inline]
    fn now(&self) -> u32 {
        self.ticks()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use khal::sim::{Event, SimBoard};
    use std::boxed::Box;
    use std::vec::Vec;

    struct Collect(Mutex<Vec<u8>>);

    impl InputHook for Collect {
        fn on_input(&self, scancodes: &ScancodeRing) {
            while let Some(b) = scancodes.pop() {
                self.0.lock().push(b);
            }
        }
    }

    fn table() -> &'static Once<Idt> {
        Box::leak(Box::new(Once::new()))
    }

    const ENTRY: IrqEntryPoints = IrqEntryPoints {
        timer: 0x000F_1000,
        keyboard: 0x000F_1040,
    };

    #[test]
    fn initialize_installs_two_gates_and_masks_everything() {
        let board = SimBoard::new();
        let substrate = Substrate::new(&board);
        let table = table();
        substrate.initialize(&board, table, ENTRY);

        let idt = table.get().unwrap();
        assert_eq!(idt.entry(0x20).handler(), ENTRY.timer);
        assert_eq!(idt.entry(0x21).handler(), ENTRY.keyboard);
        assert_eq!(idt.entry(0x21).selector(), 0x08);
        assert_eq!(idt.entry(0x20).type_attr(), 0x8E);
        let present = (0..64u8).filter(|&v| idt.entry(v).is_present()).count();
        assert_eq!(present, 2);

        assert_eq!(board.pic_vector_base(), 0x20);
        assert_eq!(board.pic_mask(), 0xFF);
        assert_eq!(board.pic_eois(), 1);
        assert_eq!(board.port_writes(0x20), [0x11, 0x20]);
        assert_eq!(board.port_writes(0x21), [0x20, 0x00, 0x01, 0xFF]);
        assert!(board.position(Event::LoadIdt(idt.pointer())).is_some());
    }

    #[test]
    fn timer_programming_sends_mode_then_divisor() {
        let board = SimBoard::new();
        let substrate = Substrate::new(&board);
        substrate.set_timer_frequency(100);
        assert_eq!(board.port_writes(0x43), [0x36]);
        assert_eq!(board.port_writes(0x40), [0x9B, 0x2E]);
    }

    #[test]
    fn masking_tracks_the_shadow() {
        let board = SimBoard::new();
        let substrate = Substrate::new(&board);
        substrate.unmask_all();
        assert_eq!(board.pic_mask(), 0xFC);
        substrate.mask(Irq::TIMER);
        assert_eq!(board.pic_mask(), 0xFD);

        let inside = substrate.masked(Irq::all(), || board.pic_mask());
        assert_eq!(inside, 0xFF);
        assert_eq!(board.pic_mask(), 0xFD);

        substrate.mask_all();
        assert_eq!(board.pic_mask(), 0xFF);
    }

    #[test]
    fn keyboard_occurrence_drains_controller_then_calls_hook() {
        let board = SimBoard::new();
        let hook = Collect(Mutex::new(Vec::new()));
        let substrate = Substrate::new(&board);

        board.press(&[0x1E, 0x9E]);
        substrate.on_keyboard();
        assert_eq!(board.kbc_pending(), 0);
        assert_eq!(substrate.pop(), Some(0x1E));
        assert_eq!(substrate.pop_scancode(), 0x9E);
        assert_eq!(substrate.pop_scancode(), 0);

        substrate.register_hook(Some(&hook));
        board.press(&[0x01, 0x81]);
        substrate.on_keyboard();
        assert_eq!(*hook.0.lock(), [0x01, 0x81]);
        assert!(!substrate.is_available());

        substrate.register_hook(None);
        board.press(&[0x3B]);
        substrate.on_keyboard();
        assert_eq!(hook.0.lock().len(), 2);
        assert!(substrate.is_available());
    }

    #[test]
    fn hook_registration_happens_with_keyboard_masked() {
        let board = SimBoard::new();
        let hook = Collect(Mutex::new(Vec::new()));
        let substrate = Substrate::new(&board);
        substrate.unmask_all();
        substrate.register_hook(Some(&hook));
        assert_eq!(board.port_writes(0x21), [0xFC, 0xFE, 0xFC]);
    }

    #[test]
    fn clear_drops_ring_and_controller_bytes() {
        let board = SimBoard::new();
        let substrate = Substrate::new(&board);
        board.press(&[0x10, 0x11]);
        substrate.on_keyboard();
        board.press(&[0x12]);

        substrate.clear();
        assert!(!substrate.is_available());
        assert_eq!(board.kbc_pending(), 0);
    }

    #[test]
    fn ticks_wrap() {
        let board = SimBoard::new();
        let substrate = Substrate::new(&board);
        substrate.ticks.store(u32::MAX, Ordering::Relaxed);
        substrate.on_timer();
        assert_eq!(substrate.now(), 0);
    }

    #[test]
    fn legacy_restore_remaps_and_loads_real_mode_table() {
        let board = SimBoard::new();
        let substrate = Substrate::new(&board);
        substrate.initialize(&board, table(), ENTRY);
        substrate.unmask_all();
        substrate.restore_legacy_vector_table(&board);

        assert_eq!(board.pic_vector_base(), 0x08);
        assert_eq!(board.pic_mask(), 0xFF);
        assert_eq!(substrate.mask_bits(), 0xFF);
        assert_eq!(
            board.events().last(),
            Some(&Event::LoadIdt(DescriptorTablePointer::REAL_MODE_IVT))
        );
    }
}
