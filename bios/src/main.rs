// =============================================================================
// SeaPig BIOS - ROM Entry Point
// =============================================================================
//
// The first Rust code that runs after power-on.
//
// WHAT HAPPENED BEFORE WE GOT HERE:
//   1. The 486 came out of reset in real mode at F000:FFF0
//   2. The ROM stub sized the first 64 KiB of RAM and saved the reset
//      signature from DX at 0x5F0
//   3. The stub loaded a flat GDT, entered 32-bit protected mode, copied this
//      image to 0x1000 and called post_main() (layout in linker.ld)
//
// WHAT WE DO HERE:
//   - Bind the real board (port I/O, VGA text memory, the CPU, physical RAM)
//     to the POST core in `seapig_firmware`
//   - Provide the IRQ0/IRQ1 trampolines the vector table points at
//   - Route `log` output to COM1
//   - Return to the stub, which switches back to real mode and boots
//
// =============================================================================

#![no_std]
#![no_main]
#![feature(abi_x86_interrupt)]

use core::panic::PanicInfo;

use kdisplay::{VGA_TEXT_BASE, VgaText};
use khal::cpu::I486;
use khal::idt::Idt;
use khal::mem::PhysMemory;
use khal::pic;
use khal::port::Pio;
use khal::{Cpu, Serial};
use log::LevelFilter;
use seapig_firmware::boot::Machine;
use seapig_firmware::nvram::NvramStore;
use seapig_firmware::substrate::IrqEntryPoints;
use seapig_firmware::ui::ConsoleUi;
use seapig_firmware::{Post, PostSelection, Substrate};
use spin::{Mutex, Once};

// =============================================================================
// Shared state
// =============================================================================
//
// Everything both the ISRs and the POST sequence touch. The substrate is
// built at compile time so the trampolines never see it uninitialized.
// =============================================================================

static SUBSTRATE: Substrate<'static, Pio> = Substrate::new(unsafe { Pio::new() });
static SELECTION: Once<PostSelection> = Once::new();
static IDT: Once<Idt> = Once::new();

// =============================================================================
// Serial log sink
// =============================================================================

struct Com1(Mutex<Serial<Pio>>);

impl klog::Sink for Com1 {
    fn write_str(&self, s: &str) {
        self.0.lock().write_str(s);
    }
}

static COM1: Com1 = Com1(Mutex::new(Serial::new(unsafe { Pio::new() })));

// =============================================================================
// Interrupt trampolines
// =============================================================================

/// What the CPU pushes for an interrupt taken at the same privilege level.
#[allow(dead_code)]
#[repr(C)]
struct InterruptStackFrame {
    eip: u32,
    cs: u32,
    eflags: u32,
}

extern "x86-interrupt" fn timer_isr(_frame: InterruptStackFrame) {
    SUBSTRATE.on_timer();
    pic::eoi(SUBSTRATE.io());
}

extern "x86-interrupt" fn keyboard_isr(_frame: InterruptStackFrame) {
    SUBSTRATE.on_keyboard();
    pic::eoi(SUBSTRATE.io());
}

// =============================================================================
// POST entry
// =============================================================================

/// Called by the ROM stub in 32-bit protected mode with interrupts off.
/// Returns with the real-mode vector table loaded and the PIC back at its
/// legacy base.
#[unsafe(no_mangle)]
#[unsafe(link_section = ".text.post_main")]
pub extern "C" fn post_main() {
    if COM1.0.lock().init() {
        klog::init(&COM1, LevelFilter::Info);
    }
    log::info!("SeaPig BIOS {}", seapig_firmware::VERSION);

    // SAFETY: POST is the only code running; paging is off and the stub
    // keeps its stack and this image below the first tested block.
    let (cpu, memory, vga) = unsafe { (I486::new(), PhysMemory::new(), VgaText::new(VGA_TEXT_BASE)) };

    let machine = Machine {
        cpu: &cpu,
        memory: &memory,
        clock: &SUBSTRATE,
        display: &vga,
    };
    let entry = IrqEntryPoints {
        timer: timer_isr as usize as u32,
        keyboard: keyboard_isr as usize as u32,
    };
    let selection = SELECTION.call_once(PostSelection::new);

    let mut store = NvramStore::new(unsafe { Pio::new() });
    let mut ui = ConsoleUi::new(&SUBSTRATE, &SUBSTRATE, &vga);
    let report = Post::new(&SUBSTRATE, selection, machine, &IDT, entry).run(&mut store, &mut ui);

    log::info!(
        "[bios] handing off: {:?}, {} KB, cmos {:?}",
        report.action,
        report.facts.memory_kib,
        report.checksum
    );
}

// =============================================================================
// Panic handler
// =============================================================================
//
// A panic during POST is fatal. Report it on COM1 if a sink is installed,
// then stop the CPU with interrupts off.
// =============================================================================

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    klog::println!("==========================================================");
    klog::println!("  POST PANIC");
    if let Some(location) = info.location() {
        klog::println!("  Location: {}:{}", location.file(), location.line());
    }
    klog::println!("  Message: {}", info.message());
    klog::println!("==========================================================");

    // SAFETY: nothing else runs once we are here.
    unsafe { I486::new() }.halt_forever()
}
