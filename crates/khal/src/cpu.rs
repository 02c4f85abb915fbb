//! CPU-level operations POST needs besides port I/O.
//!
//! [`Cpu`] is the seam between the boot sequence and privileged
//! instructions. [`I486`] is the implementation for the board; the host
//! test suite uses [`crate::sim::SimBoard`].

/// Operand of `lidt`: limit and linear base of a vector table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorTablePointer {
    pub limit: u16,
    pub base: usize,
}

impl DescriptorTablePointer {
    /// The real-mode interrupt vector table: 256 far pointers at address 0.
    pub const REAL_MODE_IVT: Self = Self {
        limit: 0x3FF,
        base: 0,
    };
}

/// Linear address where the reset stub stores DX as it was at reset. DX holds
/// the CPU signature (family/model/stepping) on every 486.
pub const RESET_SIGNATURE_ADDR: usize = 0x5F0;

pub trait Cpu {
    /// `cli`
    fn disable_interrupts(&self);
    /// `sti`
    fn enable_interrupts(&self);
    /// `lidt`
    fn load_idt(&self, table: DescriptorTablePointer);

    /// Whether an x87 answers FNINIT/FNSTSW/FNSTCW.
    fn fpu_present(&self) -> bool;
    /// Cyrix parts leave the flags alone across DIV; Intel and AMD do not.
    fn is_cyrix(&self) -> bool;
    /// Low 16 bits of DX at reset.
    fn reset_signature(&self) -> u16;

    /// Stop the machine for good.
    fn halt_forever(&self) -> !;
}

/// The board's i486-class processor.
#[cfg(target_arch = "x86")]
#[derive(Debug)]
pub struct I486 {
    _private: (),
}

#[cfg(target_arch = "x86")]
impl I486 {
    /// # Safety
    ///
    /// Must run in ring 0 in 32-bit protected mode.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

#[cfg(target_arch = "x86")]
#[repr(C, packed)]
struct IdtPointer {
    limit: u16,
    base: u32,
}

#[cfg(target_arch = "x86")]
impl Cpu for I486 {
    #[inline]
    fn disable_interrupts(&self) {
        unsafe { core::arch::asm!("cli", options(nomem, nostack)) }
    }

    #[inline]
    fn enable_interrupts(&self) {
        unsafe { core::arch::asm!("sti", options(nomem, nostack)) }
    }

    fn load_idt(&self, table: DescriptorTablePointer) {
        let ptr = IdtPointer {
            limit: table.limit,
            base: table.base as u32,
        };
        unsafe {
            core::arch::asm!(
                "lidt [{}]",
                in(reg) &ptr,
                options(readonly, nostack, preserves_flags)
            );
        }
    }

    fn fpu_present(&self) -> bool {
        let mut status: u16 = 0xFFFF;
        let mut control: u16 = 0xFFFF;
        unsafe {
            // EM and TS must be clear or the FPU instructions fault instead
            // of executing.
            let cr0: u32;
            core::arch::asm!("mov {}, cr0", out(reg) cr0, options(nomem, nostack));
            core::arch::asm!("mov cr0, {}", in(reg) cr0 & !(0x04 | 0x08), options(nostack));
            core::arch::asm!(
                "fninit",
                "fnstsw word ptr [{sw}]",
                "fnstcw word ptr [{cw}]",
                sw = in(reg) core::ptr::addr_of_mut!(status),
                cw = in(reg) core::ptr::addr_of_mut!(control),
                options(nostack)
            );
            core::arch::asm!("mov cr0, {}", in(reg) cr0, options(nostack));
        }
        // Without an FPU both words keep their 0xFFFF fill.
        status == 0 && control & 0x103F == 0x003F
    }

    fn is_cyrix(&self) -> bool {
        let ax: u16;
        unsafe {
            core::arch::asm!(
                "pushfd",
                "cli",
                "xor ax, ax",
                "sahf",
                "mov ax, 5",
                "mov cl, 2",
                "div cl",
                "lahf",
                "popfd",
                out("ax") ax,
                out("cl") _,
            );
        }
        // Only the always-one bit 1 survives if DIV left the flags untouched.
        (ax >> 8) as u8 == 0x02
    }

    fn reset_signature(&self) -> u16 {
        unsafe { core::ptr::read_volatile(RESET_SIGNATURE_ADDR as *const u32) as u16 }
    }

    fn halt_forever(&self) -> ! {
        loop {
            // SAFETY: CLI + HLT in a loop ensures the CPU stays stopped.
            // No interrupt can wake us because interrupts are disabled.
            unsafe {
                core::arch::asm!("cli", "hlt", options(nomem, nostack));
            }
        }
    }
}
