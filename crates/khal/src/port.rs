//! x86 port I/O primitives.
//!
//! Provides `inb`/`outb`/`inw`/`outw` wrappers for x86 port-mapped I/O
//! using inline assembly, and the [`PortIo`] capability every device driver
//! on the board is written against. Driver code never touches the raw
//! functions directly, so it runs unchanged on [`crate::sim::SimBoard`].

/// POST diagnostic port.
///
/// Checkpoint codes are written here for an external POST card. Reading it
/// is a harmless bus cycle, which is what [`PortIo::io_wait`] uses.
pub const POST_CODE_PORT: u16 = 0x80;

/// Byte and word access to the I/O address space.
pub trait PortIo {
    fn inb(&self, port: u16) -> u8;
    fn outb(&self, port: u16, value: u8);
    fn inw(&self, port: u16) -> u16;
    fn outw(&self, port: u16, value: u16);

    /// Small I/O delay for devices that need time between accesses.
    ///
    /// Reads the POST port rather than writing it so the code shown on a
    /// POST card is left alone.
    #[inline]
    fn io_wait(&self) {
        let _ = self.inb(POST_CODE_PORT);
    }
}

impl<T: PortIo + ?Sized> PortIo for &T {
    #[inline]
    fn inb(&self, port: u16) -> u8 {
        (**self).inb(port)
    }

    #[inline]
    fn outb(&self, port: u16, value: u8) {
        (**self).outb(port, value)
    }

    #[inline]
    fn inw(&self, port: u16) -> u16 {
        (**self).inw(port)
    }

    #[inline]
    fn outw(&self, port: u16, value: u16) {
        (**self).outw(port, value)
    }

    #[inline]
    fn io_wait(&self) {
        (**self).io_wait()
    }
}

/// Port I/O on the CPU this code is running on.
#[derive(Debug, Clone, Copy)]
pub struct Pio {
    _private: (),
}

impl Pio {
    /// # Safety
    ///
    /// Port writes reprogram real hardware. Only firmware running in ring 0
    /// on the target board may construct this.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
impl PortIo for Pio {
    #[inline]
    fn inb(&self, port: u16) -> u8 {
        unsafe { inb(port) }
    }

    #[inline]
    fn outb(&self, port: u16, value: u8) {
        unsafe { outb(port, value) }
    }

    #[inline]
    fn inw(&self, port: u16) -> u16 {
        unsafe { inw(port) }
    }

    #[inline]
    fn outw(&self, port: u16, value: u16) {
        unsafe { outw(port, value) }
    }
}

/// Write a byte to an x86 I/O port.
///
/// # Safety
///
/// Writing to an arbitrary I/O port can have side effects on hardware.
/// The caller must ensure the port and value are valid.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[inline]
pub unsafe fn outb(port: u16, value: u8) {
    core::arch::asm!(
        "out dx, al",
        in("dx") port,
        in("al") value,
        options(nomem, nostack, preserves_flags)
    );
}

/// Read a byte from an x86 I/O port.
///
/// # Safety
///
/// Reading from an arbitrary I/O port can have side effects on hardware.
/// The caller must ensure the port is valid.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[inline]
pub unsafe fn inb(port: u16) -> u8 {
    let value: u8;
    core::arch::asm!(
        "in al, dx",
        in("dx") port,
        out("al") value,
        options(nomem, nostack, preserves_flags)
    );
    value
}

/// Write a 16-bit word to an x86 I/O port.
///
/// # Safety
///
/// Same contract as [`outb`].
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[inline]
pub unsafe fn outw(port: u16, value: u16) {
    core::arch::asm!(
        "out dx, ax",
        in("dx") port,
        in("ax") value,
        options(nomem, nostack, preserves_flags)
    );
}

/// Read a 16-bit word from an x86 I/O port.
///
/// # Safety
///
/// Same contract as [`inb`].
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[inline]
pub unsafe fn inw(port: u16) -> u16 {
    let value: u16;
    core::arch::asm!(
        "in ax, dx",
        in("dx") port,
        out("ax") value,
        options(nomem, nostack, preserves_flags)
    );
    value
}
