//! Hardware Abstraction Layer for the M8SBC-486 board.
#![no_std]

#[cfg(any(test, feature = "sim"))]
extern crate std;

pub mod ata;
pub mod cmos;
pub mod cpu;
pub mod idt;
pub mod keyboard;
pub mod mem;
pub mod pic;
pub mod pit;
pub mod port;
pub mod serial;
#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use cpu::Cpu;
pub use mem::MemoryBus;
pub use port::PortIo;
pub use serial::Serial;
