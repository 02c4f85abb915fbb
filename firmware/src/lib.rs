//! SeaPig BIOS power-on self test core.
//!
//! The boot sequence lives in [`boot`]. It drives the interrupt-backed
//! [`substrate`], reads settings through [`nvram`], identifies the processor
//! with [`cpuid`], walks RAM with [`memtest`], looks for a disk with [`ide`]
//! and, when asked, hands the screen to the [`setup`] and [`about`] pages.
//!
//! Nothing here touches hardware directly. The board is reached through the
//! `khal` capabilities, which is what lets the test suite run the complete
//! POST against `khal::sim::SimBoard`.
#![cfg_attr(not(test), no_std)]

pub mod about;
pub mod boot;
pub mod checkpoint;
pub mod cpuid;
pub mod ide;
pub mod input;
pub mod memtest;
pub mod nvram;
pub mod screen;
pub mod settings;
pub mod setup;
pub mod substrate;
pub mod time;
pub mod ui;

#[cfg(test)]
pub(crate) mod testing;

pub use boot::{ActionUi, BootAction, BootReport, Post, PostConfig, PostSelection, SystemFacts};
pub use substrate::Substrate;
pub use time::TickSource;

/// Firmware version shown on the banner and the about page.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
