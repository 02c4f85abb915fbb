//! The POST status screen.

use kdisplay::{COLUMNS, TextDisplay, attr};

use crate::boot::BootAction;
use crate::cpuid::CpuModel;
use crate::ide::ModelName;
use crate::memtest::Coverage;

const VALUE_COL: usize = 20;

const CPU_ROW: usize = 7;
const FPU_ROW: usize = 8;
const MEMORY_ROW: usize = 10;
const IDE_ROW: usize = 12;
const CMOS_WARNING_ROW: usize = 22;
const FOOTER_ROW: usize = 23;
const KEYS_ROW: usize = 24;

const KEYS_COL: usize = 15;
const KEYS: &str = "[ESC SKIP MEMORY TEST]  [F1 SETTINGS]  [F3 ABOUT]";
/// Offsets into [`KEYS`] of the key names.
const KEY_HIGHLIGHTS: [usize; 7] = [1, 2, 3, 25, 26, 40, 41];

/// Column of the seconds counter after "detecting...".
const IDE_SECONDS_COL: usize = VALUE_COL + 13;

/// What POST shows while it runs, drawn onto any [`TextDisplay`].
pub struct PostScreen<'a> {
    display: &'a dyn TextDisplay,
}

impl<'a> PostScreen<'a> {
    pub fn new(display: &'a dyn TextDisplay) -> Self {
        Self { display }
    }

    /// Banner lines at the top of a blank screen.
    pub fn draw_splash(&self) {
        let d = self.display;
        d.clear(attr::NORMAL);
        d.put_fmt(
            4,
            1,
            attr::NORMAL,
            format_args!("SeaPig 486 Single Board Computer BIOS {}", crate::VERSION),
        );
        d.put_str("Copyright (C) 2024-2026, maniek86.xyz", 4, 2, attr::NORMAL);
        d.put_str("M8SBC-486 REV 1.0 BIOS", 1, 4, attr::NORMAL);
    }

    /// Labels, footer and key hints, then the processor lines.
    pub fn draw_status(&self, cpu: &CpuModel, fpu_present: bool) {
        let d = self.display;
        d.put_str("Main Processor :", 3, CPU_ROW, attr::NORMAL);
        d.put_str("   FPU Present :", 3, FPU_ROW, attr::NORMAL);
        d.put_str("   Memory Test :", 3, MEMORY_ROW, attr::NORMAL);
        d.put_str(
            "---- CHP V1 / Derived from BIOS by b-dmitry1 ----",
            1,
            FOOTER_ROW,
            attr::NORMAL,
        );

        d.put_str(KEYS, KEYS_COL, KEYS_ROW, attr::HINT);
        for offset in KEY_HIGHLIGHTS {
            d.set_attr(KEYS_COL + offset, KEYS_ROW, attr::BRIGHT);
        }

        d.put_fmt(VALUE_COL, CPU_ROW, attr::BRIGHT, format_args!("{}", cpu));
        d.put_str(yes_no(fpu_present), VALUE_COL, FPU_ROW, attr::BRIGHT);
    }

    pub fn cmos_repaired(&self) {
        self.display.put_str(
            "CMOS checksum was invalid! Cleared",
            23,
            CMOS_WARNING_ROW,
            attr::ALERT,
        );
    }

    pub fn memory_progress(&self, total_kib: u32, coverage: Coverage) {
        let suffix = match coverage {
            Coverage::Full => "",
            Coverage::Quick => " (q)",
        };
        self.display.put_fmt(
            VALUE_COL,
            MEMORY_ROW,
            attr::BRIGHT,
            format_args!("{} KB{}", total_kib, suffix),
        );
    }

    pub fn memory_error(&self) {
        self.display.put_str("MEMORY ERROR", 0, 0, attr::BRIGHT);
    }

    pub fn ide_detecting(&self) {
        self.display
            .put_str("   Primary IDE : detecting...", 3, IDE_ROW, attr::NORMAL);
    }

    /// Whole seconds spent waiting for IDENTIFY.
    pub fn ide_elapsed(&self, ticks: u32, hz: u32) {
        self.display.put_fmt(
            IDE_SECONDS_COL,
            IDE_ROW,
            attr::NORMAL,
            format_args!("{}", ticks / hz.max(1)),
        );
    }

    pub fn ide_result(&self, drive: Option<&ModelName>) {
        let d = self.display;
        match drive {
            Some(name) => {
                d.put_str("              ", VALUE_COL, IDE_ROW, attr::BRIGHT);
                d.put_str(name.as_str(), VALUE_COL, IDE_ROW, attr::BRIGHT);
            }
            None => d.put_str("None          ", VALUE_COL, IDE_ROW, attr::BRIGHT),
        }
    }

    /// Replace the key hints with the operator's choice.
    pub fn selection(&self, action: BootAction) {
        let label = match action {
            BootAction::Normal => return,
            BootAction::OpenSettings => "SETTINGS",
            BootAction::ShowInfo => "ABOUT",
        };
        let d = self.display;
        for col in 0..COLUMNS {
            d.put_char(b' ', col, KEYS_ROW, attr::NORMAL);
        }
        d.put_fmt(1, KEYS_ROW, attr::BRIGHT, format_args!("Selected: {}", label));
    }
}

fn yes_no(value: bool) -> &'static str {
    if value { "Yes" } else { "No" }
}
