//! Rows of the setup screen's option list.

use crate::nvram::{SettingsBlob, SettingsFlags};

/// How a row's value column is drawn and what Enter does on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayKind {
    /// A flag shown as `ON`/`OFF`, changed through a yes/no dialog.
    OnOff,
    /// Shown as `Enter`; opens the about page.
    Enter,
    /// Spacer. Navigation never stops on it.
    Blank,
}

/// One row in [`SETTINGS`].
pub struct SettingEntry {
    pub label: &'static str,
    pub help: &'static str,
    pub kind: DisplayKind,
    pub read: Option<fn(&SettingsBlob) -> bool>,
    pub write: Option<fn(&mut SettingsBlob, bool)>,
}

impl SettingEntry {
    const fn toggle(
        label: &'static str,
        help: &'static str,
        read: fn(&SettingsBlob) -> bool,
        write: fn(&mut SettingsBlob, bool),
    ) -> Self {
        Self {
            label,
            help,
            kind: DisplayKind::OnOff,
            read: Some(read),
            write: Some(write),
        }
    }

    const fn blank() -> Self {
        Self {
            label: "",
            help: "",
            kind: DisplayKind::Blank,
            read: None,
            write: None,
        }
    }

    /// Current value for [`DisplayKind::OnOff`] rows.
    pub fn value(&self, blob: &SettingsBlob) -> Option<bool> {
        self.read.map(|read| read(blob))
    }

    pub fn is_selectable(&self) -> bool {
        self.kind != DisplayKind::Blank
    }
}

fn quick_memtest(blob: &SettingsBlob) -> bool {
    blob.flag(SettingsFlags::QUICK_MEMTEST)
}

fn set_quick_memtest(blob: &mut SettingsBlob, on: bool) {
    blob.set_flag(SettingsFlags::QUICK_MEMTEST, on)
}

fn lba_reporting(blob: &SettingsBlob) -> bool {
    blob.flag(SettingsFlags::LBA_REPORTING)
}

fn set_lba_reporting(blob: &mut SettingsBlob, on: bool) {
    blob.set_flag(SettingsFlags::LBA_REPORTING, on)
}

fn lock_nvram(blob: &SettingsBlob) -> bool {
    blob.flag(SettingsFlags::LOCK_NVRAM)
}

fn set_lock_nvram(blob: &mut SettingsBlob, on: bool) {
    blob.set_flag(SettingsFlags::LOCK_NVRAM, on)
}

/// The option list, top to bottom. A blank row is never first, last or next
/// to another blank row.
pub static SETTINGS: [SettingEntry; 5] = [
    SettingEntry::toggle(
        "Fast memory test",
        "This option enables quick memory test which reduces boot time.",
        quick_memtest,
        set_quick_memtest,
    ),
    SettingEntry::toggle(
        "Enable LBA support reporting",
        "This option controls LBA support BIOS reporting (INT 13h ax=0x41).",
        lba_reporting,
        set_lba_reporting,
    ),
    SettingEntry::toggle(
        "Lock CMOS after boot",
        "Enabling this option locks CMOS 0x40-0x5F NVRAM area after boot.",
        lock_nvram,
        set_lock_nvram,
    ),
    SettingEntry::blank(),
    SettingEntry {
        label: "Open About",
        help: "SeaPig information and acknowledgments.",
        kind: DisplayKind::Enter,
        read: None,
        write: None,
    },
];
