//! The settings screen.
//!
//! [`SetupMenu`] is the key-driven state of the screen: which row is
//! selected, whether the blob was changed and which dialog, if any, is open
//! on top. [`SetupView`] draws that state. [`crate::ui::ConsoleUi`] joins the
//! two to the keyboard.

use kdisplay::{COLUMNS, TextDisplay, attr};
use khal::keyboard::KeyCode;

use crate::boot::SystemFacts;
use crate::nvram::{BoardIdentity, SettingsBlob};
use crate::settings::{DisplayKind, SETTINGS, SettingEntry};

const NO_DRIVE_WARNING: &str = "The system did not detect any IDE hard drives. You may attempt \
to continue booting by exiting this setup, but it is likely to result in failure.";

/// What a yes/no dialog decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    /// The value of the toggle on this row.
    Toggle(usize),
    Save,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialog {
    /// A text box closed with ESC or Enter.
    Notice {
        title: &'static str,
        text: &'static str,
    },
    /// A yes/no question. ESC leaves `current` in place.
    Confirm {
        prompt: &'static str,
        purpose: Purpose,
        current: bool,
        choice: bool,
    },
}

/// What the caller has to do after a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuEvent {
    /// Redraw and keep reading keys.
    Stay,
    /// Write the blob to CMOS.
    Save,
    OpenAbout,
    /// Leave the settings screen.
    Exit,
}

pub struct SetupMenu {
    selected: usize,
    modified: bool,
    dialog: Option<Dialog>,
}

impl SetupMenu {
    /// Opens with the no-drive warning showing if POST found no drive.
    pub fn new(drive_present: bool) -> Self {
        let dialog = (!drive_present).then_some(Dialog::Notice {
            title: "Warning",
            text: NO_DRIVE_WARNING,
        });
        Self {
            selected: 0,
            modified: false,
            dialog,
        }
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn modified(&self) -> bool {
        self.modified
    }

    pub fn dialog(&self) -> Option<&Dialog> {
        self.dialog.as_ref()
    }

    fn entry(&self) -> &'static SettingEntry {
        &SETTINGS[self.selected]
    }

    pub fn handle(&mut self, key: KeyCode, blob: &mut SettingsBlob) -> MenuEvent {
        match self.dialog {
            None => self.handle_list(key, blob),
            Some(Dialog::Notice { .. }) => {
                if matches!(key, KeyCode::Escape | KeyCode::Return) {
                    self.dialog = None;
                }
                MenuEvent::Stay
            }
            Some(Dialog::Confirm {
                prompt,
                purpose,
                current,
                choice,
            }) => match key {
                KeyCode::ArrowLeft | KeyCode::ArrowRight => {
                    self.dialog = Some(Dialog::Confirm {
                        prompt,
                        purpose,
                        current,
                        choice: key == KeyCode::ArrowRight,
                    });
                    MenuEvent::Stay
                }
                KeyCode::Escape => {
                    self.dialog = None;
                    self.commit(purpose, current, current, blob)
                }
                KeyCode::Return => {
                    self.dialog = None;
                    self.commit(purpose, current, choice, blob)
                }
                _ => MenuEvent::Stay,
            },
        }
    }

    fn handle_list(&mut self, key: KeyCode, blob: &SettingsBlob) -> MenuEvent {
        match key {
            KeyCode::Escape if self.modified => {
                self.dialog = Some(confirm("Exit without saving?", Purpose::Exit));
            }
            KeyCode::Escape => return MenuEvent::Exit,
            KeyCode::ArrowUp => self.step(-1),
            KeyCode::ArrowDown => self.step(1),
            KeyCode::Return => {
                let entry = self.entry();
                match entry.kind {
                    DisplayKind::OnOff => {
                        let value = entry.value(blob).unwrap_or(false);
                        self.dialog = Some(Dialog::Confirm {
                            prompt: entry.label,
                            purpose: Purpose::Toggle(self.selected),
                            current: value,
                            choice: value,
                        });
                    }
                    DisplayKind::Enter => return MenuEvent::OpenAbout,
                    DisplayKind::Blank => {}
                }
            }
            KeyCode::F1 => {
                let entry = self.entry();
                self.dialog = Some(Dialog::Notice {
                    title: entry.label,
                    text: entry.help,
                });
            }
            KeyCode::F10 => {
                self.dialog = Some(confirm("Save settings to CMOS?", Purpose::Save));
            }
            _ => {}
        }
        MenuEvent::Stay
    }

    /// Move one row, hopping over a blank row.
    fn step(&mut self, delta: isize) {
        let Some(mut next) = self.selected.checked_add_signed(delta) else {
            return;
        };
        if next >= SETTINGS.len() {
            return;
        }
        if !SETTINGS[next].is_selectable() {
            next = next.wrapping_add_signed(delta);
        }
        if next < SETTINGS.len() {
            self.selected = next;
        }
    }

    fn commit(
        &mut self,
        purpose: Purpose,
        current: bool,
        value: bool,
        blob: &mut SettingsBlob,
    ) -> MenuEvent {
        match purpose {
            Purpose::Toggle(row) => {
                if value != current {
                    self.modified = true;
                }
                if let Some(write) = SETTINGS[row].write {
                    write(blob, value);
                }
                MenuEvent::Stay
            }
            Purpose::Save if value => {
                self.modified = false;
                MenuEvent::Save
            }
            Purpose::Exit if value => MenuEvent::Exit,
            Purpose::Save | Purpose::Exit => MenuEvent::Stay,
        }
    }
}

fn confirm(prompt: &'static str, purpose: Purpose) -> Dialog {
    Dialog::Confirm {
        prompt,
        purpose,
        current: false,
        choice: false,
    }
}

// ── drawing ───────────────────────────────────────────────────────

const INFO_LABEL_COL: usize = 3;
const INFO_COLON_COL: usize = 33;
const INFO_VALUE_COL: usize = 35;
const OPTIONS_ROW: usize = 12;
const OPTION_COL: usize = 3;
/// Longest drive name that fits the info column.
const DRIVE_NAME_MAX: usize = 38;

/// Draws the settings screen for one POST run.
pub struct SetupView<'a> {
    display: &'a dyn TextDisplay,
    facts: &'a SystemFacts,
    identity: BoardIdentity,
}

impl<'a> SetupView<'a> {
    pub fn new(display: &'a dyn TextDisplay, facts: &'a SystemFacts, identity: BoardIdentity) -> Self {
        Self {
            display,
            facts,
            identity,
        }
    }

    pub fn render(&self, menu: &SetupMenu, blob: &SettingsBlob) {
        self.draw_page(menu.modified());
        self.draw_options(menu.selected(), blob);
        match menu.dialog() {
            None => {}
            Some(Dialog::Notice { title, text }) => self.draw_notice(title, text, menu.modified()),
            Some(Dialog::Confirm { prompt, choice, .. }) => self.draw_confirm(prompt, *choice),
        }
    }

    fn draw_page(&self, modified: bool) {
        let d = self.display;
        d.clear(attr::PANEL);

        d.put_str("SeaPig BIOS Settings", 30, 0, attr::NORMAL);
        d.put_str("UP/DOWN:Navigate  ESC:Exit  F1:Help  F10:Save", 1, 24, attr::BRIGHT);
        for col in 0..COLUMNS {
            d.set_attr(col, 0, attr::TITLE);
            d.set_attr(col, 24, attr::BRIGHT);
            d.put_char(b'=', col, 23, attr::PANEL_RULE);
            d.put_char(b'-', col, 2, attr::PANEL_RULE);
            d.put_char(b'-', col, 10, attr::PANEL_RULE);
        }
        d.put_str("System info", 1, 2, attr::PANEL_RULE);
        d.put_str("Settings", 1, 10, attr::PANEL_RULE);

        let labels = [
            "Machine",
            "CPU Model",
            "FPU available",
            "Memory available",
            "Primary IDE",
        ];
        for (i, label) in labels.iter().enumerate() {
            d.put_str(label, INFO_LABEL_COL, 4 + i, attr::PANEL_LABEL);
            d.put_char(b':', INFO_COLON_COL, 4 + i, attr::PANEL_LABEL);
        }

        let facts = self.facts;
        if self.identity.recognized {
            d.put_fmt(
                INFO_VALUE_COL,
                4,
                attr::PANEL_LABEL,
                format_args!("M8SBC-486, chipset ver: {:04X}", self.identity.chipset_version),
            );
        } else {
            d.put_str("Unknown", INFO_VALUE_COL, 4, attr::PANEL_LABEL);
        }
        d.put_fmt(INFO_VALUE_COL, 5, attr::PANEL_LABEL, format_args!("{:#}", facts.cpu));
        d.put_str(
            if facts.fpu_present { "Yes" } else { "No" },
            INFO_VALUE_COL,
            6,
            attr::PANEL_LABEL,
        );
        d.put_fmt(
            INFO_VALUE_COL,
            7,
            attr::PANEL_LABEL,
            format_args!("{} KB", facts.memory_kib),
        );
        let drive = facts.drive.as_ref().map_or("None", |name| name.as_str());
        let drive = drive.get(..DRIVE_NAME_MAX).unwrap_or(drive);
        d.put_str(drive, INFO_VALUE_COL, 8, attr::PANEL_LABEL);

        if modified {
            draw_modified(d);
        }
    }

    fn draw_options(&self, selected: usize, blob: &SettingsBlob) {
        let d = self.display;
        for (i, entry) in SETTINGS.iter().enumerate() {
            let value = match entry.kind {
                DisplayKind::OnOff if entry.value(blob) == Some(true) => "ON",
                DisplayKind::OnOff => "OFF",
                DisplayKind::Enter => "Enter",
                DisplayKind::Blank => continue,
            };
            let row = OPTIONS_ROW + i;
            let value_attr = if i == selected {
                attr::DIALOG
            } else {
                attr::PANEL
            };
            d.put_str(entry.label, OPTION_COL, row, attr::PANEL);
            d.put_char(b':', OPTION_COL + 30, row, attr::PANEL);
            d.put_str(value, OPTION_COL + 32, row, value_attr);
        }
    }

    fn draw_confirm(&self, prompt: &str, choice: bool) {
        let d = self.display;
        draw_box(d, 22, 9, 36, 5);
        d.put_str(prompt, centered(prompt), 10, attr::DIALOG);
        let (no, yes) = if choice {
            (attr::DIALOG, attr::DIALOG_FOCUS)
        } else {
            (attr::DIALOG_FOCUS, attr::DIALOG)
        };
        d.put_str("[No]", 22 + 9, 12, no);
        d.put_str("[Yes]", 22 + 22, 12, yes);
    }

    fn draw_notice(&self, title: &str, text: &str, modified: bool) {
        let d = self.display;
        draw_box(d, 18, 7, 44, 10);
        d.put_str(title, centered(title), 7, attr::DIALOG);
        draw_wrapped(d, text, 19, 9, 42, 7, attr::DIALOG);

        d.fill_row(24, b' ', attr::BRIGHT);
        if modified {
            draw_modified(d);
        }
        d.put_str("ESC or Enter to continue", 1, 24, attr::BRIGHT);
    }
}

fn draw_modified(d: &dyn TextDisplay) {
    d.put_str("Settings modified", 61, 24, attr::MODIFIED);
}

fn centered(text: &str) -> usize {
    (COLUMNS / 2).saturating_sub(text.len() / 2)
}

/// Filled box with `=` on its top and bottom edges.
fn draw_box(d: &dyn TextDisplay, x: usize, y: usize, w: usize, h: usize) {
    for row in y..y + h {
        let ch = if row == y || row == y + h - 1 { b'=' } else { b' ' };
        for col in x..x + w {
            d.put_char(ch, col, row, attr::DIALOG);
        }
    }
}

/// Word-wrapped text in a `w` by `h` cell area. Words longer than a line
/// are split; text past the last line is dropped.
fn draw_wrapped(d: &dyn TextDisplay, text: &str, x: usize, y: usize, w: usize, h: usize, color: u8) {
    let mut col = 0;
    let mut row = 0;
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            col = 0;
            row += 1;
        }
        for word in line.split(' ').filter(|word| !word.is_empty()) {
            if col != 0 && col + 1 + word.len() > w {
                col = 0;
                row += 1;
            }
            if col != 0 {
                col += 1;
            }
            for b in word.bytes() {
                if col >= w {
                    col = 0;
                    row += 1;
                }
                if row >= h {
                    return;
                }
                d.put_char(b, x + col, y + row, color);
                col += 1;
            }
        }
    }
}
