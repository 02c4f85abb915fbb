//! Character-cell text display (VGA mode 03h, 80x25).
#![no_std]

use core::cell::RefCell;
use core::fmt;

pub const COLUMNS: usize = 80;
pub const ROWS: usize = 25;

/// Physical address of the colour text buffer.
pub const VGA_TEXT_BASE: usize = 0xB8000;

/// Colour attribute byte: background in the high nibble, foreground in the
/// low nibble.
pub mod attr {
    /// Light grey on black, the BIOS default.
    pub const NORMAL: u8 = 0x07;
    /// White on black.
    pub const BRIGHT: u8 = 0x0F;
    /// Light green on black.
    pub const HINT: u8 = 0x0A;
    /// Red on black.
    pub const ALERT: u8 = 0x04;
    /// Light red on black.
    pub const MODIFIED: u8 = 0x0C;
    /// Black on light grey, setup screen body.
    pub const PANEL: u8 = 0x70;
    /// Blue on light grey.
    pub const PANEL_LABEL: u8 = 0x71;
    /// Dark grey on light grey.
    pub const PANEL_RULE: u8 = 0x78;
    /// White on blue.
    pub const DIALOG: u8 = 0x1F;
    /// Light grey on blue.
    pub const DIALOG_DIM: u8 = 0x17;
    /// White on magenta, the focused dialog button.
    pub const DIALOG_FOCUS: u8 = 0x5F;
    /// White on green, title bars.
    pub const TITLE: u8 = 0x2F;
}

/// Cell-addressed text output. Writes are immediate; out-of-range cells are
/// ignored.
pub trait TextDisplay {
    fn put_char(&self, ch: u8, col: usize, row: usize, attr: u8);
    fn set_attr(&self, col: usize, row: usize, attr: u8);

    /// Write `text` left to right from `col`, clipped at the right edge.
    fn put_str(&self, text: &str, col: usize, row: usize, attr: u8) {
        for (i, b) in text.bytes().enumerate() {
            if col + i >= COLUMNS {
                break;
            }
            self.put_char(b, col + i, row, attr);
        }
    }

    /// Format into cells starting at `col`. Returns the number of cells written.
    fn put_fmt(&self, col: usize, row: usize, attr: u8, args: fmt::Arguments) -> usize {
        let mut w = CellWriter {
            display: self,
            col,
            row,
            attr,
            written: 0,
        };
        let _ = fmt::Write::write_fmt(&mut w, args);
        w.written
    }

    /// Fill a whole row with `ch`.
    fn fill_row(&self, row: usize, ch: u8, attr: u8) {
        for col in 0..COLUMNS {
            self.put_char(ch, col, row, attr);
        }
    }

    /// Blank the screen with `attr`.
    fn clear(&self, attr: u8) {
        for row in 0..ROWS {
            self.fill_row(row, b' ', attr);
        }
    }
}

struct CellWriter<'a, D: TextDisplay + ?Sized> {
    display: &'a D,
    col: usize,
    row: usize,
    attr: u8,
    written: usize,
}

impl<D: TextDisplay + ?Sized> fmt::Write for CellWriter<'_, D> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for b in s.bytes() {
            if self.col >= COLUMNS {
                break;
            }
            self.display.put_char(b, self.col, self.row, self.attr);
            self.col += 1;
            self.written += 1;
        }
        Ok(())
    }
}

#[inline]
const fn cell(ch: u8, attr: u8) -> u16 {
    ((attr as u16) << 8) | ch as u16
}

/// The VGA colour text buffer.
pub struct VgaText {
    base: *mut u16,
}

impl VgaText {
    /// # Safety
    ///
    /// `base` must point at a mapped 80x25 text buffer, normally
    /// [`VGA_TEXT_BASE`] with the adapter in mode 03h.
    pub const unsafe fn new(base: usize) -> Self {
        Self {
            base: base as *mut u16,
        }
    }

    #[inline]
    fn slot(&self, col: usize, row: usize) -> Option<*mut u16> {
        if col >= COLUMNS || row >= ROWS {
            return None; // Out of bounds
        }
        // SAFETY: in bounds of the buffer promised to `new`.
        Some(unsafe { self.base.add(row * COLUMNS + col) })
    }
}

impl TextDisplay for VgaText {
    fn put_char(&self, ch: u8, col: usize, row: usize, attr: u8) {
        if let Some(p) = self.slot(col, row) {
            unsafe { p.write_volatile(cell(ch, attr)) }
        }
    }

    fn set_attr(&self, col: usize, row: usize, attr: u8) {
        if let Some(p) = self.slot(col, row) {
            unsafe {
                let ch = p.read_volatile() as u8;
                p.write_volatile(cell(ch, attr));
            }
        }
    }
}

/// An off-screen text buffer with the same cell layout as VGA memory.
pub struct CellBuffer {
    cells: RefCell<[[u16; COLUMNS]; ROWS]>,
}

impl CellBuffer {
    pub const fn new() -> Self {
        Self {
            cells: RefCell::new([[cell(b' ', attr::NORMAL); COLUMNS]; ROWS]),
        }
    }

    /// Characters of one row.
    pub fn row(&self, row: usize) -> [u8; COLUMNS] {
        let cells = self.cells.borrow();
        let mut out = [0u8; COLUMNS];
        for (o, c) in out.iter_mut().zip(cells[row].iter()) {
            *o = *c as u8;
        }
        out
    }

    /// One row as text with trailing blanks trimmed.
    pub fn row_text(&self, row: usize) -> RowText {
        RowText(self.row(row))
    }

    pub fn attr_at(&self, col: usize, row: usize) -> u8 {
        (self.cells.borrow()[row][col] >> 8) as u8
    }

    /// Whether any row contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        (0..ROWS).any(|r| self.row_text(r).as_str().contains(needle))
    }
}

impl Default for CellBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextDisplay for CellBuffer {
    fn put_char(&self, ch: u8, col: usize, row: usize, attr: u8) {
        if col < COLUMNS && row < ROWS {
            self.cells.borrow_mut()[row][col] = cell(ch, attr);
        }
    }

    fn set_attr(&self, col: usize, row: usize, attr: u8) {
        if col < COLUMNS && row < ROWS {
            let mut cells = self.cells.borrow_mut();
            let ch = cells[row][col] as u8;
            cells[row][col] = cell(ch, attr);
        }
    }
}

/// A copied row of a [`CellBuffer`].
pub struct RowText([u8; COLUMNS]);

impl RowText {
    /// The row up to its last non-blank, non-ASCII bytes shown as `?`.
    pub fn as_str(&self) -> &str {
        let end = self
            .0
            .iter()
            .rposition(|&b| b != b' ' && b != 0)
            .map_or(0, |i| i + 1);
        core::str::from_utf8(&self.0[..end]).unwrap_or("?")
    }
}

impl fmt::Display for RowText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
