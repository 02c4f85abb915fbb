//! Firmware logging subsystem.
//!
//! Backend for the `log` facade. Records are written as one coloured,
//! level-tagged line each to whatever [`Sink`] was installed with [`init`]
//! (COM1 on the board). Until then every record is dropped, so code may log
//! from the very first instruction.
#![no_std]

#[cfg(test)]
extern crate std;

use core::fmt::{self, Write};

use log::{Level, LevelFilter, Metadata, Record};
use spin::Once;

/// Where log text ends up.
pub trait Sink: Sync {
    fn write_str(&self, s: &str);
}

trait LevelStyle {
    fn tag(&self) -> &'static str;
    fn color(&self) -> &'static str;
}

impl LevelStyle for Level {
    fn tag(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => " INFO",
            Level::Warn => " WARN",
            Level::Error => "ERROR",
        }
    }

    fn color(&self) -> &'static str {
        match self {
            Level::Trace => "\x1b[90m", // Gray
            Level::Debug => "\x1b[36m", // Cyan
            Level::Info => "\x1b[32m",  // Green
            Level::Warn => "\x1b[33m",  // Yellow
            Level::Error => "\x1b[31m", // Red
        }
    }
}

static SINK: Once<&'static dyn Sink> = Once::new();
static LOGGER: FirmwareLogger = FirmwareLogger;

struct FirmwareLogger;

struct SinkWriter<'a>(&'a dyn Sink);

impl Write for SinkWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_str(s);
        Ok(())
    }
}

/// Format one record line.
fn write_record<W: Write>(w: &mut W, level: Level, args: fmt::Arguments) -> fmt::Result {
    w.write_str(level.color())?;
    w.write_str("[")?;
    w.write_str(level.tag())?;
    w.write_str("]\x1b[0m ")?;
    w.write_fmt(args)?;
    w.write_str("\n")
}

impl log::Log for FirmwareLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Some(sink) = SINK.get() {
            let _ = write_record(&mut SinkWriter(*sink), record.level(), *record.args());
        }
    }

    fn flush(&self) {}
}

/// Install `sink` and make this crate the `log` backend.
///
/// Only the first call has any effect.
pub fn init(sink: &'static dyn Sink, max_level: LevelFilter) {
    SINK.call_once(|| sink);
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(max_level);
    }
}

/// Print to the sink without formatting a record around it.
pub fn print(args: fmt::Arguments) {
    if let Some(sink) = SINK.get() {
        let _ = SinkWriter(*sink).write_fmt(args);
    }
}

/// Print without newline
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        $crate::print(format_args!($($arg)*))
    };
}

/// Print with newline
#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => {{
        $crate::print(format_args!($($arg)*));
        $crate::print(format_args!("\n"));
    }};
}
