//! A process-wide, atomically level-filtered text emitter, installed as the backend for the
//! `log` crate so the rest of this module tree can use the ordinary `log::{error!, warn!, info!,
//! debug!, trace!}` macros.
//!
//! Every emitted line is prefixed `[MicroSerial][LEVEL] ` and written to stderr. The level is a
//! single atomic cell; setting it and emitting through it are the only legal touch points, and the
//! two may race without tearing.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{Level, LevelFilter, Log, Metadata, Record};

static LEVEL: AtomicUsize = AtomicUsize::new(LogLevel::Info as usize);
static LOGGER: MicroserialLogger = MicroserialLogger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(usize)]
pub enum LogLevel {
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    fn from_usize(value: usize) -> LogLevel {
        match value {
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            4 => LogLevel::Debug,
            5 => LogLevel::Trace,
            _ => LogLevel::Info,
        }
    }

    fn from_log_level(level: Level) -> LogLevel {
        match level {
            Level::Error => LogLevel::Error,
            Level::Warn => LogLevel::Warn,
            Level::Info => LogLevel::Info,
            Level::Debug => LogLevel::Debug,
            Level::Trace => LogLevel::Trace,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }
}

struct MicroserialLogger;

impl Log for MicroserialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        let threshold = LogLevel::from_usize(LEVEL.load(Ordering::Relaxed));
        LogLevel::from_log_level(metadata.level()) <= threshold
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let level = LogLevel::from_log_level(record.level());
        let _ = writeln!(
            ::std::io::stderr(),
            "[MicroSerial][{}] {}",
            level.as_str(),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = ::std::io::stderr().flush();
    }
}

/// Installs this crate's logger as the global `log` backend. Idempotent: a second call is a
/// harmless no-op (the global logger can only be set once per process, and callers are not
/// expected to coordinate around that).
pub fn init() {
    let _ = log::set_logger(&LOGGER).map(|()| log::set_max_level(LevelFilter::Trace));
}

pub fn set_log_level(level: LogLevel) {
    LEVEL.store(level as usize, Ordering::Relaxed);
}

pub fn log_level() -> LogLevel {
    LogLevel::from_usize(LEVEL.load(Ordering::Relaxed))
}
