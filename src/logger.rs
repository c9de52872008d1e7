//! Timestamped line logging.
//!
//! Implements the [`log`](https://docs.rs/log/) facade: each record is one
//! line, prefixed with a local timestamp, written to stderr or to an
//! append log file when daemonized. Packet dumps and statistics reports
//! use the dedicated targets `"packet"` and `"stats"`, switched on by
//! their own flags rather than the level filter.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::sync::Mutex;

use chrono::Local;
use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::error::Error;

#[derive(Debug, Copy, Clone, Default)]
pub struct Options {
    /// log raw input/output data and poll events
    pub debug: bool,
    /// log packet details
    pub packet: bool,
    /// log packet statistics
    pub stats: bool,
}

pub struct Logger {
    out: Mutex<Box<dyn Write + Send>>,
    options: Options,
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        match metadata.target() {
            "packet" => self.options.packet,
            "stats" => self.options.stats,
            _ => {
                let max = if self.options.debug {
                    Level::Debug
                } else {
                    Level::Info
                };
                metadata.level() <= max
            }
        }
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut out = self.out.lock().unwrap();
        let now = Local::now().format("%Y %b %d %H:%M:%S");
        let _ = writeln!(out, "{} {}", now, record.args());
        let _ = out.flush();
    }

    fn flush(&self) {
        let _ = self.out.lock().unwrap().flush();
    }
}

/// Install the logger, writing to `file` (appended) or stderr.
pub fn init(options: Options, file: Option<&str>) -> Result<(), Error> {
    let out: Box<dyn Write + Send> = match file {
        Some(path) => Box::new(OpenOptions::new().append(true).create(true).open(path)?),
        None => Box::new(io::stderr()),
    };
    let logger = Logger {
        out: Mutex::new(out),
        options,
    };
    log::set_boxed_logger(Box::new(logger))
        .map_err(|_| Error::IO(io::Error::from_raw_os_error(libc::EALREADY)))?;
    log::set_max_level(if options.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });
    Ok(())
}
