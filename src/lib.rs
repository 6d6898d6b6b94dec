//! A small, cross-platform asynchronous serial-port library for POSIX hosts (Linux and macOS).
//!
//! Opening a device, configuring line parameters, and streaming bytes in both directions all go
//! through [`SerialPort`], which owns a pair of bounded [`RingBuffer`]s and a background worker
//! thread that multiplexes the device descriptor on the platform readiness facility (`epoll` on
//! Linux, `kqueue` on macOS, both reached through `mio::Poll`).
//!
//! ```no_run
//! use microserial::{config::SerialConfig, port::SerialPort, worker::Callbacks};
//! use std::sync::Arc;
//!
//! # fn main() -> microserial::error::Result<()> {
//! let mut port = SerialPort::open("/dev/ttyUSB0")?;
//! port.configure(SerialConfig::default())?;
//! port.start(Callbacks {
//!     on_data: Some(Arc::new(|bytes: &[u8]| println!("read {} bytes", bytes.len()))),
//!     on_event: Some(Arc::new(|code, msg| println!("event {}: {}", code, msg))),
//! })?;
//! port.write(b"AT\r\n")?;
//! port.stop()?;
//! # Ok(())
//! # }
//! ```

extern crate failure;
#[macro_use]
extern crate failure_derive;
extern crate glob;
#[macro_use]
extern crate log;
extern crate mio;
extern crate nix;

#[cfg(test)]
extern crate env_logger;
#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;
#[cfg(test)]
extern crate rand;

pub mod config;
pub mod discovery;
pub mod error;
pub mod logging;
pub mod plugin;
pub mod port;
pub mod ring_buffer;
mod termios;
pub mod time;
pub mod worker;

pub use config::{FlowControl, Parity, SerialConfig, StopBits};
pub use discovery::{enumerate, PortInfo};
pub use error::{Error, Result};
pub use logging::{init as init_logging, log_level, set_log_level, LogLevel};
pub use port::SerialPort;
pub use ring_buffer::RingBuffer;
pub use time::now_ns;
pub use worker::{Callbacks, DataCallback, EventCallback};
