//! The background thread that multiplexes a device descriptor and a wake pipe on the platform
//! readiness facility, draining bytes in both directions.

use std::io::{self, Write};
use std::os::unix::io::RawFd;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mio::unix::{EventedFd, UnixReady};
use mio::{Events, Poll, PollOpt, Ready, Token};
use nix::errno::Errno;
use nix::unistd;

use error::{Error, Result};
use ring_buffer::RingBuffer;

const DEVICE_TOKEN: Token = Token(0);
const WAKE_TOKEN: Token = Token(1);
const MAX_EVENTS: usize = 4;
const IO_CHUNK: usize = 4096;

/// Invoked from the worker thread with bytes freshly read from the device. The slice is valid
/// only for the duration of the call.
pub type DataCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;
/// Invoked from the worker thread on errors and remote-close. `code` follows the conventional
/// scheme: `1` remote closed, `-errno` read/write errors, `-1` a generic device error.
pub type EventCallback = Arc<dyn Fn(i32, &str) + Send + Sync>;

#[derive(Clone, Default)]
pub struct Callbacks {
    pub on_data: Option<DataCallback>,
    pub on_event: Option<EventCallback>,
}

/// Owns the poll facility and the two rings for the lifetime of a running session. Constructed by
/// `SerialPort::start` and torn down by `SerialPort::stop`.
pub(crate) struct Worker {
    fd: RawFd,
    wake_fd: RawFd,
    poll: Poll,
    rx: Arc<RingBuffer>,
    tx: Arc<RingBuffer>,
    read_timeout_ms: u32,
    callbacks: Callbacks,
    /// Bytes pulled from the tx ring but not yet accepted by the device. Re-enqueuing unwritten
    /// bytes into the tx ring from this thread would turn it into a second producer, violating
    /// the ring's single-producer contract; staging them here instead keeps the user the ring's
    /// only writer.
    tx_staging: Mutex<Vec<u8>>,
}

impl Worker {
    pub(crate) fn new(
        fd: RawFd,
        wake_fd: RawFd,
        rx: Arc<RingBuffer>,
        tx: Arc<RingBuffer>,
        read_timeout_ms: u32,
        callbacks: Callbacks,
    ) -> Result<Self> {
        let poll = Poll::new().map_err(Error::from)?;
        poll.register(
            &EventedFd(&fd),
            DEVICE_TOKEN,
            Ready::readable() | Ready::writable() | UnixReady::error() | UnixReady::hup(),
            PollOpt::level(),
        )
        .map_err(Error::from)?;
        poll.register(
            &EventedFd(&wake_fd),
            WAKE_TOKEN,
            Ready::readable(),
            PollOpt::level(),
        )
        .map_err(Error::from)?;

        Ok(Worker {
            fd,
            wake_fd,
            poll,
            rx,
            tx,
            read_timeout_ms,
            callbacks,
            tx_staging: Mutex::new(Vec::new()),
        })
    }

    /// One wait cycle. Called in a loop by the worker thread; also callable directly by tests
    /// that want to drive a session deterministically without a live background thread.
    pub(crate) fn poll_once(&self) -> Result<()> {
        let mut events = Events::with_capacity(MAX_EVENTS);
        let timeout = if self.read_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(u64::from(self.read_timeout_ms)))
        };

        if let Err(e) = self.poll.poll(&mut events, timeout) {
            if e.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(Error::from(e));
        }

        for event in &events {
            if event.token() == WAKE_TOKEN {
                self.drain_wake();
                continue;
            }

            let ready = event.readiness();
            let unix_ready = UnixReady::from(ready);
            if unix_ready.is_error() || unix_ready.is_hup() {
                self.emit_event(-1, "device error");
            }
            if ready.is_readable() {
                self.dispatch_rx();
            }
            if ready.is_writable() {
                self.dispatch_tx();
            }
        }

        Ok(())
    }

    fn drain_wake(&self) {
        let mut scratch = [0u8; 64];
        loop {
            match unistd::read(self.wake_fd, &mut scratch) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(Errno::EAGAIN) => break,
                Err(_) => break,
            }
        }
    }

    fn dispatch_rx(&self) {
        let mut chunk = [0u8; IO_CHUNK];
        loop {
            match unistd::read(self.fd, &mut chunk) {
                Ok(0) => {
                    self.emit_event(1, "remote closed");
                    break;
                }
                Ok(n) => {
                    self.rx.write(&chunk[..n]);
                    if let Some(cb) = &self.callbacks.on_data {
                        cb(&chunk[..n]);
                    }
                }
                Err(Errno::EAGAIN) => break,
                Err(errno) => {
                    self.emit_event(-(errno as i32), "read error");
                    break;
                }
            }
        }
    }

    fn dispatch_tx(&self) {
        let mut staged = self.tx_staging.lock().expect("tx staging mutex poisoned");
        loop {
            if staged.is_empty() {
                let mut chunk = [0u8; IO_CHUNK];
                let n = self.tx.read(&mut chunk);
                if n == 0 {
                    break;
                }
                staged.extend_from_slice(&chunk[..n]);
            }

            match unistd::write(self.fd, &staged) {
                Ok(written) if written > 0 => {
                    staged.drain(..written);
                    if !staged.is_empty() {
                        // Device still not ready for the rest; wait for the next writable event.
                        break;
                    }
                }
                Ok(_) => break,
                Err(Errno::EAGAIN) => break,
                Err(errno) => {
                    self.emit_event(-(errno as i32), "write error");
                    staged.clear();
                    break;
                }
            }
        }
    }

    fn emit_event(&self, code: i32, message: &str) {
        if let Some(cb) = &self.callbacks.on_event {
            cb(code, message);
        }
    }
}

/// Creates a non-blocking pipe for use as a wake channel. Both ends are non-blocking so a
/// producer-side write can never stall and a consumer-side drain always terminates on `EAGAIN`.
pub(crate) fn wake_pipe() -> Result<(std::fs::File, std::fs::File)> {
    use nix::fcntl::OFlag;
    use std::os::unix::io::FromRawFd;

    let (read_fd, write_fd) = unistd::pipe2(OFlag::O_NONBLOCK).map_err(Error::from)?;
    unsafe {
        Ok((
            std::fs::File::from_raw_fd(read_fd),
            std::fs::File::from_raw_fd(write_fd),
        ))
    }
}

/// Best-effort nudge: writes a single byte to unblock a worker waiting on the wake pipe. A
/// dropped wake on `EAGAIN` is harmless since the worker is already due to wake on its own.
pub(crate) fn nudge(wake_writer: &mut std::fs::File) {
    let _ = wake_writer.write(&[b'w']);
}
