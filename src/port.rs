//! The serial-port session: open/configure/write/close lifecycle and the worker-thread handle.

use std::fs::File;
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use nix::fcntl::{open, OFlag};
use nix::sys::stat::Mode;

use config::SerialConfig;
use error::{Error, Result};
use ring_buffer::RingBuffer;
use termios;
use worker::{self, Callbacks, Worker};

/// A single opened serial device. Not `Clone`: exactly one session owns a given descriptor.
pub struct SerialPort {
    fd: RawFd,
    // Owns the descriptor; never read or written directly, only held for its `Drop` impl.
    _file: File,
    wake_reader: File,
    wake_writer: File,
    config: Option<SerialConfig>,
    rx: Option<Arc<RingBuffer>>,
    tx: Option<Arc<RingBuffer>>,
    tx_mutex: Mutex<()>,
    running: Arc<AtomicBool>,
    worker: Option<Arc<Worker>>,
    worker_handle: Option<JoinHandle<()>>,
}

impl SerialPort {
    /// Opens `path` read/write, with no controlling terminal, non-blocking, and sets up the wake
    /// channel. Does not configure line parameters; call `configure` before `start`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let fd = open(
            path.as_ref(),
            OFlag::O_RDWR | OFlag::O_NOCTTY | OFlag::O_NONBLOCK,
            Mode::empty(),
        )
        .map_err(Error::from)?;
        let file = unsafe { File::from_raw_fd(fd) };

        let (wake_reader, wake_writer) = worker::wake_pipe()?;

        Ok(SerialPort {
            fd,
            _file: file,
            wake_reader,
            wake_writer,
            config: None,
            rx: None,
            tx: None,
            tx_mutex: Mutex::new(()),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
            worker_handle: None,
        })
    }

    /// Applies `config` to the terminal driver and (re)allocates the rx/tx rings. Rejected with
    /// `Error::AlreadyRunning` while the worker is running — see the design notes on why this
    /// rewrite rejects reconfigure-while-running instead of silently swapping buffers under the
    /// worker.
    pub fn configure(&mut self, config: SerialConfig) -> Result<()> {
        if self.running.load(Ordering::Acquire) {
            return Err(Error::AlreadyRunning);
        }
        if config.rx_buffer_size == 0 || config.tx_buffer_size == 0 {
            return Err(Error::invalid("rx/tx buffer size must be non-zero"));
        }

        termios::configure(self.fd, &config)?;

        let rx = Arc::new(RingBuffer::new(config.rx_buffer_size + 1)?);
        let tx = Arc::new(RingBuffer::new(config.tx_buffer_size + 1)?);

        self.rx = Some(rx);
        self.tx = Some(tx);
        self.config = Some(config);
        Ok(())
    }

    /// Enqueues as many bytes of `data` as fit in the tx ring and returns the count. Fails with
    /// `Error::Invalid` on an empty slice, or `Error::Pipe` if `configure` has not run yet.
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        if data.is_empty() {
            return Err(Error::invalid("write called with an empty buffer"));
        }
        let tx = self.tx.as_ref().ok_or(Error::Pipe)?;

        let written = {
            let _guard = self.tx_mutex.lock().expect("tx mutex poisoned");
            tx.write(data)
        };

        if written > 0 {
            let mut writer = self.wake_writer.try_clone().map_err(Error::from)?;
            worker::nudge(&mut writer);
        }

        Ok(written)
    }

    /// Starts the background worker. Idempotent: calling `start` on an already-running session
    /// returns `Ok(())` without spawning a second worker.
    pub fn start(&mut self, callbacks: Callbacks) -> Result<()> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let result = self.start_worker(callbacks);
        if result.is_err() {
            self.running.store(false, Ordering::Release);
        }
        result
    }

    fn start_worker(&mut self, callbacks: Callbacks) -> Result<()> {
        let rx = self.rx.clone().ok_or_else(|| {
            Error::invalid("start called before configure allocated the rx/tx rings")
        })?;
        let tx = self.tx.clone().ok_or_else(|| {
            Error::invalid("start called before configure allocated the rx/tx rings")
        })?;
        let read_timeout_ms = self
            .config
            .as_ref()
            .map(|c| c.read_timeout_ms)
            .unwrap_or(0);

        let worker = Arc::new(Worker::new(
            self.fd,
            self.wake_reader.as_raw_fd(),
            rx,
            tx,
            read_timeout_ms,
            callbacks,
        )?);

        let running = Arc::clone(&self.running);
        let worker_for_thread = Arc::clone(&worker);
        let handle = thread::Builder::new()
            .name("microserial-worker".into())
            .spawn(move || {
                while running.load(Ordering::Acquire) {
                    if let Err(e) = worker_for_thread.poll_once() {
                        warn!("worker poll cycle failed: {}", e);
                    }
                }
            })
            .map_err(Error::from)?;

        self.worker = Some(worker);
        self.worker_handle = Some(handle);
        Ok(())
    }

    /// Stops the background worker and joins its thread. Idempotent: calling `stop` on an
    /// already-stopped session returns `Ok(())` without joining a non-existent thread.
    pub fn stop(&mut self) -> Result<()> {
        if !self.running.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        let mut writer = self.wake_writer.try_clone().map_err(Error::from)?;
        worker::nudge(&mut writer);

        if let Some(handle) = self.worker_handle.take() {
            handle
                .join()
                .map_err(|_| Error::invalid("worker thread panicked"))?;
        }
        self.worker = None;
        Ok(())
    }

    /// One wait cycle against the worker's poll facility, for cooperative use (tests driving a
    /// session without a live background thread). Returns `Error::Pipe` if the worker has not
    /// been started.
    pub fn poll(&self) -> Result<()> {
        match &self.worker {
            Some(worker) => worker.poll_once(),
            None => Err(Error::Pipe),
        }
    }

    /// Stops the worker (if running) and releases the session. Equivalent to dropping the value;
    /// provided so callers can spell the lifecycle operation the distilled contract names
    /// explicitly.
    pub fn close(mut self) -> Result<()> {
        self.stop()
    }
}

impl Drop for SerialPort {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("error stopping worker during drop: {}", e);
        }
    }
}
