//! End-to-end round trip over a pseudo-terminal pair, exercising the crate purely through its
//! public surface: open/configure/start/write/stop on one side of a pty, with a real kernel tty
//! driver and a real background worker thread on the other.

extern crate env_logger;
extern crate log;
extern crate microserial;
extern crate nix;

use std::io::{Read, Write};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use nix::fcntl::OFlag;
#[cfg(any(target_os = "linux", target_os = "android"))]
use nix::pty::ptsname_r;
use nix::pty::{grantpt, posix_openpt, unlockpt};

use microserial::config::{FlowControl, Parity, SerialConfig, StopBits};
use microserial::port::SerialPort;
use microserial::worker::Callbacks;

fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter(None, log::LevelFilter::Info)
        .try_init();
}

/// Opens a fresh pty pair, returning the master end (readable/writable directly) and the
/// filesystem path of the slave end, suitable for `SerialPort::open`.
fn open_pty_pair() -> (nix::pty::PtyMaster, String) {
    let master = posix_openpt(OFlag::O_RDWR | OFlag::O_NOCTTY).expect("posix_openpt");
    grantpt(&master).expect("grantpt");
    unlockpt(&master).expect("unlockpt");
    #[cfg(any(target_os = "linux", target_os = "android"))]
    let slave_path = ptsname_r(&master).expect("ptsname_r");
    // `ptsname` is not thread-safe on platforms without the reentrant `ptsname_r`, but this test
    // opens exactly one pty at a time, so the race it protects against cannot occur here.
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    let slave_path = unsafe { nix::pty::ptsname(&master) }.expect("ptsname");
    (master, slave_path)
}

#[test]
fn write_and_receive_round_trip_over_a_pty() {
    init_logging();

    let (mut master, slave_path) = open_pty_pair();

    let mut port = SerialPort::open(&slave_path).expect("open pty slave");
    port.configure(SerialConfig {
        baud_rate: 115200,
        data_bits: 8,
        stop_bits: StopBits::One,
        parity: Parity::None,
        flow_control: FlowControl::None,
        rx_buffer_size: 8192,
        tx_buffer_size: 8192,
        read_timeout_ms: 100,
        write_timeout_ms: 0,
    })
    .expect("configure");

    let received: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    let received_for_cb = Arc::clone(&received);

    port.start(Callbacks {
        on_data: Some(Arc::new(move |bytes: &[u8]| {
            received_for_cb.lock().unwrap().extend_from_slice(bytes);
        })),
        on_event: Some(Arc::new(|code, msg| {
            log::debug!("event {}: {}", code, msg);
        })),
    })
    .expect("start");

    master.write_all(b"hello core\0").expect("write from master");

    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        if received.lock().unwrap().as_slice() == b"hello core\0" {
            break;
        }
        if Instant::now() > deadline {
            panic!(
                "on_data did not deliver the expected bytes in time, got {:?}",
                received.lock().unwrap()
            );
        }
        thread::sleep(Duration::from_millis(10));
    }

    let written = port.write(b"hello device\0").expect("write to device");
    assert_eq!(written, 13);

    // `master` is a blocking descriptor; read it on its own thread so a protocol bug that never
    // delivers the bytes times out the test instead of hanging it.
    let (tx, rx) = std::sync::mpsc::channel();
    let reader_thread = thread::spawn(move || {
        let mut buf = [0u8; 32];
        let mut total = Vec::new();
        while total.len() < 13 {
            match master.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => total.extend_from_slice(&buf[..n]),
                Err(_) => break,
            }
        }
        let _ = tx.send(total);
    });
    let total = rx
        .recv_timeout(Duration::from_secs(2))
        .expect("master never saw the bytes written by the session");
    assert_eq!(total, b"hello device\0");

    port.stop().expect("stop");
    let _ = reader_thread.join();
}

#[test]
fn reconfigure_while_running_is_rejected() {
    init_logging();

    let (_master, slave_path) = open_pty_pair();

    let mut port = SerialPort::open(&slave_path).expect("open pty slave");
    port.configure(SerialConfig::default()).expect("configure");
    port.start(Callbacks::default()).expect("start");

    let err = port
        .configure(SerialConfig::default())
        .expect_err("configure while running must fail");
    match err {
        microserial::Error::AlreadyRunning => {}
        other => panic!("expected AlreadyRunning, got {:?}", other),
    }

    port.stop().expect("stop");
}

#[test]
fn start_twice_does_not_spawn_a_second_worker() {
    init_logging();

    let (_master, slave_path) = open_pty_pair();

    let mut port = SerialPort::open(&slave_path).expect("open pty slave");
    port.configure(SerialConfig::default()).expect("configure");
    port.start(Callbacks::default()).expect("first start");
    port.start(Callbacks::default()).expect("second start is idempotent");
    port.stop().expect("stop");
}

#[test]
fn stop_twice_does_not_join_twice() {
    init_logging();

    let (_master, slave_path) = open_pty_pair();

    let mut port = SerialPort::open(&slave_path).expect("open pty slave");
    port.configure(SerialConfig::default()).expect("configure");
    port.start(Callbacks::default()).expect("start");
    port.stop().expect("first stop");
    port.stop().expect("second stop is idempotent");
}
