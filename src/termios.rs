//! Translates a `SerialConfig` into POSIX terminal-driver state.

use std::os::unix::io::RawFd;

use nix::sys::termios::{
    self, BaudRate, ControlFlags, FlushArg, InputFlags, SetArg, SpecialCharacterIndices, Termios,
};

use config::{FlowControl, Parity, SerialConfig, StopBits, CANONICAL_BAUD_RATES};
use error::{Error, Result};

/// Resets `fd` to raw mode and applies every field of `config`. Rejects an unrecognized baud rate
/// with `Error::Invalid` rather than substituting a default — see the design notes on why this
/// rewrite does not repeat the silent 115200 fallback.
pub(crate) fn configure(fd: RawFd, config: &SerialConfig) -> Result<()> {
    let speed = baud_rate_to_nix(config.baud_rate)?;

    let mut tio = termios::tcgetattr(fd)?;
    termios::cfmakeraw(&mut tio);

    tio.control_flags.remove(ControlFlags::CSIZE);
    tio.control_flags
        .insert(data_bits_flag(config.normalized_data_bits()));

    if config.stop_bits == StopBits::Two {
        tio.control_flags.insert(ControlFlags::CSTOPB);
    } else {
        tio.control_flags.remove(ControlFlags::CSTOPB);
    }

    tio.control_flags
        .remove(ControlFlags::PARENB | ControlFlags::PARODD);
    match config.parity {
        Parity::Even => tio.control_flags.insert(ControlFlags::PARENB),
        Parity::Odd => tio
            .control_flags
            .insert(ControlFlags::PARENB | ControlFlags::PARODD),
        Parity::None => {}
    }

    tio.control_chars[SpecialCharacterIndices::VMIN as usize] = 0;
    tio.control_chars[SpecialCharacterIndices::VTIME as usize] =
        vtime_deciseconds(config.read_timeout_ms);

    termios::tcsetattr(fd, SetArg::TCSANOW, &tio)?;

    termios::cfsetispeed(&mut tio, speed)?;
    termios::cfsetospeed(&mut tio, speed)?;
    termios::tcsetattr(fd, SetArg::TCSANOW, &tio)?;

    apply_flow_control(fd, &mut tio, config.flow_control)?;

    termios::tcflush(fd, FlushArg::TCIOFLUSH)?;
    Ok(())
}

fn data_bits_flag(bits: u8) -> ControlFlags {
    match bits {
        5 => ControlFlags::CS5,
        6 => ControlFlags::CS6,
        7 => ControlFlags::CS7,
        _ => ControlFlags::CS8,
    }
}

fn vtime_deciseconds(read_timeout_ms: u32) -> u8 {
    let tenths = (read_timeout_ms + 99) / 100;
    tenths.min(255) as u8
}

fn baud_rate_to_nix(baud: u32) -> Result<BaudRate> {
    if !CANONICAL_BAUD_RATES.contains(&baud) {
        return Err(Error::invalid(
            "baud rate is not one of the canonical rates",
        ));
    }
    Ok(match baud {
        9600 => BaudRate::B9600,
        19200 => BaudRate::B19200,
        38400 => BaudRate::B38400,
        57600 => BaudRate::B57600,
        115200 => BaudRate::B115200,
        230400 => BaudRate::B230400,
        #[cfg(target_os = "linux")]
        460800 => BaudRate::B460800,
        #[cfg(target_os = "linux")]
        921600 => BaudRate::B921600,
        #[cfg(not(target_os = "linux"))]
        460800 | 921600 => {
            return Err(Error::invalid(
                "this baud rate is a Linux-only termios extension",
            ))
        }
        _ => unreachable!("checked against CANONICAL_BAUD_RATES above"),
    })
}

fn apply_flow_control(fd: RawFd, tio: &mut Termios, flow: FlowControl) -> Result<()> {
    tio.input_flags
        .remove(InputFlags::IXON | InputFlags::IXOFF | InputFlags::IXANY);
    #[cfg(any(target_os = "linux", target_os = "macos"))]
    tio.control_flags.remove(ControlFlags::CRTSCTS);

    match flow {
        FlowControl::None => {}
        FlowControl::RtsCts => {
            #[cfg(any(target_os = "linux", target_os = "macos"))]
            {
                tio.control_flags.insert(ControlFlags::CRTSCTS);
            }
            #[cfg(not(any(target_os = "linux", target_os = "macos")))]
            {
                warn!("hardware flow control is not available on this platform, ignoring");
            }
        }
        FlowControl::XonXoff => {
            tio.input_flags
                .insert(InputFlags::IXON | InputFlags::IXOFF);
        }
    }

    termios::tcsetattr(fd, SetArg::TCSANOW, tio)?;
    Ok(())
}
