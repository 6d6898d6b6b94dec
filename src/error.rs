use std::io;

use failure::Fail;
use nix;

pub type Result<T> = ::std::result::Result<T, Error>;

#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "invalid argument: {}", reason)]
    Invalid { reason: &'static str },
    #[fail(display = "operating system error: {}", inner)]
    Os { inner: io::Error },
    #[fail(display = "failed to allocate ring buffer storage")]
    OutOfMemory,
    #[fail(display = "write attempted before the port was configured")]
    Pipe,
    #[fail(display = "platform does not provide a supported readiness facility")]
    NotSupported,
    #[fail(display = "configure called while the worker is running")]
    AlreadyRunning,
}

impl Error {
    pub fn invalid(reason: &'static str) -> Self {
        Error::Invalid { reason }
    }
}

impl From<nix::Error> for Error {
    fn from(inner: nix::Error) -> Self {
        // nix 0.24's `Error` is a type alias for `Errno` itself (a raw-errno-valued enum), not a
        // wrapper variant, so the conversion is a straight cast rather than a match on a `Sys(..)` arm.
        Error::Os {
            inner: io::Error::from_raw_os_error(inner as i32),
        }
    }
}

impl From<io::Error> for Error {
    fn from(inner: io::Error) -> Self {
        Error::Os { inner }
    }
}
