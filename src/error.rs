use crate::descriptor::EndpointAddress;
use std::io;
use thiserror::Error;

/// Everything that can go wrong while discovering or writing to a printer.
#[derive(Error, Debug)]
pub enum Error {
    #[error("no USB device matches the filter")]
    NoDeviceFound,
    #[error("endpoint {endpoint} is no longer available on the device")]
    EndpointUnavailable { endpoint: EndpointAddress },
    #[error("the write did not complete in time")]
    Timeout,
    #[error("partial write: {written} of {requested} bytes transferred")]
    PartialWrite { written: usize, requested: usize },
    #[error("usb error: {0}")]
    Usb(#[from] rusb::Error),
}

impl Error {
    /// Returns the number of bytes that reached the device before the error.
    pub fn written(&self) -> usize {
        match self {
            Error::PartialWrite { written, .. } => *written,
            _ => 0,
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match &err {
            Error::NoDeviceFound => io::ErrorKind::NotFound,
            Error::EndpointUnavailable { .. } => io::ErrorKind::NotConnected,
            Error::Timeout => io::ErrorKind::TimedOut,
            Error::PartialWrite { .. } => io::ErrorKind::WriteZero,
            Error::Usb(rusb::Error::NoDevice) => io::ErrorKind::NotConnected,
            Error::Usb(rusb::Error::Access) => io::ErrorKind::PermissionDenied,
            Error::Usb(_) => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_written() {
        let err = Error::PartialWrite {
            written: 6,
            requested: 10,
        };
        assert_eq!(err.written(), 6);
        assert_eq!(Error::Timeout.written(), 0);
        assert_eq!(err.to_string(), "partial write: 6 of 10 bytes transferred");
    }

    #[test]
    fn test_into_io_error() {
        let err: io::Error = Error::Timeout.into();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);

        let err: io::Error = Error::Usb(rusb::Error::Access).into();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }
}
