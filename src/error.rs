//! Error taxonomy for stream, buffer and transfer operations.
//!
//! A single crate-wide enum keeps capability failures distinguishable from
//! genuine I/O failures: callers can match on `CapabilityViolation` or
//! `ClosedStream` without string inspection.

use thiserror::Error;

/// Errors surfaced by streams, buffers, codecs and the transfer engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Operation attempted on a closed stream handle.
    #[error("stream is closed")]
    ClosedStream,

    /// Operation not permitted by the stream's capability flags.
    #[error("stream does not support {0}")]
    CapabilityViolation(&'static str),

    /// Unrecognized mode string on a file-like constructor.
    #[error("invalid mode string: {0:?}")]
    InvalidMode(String),

    /// Malformed argument, rejected before any I/O is attempted.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Unknown compression name, or one inapplicable to the requested wrapper.
    #[error("invalid codec: {0:?}")]
    InvalidCodec(String),

    /// Foreign handle capabilities don't match the caller-declared mode,
    /// or a text-mode handle was supplied where binary framing is required.
    #[error("handle type mismatch: {0}")]
    TypeMismatch(String),

    /// Memory pool refused the allocation.
    #[error("allocation of {0} bytes failed")]
    AllocationFailure(usize),

    /// Error captured in a transfer worker thread, re-raised after join.
    #[error("transfer worker failed")]
    TransferFailure(#[source] Box<Error>),

    /// Underlying operating-system I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for all streamkit operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap an error that escaped a background transfer worker.
    pub(crate) fn transfer(inner: Error) -> Error {
        Error::TransferFailure(Box::new(inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(Error::ClosedStream.to_string(), "stream is closed");
        assert_eq!(
            Error::CapabilityViolation("write").to_string(),
            "stream does not support write"
        );
        assert_eq!(
            Error::InvalidMode("x".to_string()).to_string(),
            "invalid mode string: \"x\""
        );
    }

    #[test]
    fn test_transfer_wraps_source() {
        let err = Error::transfer(Error::ClosedStream);
        match err {
            Error::TransferFailure(inner) => assert!(matches!(*inner, Error::ClosedStream)),
            _ => panic!("expected TransferFailure"),
        }
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
