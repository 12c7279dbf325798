//! The capability-tagged stream contract.
//!
//! Every backend and decorator implements [`Stream`]. Capabilities are
//! queried, never probed by downcasting: an operation a stream does not
//! support fails deterministically with
//! [`Error::CapabilityViolation`](crate::Error::CapabilityViolation) from
//! the trait's default method bodies, so a backend only overrides what it
//! can actually do.
//!
//! The lifecycle is a two-state machine: `Open -> Closed` via [`Stream::close`],
//! irreversible. Capability queries keep answering after close; the closed
//! flag is checked separately by each I/O method.

use std::io::SeekFrom;

use crate::error::{Error, Result};

/// Polymorphic stream over readable/writable/seekable backends.
///
/// Implementations must check their closed flag at the top of every I/O
/// method and fail with [`Error::ClosedStream`] once closed.
pub trait Stream: Send {
    /// Whether this stream supports `read`/`read_at`. Never fails.
    fn readable(&self) -> bool;

    /// Whether this stream supports `write`. Never fails.
    fn writable(&self) -> bool;

    /// Whether this stream supports `seek`/`tell`/`size`/`read_at`. Never fails.
    fn seekable(&self) -> bool;

    /// Whether `close` has been called.
    fn is_closed(&self) -> bool;

    /// Close the stream. Idempotent: the second call is a no-op.
    ///
    /// A stream that owns its underlying resource releases it here; a
    /// decorator that does not own its wrapped stream leaves it open.
    fn close(&mut self) -> Result<()>;

    /// Read up to `n` bytes, or to end-of-data for `None`.
    ///
    /// End of stream is signaled by a short or empty result, never an
    /// error. On a seekable stream `read(None)` returns exactly
    /// `size() - tell()` bytes; on a sequential stream it reads until
    /// exhaustion.
    fn read(&mut self, _n: Option<usize>) -> Result<Vec<u8>> {
        Err(Error::CapabilityViolation("read"))
    }

    /// Read up to `n` bytes at an absolute offset without moving the
    /// current position. Random-access streams only.
    ///
    /// The default implementation round-trips through `seek`, so it is only
    /// available on seekable streams; backends with a direct path override it.
    fn read_at(&mut self, offset: u64, n: usize) -> Result<Vec<u8>> {
        if !self.seekable() {
            return Err(Error::CapabilityViolation("random access"));
        }
        let saved = self.tell()?;
        self.seek(SeekFrom::Start(offset))?;
        let out = self.read(Some(n));
        self.seek(SeekFrom::Start(saved))?;
        out
    }

    /// Write `data`, returning the number of bytes written.
    fn write(&mut self, _data: &[u8]) -> Result<usize> {
        Err(Error::CapabilityViolation("write"))
    }

    /// Move the current position. Seekable streams only.
    fn seek(&mut self, _pos: SeekFrom) -> Result<u64> {
        Err(Error::CapabilityViolation("seek"))
    }

    /// Current position. Seekable streams only.
    fn tell(&self) -> Result<u64> {
        Err(Error::CapabilityViolation("tell"))
    }

    /// Total length of the underlying data. Seekable streams only.
    fn size(&mut self) -> Result<u64> {
        Err(Error::CapabilityViolation("size"))
    }

    /// Force buffered data down to the underlying resource.
    /// No-op on pure readers.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Resolve a `SeekFrom` against a position and total size. Shared by the
/// in-memory and mmap backends.
///
/// Matches file semantics: positions past the end are legal and reads from
/// there return nothing. Only targets before the start fail.
pub(crate) fn resolve_seek(pos: SeekFrom, current: u64, size: u64) -> Result<u64> {
    let target = match pos {
        SeekFrom::Start(offset) => Some(offset),
        SeekFrom::Current(delta) => current.checked_add_signed(delta),
        SeekFrom::End(delta) => size.checked_add_signed(delta),
    };
    target.ok_or_else(|| {
        Error::InvalidArgument("seek target before start of stream".to_string())
    })
}

/// Shorthand for the boxed trait object the resolver and decorators pass
/// around.
pub type BoxedStream = Box<dyn Stream>;

#[cfg(test)]
mod tests {
    use super::*;

    // Minimal stream with no capabilities; exercises the default bodies.
    struct Inert {
        closed: bool,
    }

    impl Stream for Inert {
        fn readable(&self) -> bool {
            false
        }
        fn writable(&self) -> bool {
            false
        }
        fn seekable(&self) -> bool {
            false
        }
        fn is_closed(&self) -> bool {
            self.closed
        }
        fn close(&mut self) -> Result<()> {
            self.closed = true;
            Ok(())
        }
    }

    #[test]
    fn test_defaults_reject_everything() {
        let mut s = Inert { closed: false };
        assert!(matches!(
            s.read(None),
            Err(Error::CapabilityViolation("read"))
        ));
        assert!(matches!(
            s.write(b"x"),
            Err(Error::CapabilityViolation("write"))
        ));
        assert!(matches!(
            s.seek(SeekFrom::Start(0)),
            Err(Error::CapabilityViolation("seek"))
        ));
        assert!(matches!(
            s.read_at(0, 1),
            Err(Error::CapabilityViolation("random access"))
        ));
        assert!(s.flush().is_ok());
    }

    #[test]
    fn test_capability_queries_survive_close() {
        let mut s = Inert { closed: false };
        s.close().unwrap();
        assert!(!s.readable());
        assert!(!s.writable());
        assert!(!s.seekable());
        assert!(s.is_closed());
    }

    #[test]
    fn test_resolve_seek_whence() {
        assert_eq!(resolve_seek(SeekFrom::Start(3), 0, 10).unwrap(), 3);
        assert_eq!(resolve_seek(SeekFrom::Current(-2), 5, 10).unwrap(), 3);
        assert_eq!(resolve_seek(SeekFrom::End(0), 0, 10).unwrap(), 10);
        assert_eq!(resolve_seek(SeekFrom::End(-10), 0, 10).unwrap(), 0);
        assert!(resolve_seek(SeekFrom::Current(-1), 0, 10).is_err());
        // Past-end targets are valid positions, as with a plain file.
        assert_eq!(resolve_seek(SeekFrom::Start(11), 0, 10).unwrap(), 11);
        assert_eq!(resolve_seek(SeekFrom::End(5), 0, 10).unwrap(), 15);
    }
}
