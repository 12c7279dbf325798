//! Adapter over caller-supplied file-like handles.
//!
//! A foreign handle is anything the embedder can express as a [`RawHandle`]:
//! a socket wrapper, a host-language file object behind FFI glue, a test
//! double. The adapter never probes the object; it consumes an explicit
//! [`HandleDescriptor`] and gates every operation on it.

use std::io::{self, SeekFrom};

use crate::backends::OpenMode;
use crate::error::{Error, Result};
use crate::stream::Stream;

/// Minimal capability descriptor for a foreign handle.
#[derive(Debug, Clone)]
pub struct HandleDescriptor {
    pub readable: bool,
    pub writable: bool,
    pub seekable: bool,
    /// Byte framing. Text-mode handles are rejected; this core moves bytes.
    pub binary: bool,
    /// Optional mode hint (`"rb"`, `"wb"`, ...) reported by the handle.
    pub mode: Option<String>,
}

impl HandleDescriptor {
    /// Binary handle with the given read/write capabilities, no seek.
    pub fn sequential(readable: bool, writable: bool) -> HandleDescriptor {
        HandleDescriptor {
            readable,
            writable,
            seekable: false,
            binary: true,
            mode: None,
        }
    }
}

fn unsupported(op: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, format!("handle: {op} unsupported"))
}

/// Contract a foreign file-like object is adapted through.
///
/// Default bodies reject the optional operations, so an embedder only
/// implements what the handle actually supports; the descriptor must agree.
pub trait RawHandle: Send {
    /// Capability descriptor; consulted once at wrap time.
    fn descriptor(&self) -> HandleDescriptor;

    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(unsupported("read"))
    }

    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(unsupported("write"))
    }

    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Err(unsupported("seek"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Stream over a [`RawHandle`].
pub struct ForeignHandle {
    inner: Box<dyn RawHandle>,
    mode: OpenMode,
    seekable: bool,
    pos: u64,
    closed: bool,
    /// Whether `close` also closes the wrapped handle. Caller-supplied
    /// handles default to not-owned; the wrapper then only marks itself
    /// closed.
    owned: bool,
}

impl std::fmt::Debug for ForeignHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForeignHandle")
            .field("mode", &self.mode)
            .field("seekable", &self.seekable)
            .field("pos", &self.pos)
            .field("closed", &self.closed)
            .field("owned", &self.owned)
            .finish_non_exhaustive()
    }
}

impl ForeignHandle {
    /// Wrap `handle`, inferring the effective mode.
    ///
    /// Preference order: the explicit `mode` argument, then the
    /// descriptor's mode hint, then the descriptor's capability flags.
    /// A declared mode that exceeds the handle's actual capabilities fails
    /// with [`Error::TypeMismatch`], as does a text-framing handle.
    pub fn new(handle: Box<dyn RawHandle>, mode: Option<&str>) -> Result<ForeignHandle> {
        let desc = handle.descriptor();
        if !desc.binary {
            return Err(Error::TypeMismatch(
                "binary handle required, got text framing".to_string(),
            ));
        }

        let resolved = match (mode, desc.mode.as_deref()) {
            (Some(explicit), _) => OpenMode::parse(explicit)?,
            (None, Some(hint)) => OpenMode::parse(hint)?,
            (None, None) => match (desc.readable, desc.writable) {
                (true, true) => OpenMode::ReadWrite,
                (true, false) => OpenMode::Read,
                (false, true) => OpenMode::Write,
                (false, false) => {
                    return Err(Error::TypeMismatch(
                        "handle is neither readable nor writable".to_string(),
                    ))
                }
            },
        };

        if resolved.readable() && !desc.readable {
            return Err(Error::TypeMismatch(format!(
                "mode {:?} requires a readable handle",
                resolved
            )));
        }
        if resolved.writable() && !desc.writable {
            return Err(Error::TypeMismatch(format!(
                "mode {:?} requires a writable handle",
                resolved
            )));
        }

        Ok(ForeignHandle {
            inner: handle,
            mode: resolved,
            seekable: desc.seekable,
            pos: 0,
            closed: false,
            owned: false,
        })
    }

    /// Make this wrapper own the handle: `close` (and drop after close)
    /// will close the handle too.
    pub fn owning(mut self) -> ForeignHandle {
        self.owned = true;
        self
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::ClosedStream)
        } else {
            Ok(())
        }
    }
}

impl Drop for ForeignHandle {
    fn drop(&mut self) {
        // An owned handle must release its resource even without an
        // explicit close. Errors have nowhere to go from a destructor.
        if self.owned && !self.closed {
            let _ = self.close();
        }
    }
}

impl Stream for ForeignHandle {
    fn readable(&self) -> bool {
        self.mode.readable()
    }

    fn writable(&self) -> bool {
        self.mode.writable()
    }

    fn seekable(&self) -> bool {
        self.seekable
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if self.mode.writable() {
            self.inner.flush()?;
        }
        if self.owned {
            self.inner.close()?;
        }
        self.closed = true;
        Ok(())
    }

    fn read(&mut self, n: Option<usize>) -> Result<Vec<u8>> {
        self.check_open()?;
        if !self.readable() {
            return Err(Error::CapabilityViolation("read"));
        }
        let out = match n {
            Some(n) => {
                let mut buf = vec![0u8; n];
                let mut filled = 0;
                while filled < n {
                    match self.inner.read(&mut buf[filled..])? {
                        0 => break,
                        read => filled += read,
                    }
                }
                buf.truncate(filled);
                buf
            }
            None => {
                // Sequential read-to-exhaustion in chunk-sized steps.
                let mut all = Vec::new();
                let mut chunk = [0u8; 8192];
                loop {
                    match self.inner.read(&mut chunk)? {
                        0 => break,
                        read => all.extend_from_slice(&chunk[..read]),
                    }
                }
                all
            }
        };
        self.pos += out.len() as u64;
        Ok(out)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.check_open()?;
        if !self.writable() {
            return Err(Error::CapabilityViolation("write"));
        }
        let mut written = 0;
        while written < data.len() {
            match self.inner.write(&data[written..])? {
                0 => break,
                n => written += n,
            }
        }
        self.pos += written as u64;
        Ok(written)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.check_open()?;
        if !self.seekable {
            return Err(Error::CapabilityViolation("seek"));
        }
        self.pos = self.inner.seek(pos)?;
        Ok(self.pos)
    }

    fn tell(&self) -> Result<u64> {
        self.check_open()?;
        Ok(self.pos)
    }

    fn size(&mut self) -> Result<u64> {
        self.check_open()?;
        if !self.seekable {
            return Err(Error::CapabilityViolation("size"));
        }
        let saved = self.pos;
        let end = self.inner.seek(SeekFrom::End(0))?;
        self.pos = self.inner.seek(SeekFrom::Start(saved))?;
        Ok(end)
    }

    fn flush(&mut self) -> Result<()> {
        self.check_open()?;
        self.inner.flush()?;
        Ok(())
    }
}
