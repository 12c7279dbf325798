//! In-memory stream backends over [`Buffer`].

use std::io::SeekFrom;

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::stream::{resolve_seek, Stream};

/// Random-access readable stream over a [`Buffer`]. Zero-copy: the buffer
/// is shared, and [`BufferReader::read_buffer`] hands out slices of it.
pub struct BufferReader {
    buf: Buffer,
    pos: u64,
    closed: bool,
}

impl BufferReader {
    pub fn new(buf: Buffer) -> BufferReader {
        BufferReader {
            buf,
            pos: 0,
            closed: false,
        }
    }

    /// Read up to `n` bytes as a zero-copy slice of the underlying buffer.
    pub fn read_buffer(&mut self, n: usize) -> Result<Buffer> {
        self.check_open()?;
        if self.pos as usize >= self.buf.size() {
            return self.buf.slice(self.buf.size(), Some(0));
        }
        let remaining = self.buf.size() - self.pos as usize;
        let take = n.min(remaining);
        let slice = self.buf.slice(self.pos as usize, Some(take))?;
        self.pos += take as u64;
        Ok(slice)
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::ClosedStream)
        } else {
            Ok(())
        }
    }
}

impl Stream for BufferReader {
    fn readable(&self) -> bool {
        true
    }

    fn writable(&self) -> bool {
        false
    }

    fn seekable(&self) -> bool {
        true
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    fn read(&mut self, n: Option<usize>) -> Result<Vec<u8>> {
        self.check_open()?;
        if self.pos as usize >= self.buf.size() {
            return Ok(Vec::new());
        }
        let remaining = self.buf.size() - self.pos as usize;
        let take = n.map_or(remaining, |n| n.min(remaining));
        let start = self.pos as usize;
        let out = self.buf.as_slice()[start..start + take].to_vec();
        self.pos += take as u64;
        Ok(out)
    }

    fn read_at(&mut self, offset: u64, n: usize) -> Result<Vec<u8>> {
        self.check_open()?;
        let total = self.buf.size() as u64;
        if offset >= total {
            return Ok(Vec::new());
        }
        let start = offset as usize;
        let take = n.min((total - offset) as usize);
        Ok(self.buf.as_slice()[start..start + take].to_vec())
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.check_open()?;
        self.pos = resolve_seek(pos, self.pos, self.buf.size() as u64)?;
        Ok(self.pos)
    }

    fn tell(&self) -> Result<u64> {
        self.check_open()?;
        Ok(self.pos)
    }

    fn size(&mut self) -> Result<u64> {
        self.check_open()?;
        Ok(self.buf.size() as u64)
    }
}

/// Writes into a pre-allocated mutable [`Buffer`] without growing it.
/// Writing past the end fails.
pub struct FixedSizeBufferWriter {
    buf: Buffer,
    pos: u64,
    closed: bool,
}

impl std::fmt::Debug for FixedSizeBufferWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedSizeBufferWriter")
            .field("pos", &self.pos)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl FixedSizeBufferWriter {
    /// Requires a mutable buffer; the writer mutates it in place through
    /// the shared storage, so clones held by the caller observe the writes.
    pub fn new(buf: Buffer) -> Result<FixedSizeBufferWriter> {
        if !buf.is_mutable() {
            return Err(Error::InvalidArgument(
                "fixed-size writer requires a mutable buffer".to_string(),
            ));
        }
        Ok(FixedSizeBufferWriter {
            buf,
            pos: 0,
            closed: false,
        })
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::ClosedStream)
        } else {
            Ok(())
        }
    }
}

impl Stream for FixedSizeBufferWriter {
    fn readable(&self) -> bool {
        false
    }

    fn writable(&self) -> bool {
        true
    }

    fn seekable(&self) -> bool {
        true
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.check_open()?;
        let total = self.buf.size() as u64;
        if self.pos + data.len() as u64 > total {
            return Err(Error::InvalidArgument(format!(
                "write of {} bytes at {} exceeds fixed buffer of {} bytes",
                data.len(),
                self.pos,
                total
            )));
        }
        let start = self.pos as usize;
        // Raw copy through the shared storage: caller-held clones of the
        // buffer observe the write, and no `&mut` view is formed. The
        // writer is the only mutator while it is open.
        unsafe { self.buf.write_bytes(start, data)? };
        self.pos += data.len() as u64;
        Ok(data.len())
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.check_open()?;
        self.pos = resolve_seek(pos, self.pos, self.buf.size() as u64)?;
        Ok(self.pos)
    }

    fn tell(&self) -> Result<u64> {
        self.check_open()?;
        Ok(self.pos)
    }

    fn size(&mut self) -> Result<u64> {
        self.check_open()?;
        Ok(self.buf.size() as u64)
    }
}

/// Growable in-memory writer. [`BufferOutputStream::finish`] closes the
/// stream and hands back the accumulated bytes as a [`Buffer`]; after that
/// the stream rejects further writes.
pub struct BufferOutputStream {
    data: Option<Vec<u8>>,
}

impl BufferOutputStream {
    pub fn new() -> BufferOutputStream {
        BufferOutputStream {
            data: Some(Vec::new()),
        }
    }

    /// Finalize: close the stream and return the accumulated buffer.
    pub fn finish(&mut self) -> Result<Buffer> {
        match self.data.take() {
            Some(data) => Ok(Buffer::from_vec(data)),
            None => Err(Error::ClosedStream),
        }
    }
}

impl Default for BufferOutputStream {
    fn default() -> Self {
        Self::new()
    }
}

impl Stream for BufferOutputStream {
    fn readable(&self) -> bool {
        false
    }

    fn writable(&self) -> bool {
        true
    }

    fn seekable(&self) -> bool {
        false
    }

    fn is_closed(&self) -> bool {
        self.data.is_none()
    }

    fn close(&mut self) -> Result<()> {
        self.data = None;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        match &mut self.data {
            Some(vec) => {
                vec.extend_from_slice(data);
                Ok(data.len())
            }
            None => Err(Error::ClosedStream),
        }
    }

    fn tell(&self) -> Result<u64> {
        match &self.data {
            Some(vec) => Ok(vec.len() as u64),
            None => Err(Error::ClosedStream),
        }
    }
}
