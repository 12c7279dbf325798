//! Buffering decorators.
//!
//! A fixed-size internal buffer sits between the caller and the wrapped
//! stream so that many small reads or writes turn into few large calls on
//! the underlying resource. `detach()` releases the wrapped raw stream
//! (flushing first on the output side) and leaves the decorator unusable;
//! the returned handle carries the raw stream's own capability flags, so
//! seek survives exactly when the raw handle is random-access.

use std::io::SeekFrom;

use crate::error::{Error, Result};
use crate::stream::{BoxedStream, Stream};

fn check_buffer_size(buffer_size: usize) -> Result<()> {
    if buffer_size == 0 {
        return Err(Error::InvalidArgument(
            "buffer size must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Read-side buffering decorator.
pub struct BufferedInputStream {
    /// `None` after `close` or `detach`.
    raw: Option<BoxedStream>,
    buf: Vec<u8>,
    /// Next unconsumed byte in `buf`.
    start: usize,
    /// One past the last valid byte in `buf`.
    end: usize,
    buffer_size: usize,
}

impl BufferedInputStream {
    pub fn new(raw: BoxedStream, buffer_size: usize) -> Result<BufferedInputStream> {
        check_buffer_size(buffer_size)?;
        if !raw.readable() {
            return Err(Error::CapabilityViolation("read"));
        }
        Ok(BufferedInputStream {
            raw: Some(raw),
            buf: vec![0u8; buffer_size],
            start: 0,
            end: 0,
            buffer_size,
        })
    }

    /// Release the wrapped raw stream; the decorator becomes unusable.
    ///
    /// Bytes already pulled into the internal buffer but not yet consumed
    /// are rewound on a seekable raw stream; on a sequential stream they
    /// are unavoidably dropped.
    pub fn detach(&mut self) -> Result<BoxedStream> {
        let mut raw = self.raw.take().ok_or(Error::ClosedStream)?;
        let pending = (self.end - self.start) as i64;
        if pending > 0 && raw.seekable() {
            raw.seek(SeekFrom::Current(-pending))?;
        }
        self.start = 0;
        self.end = 0;
        Ok(raw)
    }

    /// Configured internal buffer size.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn raw_mut(&mut self) -> Result<&mut BoxedStream> {
        self.raw.as_mut().ok_or(Error::ClosedStream)
    }

    fn buffered(&self) -> usize {
        self.end - self.start
    }

    /// Pull the next chunk from the raw stream into the internal buffer.
    fn refill(&mut self) -> Result<usize> {
        let size = self.buffer_size;
        let raw = self.raw_mut()?;
        let chunk = raw.read(Some(size))?;
        self.buf[..chunk.len()].copy_from_slice(&chunk);
        self.start = 0;
        self.end = chunk.len();
        Ok(chunk.len())
    }
}

impl Stream for BufferedInputStream {
    fn readable(&self) -> bool {
        true
    }

    fn writable(&self) -> bool {
        false
    }

    fn seekable(&self) -> bool {
        self.raw.as_ref().map_or(false, |r| r.seekable())
    }

    fn is_closed(&self) -> bool {
        self.raw.is_none()
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut raw) = self.raw.take() {
            raw.close()?;
        }
        self.start = 0;
        self.end = 0;
        Ok(())
    }

    fn read(&mut self, n: Option<usize>) -> Result<Vec<u8>> {
        if self.raw.is_none() {
            return Err(Error::ClosedStream);
        }
        let mut out = match n {
            Some(n) => Vec::with_capacity(n.min(self.buffer_size * 2)),
            None => Vec::new(),
        };

        // Drain what is already buffered.
        let want = n.unwrap_or(usize::MAX);
        let from_buf = want.min(self.buffered());
        out.extend_from_slice(&self.buf[self.start..self.start + from_buf]);
        self.start += from_buf;

        let mut remaining = want - from_buf;
        if remaining == 0 {
            return Ok(out);
        }

        match n {
            None => {
                // Read-to-end passes straight through.
                let rest = self.raw_mut()?.read(None)?;
                out.extend_from_slice(&rest);
            }
            Some(_) => {
                // Large remainders bypass the buffer entirely.
                if remaining >= self.buffer_size {
                    let direct = self.raw_mut()?.read(Some(remaining))?;
                    out.extend_from_slice(&direct);
                } else {
                    while remaining > 0 {
                        if self.buffered() == 0 && self.refill()? == 0 {
                            break;
                        }
                        let take = remaining.min(self.buffered());
                        out.extend_from_slice(&self.buf[self.start..self.start + take]);
                        self.start += take;
                        remaining -= take;
                    }
                }
            }
        }
        Ok(out)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        if !self.seekable() {
            return Err(Error::CapabilityViolation("seek"));
        }
        // Translate relative seeks against the logical position before the
        // buffer is discarded.
        let target = match pos {
            SeekFrom::Current(delta) => {
                let logical = self.tell()?;
                let target = logical.checked_add_signed(delta).ok_or_else(|| {
                    Error::InvalidArgument("seek target before start of stream".to_string())
                })?;
                SeekFrom::Start(target)
            }
            other => other,
        };
        self.start = 0;
        self.end = 0;
        self.raw_mut()?.seek(target)
    }

    fn tell(&self) -> Result<u64> {
        let raw = self.raw.as_ref().ok_or(Error::ClosedStream)?;
        Ok(raw.tell()? - self.buffered() as u64)
    }

    fn size(&mut self) -> Result<u64> {
        if !self.seekable() {
            return Err(Error::CapabilityViolation("size"));
        }
        self.raw_mut()?.size()
    }
}

/// Write-side buffering decorator.
pub struct BufferedOutputStream {
    /// `None` after `close` or `detach`.
    raw: Option<BoxedStream>,
    /// Pending bytes not yet pushed to the raw stream.
    buf: Vec<u8>,
    buffer_size: usize,
}

impl BufferedOutputStream {
    pub fn new(raw: BoxedStream, buffer_size: usize) -> Result<BufferedOutputStream> {
        check_buffer_size(buffer_size)?;
        if !raw.writable() {
            return Err(Error::CapabilityViolation("write"));
        }
        Ok(BufferedOutputStream {
            raw: Some(raw),
            buf: Vec::with_capacity(buffer_size),
            buffer_size,
        })
    }

    /// Flush pending bytes and release the wrapped raw stream; the
    /// decorator becomes unusable.
    pub fn detach(&mut self) -> Result<BoxedStream> {
        self.flush_pending()?;
        self.raw.take().ok_or(Error::ClosedStream)
    }

    /// Configured internal buffer size.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn raw_mut(&mut self) -> Result<&mut BoxedStream> {
        self.raw.as_mut().ok_or(Error::ClosedStream)
    }

    fn flush_pending(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let pending = std::mem::take(&mut self.buf);
        let result = self.raw_mut().and_then(|raw| raw.write(&pending));
        // Keep the pending bytes on error so a retry can still flush them.
        self.buf = pending;
        result?;
        self.buf.clear();
        Ok(())
    }
}

impl Stream for BufferedOutputStream {
    fn readable(&self) -> bool {
        false
    }

    fn writable(&self) -> bool {
        true
    }

    fn seekable(&self) -> bool {
        self.raw.as_ref().map_or(false, |r| r.seekable())
    }

    fn is_closed(&self) -> bool {
        self.raw.is_none()
    }

    fn close(&mut self) -> Result<()> {
        if self.raw.is_some() {
            self.flush_pending()?;
            if let Some(mut raw) = self.raw.take() {
                raw.close()?;
            }
        }
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        if self.raw.is_none() {
            return Err(Error::ClosedStream);
        }
        if self.buf.len() + data.len() <= self.buffer_size {
            self.buf.extend_from_slice(data);
            return Ok(data.len());
        }
        self.flush_pending()?;
        if data.len() >= self.buffer_size {
            // Large writes go straight through.
            self.raw_mut()?.write(data)
        } else {
            self.buf.extend_from_slice(data);
            Ok(data.len())
        }
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        if !self.seekable() {
            return Err(Error::CapabilityViolation("seek"));
        }
        self.flush_pending()?;
        self.raw_mut()?.seek(pos)
    }

    fn tell(&self) -> Result<u64> {
        let raw = self.raw.as_ref().ok_or(Error::ClosedStream)?;
        Ok(raw.tell()? + self.buf.len() as u64)
    }

    fn size(&mut self) -> Result<u64> {
        if !self.seekable() {
            return Err(Error::CapabilityViolation("size"));
        }
        self.flush_pending()?;
        self.raw_mut()?.size()
    }

    fn flush(&mut self) -> Result<()> {
        if self.raw.is_none() {
            return Err(Error::ClosedStream);
        }
        self.flush_pending()?;
        self.raw_mut()?.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::{BufferOutputStream, BufferReader};
    use crate::buffer::Buffer;

    fn reader(data: &[u8]) -> BoxedStream {
        Box::new(BufferReader::new(Buffer::from_slice(data)))
    }

    #[test]
    fn test_zero_buffer_size_rejected() {
        assert!(matches!(
            BufferedInputStream::new(reader(b"x"), 0),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            BufferedOutputStream::new(Box::new(BufferOutputStream::new()), 0),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_input_small_reads() {
        let mut s = BufferedInputStream::new(reader(b"0123456789"), 4).unwrap();
        assert_eq!(s.read(Some(2)).unwrap(), b"01");
        assert_eq!(s.read(Some(2)).unwrap(), b"23");
        assert_eq!(s.read(Some(3)).unwrap(), b"456");
        assert_eq!(s.read(None).unwrap(), b"789");
        assert_eq!(s.read(Some(1)).unwrap(), b"");
    }

    #[test]
    fn test_input_large_read_bypasses() {
        let data: Vec<u8> = (0..100).collect();
        let mut s = BufferedInputStream::new(reader(&data), 8).unwrap();
        assert_eq!(s.read(Some(3)).unwrap(), &data[..3]);
        assert_eq!(s.read(Some(90)).unwrap(), &data[3..93]);
        assert_eq!(s.read(None).unwrap(), &data[93..]);
    }

    #[test]
    fn test_input_tell_accounts_for_buffer() {
        let mut s = BufferedInputStream::new(reader(b"0123456789"), 8).unwrap();
        assert_eq!(s.read(Some(2)).unwrap(), b"01");
        // Raw position is 8 (one refill), logical is 2.
        assert_eq!(s.tell().unwrap(), 2);
    }

    #[test]
    fn test_input_seek_discards_buffer() {
        let mut s = BufferedInputStream::new(reader(b"0123456789"), 4).unwrap();
        s.read(Some(2)).unwrap();
        s.seek(SeekFrom::Start(6)).unwrap();
        assert_eq!(s.read(Some(2)).unwrap(), b"67");
        s.seek(SeekFrom::Current(-2)).unwrap();
        assert_eq!(s.read(Some(2)).unwrap(), b"67");
    }

    #[test]
    fn test_input_detach_rewinds_unread() {
        let mut s = BufferedInputStream::new(reader(b"0123456789"), 8).unwrap();
        assert_eq!(s.read(Some(2)).unwrap(), b"01");
        let mut raw = s.detach().unwrap();
        // Raw resumes at the logical position, not the buffered one.
        assert_eq!(raw.tell().unwrap(), 2);
        assert_eq!(raw.read(None).unwrap(), b"23456789");
        // Decorator is unusable now.
        assert!(matches!(s.read(Some(1)), Err(Error::ClosedStream)));
        assert!(matches!(s.detach(), Err(Error::ClosedStream)));
    }

    #[test]
    fn test_output_coalesces_writes() {
        let mut s = BufferedOutputStream::new(Box::new(BufferOutputStream::new()), 8).unwrap();
        s.write(b"ab").unwrap();
        s.write(b"cd").unwrap();
        // Nothing pushed yet: raw tell is 0, logical tell is 4.
        assert_eq!(s.tell().unwrap(), 4);
        s.flush().unwrap();
        assert_eq!(s.tell().unwrap(), 4);
    }

    #[test]
    fn test_output_detach_flushes() {
        let mut s = BufferedOutputStream::new(Box::new(BufferOutputStream::new()), 64).unwrap();
        s.write(b"pending").unwrap();
        let raw = s.detach().unwrap();
        assert_eq!(raw.tell().unwrap(), 7);
        assert!(matches!(s.write(b"x"), Err(Error::ClosedStream)));
    }

    #[test]
    fn test_output_large_write_passthrough() {
        let mut s = BufferedOutputStream::new(Box::new(BufferOutputStream::new()), 4).unwrap();
        s.write(b"ab").unwrap();
        s.write(b"cdefghij").unwrap();
        // Buffer flushed then large write went straight through.
        assert_eq!(s.tell().unwrap(), 10);
    }

    #[test]
    fn test_detached_capabilities_rederived() {
        // Seekable raw keeps seek through detach; the decorator over a
        // sequential raw reports unseekable.
        let mut buffered = BufferedInputStream::new(reader(b"abcdef"), 4).unwrap();
        assert!(buffered.seekable());
        let raw = buffered.detach().unwrap();
        assert!(raw.seekable());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut s = BufferedInputStream::new(reader(b"abc"), 4).unwrap();
        s.close().unwrap();
        s.close().unwrap();
        assert!(s.is_closed());
    }
}
