//! Compression decorators.
//!
//! Wrap any stream with a codec: reads decompress on the fly, writes
//! compress on the fly. The wrapper is sequential-only; seek does not
//! survive compression. Construction validates the codec before any I/O,
//! so an unknown name or the `uncompressed` sentinel fails fast.

use std::io::{self, Read, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::codec::{Codec, FinishingWriter};
use crate::error::{Error, Result};
use crate::stream::{BoxedStream, Stream};

/// Stream handle shared between the decorator and the codec wrapper that
/// drives it through `io::Read`/`io::Write`.
type SharedStream = Arc<Mutex<BoxedStream>>;

fn to_io(err: Error) -> io::Error {
    match err {
        Error::Io(io) => io,
        other => io::Error::new(io::ErrorKind::Other, other.to_string()),
    }
}

struct ChainedReader {
    inner: SharedStream,
}

impl Read for ChainedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut stream = self.inner.lock();
        let chunk = stream.read(Some(buf.len())).map_err(to_io)?;
        buf[..chunk.len()].copy_from_slice(&chunk);
        Ok(chunk.len())
    }
}

struct ChainedWriter {
    inner: SharedStream,
}

impl Write for ChainedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().write(buf).map_err(to_io)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().flush().map_err(to_io)
    }
}

/// Decompressing read decorator.
pub struct CompressedInputStream {
    raw: SharedStream,
    /// `None` once closed.
    decoder: Option<Box<dyn Read + Send>>,
    codec: Codec,
}

impl std::fmt::Debug for CompressedInputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressedInputStream")
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

impl CompressedInputStream {
    pub fn new(raw: BoxedStream, codec: Codec) -> Result<CompressedInputStream> {
        if !raw.readable() {
            return Err(Error::CapabilityViolation("read"));
        }
        let raw: SharedStream = Arc::new(Mutex::new(raw));
        let decoder = codec.new_decoder(ChainedReader { inner: raw.clone() })?;
        Ok(CompressedInputStream {
            raw,
            decoder: Some(decoder),
            codec,
        })
    }

    /// Codec this stream decodes.
    pub fn codec(&self) -> Codec {
        self.codec
    }
}

impl Stream for CompressedInputStream {
    fn readable(&self) -> bool {
        true
    }

    fn writable(&self) -> bool {
        false
    }

    fn seekable(&self) -> bool {
        false
    }

    fn is_closed(&self) -> bool {
        self.decoder.is_none()
    }

    fn close(&mut self) -> Result<()> {
        if self.decoder.take().is_some() {
            self.raw.lock().close()?;
        }
        Ok(())
    }

    fn read(&mut self, n: Option<usize>) -> Result<Vec<u8>> {
        let decoder = self.decoder.as_mut().ok_or(Error::ClosedStream)?;
        match n {
            Some(n) => {
                let mut out = vec![0u8; n];
                let mut filled = 0;
                while filled < n {
                    match decoder.read(&mut out[filled..])? {
                        0 => break,
                        read => filled += read,
                    }
                }
                out.truncate(filled);
                Ok(out)
            }
            None => {
                let mut out = Vec::new();
                decoder.read_to_end(&mut out)?;
                Ok(out)
            }
        }
    }
}

/// Compressing write decorator.
pub struct CompressedOutputStream {
    raw: SharedStream,
    /// `None` once closed.
    encoder: Option<Box<dyn FinishingWriter>>,
    codec: Codec,
}

impl CompressedOutputStream {
    pub fn new(raw: BoxedStream, codec: Codec) -> Result<CompressedOutputStream> {
        if !raw.writable() {
            return Err(Error::CapabilityViolation("write"));
        }
        let raw: SharedStream = Arc::new(Mutex::new(raw));
        let encoder = codec.new_encoder(ChainedWriter { inner: raw.clone() })?;
        Ok(CompressedOutputStream {
            raw,
            encoder: Some(encoder),
            codec,
        })
    }

    /// Codec this stream encodes.
    pub fn codec(&self) -> Codec {
        self.codec
    }
}

impl Stream for CompressedOutputStream {
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
        self.encoder.is_none()
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut encoder) = self.encoder.take() {
            encoder.finish()?;
            // The encoder may emit trailer bytes on drop (brotli); tear it
            // down before the raw stream closes underneath it.
            drop(encoder);
            let mut raw = self.raw.lock();
            raw.flush()?;
            raw.close()?;
        }
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let encoder = self.encoder.as_mut().ok_or(Error::ClosedStream)?;
        encoder.write_all(data)?;
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<()> {
        let encoder = self.encoder.as_mut().ok_or(Error::ClosedStream)?;
        encoder.flush()?;
        self.raw.lock().flush()
    }
}
