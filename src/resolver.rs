//! Source resolution: from a generic source description and a compression
//! policy to a composed stream.
//!
//! The resolver picks a backend for the source kind, then decorates it:
//! raw backend, then buffering (if a buffer size is given), then
//! compression (if the policy resolves to a codec). Buffering always sits
//! closer to the raw resource than compression.

use std::path::{Path, PathBuf};

use log::debug;

use crate::backends::{BufferOutputStream, BufferReader, FixedSizeBufferWriter, ForeignHandle};
use crate::backends::{LocalFile, RawHandle};
use crate::buffer::Buffer;
use crate::codec::Codec;
use crate::decorators::{
    BufferedInputStream, BufferedOutputStream, CompressedInputStream, CompressedOutputStream,
};
use crate::error::Result;
use crate::stream::BoxedStream;

/// Generic stream source accepted by [`open_input`] and [`open_output`].
pub enum Source {
    /// An already-open stream; passed through untouched.
    Stream(BoxedStream),
    /// A filesystem path; opened as a local file backend.
    Path(PathBuf),
    /// An in-memory buffer; wrapped as a reader (input) or fixed-size
    /// writer (output).
    Buffer(Buffer),
    /// A foreign file-like handle; bridged through the adapter.
    Handle(Box<dyn RawHandle>),
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Source {
        Source::Path(path)
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Source {
        Source::Path(path.to_path_buf())
    }
}

impl From<&str> for Source {
    fn from(path: &str) -> Source {
        Source::Path(PathBuf::from(path))
    }
}

impl From<Buffer> for Source {
    fn from(buf: Buffer) -> Source {
        Source::Buffer(buf)
    }
}

impl From<BoxedStream> for Source {
    fn from(stream: BoxedStream) -> Source {
        Source::Stream(stream)
    }
}

impl From<Box<dyn RawHandle>> for Source {
    fn from(handle: Box<dyn RawHandle>) -> Source {
        Source::Handle(handle)
    }
}

/// Compression policy for the resolvers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Infer the codec from the path's file extension; path-less sources
    /// resolve to no compression.
    #[default]
    Detect,
    /// Use this codec. `Codec::Uncompressed` means no wrapper.
    Codec(Codec),
    /// No compression.
    None,
}

impl Compression {
    /// Resolve a policy from a codec name, failing fast on unknown names.
    pub fn named(name: &str) -> Result<Compression> {
        Ok(Compression::Codec(Codec::from_name(name)?))
    }

    fn resolve(self, path: Option<&Path>) -> Option<Codec> {
        let codec = match self {
            Compression::Detect => path.and_then(Codec::from_path),
            Compression::Codec(Codec::Uncompressed) => None,
            Compression::Codec(codec) => Some(codec),
            Compression::None => None,
        };
        if let Some(codec) = codec {
            debug!("resolved compression: {}", codec.name());
        }
        codec
    }
}

/// Open a readable stream over `source`, decorated per the policy.
///
/// `buffer_size == 0` means no read buffering.
pub fn open_input<S: Into<Source>>(
    source: S,
    compression: Compression,
    buffer_size: usize,
) -> Result<BoxedStream> {
    let source = source.into();
    let codec = compression.resolve(source_path(&source));

    let mut stream: BoxedStream = match source {
        Source::Stream(stream) => stream,
        Source::Path(path) => {
            debug!("opening input file {:?}", path);
            Box::new(LocalFile::open(path, "rb")?)
        }
        Source::Buffer(buf) => Box::new(BufferReader::new(buf)),
        Source::Handle(handle) => Box::new(ForeignHandle::new(handle, None)?),
    };

    if buffer_size > 0 {
        stream = Box::new(BufferedInputStream::new(stream, buffer_size)?);
    }
    if let Some(codec) = codec {
        stream = Box::new(CompressedInputStream::new(stream, codec)?);
    }
    Ok(stream)
}

/// Open a writable stream over `source`, decorated per the policy.
///
/// `buffer_size == 0` means no write buffering.
pub fn open_output<S: Into<Source>>(
    source: S,
    compression: Compression,
    buffer_size: usize,
) -> Result<BoxedStream> {
    let source = source.into();
    let codec = compression.resolve(source_path(&source));

    let mut stream: BoxedStream = match source {
        Source::Stream(stream) => stream,
        Source::Path(path) => {
            debug!("opening output file {:?}", path);
            Box::new(LocalFile::open(path, "wb")?)
        }
        Source::Buffer(buf) => Box::new(FixedSizeBufferWriter::new(buf)?),
        Source::Handle(handle) => Box::new(ForeignHandle::new(handle, None)?),
    };

    if buffer_size > 0 {
        stream = Box::new(BufferedOutputStream::new(stream, buffer_size)?);
    }
    if let Some(codec) = codec {
        stream = Box::new(CompressedOutputStream::new(stream, codec)?);
    }
    Ok(stream)
}

/// Convenience: growable in-memory output stream.
pub fn growable_buffer_writer() -> BufferOutputStream {
    BufferOutputStream::new()
}

fn source_path(source: &Source) -> Option<&Path> {
    match source {
        Source::Path(path) => Some(path),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::stream::Stream;
    use std::fs;

    fn tmp(name: &str) -> String {
        format!("/tmp/streamkit_resolver_{}", name)
    }

    #[test]
    fn test_unknown_codec_name_fails_fast() {
        let err = Compression::named("superzip").unwrap_err();
        assert!(matches!(err, Error::InvalidCodec(_)));
    }

    #[test]
    fn test_detect_by_extension() {
        let path = tmp("detect.gz");
        fs::write(&path, Codec::Gzip.compress(b"detected payload").unwrap()).unwrap();

        let mut s = open_input(path.as_str(), Compression::Detect, 0).unwrap();
        assert_eq!(s.read(None).unwrap(), b"detected payload");

        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_detect_without_suffix_is_plain() {
        let path = tmp("plain.bin");
        fs::write(&path, b"not compressed").unwrap();

        let mut s = open_input(path.as_str(), Compression::Detect, 0).unwrap();
        assert_eq!(s.read(None).unwrap(), b"not compressed");

        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_detect_on_buffer_source_is_plain() {
        let buf = Buffer::from_slice(b"in memory");
        let mut s = open_input(buf, Compression::Detect, 0).unwrap();
        assert_eq!(s.read(None).unwrap(), b"in memory");
    }

    #[test]
    fn test_explicit_uncompressed_means_no_wrapper() {
        let buf = Buffer::from_slice(b"plain");
        let mut s = open_input(
            buf,
            Compression::Codec(Codec::Uncompressed),
            0,
        )
        .unwrap();
        assert!(s.seekable());
        assert_eq!(s.read(None).unwrap(), b"plain");
    }

    #[test]
    fn test_output_compose_and_read_back() {
        let path = tmp("composed.zst");
        {
            let mut out =
                open_output(path.as_str(), Compression::Detect, 512).unwrap();
            out.write(b"resolver composed output").unwrap();
            out.close().unwrap();
        }
        let mut s = open_input(path.as_str(), Compression::Detect, 256).unwrap();
        assert_eq!(s.read(None).unwrap(), b"resolver composed output");

        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_buffer_output_target() {
        let buf = Buffer::allocate(16).unwrap();
        let view = buf.clone();
        let mut s = open_output(buf, Compression::None, 0).unwrap();
        s.write(b"fixed!").unwrap();
        assert_eq!(&view.as_slice()[..6], b"fixed!");
    }

    #[test]
    fn test_stream_passthrough() {
        let inner: BoxedStream = Box::new(BufferReader::new(Buffer::from_slice(b"pass")));
        let mut s = open_input(inner, Compression::None, 0).unwrap();
        assert_eq!(s.read(None).unwrap(), b"pass");
    }
}
