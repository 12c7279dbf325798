//! Compression codecs.
//!
//! The codec set is fixed and identified by name. Each codec offers the
//! one-shot contract (`max_compressed_len`, `compress`, `decompress`) and
//! streaming encoder/decoder constructors used by the compressed decorator
//! streams. One-shot and streaming output share the same framing, so bytes
//! produced by either side decode with the other.
//!
//! # Supported algorithms
//!
//! - **gzip** (flate2)
//! - **bz2** (bzip2)
//! - **brotli**
//! - **lz4** - frame format
//! - **snappy** (snap) - frame format
//! - **zstd**

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use once_cell::sync::Lazy;

use crate::error::{Error, Result};

const BROTLI_BUFFER: usize = 4096;
const BROTLI_QUALITY: u32 = 5;
const BROTLI_LGWIN: u32 = 22;
const ZSTD_LEVEL: i32 = 3;

/// Compression algorithm identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    /// Identity codec; valid for the one-shot surface, rejected by the
    /// compressed stream wrappers (they require an actual algorithm).
    Uncompressed,
    Bz2,
    Brotli,
    Gzip,
    Lz4,
    Snappy,
    Zstd,
}

/// File-suffix detection table. No rule exists for brotli, snappy or
/// uncompressed.
static SUFFIX_TABLE: Lazy<HashMap<&'static str, Codec>> = Lazy::new(|| {
    let mut table = HashMap::new();
    table.insert("bz2", Codec::Bz2);
    table.insert("gz", Codec::Gzip);
    table.insert("lz4", Codec::Lz4);
    table.insert("zst", Codec::Zstd);
    table
});

impl Codec {
    /// Resolve a codec from its canonical name.
    pub fn from_name(name: &str) -> Result<Codec> {
        match name {
            "uncompressed" => Ok(Codec::Uncompressed),
            "bz2" => Ok(Codec::Bz2),
            "brotli" => Ok(Codec::Brotli),
            "gzip" => Ok(Codec::Gzip),
            "lz4" => Ok(Codec::Lz4),
            "snappy" => Ok(Codec::Snappy),
            "zstd" => Ok(Codec::Zstd),
            other => Err(Error::InvalidCodec(other.to_string())),
        }
    }

    /// Canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            Codec::Uncompressed => "uncompressed",
            Codec::Bz2 => "bz2",
            Codec::Brotli => "brotli",
            Codec::Gzip => "gzip",
            Codec::Lz4 => "lz4",
            Codec::Snappy => "snappy",
            Codec::Zstd => "zstd",
        }
    }

    /// Infer a codec from a path's file extension, if a suffix rule exists.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Codec> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| SUFFIX_TABLE.get(ext).copied())
    }

    /// Upper bound on the compressed size of `len` input bytes.
    pub fn max_compressed_len(&self, len: usize) -> usize {
        match self {
            Codec::Uncompressed => len,
            Codec::Zstd => zstd::zstd_safe::compress_bound(len),
            // Frame headers on top of the raw worst case.
            Codec::Snappy => snap::raw::max_compress_len(len) + 128,
            // Stored-block worst case with header margin.
            Codec::Bz2 | Codec::Brotli | Codec::Gzip | Codec::Lz4 => len + len / 255 + 128,
        }
    }

    /// One-shot compression.
    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let out = match self {
            Codec::Uncompressed => data.to_vec(),
            Codec::Gzip => {
                let mut enc = GzEncoder::new(Vec::new(), flate2::Compression::default());
                enc.write_all(data)?;
                enc.finish()?
            }
            Codec::Bz2 => {
                let mut enc =
                    bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
                enc.write_all(data)?;
                enc.finish()?
            }
            Codec::Brotli => {
                let mut out = Vec::new();
                {
                    let mut enc = brotli::CompressorWriter::new(
                        &mut out,
                        BROTLI_BUFFER,
                        BROTLI_QUALITY,
                        BROTLI_LGWIN,
                    );
                    enc.write_all(data)?;
                }
                out
            }
            Codec::Lz4 => {
                let mut enc = lz4::EncoderBuilder::new().build(Vec::new())?;
                enc.write_all(data)?;
                let (out, result) = enc.finish();
                result?;
                out
            }
            Codec::Snappy => {
                let mut enc = snap::write::FrameEncoder::new(Vec::new());
                enc.write_all(data)?;
                enc.into_inner()
                    .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?
            }
            Codec::Zstd => zstd::encode_all(data, ZSTD_LEVEL)?,
        };
        Ok(out)
    }

    /// One-shot decompression. `uncompressed_hint` pre-sizes the output;
    /// the framed formats carry their own termination, so the hint is an
    /// optimization, not a limit.
    pub fn decompress(&self, data: &[u8], uncompressed_hint: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(uncompressed_hint);
        match self {
            Codec::Uncompressed => out.extend_from_slice(data),
            Codec::Gzip => {
                GzDecoder::new(data).read_to_end(&mut out)?;
            }
            Codec::Bz2 => {
                bzip2::read::BzDecoder::new(data).read_to_end(&mut out)?;
            }
            Codec::Brotli => {
                brotli::Decompressor::new(data, BROTLI_BUFFER).read_to_end(&mut out)?;
            }
            Codec::Lz4 => {
                lz4::Decoder::new(data)?.read_to_end(&mut out)?;
            }
            Codec::Snappy => {
                snap::read::FrameDecoder::new(data).read_to_end(&mut out)?;
            }
            Codec::Zstd => {
                zstd::stream::read::Decoder::new(data)?.read_to_end(&mut out)?;
            }
        }
        Ok(out)
    }

    /// Streaming decoder over `reader`. Fails with
    /// [`Error::InvalidCodec`] for [`Codec::Uncompressed`].
    pub fn new_decoder<R>(&self, reader: R) -> Result<Box<dyn Read + Send>>
    where
        R: Read + Send + 'static,
    {
        let decoder: Box<dyn Read + Send> = match self {
            Codec::Uncompressed => {
                return Err(Error::InvalidCodec("uncompressed".to_string()));
            }
            Codec::Gzip => Box::new(GzDecoder::new(reader)),
            Codec::Bz2 => Box::new(bzip2::read::BzDecoder::new(reader)),
            Codec::Brotli => Box::new(brotli::Decompressor::new(reader, BROTLI_BUFFER)),
            Codec::Lz4 => Box::new(lz4::Decoder::new(reader)?),
            Codec::Snappy => Box::new(snap::read::FrameDecoder::new(reader)),
            Codec::Zstd => Box::new(zstd::stream::read::Decoder::new(reader)?),
        };
        Ok(decoder)
    }

    /// Streaming encoder over `writer`. Fails with
    /// [`Error::InvalidCodec`] for [`Codec::Uncompressed`].
    pub fn new_encoder<W>(&self, writer: W) -> Result<Box<dyn FinishingWriter>>
    where
        W: Write + Send + 'static,
    {
        let encoder: Box<dyn FinishingWriter> = match self {
            Codec::Uncompressed => {
                return Err(Error::InvalidCodec("uncompressed".to_string()));
            }
            Codec::Gzip => Box::new(GzEncoder::new(writer, flate2::Compression::default())),
            Codec::Bz2 => Box::new(bzip2::write::BzEncoder::new(
                writer,
                bzip2::Compression::default(),
            )),
            Codec::Brotli => Box::new(brotli::CompressorWriter::new(
                writer,
                BROTLI_BUFFER,
                BROTLI_QUALITY,
                BROTLI_LGWIN,
            )),
            Codec::Lz4 => Box::new(Lz4Finisher(Some(
                lz4::EncoderBuilder::new().build(writer)?,
            ))),
            Codec::Snappy => Box::new(snap::write::FrameEncoder::new(writer)),
            Codec::Zstd => Box::new(zstd::stream::write::Encoder::new(writer, ZSTD_LEVEL)?),
        };
        Ok(encoder)
    }
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Streaming encoder that can finalize its trailer/footer state.
///
/// `finish` must be called before the underlying writer is torn down;
/// afterwards the encoder is spent.
pub trait FinishingWriter: Write + Send {
    fn finish(&mut self) -> io::Result<()>;
}

impl<W: Write + Send> FinishingWriter for GzEncoder<W> {
    fn finish(&mut self) -> io::Result<()> {
        self.try_finish()
    }
}

impl<W: Write + Send> FinishingWriter for bzip2::write::BzEncoder<W> {
    fn finish(&mut self) -> io::Result<()> {
        self.try_finish()
    }
}

impl<W: Write + Send> FinishingWriter for brotli::CompressorWriter<W> {
    fn finish(&mut self) -> io::Result<()> {
        // The brotli stream is finalized when the writer drops; flushing
        // here pushes everything produced so far to the inner writer.
        self.flush()
    }
}

impl<W: Write + Send> FinishingWriter for snap::write::FrameEncoder<W> {
    fn finish(&mut self) -> io::Result<()> {
        // Each flush closes the current snappy frame; nothing trails it.
        self.flush()
    }
}

impl<W: Write + Send> FinishingWriter for zstd::stream::write::Encoder<'static, W> {
    fn finish(&mut self) -> io::Result<()> {
        self.do_finish()
    }
}

/// lz4 finalizes by value; hold the encoder in an `Option` so `finish`
/// can consume it behind `&mut`.
struct Lz4Finisher<W: Write>(Option<lz4::Encoder<W>>);

impl<W: Write + Send> Write for Lz4Finisher<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.0 {
            Some(enc) => enc.write(buf),
            None => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "lz4 encoder already finished",
            )),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.0 {
            Some(enc) => enc.flush(),
            None => Ok(()),
        }
    }
}

impl<W: Write + Send> FinishingWriter for Lz4Finisher<W> {
    fn finish(&mut self) -> io::Result<()> {
        match self.0.take() {
            Some(enc) => {
                let (_writer, result) = enc.finish();
                result
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Codec; 7] = [
        Codec::Uncompressed,
        Codec::Bz2,
        Codec::Brotli,
        Codec::Gzip,
        Codec::Lz4,
        Codec::Snappy,
        Codec::Zstd,
    ];

    fn sample(len: usize) -> Vec<u8> {
        // Mildly compressible deterministic bytes.
        (0..len).map(|i| ((i * 31) % 251) as u8).collect()
    }

    #[test]
    fn test_roundtrip_every_codec() {
        for codec in ALL {
            for len in [0usize, 1, 64 * 1024] {
                let data = sample(len);
                let compressed = codec.compress(&data).unwrap();
                let restored = codec.decompress(&compressed, data.len()).unwrap();
                assert_eq!(restored, data, "roundtrip failed for {} len {}", codec, len);
            }
        }
    }

    // Slow: run with `cargo test -- --ignored` before release.
    #[test]
    #[ignore]
    fn test_roundtrip_large_payload() {
        let data = sample(10 * 1024 * 1024);
        for codec in ALL {
            let compressed = codec.compress(&data).unwrap();
            let restored = codec.decompress(&compressed, data.len()).unwrap();
            assert_eq!(restored, data, "roundtrip failed for {}", codec);
        }
    }

    #[test]
    fn test_compressed_fits_bound() {
        for codec in ALL {
            let data = sample(10 * 1024);
            let compressed = codec.compress(&data).unwrap();
            assert!(
                compressed.len() <= codec.max_compressed_len(data.len()),
                "{} exceeded its bound: {} > {}",
                codec,
                compressed.len(),
                codec.max_compressed_len(data.len())
            );
        }
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Codec::from_name("gzip").unwrap(), Codec::Gzip);
        assert_eq!(Codec::from_name("uncompressed").unwrap(), Codec::Uncompressed);
        for codec in ALL {
            assert_eq!(Codec::from_name(codec.name()).unwrap(), codec);
        }
        assert!(matches!(
            Codec::from_name("deflate"),
            Err(Error::InvalidCodec(_))
        ));
        assert!(matches!(Codec::from_name("GZIP"), Err(Error::InvalidCodec(_))));
    }

    #[test]
    fn test_suffix_detection() {
        assert_eq!(Codec::from_path("data.gz"), Some(Codec::Gzip));
        assert_eq!(Codec::from_path("data.bz2"), Some(Codec::Bz2));
        assert_eq!(Codec::from_path("data.lz4"), Some(Codec::Lz4));
        assert_eq!(Codec::from_path("data.zst"), Some(Codec::Zstd));
        assert_eq!(Codec::from_path("data.bin"), None);
        assert_eq!(Codec::from_path("data"), None);
        // No suffix rule for brotli or snappy.
        assert_eq!(Codec::from_path("data.br"), None);
    }

    // Test-only writer funneling into a Vec the test can still observe.
    #[derive(Clone)]
    struct SharedVec(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);
    impl Write for SharedVec {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_streaming_matches_one_shot() {
        let data = sample(32 * 1024);
        for codec in [
            Codec::Bz2,
            Codec::Brotli,
            Codec::Gzip,
            Codec::Lz4,
            Codec::Snappy,
            Codec::Zstd,
        ] {
            // Streamed encode, one-shot decode.
            let sink = SharedVec(Default::default());
            {
                let mut enc = codec.new_encoder(sink.clone()).unwrap();
                enc.write_all(&data).unwrap();
                enc.finish().unwrap();
            }
            let encoded = sink.0.lock().unwrap().clone();
            let restored = codec.decompress(&encoded, data.len()).unwrap();
            assert_eq!(restored, data, "stream-encode mismatch for {}", codec);

            // One-shot encode, streamed decode.
            let compressed = codec.compress(&data).unwrap();
            let mut dec = codec.new_decoder(io::Cursor::new(compressed)).unwrap();
            let mut restored = Vec::new();
            dec.read_to_end(&mut restored).unwrap();
            assert_eq!(restored, data, "stream-decode mismatch for {}", codec);
        }
    }

    #[test]
    fn test_streaming_rejects_uncompressed() {
        assert!(matches!(
            Codec::Uncompressed.new_decoder(io::Cursor::new(Vec::new())),
            Err(Error::InvalidCodec(_))
        ));
        assert!(matches!(
            Codec::Uncompressed.new_encoder(Vec::new()),
            Err(Error::InvalidCodec(_))
        ));
    }
}
