//! Streamkit - Unified Stream and Buffer I/O Core
//!
//! A capability-tagged stream abstraction over heterogeneous byte sources
//! and sinks: local files, memory-mapped files, in-memory buffers, and
//! foreign file-like handles, with stackable buffering and compression
//! decorators and a bounded producer/consumer transfer engine.
//!
//! # Features
//!
//! - **Capability-tagged streams**: readable/writable/seekable queried up
//!   front; unsupported operations fail deterministically instead of
//!   surprising at I/O time
//! - **Reference-counted buffers**: zero-copy slicing over owned, foreign,
//!   or static memory, with pool-accounted allocation
//! - **Pluggable backends**: local file, mmap (with resize), in-memory
//!   reader/writers, foreign-handle adapter
//! - **Decorators**: transparent read/write buffering and streaming
//!   compression (bz2, brotli, gzip, lz4, snappy, zstd)
//! - **Source resolution**: one call from path/buffer/handle to a fully
//!   decorated stream, with compression auto-detected from the file suffix
//! - **Transfer engine**: bounded-queue background copy with backpressure
//!   and single-error propagation
//!
//! # Example
//!
//! ```rust
//! use streamkit::{open_input, open_output, Compression, Stream};
//!
//! let path = "/tmp/streamkit_doc_example.gz";
//!
//! // Suffix-detected gzip on the way out...
//! let mut out = open_output(path, Compression::Detect, 4096).unwrap();
//! out.write(b"hello, stream").unwrap();
//! out.close().unwrap();
//!
//! // ...and on the way back in.
//! let mut input = open_input(path, Compression::Detect, 4096).unwrap();
//! assert_eq!(input.read(None).unwrap(), b"hello, stream");
//! # std::fs::remove_file(path).ok();
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────┐
//! │   open_input / open_output    │  Source + compression policy
//! └──────────────┬────────────────┘
//!                │
//!                ▼
//! ┌───────────────────────────────┐
//! │  Compressed{Input,Output}     │  Optional codec decorator
//! ├───────────────────────────────┤
//! │  Buffered{Input,Output}       │  Optional buffering decorator
//! ├───────────────────────────────┤
//! │  LocalFile │ MemoryMap │ ...  │  Backend over the raw resource
//! └───────────────────────────────┘
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod backends;
pub mod buffer;
pub mod codec;
pub mod decorators;
pub mod error;
pub mod pool;
pub mod resolver;
pub mod stream;
pub mod transfer;

// Re-export commonly used types
pub use buffer::Buffer;
pub use codec::Codec;
pub use error::{Error, Result};
pub use pool::{system_pool, MemoryPool, SystemPool};
pub use stream::{BoxedStream, Stream};

// Backends
pub use backends::{
    BufferOutputStream, BufferReader, FixedSizeBufferWriter, ForeignHandle, HandleDescriptor,
    LocalFile, MemoryMap, RawHandle,
};

// Decorators
pub use decorators::{
    BufferedInputStream, BufferedOutputStream, CompressedInputStream, CompressedOutputStream,
};

// Source resolution
pub use resolver::{growable_buffer_writer, open_input, open_output, Compression, Source};

// Transfer engine
pub use transfer::{
    download, download_to_path, upload, TRANSFER_CHUNK_SIZE, TRANSFER_QUEUE_DEPTH,
};

use std::path::Path;

/// Open a local file stream. Mode strings follow the `r`/`rb`, `w`/`wb`,
/// `r+`/`rb+`/`r+b` convention.
pub fn open_local_file<P: AsRef<Path>>(path: P, mode: &str) -> Result<LocalFile> {
    LocalFile::open(path, mode)
}

/// Create a file of exactly `size` bytes and map it read-write.
pub fn create_memory_map<P: AsRef<Path>>(path: P, size: u64) -> Result<MemoryMap> {
    MemoryMap::create(path, size)
}

/// Map an existing file. Modes: `r` read, `w` write, `r+` read-write.
pub fn open_memory_map<P: AsRef<Path>>(path: P, mode: &str) -> Result<MemoryMap> {
    MemoryMap::open(path, mode)
}

/// Random-access readable stream over a buffer.
pub fn wrap_buffer_as_reader(buf: Buffer) -> BufferReader {
    BufferReader::new(buf)
}

/// Fixed-size in-place writer over a mutable buffer.
pub fn wrap_buffer_as_fixed_writer(buf: Buffer) -> Result<FixedSizeBufferWriter> {
    FixedSizeBufferWriter::new(buf)
}

/// Adapt a caller-supplied file-like handle. An explicit `mode` overrides
/// the handle's own descriptor.
pub fn wrap_foreign_handle(
    handle: Box<dyn RawHandle>,
    mode: Option<&str>,
) -> Result<ForeignHandle> {
    ForeignHandle::new(handle, mode)
}
