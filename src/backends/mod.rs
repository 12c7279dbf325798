//! Concrete stream implementations.
//!
//! Four backend families: local files, memory-mapped files, in-memory
//! buffers, and adapters over caller-supplied foreign handles. All of them
//! speak through the [`Stream`](crate::Stream) trait only.

pub mod file;
pub mod foreign;
pub mod memory;
pub mod mmap;

pub use file::LocalFile;
pub use foreign::{ForeignHandle, HandleDescriptor, RawHandle};
pub use memory::{BufferOutputStream, BufferReader, FixedSizeBufferWriter};
pub use mmap::MemoryMap;

use crate::error::{Error, Result};

/// Parsed open mode for file-like constructors.
///
/// The recognized mode strings are `r`, `rb`, `w`, `wb`, `r+`, `rb+` and
/// `r+b`; everything else fails with
/// [`Error::InvalidMode`](crate::Error::InvalidMode). The `b` suffix is
/// accepted for compatibility but carries no meaning: every stream here is
/// binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read-only, random access.
    Read,
    /// Write-only, truncate or create.
    Write,
    /// Read and write.
    ReadWrite,
}

impl OpenMode {
    /// Parse a mode string.
    pub fn parse(mode: &str) -> Result<OpenMode> {
        match mode {
            "r" | "rb" => Ok(OpenMode::Read),
            "w" | "wb" => Ok(OpenMode::Write),
            "r+" | "rb+" | "r+b" => Ok(OpenMode::ReadWrite),
            other => Err(Error::InvalidMode(other.to_string())),
        }
    }

    /// Whether streams opened in this mode can read.
    pub fn readable(self) -> bool {
        matches!(self, OpenMode::Read | OpenMode::ReadWrite)
    }

    /// Whether streams opened in this mode can write.
    pub fn writable(self) -> bool {
        matches!(self, OpenMode::Write | OpenMode::ReadWrite)
    }
}
