//! Local file backend.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::backends::OpenMode;
use crate::error::{Error, Result};
use crate::stream::Stream;

/// Stream over a regular file on the local filesystem.
///
/// Read-only and read-write files are random access; write-only files are
/// sequential (truncate-or-create) but still report their position through
/// `tell`.
pub struct LocalFile {
    file: Option<File>,
    path: PathBuf,
    mode: OpenMode,
    /// Bytes written so far; position surface for the sequential write mode.
    written: u64,
}

impl LocalFile {
    /// Open `path` with one of the recognized mode strings
    /// (`r`, `rb`, `w`, `wb`, `r+`, `rb+`, `r+b`).
    pub fn open<P: AsRef<Path>>(path: P, mode: &str) -> Result<LocalFile> {
        let mode = OpenMode::parse(mode)?;
        let file = match mode {
            OpenMode::Read => OpenOptions::new().read(true).open(path.as_ref())?,
            OpenMode::Write => OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(path.as_ref())?,
            // r+ requires an existing file, like conventional open().
            OpenMode::ReadWrite => OpenOptions::new()
                .read(true)
                .write(true)
                .open(path.as_ref())?,
        };
        Ok(LocalFile {
            file: Some(file),
            path: path.as_ref().to_path_buf(),
            mode,
            written: 0,
        })
    }

    /// Path this stream was opened with.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file(&self) -> Result<&File> {
        self.file.as_ref().ok_or(Error::ClosedStream)
    }

    fn file_mut(&mut self) -> Result<&mut File> {
        self.file.as_mut().ok_or(Error::ClosedStream)
    }
}

/// Read up to `n` bytes, tolerating short reads from the source.
pub(crate) fn read_upto<R: Read>(reader: &mut R, n: usize) -> std::io::Result<Vec<u8>> {
    let mut out = vec![0u8; n];
    let mut filled = 0;
    while filled < n {
        match reader.read(&mut out[filled..])? {
            0 => break,
            read => filled += read,
        }
    }
    out.truncate(filled);
    Ok(out)
}

impl Stream for LocalFile {
    fn readable(&self) -> bool {
        self.mode.readable()
    }

    fn writable(&self) -> bool {
        self.mode.writable()
    }

    fn seekable(&self) -> bool {
        // Write-only files are sequential.
        self.mode.readable()
    }

    fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            if self.mode.writable() {
                file.flush()?;
            }
        }
        Ok(())
    }

    fn read(&mut self, n: Option<usize>) -> Result<Vec<u8>> {
        if !self.readable() {
            return Err(Error::CapabilityViolation("read"));
        }
        let file = self.file_mut()?;
        match n {
            Some(n) => Ok(read_upto(file, n)?),
            None => {
                let mut out = Vec::new();
                file.read_to_end(&mut out)?;
                Ok(out)
            }
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        if !self.writable() {
            return Err(Error::CapabilityViolation("write"));
        }
        let file = self.file_mut()?;
        file.write_all(data)?;
        self.written += data.len() as u64;
        Ok(data.len())
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        if !self.seekable() {
            return Err(Error::CapabilityViolation("seek"));
        }
        Ok(self.file_mut()?.seek(pos)?)
    }

    fn tell(&self) -> Result<u64> {
        let file = self.file()?;
        if self.seekable() {
            // Seek is implemented for &File, so tell works without &mut self.
            let mut handle: &File = file;
            Ok(handle.stream_position()?)
        } else {
            Ok(self.written)
        }
    }

    fn size(&mut self) -> Result<u64> {
        if !self.seekable() {
            return Err(Error::CapabilityViolation("size"));
        }
        Ok(self.file()?.metadata()?.len())
    }

    fn flush(&mut self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ClosedStream);
        }
        if self.writable() {
            self.file_mut()?.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tmp(name: &str) -> String {
        format!("/tmp/streamkit_file_{}", name)
    }

    #[test]
    fn test_write_then_read() {
        let path = tmp("wr.bin");
        let mut w = LocalFile::open(&path, "wb").unwrap();
        assert!(w.writable() && !w.readable() && !w.seekable());
        assert_eq!(w.write(b"hello").unwrap(), 5);
        assert_eq!(w.tell().unwrap(), 5);
        w.close().unwrap();

        let mut r = LocalFile::open(&path, "rb").unwrap();
        assert!(r.readable() && !r.writable() && r.seekable());
        assert_eq!(r.read(None).unwrap(), b"hello");
        r.close().unwrap();

        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_invalid_mode() {
        assert!(matches!(
            LocalFile::open("/tmp/whatever", "a"),
            Err(Error::InvalidMode(_))
        ));
    }

    #[test]
    fn test_read_at_preserves_position() {
        let path = tmp("read_at.bin");
        fs::write(&path, b"0123456789").unwrap();

        let mut r = LocalFile::open(&path, "r").unwrap();
        r.seek(SeekFrom::Start(2)).unwrap();
        assert_eq!(r.read_at(5, 3).unwrap(), b"567");
        assert_eq!(r.tell().unwrap(), 2);
        assert_eq!(r.read(Some(2)).unwrap(), b"23");

        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_seek_whence() {
        let path = tmp("seek.bin");
        fs::write(&path, b"abcdefgh").unwrap();

        let mut r = LocalFile::open(&path, "r").unwrap();
        assert_eq!(r.size().unwrap(), 8);
        r.seek(SeekFrom::End(0)).unwrap();
        assert_eq!(r.tell().unwrap(), 8);
        r.seek(SeekFrom::Current(-3)).unwrap();
        assert_eq!(r.read(None).unwrap(), b"fgh");

        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_closed_rejects_io() {
        let path = tmp("closed.bin");
        fs::write(&path, b"x").unwrap();

        let mut r = LocalFile::open(&path, "r").unwrap();
        r.close().unwrap();
        // Idempotent.
        r.close().unwrap();
        assert!(r.is_closed());
        assert!(matches!(r.read(None), Err(Error::ClosedStream)));
        assert!(matches!(r.tell(), Err(Error::ClosedStream)));
        // Capability flags still answer.
        assert!(r.readable());

        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_read_write_mode() {
        let path = tmp("rw.bin");
        fs::write(&path, b"original").unwrap();

        let mut f = LocalFile::open(&path, "r+").unwrap();
        assert!(f.readable() && f.writable() && f.seekable());
        f.seek(SeekFrom::Start(4)).unwrap();
        f.write(b"NAL!").unwrap();
        f.seek(SeekFrom::Start(0)).unwrap();
        assert_eq!(f.read(None).unwrap(), b"origNAL!");

        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_rw_requires_existing() {
        assert!(LocalFile::open("/tmp/streamkit_missing_rw_file", "r+").is_err());
    }

    #[test]
    fn test_short_read_at_eof() {
        let path = tmp("short.bin");
        fs::write(&path, b"abc").unwrap();

        let mut r = LocalFile::open(&path, "r").unwrap();
        assert_eq!(r.read(Some(100)).unwrap(), b"abc");
        // Subsequent reads return empty, not an error.
        assert_eq!(r.read(Some(1)).unwrap(), b"");

        fs::remove_file(&path).ok();
    }
}
