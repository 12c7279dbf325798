//! Memory-mapped file backend.
//!
//! File contents are mapped into addressable memory, so reads are plain
//! slice copies instead of read syscalls. `resize` swaps both the backing
//! file length and the mapping; callers must not hold live buffer views
//! across a resize, region stability is not guaranteed.

use std::fs::{File, OpenOptions};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use log::debug;
use memmap2::{Mmap, MmapMut};

use crate::backends::OpenMode;
use crate::error::{Error, Result};
use crate::stream::{resolve_seek, Stream};

enum Mapping {
    ReadOnly(Mmap),
    ReadWrite(MmapMut),
}

impl Mapping {
    fn len(&self) -> usize {
        match self {
            Mapping::ReadOnly(m) => m.len(),
            Mapping::ReadWrite(m) => m.len(),
        }
    }

    fn as_slice(&self) -> &[u8] {
        match self {
            Mapping::ReadOnly(m) => &m[..],
            Mapping::ReadWrite(m) => &m[..],
        }
    }
}

/// Stream over a memory-mapped file.
pub struct MemoryMap {
    file: Option<File>,
    /// `None` when the stream is closed or the file is zero-length
    /// (zero-length mappings are not portable).
    map: Option<Mapping>,
    path: PathBuf,
    mode: OpenMode,
    pos: u64,
    closed: bool,
}

impl MemoryMap {
    /// Create a new file of exactly `size` bytes and map it read-write.
    pub fn create<P: AsRef<Path>>(path: P, size: u64) -> Result<MemoryMap> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;
        file.set_len(size)?;
        let map = Self::map_file(&file, OpenMode::ReadWrite)?;
        Ok(MemoryMap {
            file: Some(file),
            map,
            path: path.as_ref().to_path_buf(),
            mode: OpenMode::ReadWrite,
            pos: 0,
            closed: false,
        })
    }

    /// Map an existing file for read (`r`), write (`w`) or read-write (`r+`).
    pub fn open<P: AsRef<Path>>(path: P, mode: &str) -> Result<MemoryMap> {
        let mode = OpenMode::parse(mode)?;
        let file = match mode {
            OpenMode::Read => OpenOptions::new().read(true).open(path.as_ref())?,
            // Write and read-write both need a read-write descriptor for the
            // mapping; `w` restricts the stream surface, not the mapping.
            OpenMode::Write | OpenMode::ReadWrite => OpenOptions::new()
                .read(true)
                .write(true)
                .open(path.as_ref())?,
        };
        let map = Self::map_file(&file, mode)?;
        Ok(MemoryMap {
            file: Some(file),
            map,
            path: path.as_ref().to_path_buf(),
            mode,
            pos: 0,
            closed: false,
        })
    }

    fn map_file(file: &File, mode: OpenMode) -> Result<Option<Mapping>> {
        if file.metadata()?.len() == 0 {
            return Ok(None);
        }
        let mapping = match mode {
            OpenMode::Read => Mapping::ReadOnly(unsafe { Mmap::map(file)? }),
            OpenMode::Write | OpenMode::ReadWrite => {
                Mapping::ReadWrite(unsafe { MmapMut::map_mut(file)? })
            }
        };
        Ok(Some(mapping))
    }

    /// Path this map was opened with.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resize both the backing file and the mapping.
    ///
    /// The old mapping is torn down before the file length changes, so no
    /// live view can observe the transition. The current position is
    /// clamped to the new size.
    pub fn resize(&mut self, new_size: u64) -> Result<()> {
        self.check_open()?;
        if self.mode == OpenMode::Read {
            return Err(Error::CapabilityViolation("resize"));
        }
        debug!(
            "resizing memory map {:?}: {} -> {} bytes",
            self.path,
            self.map.as_ref().map_or(0, Mapping::len),
            new_size
        );
        if let Some(Mapping::ReadWrite(m)) = &self.map {
            m.flush()?;
        }
        // Unmap before truncating; a mapped region past EOF is undefined.
        self.map = None;
        let file = self.file.as_ref().ok_or(Error::ClosedStream)?;
        file.set_len(new_size)?;
        self.map = Self::map_file(file, self.mode)?;
        self.pos = self.pos.min(new_size);
        Ok(())
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::ClosedStream)
        } else {
            Ok(())
        }
    }

    fn len(&self) -> u64 {
        self.map.as_ref().map_or(0, Mapping::len) as u64
    }
}

impl Stream for MemoryMap {
    fn readable(&self) -> bool {
        self.mode.readable()
    }

    fn writable(&self) -> bool {
        self.mode.writable()
    }

    fn seekable(&self) -> bool {
        true
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if let Some(Mapping::ReadWrite(m)) = &self.map {
            m.flush()?;
        }
        self.map = None;
        self.file = None;
        self.closed = true;
        Ok(())
    }

    fn read(&mut self, n: Option<usize>) -> Result<Vec<u8>> {
        self.check_open()?;
        if !self.readable() {
            return Err(Error::CapabilityViolation("read"));
        }
        let total = self.len();
        if self.pos >= total {
            return Ok(Vec::new());
        }
        let remaining = (total - self.pos) as usize;
        let take = n.map_or(remaining, |n| n.min(remaining));
        let start = self.pos as usize;
        let out = match &self.map {
            Some(map) => map.as_slice()[start..start + take].to_vec(),
            None => Vec::new(),
        };
        self.pos += out.len() as u64;
        Ok(out)
    }

    fn read_at(&mut self, offset: u64, n: usize) -> Result<Vec<u8>> {
        self.check_open()?;
        if !self.readable() {
            return Err(Error::CapabilityViolation("read"));
        }
        let total = self.len();
        if offset >= total {
            return Ok(Vec::new());
        }
        let start = offset as usize;
        let take = n.min((total - offset) as usize);
        match &self.map {
            Some(map) => Ok(map.as_slice()[start..start + take].to_vec()),
            None => Ok(Vec::new()),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.check_open()?;
        if !self.writable() {
            return Err(Error::CapabilityViolation("write"));
        }
        let total = self.len();
        if self.pos + data.len() as u64 > total {
            return Err(Error::InvalidArgument(format!(
                "write of {} bytes at {} exceeds mapped size {}",
                data.len(),
                self.pos,
                total
            )));
        }
        if let Some(Mapping::ReadWrite(map)) = &mut self.map {
            let start = self.pos as usize;
            map[start..start + data.len()].copy_from_slice(data);
            self.pos += data.len() as u64;
            Ok(data.len())
        } else if data.is_empty() {
            Ok(0)
        } else {
            // Read-only mapping with writable mode cannot happen; an empty
            // mapping rejects nonzero writes above.
            Err(Error::CapabilityViolation("write"))
        }
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.check_open()?;
        self.pos = resolve_seek(pos, self.pos, self.len())?;
        Ok(self.pos)
    }

    fn tell(&self) -> Result<u64> {
        self.check_open()?;
        Ok(self.pos)
    }

    fn size(&mut self) -> Result<u64> {
        self.check_open()?;
        Ok(self.len())
    }

    fn flush(&mut self) -> Result<()> {
        self.check_open()?;
        if let Some(Mapping::ReadWrite(m)) = &self.map {
            m.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tmp(name: &str) -> String {
        format!("/tmp/streamkit_mmap_{}", name)
    }

    #[test]
    fn test_create_write_read_back() {
        let path = tmp("create.bin");
        let mut m = MemoryMap::create(&path, 16).unwrap();
        assert_eq!(m.size().unwrap(), 16);
        m.write(b"mapped bytes").unwrap();
        m.seek(SeekFrom::Start(0)).unwrap();
        assert_eq!(&m.read(Some(12)).unwrap(), b"mapped bytes");
        m.close().unwrap();

        assert_eq!(fs::metadata(&path).unwrap().len(), 16);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_open_read_only() {
        let path = tmp("ro.bin");
        fs::write(&path, b"read only data").unwrap();

        let mut m = MemoryMap::open(&path, "r").unwrap();
        assert!(m.readable() && !m.writable() && m.seekable());
        assert_eq!(m.read(None).unwrap(), b"read only data");
        assert!(matches!(
            m.write(b"x"),
            Err(Error::CapabilityViolation("write"))
        ));

        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_seek_past_end_reads_empty() {
        let path = tmp("seek_past.bin");
        fs::write(&path, b"0123456789").unwrap();

        let mut m = MemoryMap::open(&path, "r").unwrap();
        assert_eq!(m.seek(SeekFrom::End(5)).unwrap(), 15);
        assert_eq!(m.tell().unwrap(), 15);
        assert_eq!(m.read(None).unwrap(), b"");
        m.seek(SeekFrom::Start(7)).unwrap();
        assert_eq!(m.read(None).unwrap(), b"789");

        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_write_past_end_fails() {
        let path = tmp("past_end.bin");
        let mut m = MemoryMap::create(&path, 4).unwrap();
        assert!(matches!(
            m.write(b"too long"),
            Err(Error::InvalidArgument(_))
        ));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_resize_grows_and_shrinks() {
        let path = tmp("resize.bin");
        let mut m = MemoryMap::create(&path, 4).unwrap();
        m.write(b"abcd").unwrap();

        m.resize(8).unwrap();
        assert_eq!(m.size().unwrap(), 8);
        m.write(b"efgh").unwrap();
        assert_eq!(m.read_at(0, 8).unwrap(), b"abcdefgh");

        m.resize(2).unwrap();
        assert_eq!(m.size().unwrap(), 2);
        // Position clamped to the new size.
        assert_eq!(m.tell().unwrap(), 2);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_read_at_no_position_change() {
        let path = tmp("read_at.bin");
        fs::write(&path, b"0123456789").unwrap();

        let mut m = MemoryMap::open(&path, "r").unwrap();
        m.seek(SeekFrom::Start(3)).unwrap();
        assert_eq!(m.read_at(5, 4).unwrap(), b"5678");
        assert_eq!(m.tell().unwrap(), 3);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_closed_map_rejects_io() {
        let path = tmp("closed.bin");
        let mut m = MemoryMap::create(&path, 4).unwrap();
        m.close().unwrap();
        m.close().unwrap();
        assert!(matches!(m.read(None), Err(Error::ClosedStream)));
        assert!(matches!(m.resize(8), Err(Error::ClosedStream)));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_zero_length_file() {
        let path = tmp("empty.bin");
        fs::write(&path, b"").unwrap();

        let mut m = MemoryMap::open(&path, "r").unwrap();
        assert_eq!(m.size().unwrap(), 0);
        assert_eq!(m.read(None).unwrap(), b"");

        fs::remove_file(&path).ok();
    }
}
