//! Reference-counted byte buffers with zero-copy slicing.
//!
//! A [`Buffer`] is a view over contiguous memory that is either owned
//! (allocated through a [`MemoryPool`] or adopted from a `Vec`) or foreign
//! (a raw pointer whose backing memory is kept alive by a pinned owner
//! handle). Slicing never copies: a slice shares the parent's storage and
//! keeps it alive through the reference count.
//!
//! Mutability is a creation-time property. Slices are always immutable;
//! a `&mut` view is available only through [`Buffer::as_mut_slice`] on a
//! mutable buffer whose storage is uniquely held, so neither an immutable
//! buffer nor a shared one can leak an aliased mutable view.

use std::any::Any;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::pool::{system_pool, MemoryPool};

enum Storage {
    /// Heap bytes owned by this buffer. If allocated through a pool, the
    /// pool reference is kept so the bytes are accounted back on drop.
    Owned {
        bytes: Box<[u8]>,
        pool: Option<Arc<dyn MemoryPool>>,
    },
    /// Foreign memory. The owner handle is held strongly for the whole
    /// lifetime of the storage; whatever it keeps alive stays alive.
    Foreign {
        _owner: Box<dyn Any + Send + Sync>,
    },
    /// Memory with 'static lifetime; nothing to keep alive.
    Static,
}

struct BufferData {
    ptr: *const u8,
    len: usize,
    storage: Storage,
}

// The raw pointer aliases memory owned (or pinned) by `storage`, which is
// itself Send + Sync. Concurrent mutation is excluded by the slice rules.
unsafe impl Send for BufferData {}
unsafe impl Sync for BufferData {}

impl Drop for BufferData {
    fn drop(&mut self) {
        if let Storage::Owned {
            bytes,
            pool: Some(pool),
        } = &self.storage
        {
            pool.reclaim(bytes.len());
        }
    }
}

/// Contiguous region of memory with shared ownership and zero-copy slices.
pub struct Buffer {
    data: Arc<BufferData>,
    offset: usize,
    len: usize,
    mutable: bool,
}

impl Buffer {
    fn from_boxed(bytes: Box<[u8]>, pool: Option<Arc<dyn MemoryPool>>, mutable: bool) -> Buffer {
        let len = bytes.len();
        let ptr = bytes.as_ptr();
        Buffer {
            data: Arc::new(BufferData {
                ptr,
                len,
                storage: Storage::Owned { bytes, pool },
            }),
            offset: 0,
            len,
            mutable,
        }
    }

    /// Adopt a `Vec` as an immutable buffer without copying.
    pub fn from_vec(bytes: Vec<u8>) -> Buffer {
        Buffer::from_boxed(bytes.into_boxed_slice(), None, false)
    }

    /// Adopt a `Vec` as a mutable buffer without copying.
    pub fn from_vec_mut(bytes: Vec<u8>) -> Buffer {
        Buffer::from_boxed(bytes.into_boxed_slice(), None, true)
    }

    /// Copy a slice into a new immutable buffer.
    pub fn from_slice(bytes: &[u8]) -> Buffer {
        Buffer::from_vec(bytes.to_vec())
    }

    /// Wrap static memory; no allocation, no keep-alive needed.
    pub fn from_static(bytes: &'static [u8]) -> Buffer {
        Buffer {
            data: Arc::new(BufferData {
                ptr: bytes.as_ptr(),
                len: bytes.len(),
                storage: Storage::Static,
            }),
            offset: 0,
            len: bytes.len(),
            mutable: false,
        }
    }

    /// Allocate `size` zeroed, mutable bytes from the shared system pool.
    pub fn allocate(size: usize) -> Result<Buffer> {
        Buffer::allocate_in(size, system_pool())
    }

    /// Allocate `size` zeroed, mutable bytes from a specific pool.
    pub fn allocate_in(size: usize, pool: Arc<dyn MemoryPool>) -> Result<Buffer> {
        let bytes = pool.allocate(size)?;
        Ok(Buffer::from_boxed(
            bytes.into_boxed_slice(),
            Some(pool),
            true,
        ))
    }

    /// Wrap foreign memory at `ptr..ptr+len`.
    ///
    /// The `owner` handle is pinned for the buffer's full lifetime (and the
    /// lifetime of every slice taken from it); it must keep the memory
    /// behind `ptr` valid for as long as it lives.
    ///
    /// # Safety
    ///
    /// `ptr` must point to `len` readable bytes that remain valid and
    /// unmodified for the lifetime of `owner`.
    pub unsafe fn from_foreign(
        ptr: *const u8,
        len: usize,
        owner: Box<dyn Any + Send + Sync>,
    ) -> Buffer {
        Buffer {
            data: Arc::new(BufferData {
                ptr,
                len,
                storage: Storage::Foreign { _owner: owner },
            }),
            offset: 0,
            len,
            mutable: false,
        }
    }

    /// Number of bytes visible through this view.
    pub fn size(&self) -> usize {
        self.len
    }

    /// True when the view is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether this view permits in-place mutation.
    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    /// Address of the first visible byte.
    pub fn address(&self) -> usize {
        self.data.ptr as usize + self.offset
    }

    /// Immutable view of the bytes.
    pub fn as_slice(&self) -> &[u8] {
        // ptr + offset stays inside data.len by construction of slice().
        unsafe { std::slice::from_raw_parts(self.data.ptr.add(self.offset), self.len) }
    }

    /// Mutable view of the bytes.
    ///
    /// Fails with [`Error::CapabilityViolation`] on immutable buffers and on
    /// mutable buffers whose storage is shared (a clone or slice is alive).
    /// Requiring unique ownership makes an aliased mutable view
    /// unconstructible from safe code; finish all writes before the first
    /// clone or slice is taken.
    pub fn as_mut_slice(&mut self) -> Result<&mut [u8]> {
        if !self.mutable {
            return Err(Error::CapabilityViolation("mutation"));
        }
        if Arc::strong_count(&self.data) != 1 {
            return Err(Error::CapabilityViolation("exclusive mutation"));
        }
        Ok(unsafe {
            std::slice::from_raw_parts_mut(self.data.ptr.add(self.offset) as *mut u8, self.len)
        })
    }

    /// Copy `data` into the buffer at `offset` through the shared storage,
    /// without materializing a `&mut` view. Clones of the buffer observe
    /// the write.
    ///
    /// # Safety
    ///
    /// The caller must guarantee no other thread reads or writes the target
    /// range during the copy.
    pub(crate) unsafe fn write_bytes(&self, offset: usize, data: &[u8]) -> Result<()> {
        if !self.mutable {
            return Err(Error::CapabilityViolation("mutation"));
        }
        if offset + data.len() > self.len {
            return Err(Error::InvalidArgument(format!(
                "write of {} bytes at {} exceeds buffer of {} bytes",
                data.len(),
                offset,
                self.len
            )));
        }
        std::ptr::copy_nonoverlapping(
            data.as_ptr(),
            self.data.ptr.add(self.offset + offset) as *mut u8,
            data.len(),
        );
        Ok(())
    }

    /// Zero-copy sub-view of this buffer.
    ///
    /// `length` defaults to the remaining bytes after `offset`; an overlong
    /// `length` clamps to the remaining bytes rather than erroring, so
    /// `slice(o, Some(l)).size() == min(l, size() - o)`. An out-of-range
    /// `offset` fails with [`Error::InvalidArgument`]. The result shares the
    /// parent's storage and is always immutable.
    pub fn slice(&self, offset: usize, length: Option<usize>) -> Result<Buffer> {
        if offset > self.len {
            return Err(Error::InvalidArgument(format!(
                "slice offset {} out of range for buffer of {} bytes",
                offset, self.len
            )));
        }
        let available = self.len - offset;
        let len = length.map_or(available, |l| l.min(available));
        Ok(Buffer {
            data: Arc::clone(&self.data),
            offset: self.offset + offset,
            len,
            mutable: false,
        })
    }

    /// Exact byte-for-byte and size comparison.
    pub fn equals(&self, other: &Buffer) -> bool {
        self.as_slice() == other.as_slice()
    }

    /// Copy the visible bytes out.
    pub fn to_owned_bytes(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }
}

impl Clone for Buffer {
    fn clone(&self) -> Buffer {
        Buffer {
            data: Arc::clone(&self.data),
            offset: self.offset,
            len: self.len,
            mutable: self.mutable,
        }
    }
}

impl PartialEq for Buffer {
    fn eq(&self, other: &Buffer) -> bool {
        self.equals(other)
    }
}

impl Eq for Buffer {}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("len", &self.len)
            .field("mutable", &self.mutable)
            .field("address", &format_args!("{:#x}", self.address()))
            .finish()
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(bytes: Vec<u8>) -> Buffer {
        Buffer::from_vec(bytes)
    }
}

impl From<&[u8]> for Buffer {
    fn from(bytes: &[u8]) -> Buffer {
        Buffer::from_slice(bytes)
    }
}
