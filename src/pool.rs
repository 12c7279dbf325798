//! Memory pool abstraction for buffer allocation.
//!
//! Buffers do not call the allocator directly; they go through a
//! [`MemoryPool`] so embedders can substitute arena or capped pools.
//! The default [`SystemPool`] sits on the global allocator and keeps an
//! atomic byte count for accounting.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::error::{Error, Result};

/// Allocation source for [`Buffer`](crate::Buffer) memory.
///
/// Implementations decide when to refuse an allocation; refusal surfaces as
/// [`Error::AllocationFailure`].
pub trait MemoryPool: Send + Sync {
    /// Allocate `size` zero-initialized bytes.
    fn allocate(&self, size: usize) -> Result<Vec<u8>>;

    /// Bytes currently handed out by this pool.
    fn bytes_allocated(&self) -> usize;

    /// Record that `size` bytes previously handed out were released.
    fn reclaim(&self, size: usize);
}

/// Default pool over the global allocator.
///
/// An optional cap turns the pool into a budget: allocations that would
/// push the outstanding total past the cap fail instead of growing.
pub struct SystemPool {
    allocated: AtomicUsize,
    cap: Option<usize>,
}

impl SystemPool {
    /// Unbounded pool.
    pub fn new() -> Self {
        Self {
            allocated: AtomicUsize::new(0),
            cap: None,
        }
    }

    /// Pool that refuses allocations past `cap` outstanding bytes.
    pub fn with_cap(cap: usize) -> Self {
        Self {
            allocated: AtomicUsize::new(0),
            cap: Some(cap),
        }
    }
}

impl Default for SystemPool {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPool for SystemPool {
    fn allocate(&self, size: usize) -> Result<Vec<u8>> {
        if let Some(cap) = self.cap {
            let current = self.allocated.load(Ordering::Acquire);
            if current.saturating_add(size) > cap {
                return Err(Error::AllocationFailure(size));
            }
        }
        self.allocated.fetch_add(size, Ordering::AcqRel);
        Ok(vec![0u8; size])
    }

    fn bytes_allocated(&self) -> usize {
        self.allocated.load(Ordering::Acquire)
    }

    fn reclaim(&self, size: usize) {
        self.allocated.fetch_sub(size, Ordering::AcqRel);
    }
}

static SYSTEM_POOL: Lazy<Arc<SystemPool>> = Lazy::new(|| Arc::new(SystemPool::new()));

/// Shared process-wide default pool.
pub fn system_pool() -> Arc<SystemPool> {
    Arc::clone(&SYSTEM_POOL)
}
