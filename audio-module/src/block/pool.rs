use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use super::ref_types::AudioBlockMut;
use crate::error::{ModuleError, Result};
use crate::fifo::Timeout;

/// Fixed-size slab of equal-size byte blocks.
///
/// Every block is allocated up front; `alloc` and block release are O(1)
/// pops/pushes on a free list. Blocks are handed out as [`AudioBlockMut`]
/// handles that return themselves to the pool when the last reference is
/// dropped.
pub struct BlockPool {
    inner: Arc<PoolInner>,
}

pub(super) struct PoolInner {
    block_size: usize,
    block_count: usize,
    free: Mutex<FreeList>,
    /// Signalled when a block returns to the free list.
    available: Condvar,
}

struct FreeList {
    blocks: Vec<Box<[u8]>>,
    open: bool,
}

impl PoolInner {
    /// Return a block's storage to the free list.
    pub(super) fn release(&self, bytes: Box<[u8]>) {
        debug_assert_eq!(bytes.len(), self.block_size);
        let mut free = self.free.lock();
        debug_assert!(free.blocks.len() < self.block_count, "double release");
        free.blocks.push(bytes);
        drop(free);
        self.available.notify_one();
    }
}

impl BlockPool {
    /// Create a pool of `block_count` zeroed blocks of `block_size` bytes.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if either dimension is zero.
    pub fn new(block_count: usize, block_size: usize) -> Result<Self> {
        if block_count == 0 || block_size == 0 {
            return Err(ModuleError::InvalidParameter);
        }
        let blocks = (0..block_count)
            .map(|_| vec![0u8; block_size].into_boxed_slice())
            .collect();
        Ok(BlockPool {
            inner: Arc::new(PoolInner {
                block_size,
                block_count,
                free: Mutex::new(FreeList { blocks, open: true }),
                available: Condvar::new(),
            }),
        })
    }

    /// Allocate a zeroed block without waiting. Returns `None` if the pool is
    /// exhausted or shut down.
    pub fn alloc(&self) -> Option<AudioBlockMut> {
        self.alloc_timeout(Timeout::NoWait).ok()
    }

    /// Allocate a zeroed block, waiting up to `timeout` for one to free up.
    ///
    /// # Errors
    ///
    /// - `NoMemory` if the pool is exhausted and `timeout` is `NoWait`
    /// - `Timeout` if no block freed up in time
    /// - `NotSupported` once the pool has been shut down
    pub fn alloc_timeout(&self, timeout: Timeout) -> Result<AudioBlockMut> {
        let waiter = timeout.start();
        let mut free = self.inner.free.lock();
        loop {
            if !free.open {
                return Err(ModuleError::NotSupported);
            }
            if let Some(mut bytes) = free.blocks.pop() {
                drop(free);
                bytes.fill(0);
                return Ok(AudioBlockMut::pooled(bytes, Arc::clone(&self.inner)));
            }
            if waiter.expired() {
                return Err(if timeout == Timeout::NoWait {
                    ModuleError::NoMemory
                } else {
                    ModuleError::Timeout
                });
            }
            waiter.wait(&self.inner.available, &mut free);
        }
    }

    /// Size in bytes of every block.
    pub fn block_size(&self) -> usize {
        self.inner.block_size
    }

    /// Total number of blocks.
    pub fn capacity(&self) -> usize {
        self.inner.block_count
    }

    /// Number of blocks currently handed out.
    pub fn allocated_count(&self) -> usize {
        self.inner.block_count - self.inner.free.lock().blocks.len()
    }

    /// Refuse further allocations and wake every waiting allocator.
    ///
    /// Blocks still in use keep returning to the free list when released.
    pub(crate) fn shutdown(&self) {
        self.inner.free.lock().open = false;
        self.inner.available.notify_all();
    }
}
