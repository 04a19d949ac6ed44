use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use super::pool::PoolInner;

/// Backing bytes of a block plus the pool they return to.
struct BlockStorage {
    bytes: Box<[u8]>,
    /// `None` for detached blocks that are not part of any slab.
    home: Option<Arc<PoolInner>>,
}

impl Drop for BlockStorage {
    fn drop(&mut self) {
        if let Some(pool) = self.home.take() {
            pool.release(std::mem::take(&mut self.bytes));
        }
    }
}

/// Exclusive (mutable) handle to an audio block.
///
/// Provides `DerefMut` access to the block bytes. Dropping it returns the
/// block to its pool.
pub struct AudioBlockMut {
    storage: BlockStorage,
}

impl AudioBlockMut {
    pub(super) fn pooled(bytes: Box<[u8]>, pool: Arc<PoolInner>) -> Self {
        AudioBlockMut {
            storage: BlockStorage {
                bytes,
                home: Some(pool),
            },
        }
    }

    /// Allocate a zeroed block of `len` bytes outside any pool.
    pub fn detached(len: usize) -> Self {
        AudioBlockMut {
            storage: BlockStorage {
                bytes: vec![0u8; len].into_boxed_slice(),
                home: None,
            },
        }
    }

    /// Whether this block returns to a pool when released.
    pub fn is_pooled(&self) -> bool {
        self.storage.home.is_some()
    }

    /// Convert this exclusive handle into a shared one.
    /// No data is copied.
    pub fn into_shared(self) -> AudioBlockRef {
        AudioBlockRef {
            storage: Arc::new(self.storage),
        }
    }
}

impl Deref for AudioBlockMut {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.storage.bytes
    }
}

impl DerefMut for AudioBlockMut {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.storage.bytes
    }
}

impl AsRef<[u8]> for AudioBlockMut {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl AsMut<[u8]> for AudioBlockMut {
    fn as_mut(&mut self) -> &mut [u8] {
        self
    }
}

impl fmt::Debug for AudioBlockMut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioBlockMut")
            .field("len", &self.len())
            .field("pooled", &self.is_pooled())
            .finish()
    }
}

/// Shared (immutable) handle to an audio block.
///
/// Several `AudioBlockRef`s can point at the same block. Cloning adds a
/// reference; the block returns to its pool when the last one is dropped.
#[derive(Clone)]
pub struct AudioBlockRef {
    storage: Arc<BlockStorage>,
}

impl AudioBlockRef {
    /// Copy `bytes` into a new detached block.
    pub fn from_slice(bytes: &[u8]) -> Self {
        AudioBlockRef {
            storage: Arc::new(BlockStorage {
                bytes: bytes.into(),
                home: None,
            }),
        }
    }

    /// Number of live references to this block.
    pub fn refcount(&self) -> usize {
        Arc::strong_count(&self.storage)
    }

    /// Whether this block returns to a pool when released.
    pub fn is_pooled(&self) -> bool {
        self.storage.home.is_some()
    }

    /// Whether both handles refer to the same block.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.storage, &b.storage)
    }
}

impl Deref for AudioBlockRef {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.storage.bytes
    }
}

impl AsRef<[u8]> for AudioBlockRef {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl fmt::Debug for AudioBlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioBlockRef")
            .field("len", &self.len())
            .field("pooled", &self.is_pooled())
            .field("refcount", &self.refcount())
            .finish()
    }
}
