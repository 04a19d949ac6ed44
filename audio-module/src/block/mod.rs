//! Slab-backed audio blocks.
//!
//! A [`BlockPool`] owns a fixed number of equal-size byte blocks. Blocks are
//! handed out as an exclusive [`AudioBlockMut`] for writing, then frozen into
//! a shared [`AudioBlockRef`] for fan-out to any number of consumers. The
//! block returns to its pool when the last handle is dropped.

pub mod pool;
pub mod ref_types;

pub use pool::BlockPool;
pub use ref_types::{AudioBlockMut, AudioBlockRef};
