use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "serde")]
use serde::Serialize;

/// Per-handle counters, updated by the worker and by frame releases.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    frames_processed: AtomicU64,
    process_errors: AtomicU64,
    slab_exhausted: AtomicU64,
    delivery_failures: AtomicU64,
    frames_undelivered: AtomicU64,
    frames_released: AtomicU64,
    frames_discarded: AtomicU64,
    frames_stopped: AtomicU64,
}

macro_rules! counter {
    ($($name:ident),* $(,)?) => {
        impl StatsCounters {
            $(
                #[inline]
                pub(crate) fn $name(&self) {
                    self.$name.fetch_add(1, Ordering::Relaxed);
                }
            )*

            pub(crate) fn snapshot(&self) -> ModuleStats {
                ModuleStats {
                    $($name: self.$name.load(Ordering::Relaxed),)*
                }
            }
        }
    };
}

counter!(
    frames_processed,
    process_errors,
    slab_exhausted,
    delivery_failures,
    frames_undelivered,
    frames_released,
    frames_discarded,
    frames_stopped,
);

/// Snapshot of a handle's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ModuleStats {
    /// Successful `data_process` calls.
    pub frames_processed: u64,
    /// `data_process` calls that returned an error.
    pub process_errors: u64,
    /// Cycles skipped because the slab had no free block.
    pub slab_exhausted: u64,
    /// Per-destination enqueue failures during fan-out.
    pub delivery_failures: u64,
    /// Produced frames that no destination accepted.
    pub frames_undelivered: u64,
    /// Produced frames whose last reference was released.
    pub frames_released: u64,
    /// Produced frames dropped because the module had no destinations.
    pub frames_discarded: u64,
    /// Produced frames dropped because `stop` landed during `data_process`.
    pub frames_stopped: u64,
}
