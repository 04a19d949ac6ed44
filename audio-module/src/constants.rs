/// Maximum instance name length in bytes, including the terminator slot.
///
/// Names passed to `open` are truncated to `NAME_SIZE - 1` bytes.
pub const NAME_SIZE: usize = 20;

/// Lowest tone frequency the tone generator accepts, in Hz.
pub const TONE_MIN_HZ: u32 = 100;

/// Highest tone frequency the tone generator accepts, in Hz.
pub const TONE_MAX_HZ: u32 = 10_000;

/// Highest sample rate the tone generator synthesises for, in Hz.
pub const TONE_MAX_SAMPLE_RATE_HZ: u32 = 192_000;

/// Size of the tone generator's private one-period buffer: the longest period
/// (`TONE_MIN_HZ` at `TONE_MAX_SAMPLE_RATE_HZ`) in 32-bit carriers.
pub const TONE_BUFFER_MAX_BYTES: usize =
    (TONE_MAX_SAMPLE_RATE_HZ / TONE_MIN_HZ) as usize * 4;

/// Default worker thread stack size in bytes.
pub const DEFAULT_STACK_SIZE: usize = 64 * 1024;

/// Default worker thread priority (recorded, not applied by std threads).
pub const DEFAULT_THREAD_PRIORITY: i32 = 5;

/// Default number of message slots in each RX/TX FIFO.
pub const DEFAULT_QUEUE_DEPTH: usize = 4;

/// Default number of blocks in a module's output slab.
pub const DEFAULT_BLOCK_COUNT: usize = 4;
