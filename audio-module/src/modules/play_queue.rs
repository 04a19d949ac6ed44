//! User-to-graph audio queue.
//!
//! [`PlayQueue`] is an Input module that emits frames handed to it by user
//! code through a [`PlayQueueFeeder`]. This is useful for streaming
//! pre-computed audio, test signals, or data from external sources.
//!
//! ## Usage
//!
//! ```ignore
//! let (play_queue, feeder) = PlayQueue::new(4)?;
//! handle.open(play_queue, "play", &ThreadConfig::with_block_size(960), &())?;
//! handle.start()?;
//!
//! // From any thread:
//! feeder.play(AudioData::from_bytes(&samples, meta))?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::block::AudioBlockMut;
use crate::data::AudioData;
use crate::error::{ModuleError, Result};
use crate::fifo::{enqueue, DataFifo, Timeout};
use crate::module::{AudioModule, ModuleDescription, ModuleType};

/// How long one `data_process` call waits for a queued frame.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Input module fed from user code.
///
/// Each `data_process` call waits up to [`POLL_INTERVAL`] for a frame and
/// copies it into the output block. An empty poll returns
/// [`ModuleError::Timeout`], which the worker treats as "nothing this cycle".
pub struct PlayQueue {
    queue: Arc<DataFifo<AudioData>>,
}

/// User-side end of a [`PlayQueue`].
#[derive(Clone)]
pub struct PlayQueueFeeder {
    queue: Arc<DataFifo<AudioData>>,
}

impl PlayQueue {
    /// Create a queue holding up to `depth` frames.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if `depth` is zero.
    pub fn new(depth: usize) -> Result<(Self, PlayQueueFeeder)> {
        let queue = Arc::new(DataFifo::new(depth)?);
        Ok((
            PlayQueue {
                queue: Arc::clone(&queue),
            },
            PlayQueueFeeder { queue },
        ))
    }
}

impl PlayQueueFeeder {
    /// Enqueue a frame for playback.
    ///
    /// # Errors
    ///
    /// `NoMemory` if the queue is full.
    pub fn play(&self, frame: AudioData) -> Result<()> {
        self.play_timeout(frame, Timeout::NoWait)
    }

    /// Enqueue a frame, waiting up to `timeout` for room.
    pub fn play_timeout(&self, frame: AudioData, timeout: Timeout) -> Result<()> {
        enqueue(&self.queue, frame, timeout)
    }

    /// Number of frames waiting to be played.
    pub fn len(&self) -> usize {
        self.queue.num_used().1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AudioModule for PlayQueue {
    type Config = ();

    const DESCRIPTION: ModuleDescription = ModuleDescription {
        name: "play queue",
        module_type: ModuleType::Input,
    };

    fn close(&mut self) -> Result<()> {
        self.queue.empty();
        Ok(())
    }

    fn data_process(&mut self, _input: Option<&AudioData>, output: Option<&mut AudioData<AudioBlockMut>>) -> Result<()> {
        let output = output.ok_or(ModuleError::InvalidParameter)?;
        let mut slot = self.queue.last_filled_get(Timeout::After(POLL_INTERVAL))?;
        let frame = slot.take().ok_or(ModuleError::Refused)?;
        slot.block_free();

        let bytes = frame.bytes();
        if bytes.len() > output.capacity() {
            return Err(ModuleError::InvalidParameter);
        }
        output.data[..bytes.len()].copy_from_slice(bytes);
        output.data_size = bytes.len();
        output.meta = frame.meta;
        Ok(())
    }
}
