//! Graph-to-user audio queue.
//!
//! [`RecordQueue`] is an Output module that copies every frame it receives
//! into a bounded queue read by user code through a [`RecordReader`]. This
//! is useful for capture, analysis, or any case where user code needs to
//! inspect the audio produced by the graph.
//!
//! ## Usage
//!
//! ```ignore
//! let (record_queue, reader) = RecordQueue::new(8)?;
//! handle.open(record_queue, "record", &ThreadConfig::default(), &())?;
//! connect(&upstream, &handle, false)?;
//! handle.start()?;
//!
//! while let Ok(frame) = reader.read(Timeout::After(Duration::from_millis(50))) {
//!     // Inspect the captured frame...
//! }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::debug;

use crate::block::AudioBlockMut;
use crate::data::AudioData;
use crate::error::{ModuleError, Result};
use crate::fifo::{enqueue, DataFifo, Timeout};
use crate::module::{AudioModule, ModuleDescription, ModuleType};

/// Output module recording into a queue. When the queue is full the newest
/// frame is dropped.
pub struct RecordQueue {
    queue: Arc<DataFifo<AudioData>>,
    dropped: Arc<AtomicU64>,
}

/// User-side end of a [`RecordQueue`].
#[derive(Clone)]
pub struct RecordReader {
    queue: Arc<DataFifo<AudioData>>,
    dropped: Arc<AtomicU64>,
}

impl RecordQueue {
    /// Create a queue holding up to `depth` frames.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if `depth` is zero.
    pub fn new(depth: usize) -> Result<(Self, RecordReader)> {
        let queue = Arc::new(DataFifo::new(depth)?);
        let dropped = Arc::new(AtomicU64::new(0));
        Ok((
            RecordQueue {
                queue: Arc::clone(&queue),
                dropped: Arc::clone(&dropped),
            },
            RecordReader { queue, dropped },
        ))
    }
}

impl RecordReader {
    /// Take the oldest recorded frame, waiting up to `timeout`.
    ///
    /// # Errors
    ///
    /// `Timeout` if nothing was recorded in time.
    pub fn read(&self, timeout: Timeout) -> Result<AudioData> {
        let mut slot = self.queue.last_filled_get(timeout)?;
        let frame = slot.take();
        frame.ok_or(ModuleError::Refused)
    }

    /// Take the oldest recorded frame if there is one.
    pub fn try_read(&self) -> Option<AudioData> {
        self.read(Timeout::NoWait).ok()
    }

    /// Number of frames waiting to be read.
    pub fn len(&self) -> usize {
        self.queue.num_used().1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frames dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl AudioModule for RecordQueue {
    type Config = ();

    const DESCRIPTION: ModuleDescription = ModuleDescription {
        name: "record queue",
        module_type: ModuleType::Output,
    };

    fn data_process(&mut self, input: Option<&AudioData>, _output: Option<&mut AudioData<AudioBlockMut>>) -> Result<()> {
        let input = input.ok_or(ModuleError::InvalidParameter)?;
        let copy = AudioData::from_bytes(input.bytes(), input.meta);
        if let Err(err) = enqueue(&self.queue, copy, Timeout::NoWait) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            debug!("record queue full, frame dropped: {}", err);
        }
        Ok(())
    }
}
