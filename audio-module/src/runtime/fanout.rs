//! Reference-counted delivery of one produced frame to every destination.
//!
//! Each dispatched frame gets a [`FrameRelease`] initialised to the
//! destination count `N`. Every message carrying the frame holds the release
//! and counts it down once when the consumer releases (or drops) it; a
//! delivery that fails counts down immediately. The producer's reference to
//! the slab block is dropped when the count reaches zero:
//!
//! ```text
//!                 ┌─► dest A rx ─► release ─┐
//! produce ─► N=3 ─┼─► dest B rx ─► release ─┼─► 0 ─► block back to slab
//!                 └─► own tx ───► data_rx ──┘
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;

use super::handle::ModuleShared;
use super::message::Message;
use super::stats::StatsCounters;
use crate::block::AudioBlockRef;
use crate::data::AudioData;
use crate::error::ModuleError;
use crate::fifo::{enqueue, Timeout};

/// Countdown shared by every message carrying one produced frame.
pub(crate) struct FrameRelease {
    remaining: AtomicUsize,
    block: Mutex<Option<AudioBlockRef>>,
    stats: Arc<StatsCounters>,
}

impl FrameRelease {
    fn new(count: usize, block: AudioBlockRef, stats: Arc<StatsCounters>) -> Self {
        FrameRelease {
            remaining: AtomicUsize::new(count),
            block: Mutex::new(Some(block)),
            stats,
        }
    }

    pub(crate) fn release(&self) {
        let previous = self.remaining.fetch_sub(1, Ordering::AcqRel);
        if previous == 1 {
            self.block.lock().take();
            self.stats.frames_released();
        } else if previous == 0 {
            warn!("frame released more often than it was dispatched");
            self.remaining.store(0, Ordering::Release);
        }
    }
}

/// Deliver `frame` to every destination of `shared`.
///
/// Runs under the destination-list lock, so every destination observes
/// frames in production order.
pub(crate) fn dispatch(shared: &ModuleShared, frame: AudioData) {
    let mut destinations = shared.destinations.lock();
    destinations.prune(&shared.name);
    let count = destinations.count();
    if count == 0 {
        shared.stats.frames_discarded();
        debug!("{}: no destinations, frame discarded", shared.name);
        return;
    }

    let release = Arc::new(FrameRelease::new(
        count,
        frame.data.clone(),
        Arc::clone(&shared.stats),
    ));
    let mut delivered = 0usize;

    for destination in &destinations.list {
        let message = Message::with_release(frame.clone(), Arc::clone(&shared.name), Arc::clone(&release));
        let result = match destination.upgrade() {
            Some(destination) => destination.deliver(message).map_err(|err| (destination.name.clone(), err)),
            None => Err((Arc::from("<closed>"), ModuleError::NotSupported)),
        };
        match result {
            Ok(()) => delivered += 1,
            Err((to, err)) => {
                shared.stats.delivery_failures();
                debug!("{}: dropped frame for {}: {}", shared.name, to, err);
            }
        }
    }

    if destinations.use_tx_queue {
        let message = Message::with_release(frame.clone(), Arc::clone(&shared.name), Arc::clone(&release));
        let result = match shared.tx_fifo.as_ref() {
            Some(tx_fifo) => enqueue(tx_fifo, message, Timeout::NoWait),
            None => Err(ModuleError::NotSupported),
        };
        match result {
            Ok(()) => delivered += 1,
            Err(err) => {
                shared.stats.delivery_failures();
                debug!("{}: dropped frame for own tx queue: {}", shared.name, err);
            }
        }
    }

    if delivered == 0 {
        shared.stats.frames_undelivered();
        debug!("{}: frame reached no destination", shared.name);
    }
}
