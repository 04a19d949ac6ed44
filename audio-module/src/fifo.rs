//! Bounded message FIFO with a paired slot slab.
//!
//! A [`DataFifo`] couples a fixed number of slots (the slab) with a ring of
//! filled-slot indices (the queue). Producers reserve a vacant slot, fill it
//! in place and publish it; consumers dequeue filled slots in FIFO order and
//! return them to the slab when done:
//!
//! ```text
//! producer: first_vacant_get ─► write ─► block_lock ──┐
//!                                                     ▼
//! consumer:              free ◄─ take ◄─ last_filled_get
//! ```
//!
//! Reservations are scoped guards ([`VacantSlot`], [`FilledSlot`]): dropping
//! a guard that was never published or consumed frees its slot, so early
//! exits cannot leak slab capacity.
//!
//! The vacant side and the filled side are independent: a slot is tracked
//! by index and its value never moves between reservation and consumption.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::error::{ModuleError, Result};

/// How long a blocking FIFO or slab call may wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Fail immediately if the call cannot complete.
    NoWait,
    /// Wait up to the given duration.
    After(Duration),
    /// Wait until the call completes or the queue is shut down.
    Forever,
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        Timeout::After(duration)
    }
}

impl Timeout {
    pub(crate) fn start(self) -> Waiter {
        let deadline = match self {
            Timeout::After(duration) => Instant::now().checked_add(duration),
            Timeout::NoWait | Timeout::Forever => None,
        };
        Waiter {
            no_wait: self == Timeout::NoWait,
            deadline,
        }
    }
}

/// Wait budget of one blocking call.
pub(crate) struct Waiter {
    no_wait: bool,
    deadline: Option<Instant>,
}

impl Waiter {
    /// Whether the budget is spent.
    pub(crate) fn expired(&self) -> bool {
        self.no_wait || self.deadline.is_some_and(|at| Instant::now() >= at)
    }

    /// Block on `cv` until notified or the deadline passes.
    pub(crate) fn wait<T>(&self, cv: &Condvar, guard: &mut MutexGuard<'_, T>) {
        match self.deadline {
            Some(at) => {
                cv.wait_until(guard, at);
            }
            None => cv.wait(guard),
        }
    }
}

struct Ring {
    /// Slab free list (vacant slot indices).
    vacant: Vec<usize>,
    /// Published slots in FIFO order: (slot index, declared size).
    filled: VecDeque<(usize, usize)>,
    /// Slots currently reserved or filled.
    alloced: usize,
    initialized: bool,
}

/// Fixed-capacity message queue paired with a same-capacity slot slab.
pub struct DataFifo<T> {
    slots: Box<[Mutex<Option<T>>]>,
    ring: Mutex<Ring>,
    /// Signalled when a slot returns to the slab.
    vacant_cv: Condvar,
    /// Signalled when a slot is published.
    filled_cv: Condvar,
}

impl<T> DataFifo<T> {
    /// Create a FIFO with `capacity` slots.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(ModuleError::InvalidParameter);
        }
        let slots = (0..capacity).map(|_| Mutex::new(None)).collect();
        Ok(DataFifo {
            slots,
            ring: Mutex::new(Ring {
                // Reversed so the first reservation takes slot 0.
                vacant: (0..capacity).rev().collect(),
                filled: VecDeque::with_capacity(capacity),
                alloced: 0,
                initialized: true,
            }),
            vacant_cv: Condvar::new(),
            filled_cv: Condvar::new(),
        })
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Size in bytes of one slot.
    pub fn block_size(&self) -> usize {
        core::mem::size_of::<T>()
    }

    /// Reserve a vacant slot.
    ///
    /// # Errors
    ///
    /// - `NoMemory` if every slot is taken and `timeout` is `NoWait`
    /// - `Timeout` if no slot freed up within the timeout
    /// - `NotSupported` if the FIFO has been shut down
    pub fn first_vacant_get(&self, timeout: Timeout) -> Result<VacantSlot<'_, T>> {
        let waiter = timeout.start();
        let mut ring = self.ring.lock();
        loop {
            if !ring.initialized {
                return Err(ModuleError::NotSupported);
            }
            if let Some(index) = ring.vacant.pop() {
                ring.alloced += 1;
                return Ok(VacantSlot {
                    fifo: self,
                    index,
                    published: false,
                });
            }
            if waiter.expired() {
                return Err(if timeout == Timeout::NoWait {
                    ModuleError::NoMemory
                } else {
                    ModuleError::Timeout
                });
            }
            waiter.wait(&self.vacant_cv, &mut ring);
        }
    }

    /// Dequeue the oldest filled slot.
    ///
    /// # Errors
    ///
    /// - `Timeout` if nothing was published within the timeout
    /// - `NotSupported` if the FIFO has been shut down
    pub fn last_filled_get(&self, timeout: Timeout) -> Result<FilledSlot<'_, T>> {
        let waiter = timeout.start();
        let mut ring = self.ring.lock();
        loop {
            if !ring.initialized {
                return Err(ModuleError::NotSupported);
            }
            if let Some((index, size)) = ring.filled.pop_front() {
                return Ok(FilledSlot {
                    fifo: self,
                    index,
                    size,
                });
            }
            if waiter.expired() {
                return Err(ModuleError::Timeout);
            }
            waiter.wait(&self.filled_cv, &mut ring);
        }
    }

    /// Drop every published item and return its slot to the slab.
    ///
    /// Reservations still held by producers are not affected.
    pub fn empty(&self) {
        let drained: Vec<(usize, usize)> = self.ring.lock().filled.drain(..).collect();
        for (index, _) in drained {
            self.free_slot(index);
        }
    }

    /// `(alloced, locked)`: slots reserved or filled, and slots filled.
    pub fn num_used(&self) -> (usize, usize) {
        let ring = self.ring.lock();
        (ring.alloced, ring.filled.len())
    }

    /// Whether the FIFO still accepts calls.
    pub fn is_initialized(&self) -> bool {
        self.ring.lock().initialized
    }

    /// Refuse all further reservations and dequeues and wake every waiter.
    pub(crate) fn shutdown(&self) {
        self.ring.lock().initialized = false;
        self.vacant_cv.notify_all();
        self.filled_cv.notify_all();
    }

    fn publish(&self, index: usize, size: usize) -> Result<()> {
        if size == 0 || size > self.block_size().max(1) || self.slots[index].lock().is_none() {
            return Err(ModuleError::InvalidParameter);
        }
        let mut ring = self.ring.lock();
        if !ring.initialized {
            return Err(ModuleError::NotSupported);
        }
        ring.filled.push_back((index, size));
        drop(ring);
        self.filled_cv.notify_one();
        Ok(())
    }

    fn free_slot(&self, index: usize) {
        // The value is dropped before the ring lock is taken: dropping a
        // message may run callbacks that touch other FIFOs.
        let value = self.slots[index].lock().take();
        drop(value);

        let mut ring = self.ring.lock();
        ring.vacant.push(index);
        ring.alloced -= 1;
        drop(ring);
        self.vacant_cv.notify_one();
    }
}

/// A reserved, not yet published slot. Dropping it frees the reservation.
pub struct VacantSlot<'a, T> {
    fifo: &'a DataFifo<T>,
    index: usize,
    published: bool,
}

impl<T> VacantSlot<'_, T> {
    /// Store `value` in the slot, replacing any earlier write.
    pub fn write(&mut self, value: T) {
        *self.fifo.slots[self.index].lock() = Some(value);
    }

    /// Publish the slot as a filled item of `size` bytes.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if nothing was written or `size` is zero or larger
    /// than [`DataFifo::block_size`]. The reservation is freed on failure.
    pub fn block_lock(mut self, size: usize) -> Result<()> {
        self.fifo.publish(self.index, size)?;
        self.published = true;
        Ok(())
    }

    /// Return the reservation to the slab without publishing.
    pub fn block_free(self) {}
}

impl<T> Drop for VacantSlot<'_, T> {
    fn drop(&mut self) {
        if !self.published {
            self.fifo.free_slot(self.index);
        }
    }
}

/// A dequeued slot. Dropping it returns the slot to the slab.
pub struct FilledSlot<'a, T> {
    fifo: &'a DataFifo<T>,
    index: usize,
    size: usize,
}

impl<T> FilledSlot<'_, T> {
    /// Size declared by the producer at `block_lock`.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Move the value out of the slot.
    pub fn take(&mut self) -> Option<T> {
        self.fifo.slots[self.index].lock().take()
    }

    /// Return the slot to the slab.
    pub fn block_free(self) {}
}

impl<T> Drop for FilledSlot<'_, T> {
    fn drop(&mut self) {
        self.fifo.free_slot(self.index);
    }
}

/// Reserve, fill and publish `value` in one step.
///
/// On failure the value is dropped together with the reservation.
pub fn enqueue<T>(fifo: &DataFifo<T>, value: T, timeout: Timeout) -> Result<()> {
    let mut slot = fifo.first_vacant_get(timeout)?;
    slot.write(value);
    slot.block_lock(fifo.block_size().max(1))
}
