//! Module handles and the lifecycle API.
//!
//! A [`ModuleHandle`] is either Undefined (never opened, or closed) or owns
//! one open module instance: the module value, its worker thread, and the
//! state shared with that worker and with upstream producers
//! ([`ModuleShared`]). Producers reference their destinations weakly, so the
//! graph never owns a handle.
//!
//! ```text
//!            open        start        stop
//! Undefined ────► Configured ──► Running ──► Stopped
//!     ▲              ▲  │  ▲                  │ │
//!     │              └──┘  └──────start───────┘ │
//!     │          reconfigure ◄────reconfigure───┘
//!     └────────────── close (from Configured | Stopped)
//! ```

use std::sync::{Arc, Weak};
use std::thread::JoinHandle;

use log::{debug, error, warn};
use parking_lot::{Condvar, Mutex};

use super::message::{Message, ResponseCallback};
use super::stats::{ModuleStats, StatsCounters};
use super::worker;
use crate::block::BlockPool;
use crate::constants::{
    DEFAULT_BLOCK_COUNT, DEFAULT_QUEUE_DEPTH, DEFAULT_STACK_SIZE, DEFAULT_THREAD_PRIORITY, NAME_SIZE,
};
use crate::data::AudioData;
use crate::error::{ModuleError, Result};
use crate::fifo::{enqueue, DataFifo, Timeout};
use crate::module::{AudioModule, ModuleDescription, ModuleState, ModuleType};

/// Thread and buffer configuration of one module instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadConfig {
    /// Worker stack size in bytes.
    pub stack_size: usize,
    /// Scheduling priority. Recorded and logged only; std threads do not
    /// expose priorities.
    pub priority: i32,
    /// RX FIFO depth (Output and InOut modules).
    pub rx_queue_depth: usize,
    /// TX FIFO depth (Input and InOut modules).
    pub tx_queue_depth: usize,
    /// Output slab block count (Input and InOut modules).
    pub block_count: usize,
    /// Output slab block size in bytes (Input and InOut modules).
    pub block_size: usize,
}

impl Default for ThreadConfig {
    fn default() -> Self {
        ThreadConfig {
            stack_size: DEFAULT_STACK_SIZE,
            priority: DEFAULT_THREAD_PRIORITY,
            rx_queue_depth: DEFAULT_QUEUE_DEPTH,
            tx_queue_depth: DEFAULT_QUEUE_DEPTH,
            block_count: DEFAULT_BLOCK_COUNT,
            block_size: 0,
        }
    }
}

impl ThreadConfig {
    /// Default configuration with output blocks of `block_size` bytes.
    pub fn with_block_size(block_size: usize) -> Self {
        ThreadConfig {
            block_size,
            ..Default::default()
        }
    }

    fn validate(&self, module_type: ModuleType) -> Result<()> {
        if self.stack_size == 0 {
            return Err(ModuleError::InvalidParameter);
        }
        if module_type.consumes() && self.rx_queue_depth == 0 {
            return Err(ModuleError::InvalidParameter);
        }
        if module_type.produces()
            && (self.tx_queue_depth == 0 || self.block_count == 0 || self.block_size == 0)
        {
            return Err(ModuleError::InvalidParameter);
        }
        Ok(())
    }
}

struct Lifecycle {
    current: ModuleState,
    previous: ModuleState,
    /// Set while `stop` waits for the module; cleared by the next transition.
    stopping: bool,
    shutdown: bool,
}

pub(crate) struct Destinations {
    pub(crate) list: Vec<Weak<ModuleShared>>,
    pub(crate) use_tx_queue: bool,
}

impl Destinations {
    /// Live destinations, plus one for the own TX FIFO.
    pub(crate) fn count(&self) -> usize {
        let live = self.list.iter().filter(|dest| dest.strong_count() > 0).count();
        live + usize::from(self.use_tx_queue)
    }

    /// Forget destinations that were closed without being disconnected.
    pub(crate) fn prune(&mut self, from: &str) {
        let before = self.list.len();
        self.list.retain(|dest| dest.strong_count() > 0);
        if self.list.len() != before {
            debug!("{}: pruned {} closed destination(s)", from, before - self.list.len());
        }
    }
}

/// State shared between a handle, its worker and upstream producers.
pub(crate) struct ModuleShared {
    pub(crate) name: Arc<str>,
    pub(crate) description: ModuleDescription,
    lifecycle: Mutex<Lifecycle>,
    lifecycle_cv: Condvar,
    pub(crate) rx_fifo: Option<DataFifo<Message>>,
    pub(crate) tx_fifo: Option<DataFifo<Message>>,
    pub(crate) pool: Option<BlockPool>,
    pub(crate) destinations: Mutex<Destinations>,
    pub(crate) stats: Arc<StatsCounters>,
}

impl ModuleShared {
    pub(crate) fn state(&self) -> ModuleState {
        self.lifecycle.lock().current
    }

    pub(crate) fn is_running(&self) -> bool {
        self.state() == ModuleState::Running
    }

    fn previous_state(&self) -> ModuleState {
        self.lifecycle.lock().previous
    }

    /// Whether a produced frame may still be dispatched: Running with no
    /// `stop` in progress.
    pub(crate) fn accepts_output(&self) -> bool {
        let lifecycle = self.lifecycle.lock();
        lifecycle.current == ModuleState::Running && !lifecycle.stopping
    }

    fn set_stopping(&self, stopping: bool) {
        self.lifecycle.lock().stopping = stopping;
    }

    fn set_state(&self, state: ModuleState) {
        let mut lifecycle = self.lifecycle.lock();
        lifecycle.previous = lifecycle.current;
        lifecycle.current = state;
        lifecycle.stopping = false;
        drop(lifecycle);
        self.lifecycle_cv.notify_all();
    }

    /// Block until the module is Running. Returns `false` once it is shut
    /// down.
    pub(crate) fn wait_until_running(&self) -> bool {
        let mut lifecycle = self.lifecycle.lock();
        loop {
            if lifecycle.shutdown {
                return false;
            }
            if lifecycle.current == ModuleState::Running {
                return true;
            }
            self.lifecycle_cv.wait(&mut lifecycle);
        }
    }

    /// Enqueue `message` on this module's RX FIFO without waiting.
    pub(crate) fn deliver(&self, message: Message) -> Result<()> {
        if !self.is_running() {
            return Err(ModuleError::NotSupported);
        }
        let rx_fifo = self.rx_fifo.as_ref().ok_or(ModuleError::NotSupported)?;
        enqueue(rx_fifo, message, Timeout::NoWait)
    }

    /// Stop the worker: refuse further work and wake every blocked call.
    fn shutdown(&self) {
        self.lifecycle.lock().shutdown = true;
        self.lifecycle_cv.notify_all();
        for fifo in [&self.rx_fifo, &self.tx_fifo].into_iter().flatten() {
            fifo.shutdown();
        }
        if let Some(pool) = &self.pool {
            pool.shutdown();
        }
    }

    fn empty_fifos(&self) {
        for fifo in [&self.rx_fifo, &self.tx_fifo].into_iter().flatten() {
            fifo.empty();
        }
    }
}

struct OpenModule<M> {
    shared: Arc<ModuleShared>,
    module: Arc<Mutex<M>>,
    /// Serialises lifecycle calls on this handle.
    control: Mutex<()>,
    worker: Option<JoinHandle<()>>,
}

impl<M> OpenModule<M> {
    fn teardown(&mut self) {
        self.shared.empty_fifos();
        self.shared.shutdown();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("{}: worker thread panicked", self.shared.name);
            }
        }
        self.shared.empty_fifos();
        self.shared.set_state(ModuleState::Undefined);
    }
}

/// Handle to one module instance.
///
/// Starts out Undefined; [`open`](Self::open) creates the instance and its
/// worker thread, [`close`](Self::close) (or dropping the handle) tears them
/// down again.
pub struct ModuleHandle<M: AudioModule> {
    inner: Option<OpenModule<M>>,
}

impl<M: AudioModule> Default for ModuleHandle<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Undo a successful `open` entry point after a later step of
/// [`ModuleHandle::open`] failed.
fn close_after_failed_open<M: AudioModule>(module: &mut M, name: &str) {
    if let Err(err) = module.close() {
        warn!("{}: close after failed open: {}", name, err);
    }
}

/// Copy at most `NAME_SIZE - 1` bytes of `name`, cut on a char boundary.
fn truncate_name(name: &str) -> &str {
    let mut end = name.len().min(NAME_SIZE - 1);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

impl<M: AudioModule> ModuleHandle<M> {
    /// An Undefined handle.
    pub const fn new() -> Self {
        ModuleHandle { inner: None }
    }

    fn open_module(&self) -> Result<&OpenModule<M>> {
        self.inner.as_ref().ok_or(ModuleError::InvalidParameter)
    }

    /// Open `module` under `name`: build its FIFOs and slab, run its `open`
    /// and `configuration_set` entry points and spawn its worker thread.
    ///
    /// The name is truncated to `NAME_SIZE - 1` bytes. On success the state
    /// is Configured and the previous state Undefined.
    ///
    /// # Errors
    ///
    /// - `AlreadyInit` if the handle is already open
    /// - `InvalidParameter` if the name, description or thread
    ///   configuration is invalid
    /// - any error returned by the module's `open` or `configuration_set`
    /// - `Spawn` if the worker thread could not be created
    ///
    /// The handle stays Undefined on every error. If the module's `open`
    /// succeeded, its `close` runs before the error is returned.
    pub fn open(&mut self, mut module: M, name: &str, thread: &ThreadConfig, config: &M::Config) -> Result<()> {
        if self.inner.is_some() {
            return Err(ModuleError::AlreadyInit);
        }
        let description = M::DESCRIPTION;
        let module_type = description.module_type;
        if name.is_empty() || description.name.is_empty() || module_type == ModuleType::Undefined {
            return Err(ModuleError::InvalidParameter);
        }
        thread.validate(module_type)?;

        let name: Arc<str> = Arc::from(truncate_name(name));
        let rx_fifo = if module_type.consumes() {
            Some(DataFifo::new(thread.rx_queue_depth)?)
        } else {
            None
        };
        let (tx_fifo, pool) = if module_type.produces() {
            (
                Some(DataFifo::new(thread.tx_queue_depth)?),
                Some(BlockPool::new(thread.block_count, thread.block_size)?),
            )
        } else {
            (None, None)
        };

        module.open(config)?;
        if let Err(err) = module.configuration_set(config) {
            close_after_failed_open(&mut module, &name);
            return Err(err);
        }

        let shared = Arc::new(ModuleShared {
            name: Arc::clone(&name),
            description,
            lifecycle: Mutex::new(Lifecycle {
                current: ModuleState::Configured,
                previous: ModuleState::Undefined,
                stopping: false,
                shutdown: false,
            }),
            lifecycle_cv: Condvar::new(),
            rx_fifo,
            tx_fifo,
            pool,
            destinations: Mutex::new(Destinations {
                list: Vec::new(),
                use_tx_queue: false,
            }),
            stats: Arc::new(StatsCounters::default()),
        });
        let module = Arc::new(Mutex::new(module));
        let worker = match worker::spawn(Arc::clone(&shared), Arc::clone(&module), thread.stack_size) {
            Ok(worker) => worker,
            Err(err) => {
                error!("{}: worker thread not created: {}", name, err);
                close_after_failed_open(&mut *module.lock(), &name);
                return Err(err);
            }
        };

        debug!(
            "{}: opened {} ({:?}), priority {}",
            name, description.name, module_type, thread.priority
        );
        self.inner = Some(OpenModule {
            shared,
            module,
            control: Mutex::new(()),
            worker: Some(worker),
        });
        Ok(())
    }

    /// Re-apply a configuration. Allowed in Configured and Stopped; the
    /// state becomes Configured.
    ///
    /// # Errors
    ///
    /// `NotSupported` when Undefined or Running, otherwise whatever the
    /// module's `configuration_set` returns (the state is then unchanged).
    pub fn reconfigure(&self, config: &M::Config) -> Result<()> {
        let open = self.inner.as_ref().ok_or(ModuleError::NotSupported)?;
        let _control = open.control.lock();
        match open.shared.state() {
            ModuleState::Configured | ModuleState::Stopped => {}
            _ => return Err(ModuleError::NotSupported),
        }
        open.module.lock().configuration_set(config)?;
        open.shared.set_state(ModuleState::Configured);
        debug!("{}: reconfigured", open.shared.name);
        Ok(())
    }

    /// Read the active configuration into `config`.
    ///
    /// # Errors
    ///
    /// `NotSupported` when Undefined.
    pub fn configuration_get(&self, config: &mut M::Config) -> Result<()> {
        let open = self.inner.as_ref().ok_or(ModuleError::NotSupported)?;
        open.module.lock().configuration_get(config)
    }

    /// Start processing. Allowed in Configured and Stopped.
    ///
    /// # Errors
    ///
    /// `AlreadyInit` if already Running, `NotSupported` when Undefined, or
    /// the module's `start` error (state unchanged).
    pub fn start(&self) -> Result<()> {
        let open = self.inner.as_ref().ok_or(ModuleError::NotSupported)?;
        let _control = open.control.lock();
        match open.shared.state() {
            ModuleState::Configured | ModuleState::Stopped => {}
            ModuleState::Running => return Err(ModuleError::AlreadyInit),
            ModuleState::Undefined => return Err(ModuleError::NotSupported),
        }
        open.module.lock().start()?;
        open.shared.set_state(ModuleState::Running);
        debug!("{}: started", open.shared.name);
        Ok(())
    }

    /// Stop processing. Queued frames stay queued until the next `start`.
    ///
    /// A frame whose `data_process` is still running when `stop` is called
    /// is dropped instead of dispatched.
    ///
    /// # Errors
    ///
    /// `AlreadyInit` if already Stopped, `NotSupported` if not Running, or
    /// the module's `stop` error (state unchanged).
    pub fn stop(&self) -> Result<()> {
        let open = self.inner.as_ref().ok_or(ModuleError::NotSupported)?;
        let _control = open.control.lock();
        match open.shared.state() {
            ModuleState::Running => {}
            ModuleState::Stopped => return Err(ModuleError::AlreadyInit),
            _ => return Err(ModuleError::NotSupported),
        }
        open.shared.set_stopping(true);
        if let Err(err) = open.module.lock().stop() {
            open.shared.set_stopping(false);
            return Err(err);
        }
        open.shared.set_state(ModuleState::Stopped);
        debug!("{}: stopped", open.shared.name);
        Ok(())
    }

    /// Close the instance: run the module's `close`, drain both FIFOs, shut
    /// the worker down and join it. The handle becomes Undefined.
    ///
    /// Pending frames are dropped, which runs their response callbacks.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` when already Undefined, `NotSupported` while
    /// Running. An error from the module's `close` is returned after the
    /// teardown completes.
    pub fn close(&mut self) -> Result<()> {
        let open = self.inner.as_ref().ok_or(ModuleError::InvalidParameter)?;
        if open.shared.is_running() {
            return Err(ModuleError::NotSupported);
        }
        let result = open.module.lock().close();

        if let Some(mut open) = self.inner.take() {
            let name = Arc::clone(&open.shared.name);
            open.teardown();
            debug!("{}: closed", name);
        }
        result
    }

    /// Queue a copy of `data` for processing.
    ///
    /// `response` runs once the module is done with the frame, including
    /// when the frame is dropped.
    ///
    /// # Errors
    ///
    /// - `NotSupported` if not Running or the module is an Input module
    /// - `NoMemory` if the RX FIFO is full
    pub fn data_tx<B: AsRef<[u8]>>(&self, data: &AudioData<B>, response: Option<ResponseCallback>) -> Result<()> {
        let open = self.inner.as_ref().ok_or(ModuleError::NotSupported)?;
        tx_into(&open.shared, data, response)
    }

    /// Take the next frame from the TX FIFO and copy it into `out`.
    ///
    /// `out.data_size` is the room available; on success it is set to the
    /// frame size and `out.meta` to the frame metadata.
    ///
    /// # Errors
    ///
    /// - `NotSupported` if not Running or the module is an Output module
    /// - `Timeout` if no frame arrived in time
    /// - `InvalidParameter` if the frame does not fit (the frame is dropped)
    pub fn data_rx<B>(&self, out: &mut AudioData<B>, timeout: Timeout) -> Result<()>
    where
        B: AsRef<[u8]> + AsMut<[u8]>,
    {
        let open = self.inner.as_ref().ok_or(ModuleError::NotSupported)?;
        rx_from(&open.shared, out, timeout)
    }

    /// Current state; Undefined for a closed handle.
    pub fn state(&self) -> ModuleState {
        self.inner
            .as_ref()
            .map_or(ModuleState::Undefined, |open| open.shared.state())
    }

    /// State at entry to the last successful state-changing call.
    pub fn previous_state(&self) -> ModuleState {
        self.inner
            .as_ref()
            .map_or(ModuleState::Undefined, |open| open.shared.previous_state())
    }

    /// `(base name, instance name)`.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` when Undefined.
    pub fn names(&self) -> Result<(&'static str, &str)> {
        let open = self.open_module()?;
        Ok((open.shared.description.name, &*open.shared.name))
    }

    /// Number of destinations, counting the own TX FIFO if connected.
    pub fn destination_count(&self) -> usize {
        self.inner
            .as_ref()
            .map_or(0, |open| open.shared.destinations.lock().count())
    }

    /// Counter snapshot; all zero for a closed handle.
    pub fn stats(&self) -> ModuleStats {
        self.inner
            .as_ref()
            .map_or_else(ModuleStats::default, |open| open.shared.stats.snapshot())
    }

    /// `(allocated, capacity)` of the output slab, if the module has one.
    pub fn pool_usage(&self) -> Option<(usize, usize)> {
        let pool = self.inner.as_ref()?.shared.pool.as_ref()?;
        Some((pool.allocated_count(), pool.capacity()))
    }

    /// `(alloced, locked)` of the RX FIFO, if the module has one.
    pub fn rx_fifo_usage(&self) -> Option<(usize, usize)> {
        Some(self.inner.as_ref()?.shared.rx_fifo.as_ref()?.num_used())
    }

    /// `(alloced, locked)` of the TX FIFO, if the module has one.
    pub fn tx_fifo_usage(&self) -> Option<(usize, usize)> {
        Some(self.inner.as_ref()?.shared.tx_fifo.as_ref()?.num_used())
    }

    fn shared(&self) -> Option<&Arc<ModuleShared>> {
        self.inner.as_ref().map(|open| &open.shared)
    }

    /// Whether a `stop` call is waiting for the module.
    #[cfg(test)]
    pub(crate) fn stop_pending(&self) -> bool {
        self.shared().is_some_and(|shared| shared.lifecycle.lock().stopping)
    }
}

impl<M: AudioModule> Drop for ModuleHandle<M> {
    fn drop(&mut self) {
        if let Some(mut open) = self.inner.take() {
            debug!("{}: handle dropped while open, shutting down", open.shared.name);
            open.teardown();
        }
    }
}

fn tx_into<B: AsRef<[u8]>>(shared: &ModuleShared, data: &AudioData<B>, response: Option<ResponseCallback>) -> Result<()> {
    if !shared.is_running() {
        return Err(ModuleError::NotSupported);
    }
    let rx_fifo = shared.rx_fifo.as_ref().ok_or(ModuleError::NotSupported)?;
    let message = Message::new(AudioData::from_bytes(data.bytes(), data.meta), None, response);
    enqueue(rx_fifo, message, Timeout::NoWait).map_err(|err| {
        debug!("{}: data_tx refused: {}", shared.name, err);
        err
    })
}

fn rx_from<B>(shared: &ModuleShared, out: &mut AudioData<B>, timeout: Timeout) -> Result<()>
where
    B: AsRef<[u8]> + AsMut<[u8]>,
{
    if !shared.is_running() {
        return Err(ModuleError::NotSupported);
    }
    let tx_fifo = shared.tx_fifo.as_ref().ok_or(ModuleError::NotSupported)?;
    let mut slot = tx_fifo.last_filled_get(timeout)?;
    let message = slot.take().ok_or_else(|| {
        warn!("{}: filled TX slot without a message", shared.name);
        ModuleError::Refused
    })?;
    slot.block_free();

    let bytes = message.audio_data.bytes();
    if out.data_size < bytes.len() || out.capacity() < bytes.len() {
        debug!(
            "{}: data_rx buffer too small ({} < {})",
            shared.name,
            out.data_size,
            bytes.len()
        );
        return Err(ModuleError::InvalidParameter);
    }
    out.data.as_mut()[..bytes.len()].copy_from_slice(bytes);
    out.data_size = bytes.len();
    out.meta = message.audio_data.meta;
    message.release();
    Ok(())
}

/// Send `input` into `tx`'s RX FIFO, then wait up to `timeout` for a frame
/// on `rx`'s TX FIFO and copy it into `out`.
///
/// The two handles may be the same module (self-loopback) or two ends of a
/// connected chain; the frame travels through the connection graph either
/// way.
///
/// # Errors
///
/// As for [`ModuleHandle::data_tx`] and [`ModuleHandle::data_rx`]; nothing
/// is sent unless both handles are Running with the right types.
pub fn data_tx_rx<A, B, I, O>(
    tx: &ModuleHandle<A>,
    rx: &ModuleHandle<B>,
    input: &AudioData<I>,
    out: &mut AudioData<O>,
    timeout: Timeout,
) -> Result<()>
where
    A: AudioModule,
    B: AudioModule,
    I: AsRef<[u8]>,
    O: AsRef<[u8]> + AsMut<[u8]>,
{
    let (Some(tx_shared), Some(rx_shared)) = (tx.shared(), rx.shared()) else {
        return Err(ModuleError::NotSupported);
    };
    if !tx_shared.is_running() || !rx_shared.is_running() {
        return Err(ModuleError::NotSupported);
    }
    if !tx_shared.description.module_type.consumes() || !rx_shared.description.module_type.produces() {
        return Err(ModuleError::NotSupported);
    }
    tx_into(tx_shared, input, None)?;
    rx_from(rx_shared, out, timeout)
}

/// Connect `from` to `to`.
///
/// With `return_on_tx`, `to` must be `from` itself: the module then also
/// emits every frame into its own TX FIFO for [`ModuleHandle::data_rx`].
/// Otherwise `to` is appended to `from`'s destination list.
///
/// # Errors
///
/// - `InvalidParameter` if either handle is Undefined, `from` does not
///   produce, `to` does not consume, or `return_on_tx` names another handle
/// - `AlreadyInit` if the connection already exists
pub fn connect<A: AudioModule, B: AudioModule>(
    from: &ModuleHandle<A>,
    to: &ModuleHandle<B>,
    return_on_tx: bool,
) -> Result<()> {
    let (from, to) = connection_ends(from, to, return_on_tx)?;
    let mut destinations = from.destinations.lock();
    destinations.prune(&from.name);
    if return_on_tx {
        if destinations.use_tx_queue {
            return Err(ModuleError::AlreadyInit);
        }
        destinations.use_tx_queue = true;
        debug!("{}: connected to own tx queue", from.name);
    } else {
        if destinations.list.iter().any(|dest| Weak::as_ptr(dest) == Arc::as_ptr(to)) {
            return Err(ModuleError::AlreadyInit);
        }
        destinations.list.push(Arc::downgrade(to));
        debug!("{}: connected to {}", from.name, to.name);
    }
    Ok(())
}

/// Undo a [`connect`].
///
/// # Errors
///
/// `InvalidParameter` on the same validation failures as `connect`, or if
/// the connection does not exist.
pub fn disconnect<A: AudioModule, B: AudioModule>(
    from: &ModuleHandle<A>,
    to: &ModuleHandle<B>,
    return_on_tx: bool,
) -> Result<()> {
    let (from, to) = connection_ends(from, to, return_on_tx)?;
    let mut destinations = from.destinations.lock();
    destinations.prune(&from.name);
    if return_on_tx {
        if !destinations.use_tx_queue {
            return Err(ModuleError::InvalidParameter);
        }
        destinations.use_tx_queue = false;
        debug!("{}: disconnected from own tx queue", from.name);
    } else {
        let index = destinations
            .list
            .iter()
            .position(|dest| Weak::as_ptr(dest) == Arc::as_ptr(to))
            .ok_or(ModuleError::InvalidParameter)?;
        destinations.list.remove(index);
        debug!("{}: disconnected from {}", from.name, to.name);
    }
    Ok(())
}

fn connection_ends<'a, A: AudioModule, B: AudioModule>(
    from: &'a ModuleHandle<A>,
    to: &'a ModuleHandle<B>,
    return_on_tx: bool,
) -> Result<(&'a Arc<ModuleShared>, &'a Arc<ModuleShared>)> {
    let (Some(from), Some(to)) = (from.shared(), to.shared()) else {
        return Err(ModuleError::InvalidParameter);
    };
    if !from.description.module_type.produces() {
        return Err(ModuleError::InvalidParameter);
    }
    if return_on_tx {
        if !Arc::ptr_eq(from, to) {
            return Err(ModuleError::InvalidParameter);
        }
    } else if !to.description.module_type.consumes() {
        return Err(ModuleError::InvalidParameter);
    }
    Ok((from, to))
}

/// Poll `condition` every millisecond until it holds or `limit` passes.
#[cfg(test)]
pub(crate) fn wait_for(limit: std::time::Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + limit;
    while std::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
    condition()
}
