//! Per-module worker threads.
//!
//! One thread per open handle. The loop depends on the module type:
//!
//! | Type | Loop |
//! |------|------|
//! | InOut | rx → alloc → `data_process(Some, Some)` → fan-out → release rx |
//! | Input | alloc (blocking) → `data_process(None, Some)` → fan-out |
//! | Output | rx → `data_process(Some, None)` → release rx |
//!
//! Every loop parks while the module is not Running and exits once the
//! handle is shut down. A frame produced while `stop` is pending is dropped
//! rather than fanned out. Dropping the received [`Message`] releases it, so
//! every early `continue` returns the upstream frame.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error, trace};
use parking_lot::Mutex;

use super::fanout::dispatch;
use super::handle::ModuleShared;
use super::message::Message;
use crate::block::{AudioBlockMut, BlockPool};
use crate::data::{AudioData, AudioMetadata};
use crate::error::{ModuleError, Result};
use crate::fifo::{DataFifo, Timeout};
use crate::module::{AudioModule, ModuleType};

pub(crate) fn spawn<M: AudioModule>(
    shared: Arc<ModuleShared>,
    module: Arc<Mutex<M>>,
    stack_size: usize,
) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(shared.name.to_string())
        .stack_size(stack_size)
        .spawn(move || run(&shared, &module))
        .map_err(ModuleError::Spawn)
}

fn run<M: AudioModule>(shared: &ModuleShared, module: &Mutex<M>) {
    debug!("{}: worker started", shared.name);
    match shared.description.module_type {
        ModuleType::InOut => match (shared.rx_fifo.as_ref(), shared.pool.as_ref()) {
            (Some(rx_fifo), Some(pool)) => in_out_loop(shared, module, rx_fifo, pool),
            _ => error!("{}: in-out module without rx fifo or slab", shared.name),
        },
        ModuleType::Input => match shared.pool.as_ref() {
            Some(pool) => input_loop(shared, module, pool),
            None => error!("{}: input module without slab", shared.name),
        },
        ModuleType::Output => match shared.rx_fifo.as_ref() {
            Some(rx_fifo) => output_loop(shared, module, rx_fifo),
            None => error!("{}: output module without rx fifo", shared.name),
        },
        ModuleType::Undefined => error!("{}: undefined module type", shared.name),
    }
    debug!("{}: worker exiting", shared.name);
}

/// Next message from `rx_fifo`, once the module is Running.
/// `None` means the handle was shut down.
fn receive(shared: &ModuleShared, rx_fifo: &DataFifo<Message>) -> Option<Message> {
    loop {
        if !shared.wait_until_running() {
            return None;
        }
        let mut slot = rx_fifo.last_filled_get(Timeout::Forever).ok()?;
        match slot.take() {
            Some(message) => {
                slot.block_free();
                // Frames queued before a stop wait for the next start.
                return shared.wait_until_running().then_some(message);
            }
            None => error!("{}: filled rx slot without a message", shared.name),
        }
    }
}

/// Run `data_process` and validate what it reports about the output.
fn process<M: AudioModule>(
    shared: &ModuleShared,
    module: &Mutex<M>,
    input: Option<&AudioData>,
    output: Option<&mut AudioData<AudioBlockMut>>,
) -> Result<()> {
    let mut guard = module.lock();
    match output {
        Some(output) => {
            guard.data_process(input, Some(&mut *output))?;
            if output.data_size > output.capacity() {
                error!(
                    "{}: data_process reported {} bytes in a {} byte block",
                    shared.name,
                    output.data_size,
                    output.capacity()
                );
                return Err(ModuleError::InvalidParameter);
            }
            Ok(())
        }
        None => guard.data_process(input, None),
    }
}

/// Fan `output` out, unless a `stop` arrived while it was produced.
fn emit(shared: &ModuleShared, output: AudioData<AudioBlockMut>) {
    if shared.accepts_output() {
        dispatch(shared, output.into_shared());
    } else {
        shared.stats.frames_stopped();
        debug!("{}: stopped during data_process, frame dropped", shared.name);
    }
}

fn in_out_loop<M: AudioModule>(
    shared: &ModuleShared,
    module: &Mutex<M>,
    rx_fifo: &DataFifo<Message>,
    pool: &BlockPool,
) {
    while let Some(message) = receive(shared, rx_fifo) {
        let Some(block) = pool.alloc() else {
            shared.stats.slab_exhausted();
            debug!("{}: slab exhausted, frame dropped", shared.name);
            continue;
        };
        let mut output = AudioData::new(block, pool.block_size(), AudioMetadata::default());

        match process(shared, module, Some(&message.audio_data), Some(&mut output)) {
            Ok(()) => {
                shared.stats.frames_processed();
                emit(shared, output);
            }
            Err(err) => {
                shared.stats.process_errors();
                debug!("{}: data_process failed: {}", shared.name, err);
            }
        }
        message.release();
    }
}

fn input_loop<M: AudioModule>(shared: &ModuleShared, module: &Mutex<M>, pool: &BlockPool) {
    loop {
        if !shared.wait_until_running() {
            return;
        }
        let block = match pool.alloc_timeout(Timeout::Forever) {
            Ok(block) => block,
            Err(_) => return,
        };
        if !shared.is_running() {
            continue;
        }
        let mut output = AudioData::new(block, pool.block_size(), AudioMetadata::default());

        match process(shared, module, None, Some(&mut output)) {
            Ok(()) => {
                shared.stats.frames_processed();
                emit(shared, output);
            }
            Err(ModuleError::Timeout) => trace!("{}: no frame this cycle", shared.name),
            Err(err) => {
                shared.stats.process_errors();
                debug!("{}: data_process failed: {}", shared.name, err);
            }
        }
    }
}

fn output_loop<M: AudioModule>(shared: &ModuleShared, module: &Mutex<M>, rx_fifo: &DataFifo<Message>) {
    while let Some(message) = receive(shared, rx_fifo) {
        match process(shared, module, Some(&message.audio_data), None) {
            Ok(()) => shared.stats.frames_processed(),
            Err(err) => {
                shared.stats.process_errors();
                debug!("{}: data_process failed: {}", shared.name, err);
            }
        }
        message.release();
    }
}
