//! # audio-module
//!
//! A thread-per-module audio processing framework. Each module instance owns
//! a worker thread, an RX FIFO for frames it consumes, a TX FIFO for frames
//! user code reads back, and a slab of output blocks. Modules are wired into
//! a directed graph; every produced frame is fanned out to all connected
//! destinations and its block returns to the slab once the last of them is
//! done with it.
//!
//! ## Architecture
//!
//! | Layer | Module | Purpose |
//! |-------|--------|---------|
//! | Memory | [`block`] | Per-module block slab with refcounted handles |
//! | Queues | [`fifo`] | Bounded two-phase FIFO with timeouts |
//! | Data | [`data`] | [`AudioData`] frames and [`AudioMetadata`] |
//! | Trait | [`module`] | The [`AudioModule`] trait and module types |
//! | Runtime | [`runtime`] | [`ModuleHandle`] lifecycle, workers, fan-out |
//! | DSP | [`dsp`] | PCM sample access, continuous array builder, tone synthesis |
//! | Modules | [`modules`] | Tone generator, passthrough, play/record queues |
//!
//! ## Quick start
//!
//! ```ignore
//! use audio_module::prelude::*;
//!
//! let mut tone = ModuleHandle::new();
//! tone.open(ToneGenerator::new(), "tone", &ThreadConfig::with_block_size(960), &ToneConfig::default())?;
//! connect(&tone, &tone, true)?;
//! tone.start()?;
//!
//! let input = AudioData::from_bytes(&[0; 960], AudioMetadata::pcm(48_000, 16, 16, LOCATION_FRONT_LEFT));
//! let mut out = AudioData::with_capacity(960);
//! data_tx_rx(&tone, &tone, &input, &mut out, Timeout::After(Duration::from_millis(100)))?;
//! ```
//!
//! ## Features
//!
//! | Feature | Default | Enables |
//! |---------|---------|---------|
//! | `tone` | yes | Tone synthesis and the [`ToneGenerator`](modules::ToneGenerator) module |
//! | `serde` | yes | `Serialize`/`Deserialize` for metadata, configs and stats |
//!
//! ## Threading
//!
//! Lifecycle calls on one handle are serialised. A module's own methods are
//! only ever called with its lock held, so implementations need no internal
//! synchronisation. Worker threads are named after their instance name.

pub mod constants;
pub mod error;
pub mod block;
pub mod fifo;
pub mod data;
pub mod module;
pub mod dsp;
pub mod runtime;
pub mod modules;

pub use data::{AudioData, AudioMetadata, CodingType};
pub use error::{ModuleError, Result};
pub use fifo::{DataFifo, Timeout};
pub use module::{AudioModule, ModuleDescription, ModuleState, ModuleType};
pub use runtime::{connect, data_tx_rx, disconnect, ModuleHandle, ModuleStats, ThreadConfig};

/// Everything needed to build and drive a pipeline.
pub mod prelude {
    pub use std::time::Duration;

    pub use crate::block::{AudioBlockMut, AudioBlockRef};
    pub use crate::data::*;
    pub use crate::error::{ModuleError, Result};
    pub use crate::fifo::Timeout;
    pub use crate::module::{AudioModule, ModuleDescription, ModuleState, ModuleType};
    pub use crate::modules::*;
    pub use crate::runtime::{connect, data_tx_rx, disconnect, ModuleHandle, ModuleStats, ThreadConfig};
}
