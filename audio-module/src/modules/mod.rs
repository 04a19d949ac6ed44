//! Reference modules.
//!
//! | Module | Type | Description |
//! |--------|------|-------------|
//! | [`Passthrough`] | InOut | Copies input to output |
//! | [`ToneGenerator`] | InOut | Mixes a sine tone into selected channels |
//! | [`PlayQueue`] | Input | User code → module graph |
//! | [`RecordQueue`] | Output | Module graph → user code |

pub mod passthrough;
pub mod play_queue;
pub mod record_queue;

#[cfg(feature = "tone")]
pub mod tone_generator;

pub use passthrough::Passthrough;
pub use play_queue::{PlayQueue, PlayQueueFeeder};
pub use record_queue::{RecordQueue, RecordReader};

#[cfg(feature = "tone")]
pub use tone_generator::{ToneConfig, ToneGenerator};
