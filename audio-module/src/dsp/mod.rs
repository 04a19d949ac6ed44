//! Sample-level DSP: PCM access, continuous-array construction and tone
//! synthesis.

pub mod continuous_array;
pub mod pcm;

#[cfg(feature = "tone")]
pub mod tone;

pub use continuous_array::{build_all_channels, build_channel};
