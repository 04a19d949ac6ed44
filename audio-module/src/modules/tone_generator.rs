//! Tone generator / mixer module.
//!
//! An in-out module that writes a sine tone into selected channels of each
//! input frame. For every channel whose location is in `mix_locations` the
//! output sample is
//!
//! ```text
//! out = saturate(tone · tone_scale + in · input_scale)
//! ```
//!
//! and every other channel passes through unchanged. The tone is one period
//! synthesised for the input's sample format and repeated continuously
//! across frames with the continuous-array builder, so consecutive frames
//! join without phase jumps. The output layout follows `interleave_output`
//! regardless of the input layout.

use log::debug;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::block::AudioBlockMut;
use crate::constants::{TONE_BUFFER_MAX_BYTES, TONE_MAX_HZ, TONE_MIN_HZ};
use crate::data::{locations_iter, AudioData, AudioMetadata, CodingType, LOCATION_FRONT_LEFT};
use crate::dsp::continuous_array::build_channel;
use crate::dsp::pcm::{read_sample, sample_offset, saturate, write_sample};
use crate::dsp::tone::tone_generate;
use crate::error::{ModuleError, Result};
use crate::module::{AudioModule, ModuleDescription, ModuleType};

/// Tone generator configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ToneConfig {
    /// Tone frequency, `TONE_MIN_HZ..=TONE_MAX_HZ`.
    pub frequency_hz: u32,
    /// Tone amplitude relative to full scale, `0.0..=1.0`.
    pub amplitude: f32,
    /// Gain applied to the tone when mixing, `0.0..=1.0`.
    pub tone_scale: f32,
    /// Gain applied to the input when mixing, `0.0..=1.0`.
    pub input_scale: f32,
    /// Channel locations that receive the tone.
    pub mix_locations: u32,
    /// Write the output interleaved.
    pub interleave_output: bool,
}

impl Default for ToneConfig {
    fn default() -> Self {
        ToneConfig {
            frequency_hz: 1000,
            amplitude: 0.5,
            tone_scale: 1.0,
            input_scale: 1.0,
            mix_locations: LOCATION_FRONT_LEFT,
            interleave_output: false,
        }
    }
}

impl ToneConfig {
    /// # Errors
    ///
    /// `InvalidParameter` if the frequency or any gain is out of range.
    pub fn validate(&self) -> Result<()> {
        if !(TONE_MIN_HZ..=TONE_MAX_HZ).contains(&self.frequency_hz) {
            return Err(ModuleError::InvalidParameter);
        }
        for gain in [self.amplitude, self.tone_scale, self.input_scale] {
            if !(0.0..=1.0).contains(&gain) {
                return Err(ModuleError::InvalidParameter);
            }
        }
        Ok(())
    }
}

/// Format the cached tone was generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ToneDescriptor {
    sample_rate_hz: u32,
    bits_per_sample: u8,
    carried_bits_per_sample: u8,
    mix_locations: u32,
}

pub struct ToneGenerator {
    config: ToneConfig,
    /// One period of the tone.
    tone: AudioData<Vec<u8>>,
    descriptor: Option<ToneDescriptor>,
    /// Byte position in `tone` where the next frame starts.
    cursor: usize,
    /// Tone laid out like the output frame.
    scratch: Vec<u8>,
}

impl Default for ToneGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ToneGenerator {
    pub fn new() -> Self {
        ToneGenerator {
            config: ToneConfig::default(),
            tone: AudioData::new(vec![0; TONE_BUFFER_MAX_BYTES], 0, AudioMetadata::default()),
            descriptor: None,
            cursor: 0,
            scratch: Vec::new(),
        }
    }

    /// Regenerate the tone if the input format or mix map changed.
    fn tone_prepare(&mut self, meta: &AudioMetadata) -> Result<()> {
        let descriptor = ToneDescriptor {
            sample_rate_hz: meta.sample_rate_hz,
            bits_per_sample: meta.bits_per_sample,
            carried_bits_per_sample: meta.carried_bits_per_sample,
            mix_locations: self.config.mix_locations,
        };
        if self.descriptor == Some(descriptor) {
            return Ok(());
        }

        self.descriptor = None;
        let size = tone_generate(
            &mut self.tone.data,
            self.config.frequency_hz,
            meta.sample_rate_hz,
            meta.bits_per_sample,
            meta.carried_bits_per_sample,
            self.config.amplitude,
        )?;
        self.tone.data_size = size;
        self.tone.meta = AudioMetadata::pcm(
            meta.sample_rate_hz,
            meta.bits_per_sample,
            meta.carried_bits_per_sample,
            LOCATION_FRONT_LEFT,
        );
        self.descriptor = Some(descriptor);
        self.cursor = 0;
        debug!(
            "tone generator: {} Hz at {} Hz / {}-in-{} bit, {} bytes",
            self.config.frequency_hz,
            meta.sample_rate_hz,
            meta.bits_per_sample,
            meta.carried_bits_per_sample,
            size
        );
        Ok(())
    }
}

impl AudioModule for ToneGenerator {
    type Config = ToneConfig;

    const DESCRIPTION: ModuleDescription = ModuleDescription {
        name: "tone generator",
        module_type: ModuleType::InOut,
    };

    fn configuration_set(&mut self, config: &ToneConfig) -> Result<()> {
        config.validate()?;
        self.config = *config;
        self.descriptor = None;
        Ok(())
    }

    fn configuration_get(&self, config: &mut ToneConfig) -> Result<()> {
        *config = self.config;
        Ok(())
    }

    fn data_process(&mut self, input: Option<&AudioData>, output: Option<&mut AudioData<AudioBlockMut>>) -> Result<()> {
        let (Some(input), Some(output)) = (input, output) else {
            return Err(ModuleError::InvalidParameter);
        };
        let meta = input.meta;
        if meta.data_coding != CodingType::Pcm {
            return Err(ModuleError::InvalidParameter);
        }
        let size = input.bytes().len();
        if size == 0 || size > output.capacity() {
            return Err(ModuleError::InvalidParameter);
        }
        let channels = usize::from(meta.channel_count());
        let carrier = meta.carrier_bytes();
        if channels == 0 || carrier == 0 || carrier > 4 || size % channels != 0 || (size / channels) % carrier != 0 {
            return Err(ModuleError::InvalidParameter);
        }

        self.tone_prepare(&meta)?;

        let mut out_meta = meta;
        out_meta.interleaved = self.config.interleave_output;

        // Tone for the mixed channels, laid out like the output.
        self.scratch.clear();
        self.scratch.resize(size, 0);
        let mut scratch = AudioData::new(&mut self.scratch[..], size, out_meta);
        let start = self.cursor;
        let mut end = start;
        let mut mixed = 0u32;
        for (channel, location) in locations_iter(meta.locations).enumerate() {
            if location & self.config.mix_locations == 0 {
                continue;
            }
            let mut pos = start;
            build_channel(&mut scratch, &self.tone, channel as u8, &mut pos)?;
            end = pos;
            mixed |= 1 << channel;
        }
        self.cursor = end;

        let per_channel = size / channels;
        let in_bytes = input.bytes();
        let out_bytes = &mut output.data[..size];
        for channel in 0..channels {
            let is_mixed = mixed & (1 << channel) != 0;
            for index in 0..per_channel / carrier {
                let in_offset = sample_offset(index, channel, channels, per_channel, carrier, meta.interleaved);
                let out_offset = sample_offset(index, channel, channels, per_channel, carrier, out_meta.interleaved);
                let sample = read_sample(&in_bytes[in_offset..], carrier);
                let value = if is_mixed {
                    let tone = read_sample(&self.scratch[out_offset..], carrier);
                    let mix = tone as f32 * self.config.tone_scale + sample as f32 * self.config.input_scale;
                    saturate(mix as i64, meta.bits_per_sample)
                } else {
                    sample
                };
                write_sample(&mut out_bytes[out_offset..], carrier, value);
            }
        }

        output.data_size = size;
        output.meta = out_meta;
        Ok(())
    }
}
