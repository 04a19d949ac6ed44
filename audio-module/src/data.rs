//! Audio frame carrier and its metadata.
//!
//! An [`AudioData`] is a byte region plus the [`AudioMetadata`] describing
//! how to interpret it. Channels are identified by a 32-bit location bitmap;
//! the channel count is always the number of set bits.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::block::{AudioBlockMut, AudioBlockRef};

pub const LOCATION_FRONT_LEFT: u32 = 1 << 0;
pub const LOCATION_FRONT_RIGHT: u32 = 1 << 1;
pub const LOCATION_FRONT_CENTER: u32 = 1 << 2;
pub const LOCATION_LOW_FREQ_EFFECTS: u32 = 1 << 3;
pub const LOCATION_BACK_LEFT: u32 = 1 << 4;
pub const LOCATION_BACK_RIGHT: u32 = 1 << 5;
pub const LOCATION_SIDE_LEFT: u32 = 1 << 10;
pub const LOCATION_SIDE_RIGHT: u32 = 1 << 11;

/// Front left + front right.
pub const LOCATION_STEREO: u32 = LOCATION_FRONT_LEFT | LOCATION_FRONT_RIGHT;

/// Number of channels described by a location bitmap.
#[inline]
pub fn number_channels_calculate(locations: u32) -> u8 {
    locations.count_ones() as u8
}

/// Iterate over the set location bits of `locations`, lowest first.
///
/// The n-th item is the location of channel n.
pub fn locations_iter(locations: u32) -> impl Iterator<Item = u32> {
    let mut remaining = locations;
    core::iter::from_fn(move || {
        if remaining == 0 {
            return None;
        }
        let bit = remaining & remaining.wrapping_neg();
        remaining &= !bit;
        Some(bit)
    })
}

/// Encoding of the bytes in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CodingType {
    #[default]
    Undefined,
    Pcm,
    Lc3,
}

/// Describes one audio frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AudioMetadata {
    pub data_coding: CodingType,
    /// Frame duration in microseconds.
    pub data_len_us: u32,
    pub sample_rate_hz: u32,
    /// Significant bits per sample.
    pub bits_per_sample: u8,
    /// Container width per sample, `>= bits_per_sample` (e.g. 24-in-32).
    pub carried_bits_per_sample: u8,
    pub interleaved: bool,
    /// Channel location bitmap, one set bit per channel.
    pub locations: u32,
    pub reference_ts_us: u32,
    pub data_rx_ts_us: u32,
    pub bad_data: bool,
}

impl AudioMetadata {
    /// PCM metadata with the given rate, depth, container and locations.
    pub fn pcm(sample_rate_hz: u32, bits_per_sample: u8, carried_bits_per_sample: u8, locations: u32) -> Self {
        AudioMetadata {
            data_coding: CodingType::Pcm,
            sample_rate_hz,
            bits_per_sample,
            carried_bits_per_sample,
            locations,
            ..Default::default()
        }
    }

    pub fn channel_count(&self) -> u8 {
        number_channels_calculate(self.locations)
    }

    /// Bytes per sample container.
    pub fn carrier_bytes(&self) -> usize {
        usize::from(self.carried_bits_per_sample / 8)
    }

    /// Whether two frames share rate, depth and container width.
    pub fn same_format(&self, other: &AudioMetadata) -> bool {
        self.sample_rate_hz == other.sample_rate_hz
            && self.bits_per_sample == other.bits_per_sample
            && self.carried_bits_per_sample == other.carried_bits_per_sample
    }
}

/// A frame: a byte region, the number of valid bytes in it, and metadata.
///
/// `B` is the storage: [`AudioBlockRef`] for frames travelling between
/// modules, [`AudioBlockMut`] for the output a module is filling.
#[derive(Debug, Clone)]
pub struct AudioData<B = AudioBlockRef> {
    pub data: B,
    /// Valid bytes; the region may be larger.
    pub data_size: usize,
    pub meta: AudioMetadata,
}

impl<B: AsRef<[u8]>> AudioData<B> {
    pub fn new(data: B, data_size: usize, meta: AudioMetadata) -> Self {
        AudioData {
            data,
            data_size,
            meta,
        }
    }

    /// Size of the underlying region.
    pub fn capacity(&self) -> usize {
        self.data.as_ref().len()
    }

    /// The valid bytes (`data_size`, clamped to the region).
    pub fn bytes(&self) -> &[u8] {
        let region = self.data.as_ref();
        &region[..self.data_size.min(region.len())]
    }

    pub fn channel_count(&self) -> u8 {
        self.meta.channel_count()
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> AudioData<B> {
    /// The valid bytes, writable.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        let region = self.data.as_mut();
        let len = self.data_size.min(region.len());
        &mut region[..len]
    }
}

impl AudioData<AudioBlockRef> {
    /// Copy `bytes` into a new detached frame.
    pub fn from_bytes(bytes: &[u8], meta: AudioMetadata) -> Self {
        AudioData {
            data: AudioBlockRef::from_slice(bytes),
            data_size: bytes.len(),
            meta,
        }
    }
}

impl AudioData<AudioBlockMut> {
    /// A zeroed, writable frame of `capacity` bytes outside any pool.
    pub fn with_capacity(capacity: usize) -> Self {
        AudioData {
            data: AudioBlockMut::detached(capacity),
            data_size: capacity,
            meta: AudioMetadata::default(),
        }
    }

    /// Freeze the frame for sharing. No data is copied.
    pub fn into_shared(self) -> AudioData<AudioBlockRef> {
        AudioData {
            data: self.data.into_shared(),
            data_size: self.data_size,
            meta: self.meta,
        }
    }
}
