//! PCM sample access over raw frame bytes.
//!
//! Samples are little-endian, right-aligned in a container of 1 to 4 bytes
//! and sign-extended from the container width on read.

/// Read one sample from the first `carrier_bytes` bytes of `bytes`.
#[inline]
pub fn read_sample(bytes: &[u8], carrier_bytes: usize) -> i32 {
    debug_assert!((1..=4).contains(&carrier_bytes));
    let mut raw = [0u8; 4];
    raw[..carrier_bytes].copy_from_slice(&bytes[..carrier_bytes]);
    let shift = 32 - 8 * carrier_bytes as u32;
    (i32::from_le_bytes(raw) << shift) >> shift
}

/// Write the low `carrier_bytes` bytes of `value` into `bytes`.
#[inline]
pub fn write_sample(bytes: &mut [u8], carrier_bytes: usize, value: i32) {
    debug_assert!((1..=4).contains(&carrier_bytes));
    bytes[..carrier_bytes].copy_from_slice(&value.to_le_bytes()[..carrier_bytes]);
}

/// Largest positive sample value at `bits` of depth.
#[inline]
pub fn full_scale(bits: u8) -> i32 {
    debug_assert!((1..=32).contains(&bits));
    ((1i64 << (bits - 1)) - 1) as i32
}

/// Saturate `val` to the signed range of a `bits`-bit sample.
#[inline]
pub fn saturate(val: i64, bits: u8) -> i32 {
    let max = i64::from(full_scale(bits));
    let min = -max - 1;
    val.clamp(min, max) as i32
}

/// Byte offset of sample `index` of channel `channel`.
///
/// Deinterleaved frames store each channel contiguously in
/// `per_channel_bytes`; interleaved frames store one sample of every channel
/// per step.
#[inline]
pub fn sample_offset(
    index: usize,
    channel: usize,
    channel_count: usize,
    per_channel_bytes: usize,
    carrier_bytes: usize,
    interleaved: bool,
) -> usize {
    if interleaved {
        (index * channel_count + channel) * carrier_bytes
    } else {
        channel * per_channel_bytes + index * carrier_bytes
    }
}

/// Byte offset of byte `byte` of channel `channel`'s stream.
///
/// Equivalent to [`sample_offset`] for whole samples, extended to the bytes
/// inside a sample container.
#[inline]
pub fn byte_offset(
    byte: usize,
    channel: usize,
    channel_count: usize,
    per_channel_bytes: usize,
    carrier_bytes: usize,
    interleaved: bool,
) -> usize {
    sample_offset(
        byte / carrier_bytes,
        channel,
        channel_count,
        per_channel_bytes,
        carrier_bytes,
        interleaved,
    ) + byte % carrier_bytes
}
