//! Continuous-array builder.
//!
//! Treats a finite source frame (typically one period of a tone) as an
//! endless stream formed by repeating it, and copies a window of that stream
//! into one or all channels of a destination frame. A caller-held byte cursor
//! into the source marks where the next window starts and wraps at the end of
//! the source:
//!
//! ```text
//! source:  [a b c d]            cursor = 3
//! stream:   a b c d a b c d a b c d ...
//!                 ^ window of 6: d a b c d a   → cursor = 1
//! ```
//!
//! The destination's `interleaved` flag selects the layout of the window:
//! deinterleaved channel `i` occupies `[i·pc, (i+1)·pc)` where `pc` is the
//! per-channel size; interleaved channels are strided by
//! `channel_count · carrier_bytes`.

use crate::data::AudioData;
use crate::dsp::pcm::byte_offset;
use crate::error::{ModuleError, Result};

/// Destination geometry shared by both entry points.
struct Layout {
    channel_count: usize,
    per_channel: usize,
    carrier: usize,
    interleaved: bool,
}

fn validate<S, D>(dest: &AudioData<D>, src: &AudioData<S>, pos: usize) -> Result<Layout>
where
    S: AsRef<[u8]>,
    D: AsRef<[u8]>,
{
    if !dest.meta.same_format(&src.meta) {
        return Err(ModuleError::InvalidParameter);
    }
    if src.data_size == 0 || dest.data_size == 0 || pos >= src.data_size {
        return Err(ModuleError::InvalidParameter);
    }
    if src.data_size > src.capacity() || dest.data_size > dest.capacity() {
        return Err(ModuleError::InvalidParameter);
    }

    let channel_count = usize::from(dest.channel_count());
    let carrier = dest.meta.carrier_bytes();
    if channel_count == 0 || carrier == 0 || carrier > 4 {
        return Err(ModuleError::InvalidParameter);
    }
    if dest.data_size % channel_count != 0 {
        return Err(ModuleError::InvalidParameter);
    }
    let per_channel = dest.data_size / channel_count;
    if dest.meta.interleaved && per_channel % carrier != 0 {
        return Err(ModuleError::InvalidParameter);
    }

    Ok(Layout {
        channel_count,
        per_channel,
        carrier,
        interleaved: dest.meta.interleaved,
    })
}

/// Copy `layout.per_channel` stream bytes starting at `start` into `channel`.
/// Returns the cursor after the window.
fn fill_channel(dest: &mut [u8], src: &[u8], layout: &Layout, channel: usize, start: usize) -> usize {
    let mut pos = start;
    for byte in 0..layout.per_channel {
        let offset = byte_offset(
            byte,
            channel,
            layout.channel_count,
            layout.per_channel,
            layout.carrier,
            layout.interleaved,
        );
        dest[offset] = src[pos];
        pos += 1;
        if pos == src.len() {
            pos = 0;
        }
    }
    pos
}

/// Fill one channel of `dest` from the stream of `src`, starting at `*pos`.
///
/// The window length is the destination's per-channel size
/// (`dest.data_size / channel_count`). On success `*pos` is advanced by the
/// window length, modulo `src.data_size`.
///
/// # Errors
///
/// `InvalidParameter` if the frames disagree on sample rate, bit depth or
/// carrier width, either size is zero, `*pos` is outside the source, the
/// destination is smaller than `src.data_size / channel_count`, its size is
/// not a multiple of the channel count, or `channel` is out of range.
pub fn build_channel<S, D>(
    dest: &mut AudioData<D>,
    src: &AudioData<S>,
    channel: u8,
    pos: &mut usize,
) -> Result<()>
where
    S: AsRef<[u8]>,
    D: AsRef<[u8]> + AsMut<[u8]>,
{
    let layout = validate(dest, src, *pos)?;
    let channel = usize::from(channel);
    if channel >= layout.channel_count || dest.data_size < src.data_size / layout.channel_count {
        return Err(ModuleError::InvalidParameter);
    }

    let src_bytes = &src.data.as_ref()[..src.data_size];
    *pos = fill_channel(dest.bytes_mut(), src_bytes, &layout, channel, *pos);
    Ok(())
}

/// Fill every channel of `dest` with the same window of the `src` stream.
///
/// `*pos` advances once, by the per-channel size.
///
/// # Errors
///
/// As for [`build_channel`], minus the channel and minimum-size checks.
pub fn build_all_channels<S, D>(dest: &mut AudioData<D>, src: &AudioData<S>, pos: &mut usize) -> Result<()>
where
    S: AsRef<[u8]>,
    D: AsRef<[u8]> + AsMut<[u8]>,
{
    let layout = validate(dest, src, *pos)?;

    let src_bytes = &src.data.as_ref()[..src.data_size];
    let dest_bytes = dest.bytes_mut();
    let start = *pos;
    let mut end = start;
    for channel in 0..layout.channel_count {
        end = fill_channel(dest_bytes, src_bytes, &layout, channel, start);
    }
    *pos = end;
    Ok(())
}
