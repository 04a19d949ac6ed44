//! Single-period sine tone synthesis.

use core::f32::consts::PI;

use crate::dsp::pcm::{full_scale, write_sample};
use crate::error::{ModuleError, Result};

/// Write one period of a sine tone into `buf` and return the bytes written.
///
/// The period is `sample_rate_hz / frequency_hz` samples long (integer
/// division). Sample `i` is `amplitude · sin(2π·i/n) · full_scale(bits)`,
/// stored little-endian in a `carried_bits / 8` byte container.
///
/// # Errors
///
/// `InvalidParameter` if the frequency is zero or above Nyquist, the
/// amplitude is outside `[0.0, 1.0]`, the bit layout is not a whole-byte
/// container of at most 32 bits holding `bits` bits, or `buf` is too small
/// for the period.
pub fn tone_generate(
    buf: &mut [u8],
    frequency_hz: u32,
    sample_rate_hz: u32,
    bits: u8,
    carried_bits: u8,
    amplitude: f32,
) -> Result<usize> {
    if frequency_hz == 0 || sample_rate_hz < frequency_hz.saturating_mul(2) {
        return Err(ModuleError::InvalidParameter);
    }
    if !(0.0..=1.0).contains(&amplitude) {
        return Err(ModuleError::InvalidParameter);
    }
    if bits == 0 || bits > carried_bits || carried_bits > 32 || carried_bits % 8 != 0 {
        return Err(ModuleError::InvalidParameter);
    }

    let samples = (sample_rate_hz / frequency_hz) as usize;
    let carrier = usize::from(carried_bits / 8);
    let size = samples * carrier;
    if size > buf.len() {
        return Err(ModuleError::InvalidParameter);
    }

    let peak = amplitude * full_scale(bits) as f32;
    let step = 2.0 * PI / samples as f32;
    for (i, sample) in buf[..size].chunks_exact_mut(carrier).enumerate() {
        let value = peak * libm::sinf(step * i as f32);
        write_sample(sample, carrier, value as i32);
    }
    Ok(size)
}
