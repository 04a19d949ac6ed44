//! Tone loopback: three-module pipeline driven from user code.
//!
//! ```text
//!   PlayQueue (silence, 10 ms frames)
//!         │
//!   ToneGenerator (1 kHz into front-left, stereo interleaved)
//!         │
//!   RecordQueue ──► peak level per channel
//! ```
//!
//! Run with `RUST_LOG=debug` to watch the modules come up and go down.

use std::time::Duration;

use audio_module::prelude::*;
use log::info;

const SAMPLE_RATE_HZ: u32 = 48_000;
const FRAME_SAMPLES: usize = 480;
const CHANNELS: usize = 2;
const FRAME_BYTES: usize = FRAME_SAMPLES * CHANNELS * 2;
const FRAMES: usize = 20;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let thread = ThreadConfig::with_block_size(FRAME_BYTES);

    let (play, feeder) = PlayQueue::new(1)?;
    let mut source = ModuleHandle::new();
    source.open(play, "source", &thread, &())?;

    let tone_config = ToneConfig {
        frequency_hz: 1_000,
        amplitude: 0.5,
        tone_scale: 1.0,
        input_scale: 1.0,
        mix_locations: LOCATION_FRONT_LEFT,
        interleave_output: true,
    };
    let mut tone = ModuleHandle::new();
    tone.open(ToneGenerator::new(), "tone", &thread, &tone_config)?;

    let (record, reader) = RecordQueue::new(1)?;
    let mut sink = ModuleHandle::new();
    sink.open(record, "sink", &thread, &())?;

    connect(&source, &tone, false)?;
    connect(&tone, &sink, false)?;
    sink.start()?;
    tone.start()?;
    source.start()?;

    // Keep one frame in flight; a full downstream FIFO drops frames.
    let meta = AudioMetadata::pcm(SAMPLE_RATE_HZ, 16, 16, LOCATION_STEREO);
    for index in 0..FRAMES {
        feeder.play(AudioData::from_bytes(&[0; FRAME_BYTES], meta))?;
        let frame = reader.read(Timeout::After(Duration::from_secs(1)))?;
        let mut peaks = [0i16; CHANNELS];
        for sample in frame.bytes().chunks_exact(2 * CHANNELS) {
            for (channel, peak) in peaks.iter_mut().enumerate() {
                let value = i16::from_le_bytes([sample[2 * channel], sample[2 * channel + 1]]);
                *peak = (*peak).max(value.saturating_abs());
            }
        }
        info!("frame {:2}: peak left {:5}, right {:5}", index, peaks[0], peaks[1]);
    }

    for (name, stats) in [("source", source.stats()), ("tone", tone.stats()), ("sink", sink.stats())] {
        info!(
            "{}: processed {}, errors {}, released {}",
            name, stats.frames_processed, stats.process_errors, stats.frames_released
        );
    }

    source.stop()?;
    tone.stop()?;
    sink.stop()?;
    source.close()?;
    tone.close()?;
    sink.close()?;
    Ok(())
}
