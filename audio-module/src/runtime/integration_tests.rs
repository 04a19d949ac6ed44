//! Integration tests exercising complete module graphs.
//!
//! Every test opens real handles with real worker threads and drives them
//! through the public lifecycle and data API:
//!
//! ```text
//! data_tx ─► [rx fifo] ─► worker ─► data_process ─► fan-out ─┬─► [dest rx fifo] ─► ...
//!                                                           └─► [own tx fifo] ─► data_rx
//! ```

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use parking_lot::{Condvar, Mutex};

    use crate::block::AudioBlockMut;
    use crate::data::{AudioData, AudioMetadata, LOCATION_FRONT_LEFT};
    use crate::error::{ModuleError, Result};
    use crate::fifo::Timeout;
    use crate::module::{AudioModule, ModuleDescription, ModuleState, ModuleType};
    use crate::modules::{Passthrough, PlayQueue, RecordQueue, RecordReader};
    use crate::runtime::handle::wait_for;
    use crate::runtime::{connect, data_tx_rx, disconnect, ModuleHandle, ResponseCallback, ThreadConfig};

    const WAIT: Duration = Duration::from_secs(2);

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn pcm_frame(bytes: &[u8]) -> AudioData {
        AudioData::from_bytes(bytes, AudioMetadata::pcm(16_000, 16, 16, LOCATION_FRONT_LEFT))
    }

    fn open_passthrough(name: &str, thread: ThreadConfig) -> ModuleHandle<Passthrough> {
        let mut handle = ModuleHandle::new();
        handle.open(Passthrough, name, &thread, &()).unwrap();
        handle
    }

    fn open_recorder(name: &str) -> (ModuleHandle<RecordQueue>, RecordReader) {
        let (queue, reader) = RecordQueue::new(8).unwrap();
        let mut handle = ModuleHandle::new();
        handle.open(queue, name, &ThreadConfig::default(), &()).unwrap();
        (handle, reader)
    }

    /// Response callback that counts its invocations.
    fn counting_callback(counter: &Arc<AtomicUsize>) -> Option<ResponseCallback> {
        let counter = Arc::clone(counter);
        Some(Box::new(move |_: &AudioData| {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
    }

    // ---------------------------------------------------------------
    // Gates: modules whose data_process blocks until opened
    // ---------------------------------------------------------------
    #[derive(Default)]
    struct GateState {
        open: bool,
        entered: usize,
        seen: Vec<u8>,
    }

    #[derive(Clone, Default)]
    struct GateControl(Arc<(Mutex<GateState>, Condvar)>);

    impl GateControl {
        fn open(&self) {
            self.0 .0.lock().open = true;
            self.0 .1.notify_all();
        }

        fn entered(&self) -> usize {
            self.0 .0.lock().entered
        }

        fn seen(&self) -> Vec<u8> {
            self.0 .0.lock().seen.clone()
        }

        /// Record the frame's first byte, then block until opened.
        fn pass(&self, input: Option<&AudioData>) {
            let (lock, cv) = &*self.0;
            let mut state = lock.lock();
            state.entered += 1;
            if let Some(first) = input.and_then(|frame| frame.bytes().first().copied()) {
                state.seen.push(first);
            }
            let deadline = Instant::now() + Duration::from_secs(5);
            while !state.open && Instant::now() < deadline {
                cv.wait_until(&mut state, deadline);
            }
        }
    }

    struct Gate(GateControl);

    impl AudioModule for Gate {
        type Config = ();
        const DESCRIPTION: ModuleDescription = ModuleDescription {
            name: "gate",
            module_type: ModuleType::Output,
        };

        fn data_process(&mut self, input: Option<&AudioData>, _output: Option<&mut AudioData<AudioBlockMut>>) -> Result<()> {
            self.0.pass(input);
            Ok(())
        }
    }

    /// In-out twin of [`Gate`]: copies its input once opened.
    struct GatedCopy(GateControl);

    impl AudioModule for GatedCopy {
        type Config = ();
        const DESCRIPTION: ModuleDescription = ModuleDescription {
            name: "gated copy",
            module_type: ModuleType::InOut,
        };

        fn data_process(&mut self, input: Option<&AudioData>, output: Option<&mut AudioData<AudioBlockMut>>) -> Result<()> {
            self.0.pass(input);
            Passthrough.data_process(input, output)
        }
    }

    // ---------------------------------------------------------------
    // 1: Self-loopback
    // ---------------------------------------------------------------
    #[test]
    fn self_loopback_round_trip() {
        init_logging();
        let handle = open_passthrough("loopback", ThreadConfig::with_block_size(64));
        connect(&handle, &handle, true).unwrap();
        handle.start().unwrap();

        let bytes: Vec<u8> = (0x01..=0x28).collect();
        let input = pcm_frame(&bytes);
        let mut out = AudioData::with_capacity(40);
        data_tx_rx(&handle, &handle, &input, &mut out, Timeout::After(WAIT)).unwrap();

        assert_eq!(out.data_size, 40);
        assert_eq!(out.bytes(), &bytes[..]);
        assert_eq!(out.meta, input.meta);

        assert!(wait_for(WAIT, || handle.pool_usage() == Some((0, 4))));
        let stats = handle.stats();
        assert_eq!(stats.frames_processed, 1);
        assert_eq!(stats.frames_released, 1);
    }

    #[test]
    fn frames_keep_fifo_order() {
        init_logging();
        let handle = open_passthrough("order", ThreadConfig::with_block_size(8));
        connect(&handle, &handle, true).unwrap();
        handle.start().unwrap();

        for tag in 1..=4u8 {
            handle.data_tx(&pcm_frame(&[tag, tag]), None).unwrap();
        }
        let mut out = AudioData::with_capacity(8);
        for tag in 1..=4u8 {
            out.data_size = 8;
            handle.data_rx(&mut out, Timeout::After(WAIT)).unwrap();
            assert_eq!(out.bytes(), &[tag, tag]);
        }
    }

    #[test]
    fn tx_rx_through_a_chain() {
        init_logging();
        let first = open_passthrough("first", ThreadConfig::with_block_size(16));
        let second = open_passthrough("second", ThreadConfig::with_block_size(16));
        connect(&first, &second, false).unwrap();
        connect(&second, &second, true).unwrap();
        first.start().unwrap();
        second.start().unwrap();

        let input = pcm_frame(&[9, 8, 7, 6]);
        let mut out = AudioData::with_capacity(16);
        data_tx_rx(&first, &second, &input, &mut out, Timeout::After(WAIT)).unwrap();
        assert_eq!(out.bytes(), &[9, 8, 7, 6]);

        // Reading the first module's own tx queue finds nothing: it is not
        // connected to itself.
        assert!(matches!(
            first.data_rx(&mut out, Timeout::NoWait),
            Err(ModuleError::Timeout)
        ));
    }

    #[test]
    fn rx_into_small_buffer_is_rejected() {
        init_logging();
        let handle = open_passthrough("small", ThreadConfig::with_block_size(16));
        connect(&handle, &handle, true).unwrap();
        handle.start().unwrap();

        handle.data_tx(&pcm_frame(&[1; 8]), None).unwrap();
        let mut out = AudioData::with_capacity(4);
        assert!(matches!(
            handle.data_rx(&mut out, Timeout::After(WAIT)),
            Err(ModuleError::InvalidParameter)
        ));
        assert!(wait_for(WAIT, || handle.pool_usage() == Some((0, 4))));
    }

    // ---------------------------------------------------------------
    // 2: Fan-out release
    // ---------------------------------------------------------------
    #[test]
    fn fan_out_releases_block_after_all_consumers() {
        init_logging();
        let producer = open_passthrough("producer", ThreadConfig::with_block_size(32));
        let (left, left_reader) = open_recorder("left");
        let (right, right_reader) = open_recorder("right");
        connect(&producer, &left, false).unwrap();
        connect(&producer, &right, false).unwrap();
        assert_eq!(producer.destination_count(), 2);
        for handle in [&left, &right] {
            handle.start().unwrap();
        }
        producer.start().unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        producer.data_tx(&pcm_frame(&[5, 6, 7, 8]), counting_callback(&calls)).unwrap();

        let left_frame = left_reader.read(Timeout::After(WAIT)).unwrap();
        let right_frame = right_reader.read(Timeout::After(WAIT)).unwrap();
        assert_eq!(left_frame.bytes(), &[5, 6, 7, 8]);
        assert_eq!(right_frame.bytes(), &[5, 6, 7, 8]);

        assert!(wait_for(WAIT, || producer.pool_usage() == Some((0, 4))));
        assert!(wait_for(WAIT, || producer.stats().frames_released == 1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = producer.stats();
        assert_eq!(stats.frames_processed, 1);
        assert_eq!(stats.delivery_failures, 0);
        assert_eq!(left.stats().frames_processed, 1);
        assert_eq!(right.stats().frames_processed, 1);
    }

    #[test]
    fn fan_out_holds_block_until_last_consumer() {
        init_logging();
        let gate = GateControl::default();
        let producer = open_passthrough("producer", ThreadConfig::with_block_size(8));
        let (fast, fast_reader) = open_recorder("fast");
        let mut slow = ModuleHandle::new();
        slow.open(Gate(gate.clone()), "slow", &ThreadConfig::default(), &()).unwrap();
        connect(&producer, &fast, false).unwrap();
        connect(&producer, &slow, false).unwrap();
        fast.start().unwrap();
        slow.start().unwrap();
        producer.start().unwrap();

        producer.data_tx(&pcm_frame(&[4, 4]), None).unwrap();
        assert_eq!(fast_reader.read(Timeout::After(WAIT)).unwrap().bytes(), &[4, 4]);
        assert!(wait_for(WAIT, || gate.entered() == 1));
        assert!(wait_for(WAIT, || fast.stats().frames_processed == 1));

        // One of two consumers done: the block stays out of the slab.
        assert_eq!(producer.pool_usage(), Some((1, 4)));
        assert_eq!(producer.stats().frames_released, 0);

        gate.open();
        assert!(wait_for(WAIT, || producer.pool_usage() == Some((0, 4))));
        assert!(wait_for(WAIT, || producer.stats().frames_released == 1));
        assert_eq!(gate.seen(), vec![4]);
    }

    #[test]
    fn frames_without_destinations_are_discarded() {
        init_logging();
        let handle = open_passthrough("lonely", ThreadConfig::with_block_size(8));
        handle.start().unwrap();

        handle.data_tx(&pcm_frame(&[1, 2]), None).unwrap();
        assert!(wait_for(WAIT, || handle.stats().frames_discarded == 1));
        assert!(wait_for(WAIT, || handle.pool_usage() == Some((0, 4))));
        assert_eq!(handle.stats().frames_released, 0);
    }

    #[test]
    fn failed_deliveries_are_counted() {
        init_logging();
        let producer = open_passthrough("producer", ThreadConfig::with_block_size(8));
        // Opened but never started: refuses every frame.
        let (idle, _reader) = open_recorder("idle");
        connect(&producer, &idle, false).unwrap();
        producer.start().unwrap();

        producer.data_tx(&pcm_frame(&[1, 2]), None).unwrap();
        assert!(wait_for(WAIT, || producer.stats().frames_undelivered == 1));
        let stats = producer.stats();
        assert_eq!(stats.delivery_failures, 1);
        assert_eq!(stats.frames_released, 1);
        assert!(wait_for(WAIT, || producer.pool_usage() == Some((0, 4))));
        assert_eq!(idle.stats().frames_processed, 0);
    }

    #[test]
    fn closed_destination_is_skipped() {
        init_logging();
        let producer = open_passthrough("producer", ThreadConfig::with_block_size(8));
        let (mut gone, _reader) = open_recorder("gone");
        let (kept, kept_reader) = open_recorder("kept");
        connect(&producer, &gone, false).unwrap();
        connect(&producer, &kept, false).unwrap();
        gone.close().unwrap();
        assert_eq!(producer.destination_count(), 1);
        kept.start().unwrap();
        producer.start().unwrap();

        producer.data_tx(&pcm_frame(&[3, 3]), None).unwrap();
        assert_eq!(kept_reader.read(Timeout::After(WAIT)).unwrap().bytes(), &[3, 3]);
        assert!(wait_for(WAIT, || producer.stats().frames_released == 1));
        assert_eq!(producer.stats().delivery_failures, 0);
    }

    #[test]
    fn reopened_destination_reconnects_cleanly() {
        init_logging();
        let producer = open_passthrough("producer", ThreadConfig::with_block_size(8));
        let (mut sink, _reader) = open_recorder("sink");
        connect(&producer, &sink, false).unwrap();
        sink.close().unwrap();
        assert_eq!(producer.destination_count(), 0);

        let (queue, reader) = RecordQueue::new(8).unwrap();
        sink.open(queue, "sink", &ThreadConfig::default(), &()).unwrap();
        connect(&producer, &sink, false).unwrap();
        assert_eq!(producer.destination_count(), 1);
        disconnect(&producer, &sink, false).unwrap();
        assert_eq!(producer.destination_count(), 0);
        assert!(matches!(
            disconnect(&producer, &sink, false),
            Err(ModuleError::InvalidParameter)
        ));

        connect(&producer, &sink, false).unwrap();
        sink.start().unwrap();
        producer.start().unwrap();
        for tag in 1..=3u8 {
            producer.data_tx(&pcm_frame(&[tag]), None).unwrap();
        }
        for tag in 1..=3u8 {
            assert_eq!(reader.read(Timeout::After(WAIT)).unwrap().bytes(), &[tag]);
        }
        assert!(wait_for(WAIT, || producer.stats().frames_released == 3));
        let stats = producer.stats();
        assert_eq!(stats.delivery_failures, 0);
        assert_eq!(stats.frames_undelivered, 0);
    }

    #[test]
    fn slab_exhaustion_drops_and_releases_input() {
        init_logging();
        let thread = ThreadConfig {
            block_count: 1,
            ..ThreadConfig::with_block_size(8)
        };
        let handle = open_passthrough("tight", thread);
        connect(&handle, &handle, true).unwrap();
        handle.start().unwrap();

        // The first frame parks the only block in the unread tx queue.
        handle.data_tx(&pcm_frame(&[1]), None).unwrap();
        assert!(wait_for(WAIT, || handle.stats().frames_processed == 1));
        assert_eq!(handle.pool_usage(), Some((1, 1)));

        let calls = Arc::new(AtomicUsize::new(0));
        handle.data_tx(&pcm_frame(&[2]), counting_callback(&calls)).unwrap();
        assert!(wait_for(WAIT, || handle.stats().slab_exhausted == 1));
        assert!(wait_for(WAIT, || calls.load(Ordering::SeqCst) == 1));

        let mut out = AudioData::with_capacity(8);
        handle.data_rx(&mut out, Timeout::After(WAIT)).unwrap();
        assert_eq!(out.bytes(), &[1]);
        assert!(wait_for(WAIT, || handle.pool_usage() == Some((0, 1))));
    }

    #[test]
    fn process_error_drops_and_releases_input() {
        init_logging();
        let handle = open_passthrough("strict", ThreadConfig::with_block_size(4));
        connect(&handle, &handle, true).unwrap();
        handle.start().unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        handle.data_tx(&pcm_frame(&[0; 16]), counting_callback(&calls)).unwrap();
        assert!(wait_for(WAIT, || handle.stats().process_errors == 1));
        assert!(wait_for(WAIT, || calls.load(Ordering::SeqCst) == 1));
        assert!(wait_for(WAIT, || handle.pool_usage() == Some((0, 4))));

        let mut out = AudioData::with_capacity(16);
        assert!(matches!(
            handle.data_rx(&mut out, Timeout::After(Duration::from_millis(20))),
            Err(ModuleError::Timeout)
        ));
    }

    // ---------------------------------------------------------------
    // 3: Back-pressure
    // ---------------------------------------------------------------
    #[test]
    fn full_rx_fifo_refuses_without_losing_queued_frames() {
        init_logging();
        let gate = GateControl::default();
        let thread = ThreadConfig {
            rx_queue_depth: 2,
            ..ThreadConfig::default()
        };
        let mut handle = ModuleHandle::new();
        handle.open(Gate(gate.clone()), "gate", &thread, &()).unwrap();
        handle.start().unwrap();

        // Frame 0 is taken by the worker, which then blocks on the gate.
        handle.data_tx(&pcm_frame(&[0]), None).unwrap();
        assert!(wait_for(WAIT, || gate.entered() == 1));

        handle.data_tx(&pcm_frame(&[1]), None).unwrap();
        handle.data_tx(&pcm_frame(&[2]), None).unwrap();
        assert_eq!(handle.rx_fifo_usage(), Some((2, 2)));

        let calls = Arc::new(AtomicUsize::new(0));
        assert!(matches!(
            handle.data_tx(&pcm_frame(&[3]), counting_callback(&calls)),
            Err(ModuleError::NoMemory)
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        gate.open();
        assert!(wait_for(WAIT, || handle.stats().frames_processed == 3));
        assert_eq!(gate.seen(), vec![0, 1, 2]);
        assert_eq!(handle.rx_fifo_usage(), Some((0, 0)));
    }

    #[test]
    fn data_tx_copies_caller_bytes() {
        init_logging();
        let gate = GateControl::default();
        let mut handle = ModuleHandle::new();
        handle.open(Gate(gate.clone()), "gate", &ThreadConfig::default(), &()).unwrap();
        handle.start().unwrap();

        // The caller's buffer is reused while earlier frames are queued.
        let meta = AudioMetadata::pcm(16_000, 16, 16, LOCATION_FRONT_LEFT);
        let mut buffer = vec![7u8, 7];
        handle.data_tx(&AudioData::new(&buffer[..], 2, meta), None).unwrap();
        buffer.fill(9);
        handle.data_tx(&AudioData::new(&buffer[..], 2, meta), None).unwrap();
        buffer.fill(0);

        gate.open();
        assert!(wait_for(WAIT, || handle.stats().frames_processed == 2));
        assert_eq!(gate.seen(), vec![7, 9]);
    }

    // ---------------------------------------------------------------
    // 4: Close while idle
    // ---------------------------------------------------------------
    #[test]
    fn close_while_idle() {
        init_logging();
        let mut handle = open_passthrough("idle", ThreadConfig::with_block_size(8));
        handle.reconfigure(&()).unwrap();
        handle.close().unwrap();

        assert_eq!(handle.state(), ModuleState::Undefined);
        assert!(matches!(handle.close(), Err(ModuleError::InvalidParameter)));
        assert!(handle.pool_usage().is_none());
        assert!(handle.names().is_err());
    }

    #[test]
    fn close_releases_pending_frames() {
        init_logging();
        let mut handle = open_passthrough("pending", ThreadConfig::with_block_size(8));
        connect(&handle, &handle, true).unwrap();
        handle.start().unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        handle.data_tx(&pcm_frame(&[1]), counting_callback(&calls)).unwrap();
        assert!(wait_for(WAIT, || handle.tx_fifo_usage() == Some((1, 1))));
        handle.stop().unwrap();
        handle.close().unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(handle.state(), ModuleState::Undefined);
    }

    #[test]
    fn dropping_a_running_handle_joins_the_worker() {
        init_logging();
        let handle = open_passthrough("dropped", ThreadConfig::with_block_size(8));
        handle.start().unwrap();
        drop(handle);
    }

    // ---------------------------------------------------------------
    // State discipline
    // ---------------------------------------------------------------
    #[test]
    fn data_calls_require_running() {
        init_logging();
        let handle = open_passthrough("states", ThreadConfig::with_block_size(8));
        connect(&handle, &handle, true).unwrap();
        let input = pcm_frame(&[1]);
        let mut out = AudioData::with_capacity(8);

        // Configured
        assert!(matches!(handle.data_tx(&input, None), Err(ModuleError::NotSupported)));
        assert!(matches!(
            handle.data_rx(&mut out, Timeout::NoWait),
            Err(ModuleError::NotSupported)
        ));
        assert!(matches!(
            data_tx_rx(&handle, &handle, &input, &mut out, Timeout::NoWait),
            Err(ModuleError::NotSupported)
        ));
        assert!(matches!(handle.stop(), Err(ModuleError::NotSupported)));

        handle.start().unwrap();
        assert!(matches!(handle.start(), Err(ModuleError::AlreadyInit)));
        assert!(matches!(handle.reconfigure(&()), Err(ModuleError::NotSupported)));
        assert_eq!(handle.state(), ModuleState::Running);

        handle.stop().unwrap();
        assert!(matches!(handle.stop(), Err(ModuleError::AlreadyInit)));
        assert_eq!(handle.state(), ModuleState::Stopped);
        assert!(matches!(handle.data_tx(&input, None), Err(ModuleError::NotSupported)));

        // Restart picks up where it left off.
        handle.start().unwrap();
        data_tx_rx(&handle, &handle, &input, &mut out, Timeout::After(WAIT)).unwrap();
        assert_eq!(out.bytes(), &[1]);
    }

    #[test]
    fn stop_during_process_drops_the_frame() {
        init_logging();
        let gate = GateControl::default();
        let mut handle = ModuleHandle::new();
        handle
            .open(GatedCopy(gate.clone()), "gated", &ThreadConfig::with_block_size(8), &())
            .unwrap();
        connect(&handle, &handle, true).unwrap();
        handle.start().unwrap();

        handle.data_tx(&pcm_frame(&[1, 2]), None).unwrap();
        assert!(wait_for(WAIT, || gate.entered() == 1));

        std::thread::scope(|scope| {
            let stopper = scope.spawn(|| handle.stop());
            assert!(wait_for(WAIT, || handle.stop_pending()));
            gate.open();
            stopper.join().unwrap().unwrap();
        });

        assert_eq!(handle.state(), ModuleState::Stopped);
        assert!(wait_for(WAIT, || handle.stats().frames_stopped == 1));
        assert!(wait_for(WAIT, || handle.pool_usage() == Some((0, 4))));
        assert_eq!(handle.tx_fifo_usage(), Some((0, 0)));
        assert_eq!(handle.stats().frames_released, 0);
        assert!(!handle.stop_pending());

        // The next frame after a restart goes out as usual.
        handle.start().unwrap();
        let mut out = AudioData::with_capacity(8);
        data_tx_rx(&handle, &handle, &pcm_frame(&[3, 4]), &mut out, Timeout::After(WAIT)).unwrap();
        assert_eq!(out.bytes(), &[3, 4]);
    }

    #[test]
    fn data_calls_check_module_type() {
        init_logging();
        let (play, _feeder) = PlayQueue::new(2).unwrap();
        let mut source = ModuleHandle::new();
        source.open(play, "source", &ThreadConfig::with_block_size(8), &()).unwrap();
        let (sink, _reader) = open_recorder("sink");
        source.start().unwrap();
        sink.start().unwrap();

        let input = pcm_frame(&[1]);
        let mut out = AudioData::with_capacity(8);
        assert!(matches!(source.data_tx(&input, None), Err(ModuleError::NotSupported)));
        assert!(matches!(
            sink.data_rx(&mut out, Timeout::NoWait),
            Err(ModuleError::NotSupported)
        ));
        assert!(matches!(
            data_tx_rx(&source, &sink, &input, &mut out, Timeout::NoWait),
            Err(ModuleError::NotSupported)
        ));
        source.stop().unwrap();
    }

    #[test]
    fn disconnect_stops_delivery() {
        init_logging();
        let producer = open_passthrough("producer", ThreadConfig::with_block_size(8));
        let (sink, reader) = open_recorder("sink");
        connect(&producer, &sink, false).unwrap();
        disconnect(&producer, &sink, false).unwrap();
        sink.start().unwrap();
        producer.start().unwrap();

        producer.data_tx(&pcm_frame(&[1]), None).unwrap();
        assert!(wait_for(WAIT, || producer.stats().frames_discarded == 1));
        assert!(reader.is_empty());
    }

    // ---------------------------------------------------------------
    // Input → in-out → output pipeline
    // ---------------------------------------------------------------
    #[test]
    fn play_through_to_record() {
        init_logging();
        let (play, feeder) = PlayQueue::new(4).unwrap();
        let mut source = ModuleHandle::new();
        source.open(play, "source", &ThreadConfig::with_block_size(16), &()).unwrap();
        let middle = open_passthrough("middle", ThreadConfig::with_block_size(16));
        let (sink, reader) = open_recorder("sink");

        connect(&source, &middle, false).unwrap();
        connect(&middle, &sink, false).unwrap();
        sink.start().unwrap();
        middle.start().unwrap();
        source.start().unwrap();

        for tag in 1..=3u8 {
            feeder.play(pcm_frame(&[tag; 4])).unwrap();
        }
        for tag in 1..=3u8 {
            let frame = reader.read(Timeout::After(WAIT)).unwrap();
            assert_eq!(frame.bytes(), &[tag; 4]);
            assert_eq!(frame.meta.sample_rate_hz, 16_000);
        }

        source.stop().unwrap();
        assert!(wait_for(WAIT, || source.pool_usage() == Some((0, 4))));
        assert!(wait_for(WAIT, || middle.pool_usage() == Some((0, 4))));
        assert_eq!(source.stats().frames_processed, 3);
        assert_eq!(source.stats().process_errors, 0);
    }

    // ---------------------------------------------------------------
    // 5 & 6: Tone generator
    // ---------------------------------------------------------------
    #[cfg(feature = "tone")]
    mod tone {
        use super::*;
        use crate::constants::TONE_BUFFER_MAX_BYTES;
        use crate::dsp::continuous_array::build_channel;
        use crate::dsp::pcm::{read_sample, saturate, write_sample};
        use crate::dsp::tone::tone_generate;
        use crate::modules::{ToneConfig, ToneGenerator};

        fn parity_config() -> ToneConfig {
            ToneConfig {
                frequency_hz: 200,
                amplitude: 0.5,
                tone_scale: 0.5,
                input_scale: 0.5,
                mix_locations: 1,
                interleave_output: false,
            }
        }

        /// Builder output for `frames` consecutive frames, scaled by
        /// `tone_scale`.
        fn reference(config: &ToneConfig, rate: u32, frames: usize, samples: usize) -> Vec<Vec<u8>> {
            let meta = AudioMetadata::pcm(rate, 16, 16, LOCATION_FRONT_LEFT);
            let mut tone = vec![0u8; TONE_BUFFER_MAX_BYTES];
            let size = tone_generate(&mut tone, config.frequency_hz, rate, 16, 16, config.amplitude).unwrap();
            let tone = AudioData::new(tone, size, meta);

            let mut cursor = 0;
            (0..frames)
                .map(|_| {
                    let mut frame = AudioData::new(vec![0u8; samples * 2], samples * 2, meta);
                    build_channel(&mut frame, &tone, 0, &mut cursor).unwrap();
                    for chunk in frame.data.chunks_exact_mut(2) {
                        let sample = read_sample(chunk, 2);
                        let scaled = saturate((sample as f32 * config.tone_scale + 0.0) as i64, 16);
                        write_sample(chunk, 2, scaled);
                    }
                    frame.data
                })
                .collect()
        }

        #[test]
        fn tone_generator_parity() {
            init_logging();
            let config = parity_config();
            let mut handle = ModuleHandle::new();
            handle
                .open(ToneGenerator::new(), "tone", &ThreadConfig::with_block_size(1024), &config)
                .unwrap();
            connect(&handle, &handle, true).unwrap();
            handle.start().unwrap();

            for (rate, samples) in [(48_000u32, 360usize), (16_000, 120)] {
                let meta = AudioMetadata::pcm(rate, 16, 16, LOCATION_FRONT_LEFT);
                let input = AudioData::from_bytes(&vec![0u8; samples * 2], meta);
                for expected in reference(&config, rate, 4, samples) {
                    let mut out = AudioData::with_capacity(1024);
                    data_tx_rx(&handle, &handle, &input, &mut out, Timeout::After(WAIT)).unwrap();
                    assert_eq!(out.data_size, samples * 2);
                    assert_eq!(out.bytes(), &expected[..]);
                    assert_eq!(out.meta.sample_rate_hz, rate);
                }
            }

            handle.stop().unwrap();
            handle.close().unwrap();
        }

        #[test]
        fn rejected_reconfigure_keeps_state() {
            init_logging();
            let config = parity_config();
            let mut handle = ModuleHandle::new();
            handle
                .open(ToneGenerator::new(), "tone", &ThreadConfig::with_block_size(1024), &config)
                .unwrap();

            let low = ToneConfig {
                frequency_hz: 10,
                ..config
            };
            let loud = ToneConfig {
                amplitude: 1.5,
                ..config
            };
            let negative = ToneConfig {
                tone_scale: -0.5,
                ..config
            };
            for bad in [low, loud, negative] {
                assert!(matches!(handle.reconfigure(&bad), Err(ModuleError::InvalidParameter)));
                assert_eq!(handle.state(), ModuleState::Configured);
                assert_eq!(handle.previous_state(), ModuleState::Undefined);
            }

            let mut read = ToneConfig::default();
            handle.configuration_get(&mut read).unwrap();
            assert_eq!(read, config);

            // Same from Stopped.
            handle.start().unwrap();
            handle.stop().unwrap();
            assert!(matches!(handle.reconfigure(&low), Err(ModuleError::InvalidParameter)));
            assert_eq!(handle.state(), ModuleState::Stopped);
            assert_eq!(handle.previous_state(), ModuleState::Running);
            handle.close().unwrap();
        }
    }
}
