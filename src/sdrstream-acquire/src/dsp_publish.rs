//! The DSP/publish thread: consumes sample blocks from the acquisition
//! loop, runs the FFT engine, and publishes the resulting frame into the
//! shared ring. One instance per active channel when channel_count = 2;
//! their outputs are merged by the caller before publication.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use sdrstream_core::fft::FftEngine;
use sdrstream_core::frame::{SampleBlock, SpectrumFrame, SpectrumHeader};
use sdrstream_core::window::WindowKind;
use sdrstream_ring::RingWriter;
use tracing::debug;

pub struct DspPublishThread {
    handle: Option<JoinHandle<()>>,
    stop_flag: Arc<AtomicBool>,
    frame_counter: Arc<std::sync::atomic::AtomicU64>,
}

impl DspPublishThread {
    /// `stop_flag` is shared with the rest of the daemon's thread topology
    /// (see `Daemon::start`): a control-socket `STOP` sets the acquisition
    /// loop's own stop flag, and this thread is handed the same `Arc` so
    /// that a remote stop tears down DSP publication too, not just
    /// acquisition.
    pub fn spawn(
        rx: Receiver<Arc<SampleBlock>>,
        mut writer: RingWriter,
        fft_size: usize,
        window_kind: WindowKind,
        center_freq_hz: Arc<std::sync::atomic::AtomicU64>,
        sample_rate_hz: f64,
        channel_mask: u16,
        stop_flag: Arc<AtomicBool>,
    ) -> Self {
        let thread_stop = stop_flag.clone();
        let frame_counter = Arc::new(std::sync::atomic::AtomicU64::new(0));
        let thread_frame_counter = frame_counter.clone();

        let handle = std::thread::Builder::new()
            .name("sdrstream-dsp".into())
            .spawn(move || {
                let mut engine = FftEngine::new(fft_size, window_kind);
                let mut payload = vec![0.0f32; fft_size];
                while !thread_stop.load(Ordering::Acquire) {
                    let block = match rx.recv_timeout(std::time::Duration::from_millis(500)) {
                        Ok(b) => b,
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => {
                            debug!("acquisition loop gone, stopping dsp/publish thread");
                            thread_stop.store(true, Ordering::Release);
                            break;
                        }
                    };
                    if block.samples.len() < fft_size {
                        continue;
                    }
                    let peak = engine.transform(&block.samples, &mut payload);
                    let center_bits = center_freq_hz.load(Ordering::Acquire);
                    let header = SpectrumHeader {
                        seq: 0, // overwritten by the writer
                        capture_timestamp: block.host_timestamp,
                        center_freq_hz: f64::from_bits(center_bits),
                        sample_rate_hz,
                        fft_size: fft_size as u16,
                        channel_mask,
                        flags: 0,
                        peak_bin: peak.peak_bin as i16,
                        peak_power_dbfs: peak.peak_dbfs,
                    };
                    writer.publish(&SpectrumFrame {
                        header,
                        payload: payload.clone(),
                    });
                    thread_frame_counter.fetch_add(1, Ordering::Relaxed);
                }
                writer.set_streaming(false);
            })
            .expect("spawning dsp/publish thread");

        DspPublishThread {
            handle: Some(handle),
            stop_flag,
            frame_counter,
        }
    }

    /// Cumulative published frames, shared with the status thread so the
    /// `STT1` heartbeat reflects real throughput.
    pub fn frame_counter_signal(&self) -> Arc<std::sync::atomic::AtomicU64> {
        self.frame_counter.clone()
    }

    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for DspPublishThread {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
