//! Streaming daemon (C6): wires C1-C5 and C9-C10 together, owns the
//! thread topology (acquisition, DSP/publish, status, control, fan-out),
//! and handles orderly shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::bounded;
use sdrstream_acquire::{AcquisitionLoop, ControlServer};
use sdrstream_acquire::control::StatusBoard;
use sdrstream_acquire::dsp_publish::DspPublishThread;
use sdrstream_app::config::StreamerConfig;
use sdrstream_backend::SimulatedDevice;
use sdrstream_core::radio::{RadioConfig, RadioDevice};
use sdrstream_core::status::StatusRecord;
use sdrstream_core::window::WindowKind;
use sdrstream_ring::RingWriter;
use tokio::sync::broadcast;
use tracing::info;

use crate::status::StatusThread;

pub struct Daemon {
    acquisition: AcquisitionLoop,
    dsp: DspPublishThread,
    status: StatusThread,
    control_stop: Arc<AtomicBool>,
    fanout_stop: Option<Arc<AtomicBool>>,
}

pub fn build_device(cfg: &StreamerConfig) -> std::io::Result<Box<dyn RadioDevice>> {
    match cfg.radio.backend.as_str() {
        "sim" => Ok(Box::new(SimulatedDevice::default())),
        #[cfg(feature = "soapysdr-backend")]
        "soapysdr" => {
            let device = sdrstream_backend::soapy::SoapyDevice::open(&cfg.radio.device_args)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
            Ok(Box::new(device))
        }
        other => Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("unknown radio backend: {other}"),
        )),
    }
}

impl Daemon {
    /// Construct and start every thread. Returns once the pipeline is
    /// streaming; call `shutdown` to tear it down in order. `status_tx` is
    /// the fan-out bridge's status broadcast channel: every record the
    /// status thread produces is both logged and sent here so subscribers
    /// receive it as an `STT1` frame.
    pub fn start(cfg: &StreamerConfig, status_tx: broadcast::Sender<StatusRecord>) -> std::io::Result<Self> {
        let device = build_device(cfg)?;
        let radio_cfg = RadioConfig {
            center_freq_hz: cfg.radio.center_freq_hz,
            sample_rate_hz: cfg.radio.sample_rate_hz,
            gain_db: cfg.radio.gain_db,
            bandwidth_hz: cfg.radio.bandwidth_hz,
            channel_mask: cfg.radio.channel_mask,
            block_size: cfg.radio.block_size,
        };

        let ring_name = format!("{}-{}", cfg.general.ring_name_prefix, cfg.ring.name);
        let writer = RingWriter::create(
            &ring_name,
            cfg.ring.slot_count,
            cfg.dsp.fft_size as u32,
            cfg.radio.channel_mask.count_ones().max(1),
            cfg.radio.sample_rate_hz,
        )
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

        let (dsp_tx, dsp_rx) = bounded(64);
        let (acquisition, state) = AcquisitionLoop::spawn(device, radio_cfg, vec![dsp_tx])?;

        // Shared with DSP/status/control so a remote STOP (which the
        // acquisition loop applies to this same flag) tears down every
        // thread in the daemon, not just acquisition.
        let shutdown_signal = acquisition.stop_signal();

        let window_kind: WindowKind = cfg.dsp.window.parse().unwrap_or_default();
        let center_freq_bits = acquisition.center_freq_signal();

        let dsp = DspPublishThread::spawn(
            dsp_rx,
            writer,
            cfg.dsp.fft_size,
            window_kind,
            center_freq_bits,
            state.actuals.sample_rate_hz,
            cfg.radio.channel_mask,
            shutdown_signal.clone(),
        );

        let frame_counter = dsp.frame_counter_signal();
        let overflow_counter = acquisition.overflow_signal();
        let status = StatusThread::spawn(
            Duration::from_millis(500),
            frame_counter,
            overflow_counter,
            move |record| {
                info!(
                    frame_counter = record.frame_counter,
                    overflow_count = record.overflow_count,
                    "status heartbeat"
                );
                let _ = status_tx.send(record);
            },
            shutdown_signal.clone(),
        );

        let control_server =
            ControlServer::bind_with_stop_flag(&cfg.control.socket_addr, shutdown_signal.clone())?;
        let control_stop = shutdown_signal;
        let mailbox = acquisition.mailbox();
        let status_board = Arc::new(StatusBoard::default());
        std::thread::Builder::new()
            .name("sdrstream-control".into())
            .spawn(move || control_server.serve(mailbox, status_board))
            .expect("spawning control server thread");

        Ok(Daemon {
            acquisition,
            dsp,
            status,
            control_stop,
            fanout_stop: None,
        })
    }

    pub fn set_fanout_stop(&mut self, stop: Arc<AtomicBool>) {
        self.fanout_stop = Some(stop);
    }

    /// The flag shared by every thread the daemon owns (acquisition, DSP,
    /// status, control). A remote `STOP` command sets it; callers that run
    /// something the daemon doesn't own (e.g. the fan-out HTTP server)
    /// should poll this to know when to stop too.
    pub fn shutdown_signal(&self) -> Arc<AtomicBool> {
        self.control_stop.clone()
    }

    /// Orderly shutdown. `control_stop` is the same shared flag acquisition,
    /// DSP, and control all poll, so setting it signals every one of them
    /// to exit at once; what's actually sequenced below is which thread we
    /// wait out first. DSP and status are joined before acquisition, so
    /// the radio handle acquisition owns outlives every other thread that
    /// might still be touching state derived from it.
    pub fn shutdown(mut self) {
        self.control_stop.store(true, Ordering::Release);
        if let Some(stop) = self.fanout_stop.take() {
            stop.store(true, Ordering::Release);
        }
        self.dsp.stop();
        self.status.stop();
        self.acquisition.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daemon_starts_and_shuts_down_cleanly_with_the_simulated_backend() {
        let mut cfg = StreamerConfig::default();
        cfg.radio.backend = "sim".to_string();
        cfg.ring.name = format!("test-{}", std::process::id());
        cfg.control.socket_addr = "127.0.0.1:0".to_string();
        cfg.dsp.fft_size = 64;

        let (status_tx, _status_rx) = broadcast::channel(16);
        let daemon =
            Daemon::start(&cfg, status_tx).expect("daemon should start with the simulated backend");
        std::thread::sleep(Duration::from_millis(100));
        daemon.shutdown();
    }
}
