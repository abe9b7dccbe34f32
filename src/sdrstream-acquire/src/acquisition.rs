//! The acquisition thread: owns the radio exclusively, applies live
//! config changes from the mailbox between blocks, and fans sample blocks
//! out to whichever downstream stages are subscribed. Adapted from the
//! `iq_read_loop` pattern this crate was built on: poll the mailbox
//! before the blocking receive call, never after.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::Sender;
use num_complex::Complex32;
use sdrstream_core::frame::SampleBlock;
use sdrstream_core::radio::{RadioActuals, RadioConfig, RadioDevice, RecvOutcome};
use tracing::{debug, error, warn};

use crate::command::Command;
use crate::mailbox::Mailbox;

const RECEIVE_TIMEOUT: Duration = Duration::from_secs(3);
const OVERFLOW_LOG_INTERVAL: u64 = 100;

/// Live-mutable acquisition parameters, refreshed as commands are applied.
#[derive(Debug, Clone, Copy)]
pub struct AcquisitionState {
    pub actuals: RadioActuals,
    pub block_size: usize,
}

pub struct AcquisitionLoop {
    handle: Option<JoinHandle<()>>,
    stop_flag: Arc<AtomicBool>,
    mailbox: Mailbox,
    center_freq_bits: Arc<AtomicU64>,
    overflow_count: Arc<AtomicU64>,
}

impl AcquisitionLoop {
    /// Spawn the acquisition thread. `subscribers` receive a clone of every
    /// sample block produced; a subscriber whose channel is full is simply
    /// skipped for that block (back-pressure never reaches the radio).
    pub fn spawn(
        mut device: Box<dyn RadioDevice>,
        initial: RadioConfig,
        subscribers: Vec<Sender<Arc<SampleBlock>>>,
    ) -> std::io::Result<(Self, AcquisitionState)> {
        let actuals = device
            .configure(&initial)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        device
            .start()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

        let stop_flag = Arc::new(AtomicBool::new(false));
        let mailbox = Mailbox::new();
        let center_freq_bits = Arc::new(AtomicU64::new(actuals.center_freq_hz.to_bits()));
        let overflow_count = Arc::new(AtomicU64::new(0));
        let state = AcquisitionState {
            actuals,
            block_size: initial.block_size,
        };

        let thread_stop = stop_flag.clone();
        let thread_mailbox = mailbox.clone();
        let thread_center_freq = center_freq_bits.clone();
        let thread_overflow_count = overflow_count.clone();
        let block_size = initial.block_size;

        let handle = std::thread::Builder::new()
            .name("sdrstream-acquire".into())
            .spawn(move || {
                run_loop(
                    device.as_mut(),
                    block_size,
                    thread_stop,
                    thread_mailbox,
                    thread_center_freq,
                    thread_overflow_count,
                    subscribers,
                )
            })
            .expect("spawning acquisition thread");

        Ok((
            AcquisitionLoop {
                handle: Some(handle),
                stop_flag,
                mailbox,
                center_freq_bits,
                overflow_count,
            },
            state,
        ))
    }

    pub fn mailbox(&self) -> Mailbox {
        self.mailbox.clone()
    }

    /// The flag the loop itself stops on: set by `Command::Stop` (from the
    /// control mailbox) as well as by `stop()`/`Drop`. Callers that need to
    /// react to an acquisition-initiated shutdown (DSP, status, control)
    /// should observe this same flag rather than invent their own.
    pub fn stop_signal(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    /// The live center frequency, updated by the loop itself on a
    /// successful `SET_FREQ`. Shared with the DSP/publish thread so
    /// published frames always carry the frequency currently tuned, not
    /// the one in effect at startup.
    pub fn center_freq_signal(&self) -> Arc<AtomicU64> {
        self.center_freq_bits.clone()
    }

    /// Cumulative radio-reported sample overflows, shared with the status
    /// thread so the `STT1` heartbeat reflects real counts.
    pub fn overflow_signal(&self) -> Arc<AtomicU64> {
        self.overflow_count.clone()
    }

    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for AcquisitionLoop {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_loop(
    device: &mut dyn RadioDevice,
    block_size: usize,
    stop_flag: Arc<AtomicBool>,
    mailbox: Mailbox,
    center_freq_bits: Arc<AtomicU64>,
    overflow_count: Arc<AtomicU64>,
    subscribers: Vec<Sender<Arc<SampleBlock>>>,
) {
    let mut local_overflow_count: u64 = 0;
    let mut buf = vec![Complex32::new(0.0, 0.0); block_size];

    while !stop_flag.load(Ordering::Acquire) {
        if let Some(cmd) = mailbox.try_take() {
            apply_command(device, cmd, &stop_flag, &mailbox, &center_freq_bits);
        }

        match device.receive_block(&mut buf, RECEIVE_TIMEOUT) {
            Ok(RecvOutcome::Ok {
                samples,
                overflowed,
            }) => {
                if overflowed {
                    local_overflow_count += 1;
                    overflow_count.fetch_add(1, Ordering::Relaxed);
                    if local_overflow_count == 1 || local_overflow_count % OVERFLOW_LOG_INTERVAL == 0 {
                        warn!(overflow_count = local_overflow_count, "radio reported sample overflow");
                    }
                }
                if samples == 0 {
                    continue;
                }
                let block = Arc::new(SampleBlock {
                    samples: buf[..samples].to_vec(),
                    host_timestamp: monotonic_seconds(),
                    overflowed,
                });
                for tx in &subscribers {
                    let _ = tx.try_send(block.clone());
                }
            }
            Ok(RecvOutcome::TimedOut) => {
                debug!("radio receive timed out");
            }
            Err(e) => {
                error!(error = %e, "unrecoverable device fault, aborting acquisition loop");
                // Tear down the rest of the daemon's threads too: dropping
                // `subscribers` below would eventually get the DSP thread
                // to notice via a channel disconnect, but setting the
                // shared flag directly means control/status/fan-out don't
                // wait out their poll interval first.
                stop_flag.store(true, Ordering::Release);
                return;
            }
        }
    }
}

fn apply_command(
    device: &mut dyn RadioDevice,
    cmd: Command,
    stop_flag: &AtomicBool,
    mailbox: &Mailbox,
    center_freq_bits: &AtomicU64,
) {
    let is_retune = matches!(cmd, Command::SetFreq(_));
    let result = match cmd {
        Command::SetFreq(hz) => device.tune(hz),
        Command::SetGain(db) => device.set_gain(db),
        Command::SetSampleRate(hz) => restart_for(device, |d| d.set_sample_rate(hz)),
        Command::SetBandwidth(hz) => restart_for(device, |d| d.set_bandwidth(hz)),
        Command::Stop => {
            stop_flag.store(true, Ordering::Release);
            Ok(0.0)
        }
        Command::GetStatus | Command::Ping => Ok(0.0),
    };
    match result {
        Ok(actual) => {
            if is_retune {
                center_freq_bits.store(actual.to_bits(), Ordering::Release);
            }
            mailbox.acknowledge(actual);
        }
        Err(e) => error!(error = %e, "failed to apply acquisition command"),
    }
}

/// Sample-rate/bandwidth changes require a stop/reconfigure/restart cycle
/// rather than a hot apply (§4.4 step 4).
fn restart_for(
    device: &mut dyn RadioDevice,
    apply: impl FnOnce(&mut dyn RadioDevice) -> sdrstream_core::error::DynResult<f64>,
) -> sdrstream_core::error::DynResult<f64> {
    device.stop()?;
    let actual = apply(device)?;
    device.start()?;
    Ok(actual)
}

fn monotonic_seconds() -> f64 {
    use std::time::Instant;
    // A process-local Instant can't be converted to wall-clock seconds
    // directly; callers only rely on relative ordering, not absolute time.
    thread_local! {
        static START: Instant = Instant::now();
    }
    START.with(|start| start.elapsed().as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use sdrstream_backend::SimulatedDevice;
    use sdrstream_core::radio::RadioConfig;

    fn default_config() -> RadioConfig {
        RadioConfig {
            center_freq_hz: 1.0e8,
            sample_rate_hz: 2.0e6,
            gain_db: 10.0,
            bandwidth_hz: 2.0e6,
            channel_mask: 1,
            block_size: 256,
        }
    }

    #[test]
    fn acquisition_loop_delivers_blocks_to_subscribers() {
        let (tx, rx) = bounded(4);
        let (mut acq, state) = AcquisitionLoop::spawn(
            Box::new(SimulatedDevice::new(1000.0)),
            default_config(),
            vec![tx],
        )
        .unwrap();
        assert_eq!(state.block_size, 256);

        let block = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(block.samples.len(), 256);
        acq.stop();
    }

    #[test]
    fn set_gain_command_is_applied_without_panicking() {
        let (tx, _rx) = bounded(4);
        let (acq, _state) = AcquisitionLoop::spawn(
            Box::new(SimulatedDevice::default()),
            default_config(),
            vec![tx],
        )
        .unwrap();
        acq.mailbox().send(Command::SetGain(30.0));
        std::thread::sleep(Duration::from_millis(50));
        drop(acq);
    }
}
