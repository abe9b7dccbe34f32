//! A software-only radio used by tests, the scanner-identify scenario, and
//! any environment without hardware attached. Synthesizes a tone at a
//! configurable offset from the tuned center frequency plus a noise floor,
//! so downstream DSP tests can assert on a known peak bin.

use std::f64::consts::PI;
use std::time::Duration;

use num_complex::Complex32;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use sdrstream_core::error::DynResult;
use sdrstream_core::radio::{RadioActuals, RadioConfig, RadioDevice, RecvOutcome};

pub struct SimulatedDevice {
    center_freq_hz: f64,
    sample_rate_hz: f64,
    gain_db: f64,
    bandwidth_hz: f64,
    running: bool,
    phase: f64,
    /// Offset of the synthesized tone from the tuned center frequency.
    tone_offset_hz: f64,
    noise_floor_linear: f32,
    rng: SmallRng,
}

impl SimulatedDevice {
    pub fn new(tone_offset_hz: f64) -> Self {
        SimulatedDevice {
            center_freq_hz: 100_000_000.0,
            sample_rate_hz: 2_000_000.0,
            gain_db: 20.0,
            bandwidth_hz: 2_000_000.0,
            running: false,
            phase: 0.0,
            tone_offset_hz,
            noise_floor_linear: 0.01,
            rng: SmallRng::seed_from_u64(0xDEC0DE),
        }
    }
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        SimulatedDevice::new(0.0)
    }
}

impl RadioDevice for SimulatedDevice {
    fn configure(&mut self, cfg: &RadioConfig) -> DynResult<RadioActuals> {
        self.center_freq_hz = cfg.center_freq_hz;
        self.sample_rate_hz = cfg.sample_rate_hz;
        self.gain_db = cfg.gain_db;
        self.bandwidth_hz = cfg.bandwidth_hz;
        Ok(RadioActuals {
            center_freq_hz: self.center_freq_hz,
            sample_rate_hz: self.sample_rate_hz,
            gain_db: self.gain_db,
            bandwidth_hz: self.bandwidth_hz,
        })
    }

    fn tune(&mut self, hz: f64) -> DynResult<f64> {
        self.center_freq_hz = hz;
        Ok(hz)
    }

    fn set_gain(&mut self, db: f64) -> DynResult<f64> {
        self.gain_db = db;
        Ok(db)
    }

    fn set_sample_rate(&mut self, hz: f64) -> DynResult<f64> {
        self.sample_rate_hz = hz;
        Ok(hz)
    }

    fn set_bandwidth(&mut self, hz: f64) -> DynResult<f64> {
        self.bandwidth_hz = hz;
        Ok(hz)
    }

    fn start(&mut self) -> DynResult<()> {
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) -> DynResult<()> {
        self.running = false;
        Ok(())
    }

    fn receive_block(
        &mut self,
        out: &mut [Complex32],
        _timeout: Duration,
    ) -> DynResult<RecvOutcome> {
        if !self.running {
            return Ok(RecvOutcome::TimedOut);
        }
        let step = 2.0 * PI * self.tone_offset_hz / self.sample_rate_hz;
        for sample in out.iter_mut() {
            let noise_i: f32 = self.rng.gen_range(-1.0..1.0) * self.noise_floor_linear;
            let noise_q: f32 = self.rng.gen_range(-1.0..1.0) * self.noise_floor_linear;
            *sample = Complex32::new(
                self.phase.cos() as f32 + noise_i,
                self.phase.sin() as f32 + noise_q,
            );
            self.phase += step;
            if self.phase > 2.0 * PI {
                self.phase -= 2.0 * PI;
            }
        }
        Ok(RecvOutcome::Ok {
            samples: out.len(),
            overflowed: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receive_block_fills_requested_length() {
        let mut dev = SimulatedDevice::new(10_000.0);
        dev.configure(&RadioConfig {
            center_freq_hz: 1.0e8,
            sample_rate_hz: 2.0e6,
            gain_db: 10.0,
            bandwidth_hz: 2.0e6,
            channel_mask: 1,
            block_size: 1024,
        })
        .unwrap();
        dev.start().unwrap();
        let mut buf = vec![Complex32::new(0.0, 0.0); 1024];
        let outcome = dev.receive_block(&mut buf, Duration::from_secs(1)).unwrap();
        assert_eq!(
            outcome,
            RecvOutcome::Ok {
                samples: 1024,
                overflowed: false
            }
        );
        assert!(buf.iter().any(|c| c.re != 0.0));
    }

    #[test]
    fn receive_block_times_out_when_not_started() {
        let mut dev = SimulatedDevice::default();
        let mut buf = vec![Complex32::new(0.0, 0.0); 16];
        let outcome = dev.receive_block(&mut buf, Duration::from_millis(1)).unwrap();
        assert_eq!(outcome, RecvOutcome::TimedOut);
    }

    #[test]
    fn tune_and_set_gain_report_back_requested_value() {
        let mut dev = SimulatedDevice::default();
        assert_eq!(dev.tune(145_500_000.0).unwrap(), 145_500_000.0);
        assert_eq!(dev.set_gain(30.0).unwrap(), 30.0);
    }
}
