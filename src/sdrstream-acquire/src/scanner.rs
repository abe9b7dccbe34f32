//! Frequency scanner (C8): retune, settle, dwell over K averages, report.
//! Owns the radio exclusively for the duration of a scan; mutually
//! exclusive with the streaming daemon.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use num_complex::Complex32;
use sdrstream_core::fft::FftEngine;
use sdrstream_core::radio::{RadioConfig, RadioDevice, RecvOutcome};
use sdrstream_core::window::WindowKind;

const SETTLE_FLOOR: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanStepResult {
    pub actual_freq_hz: f64,
    pub avg_peak_dbfs: f32,
    pub max_peak_dbfs: f32,
    pub avg_total_dbfs: f32,
    pub valid_count: u32,
}

pub struct FrequencyScanner {
    fft_size: usize,
    window_kind: WindowKind,
    averages: u32,
    settle_time: Duration,
    abort: Arc<AtomicBool>,
}

impl FrequencyScanner {
    pub fn new(fft_size: usize, window_kind: WindowKind, averages: u32, settle_time: Duration) -> Self {
        FrequencyScanner {
            fft_size,
            window_kind,
            averages: averages.max(1),
            settle_time: settle_time.max(SETTLE_FLOOR),
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        self.abort.clone()
    }

    /// Run the full scan grid, returning one result per step. Truncated
    /// (fewer than the requested steps) if aborted mid-run.
    pub fn scan(
        &self,
        device: &mut dyn RadioDevice,
        start_hz: f64,
        stop_hz: f64,
        step_hz: f64,
        sample_rate_hz: f64,
        gain_db: f64,
    ) -> Vec<ScanStepResult> {
        let mut results = Vec::new();
        let mut engine = FftEngine::new(self.fft_size, self.window_kind);
        let mut freq = start_hz;

        while freq <= stop_hz {
            if self.abort.load(Ordering::Acquire) {
                break;
            }
            if let Some(result) = self.run_step(device, freq, sample_rate_hz, gain_db, &mut engine) {
                results.push(result);
            }
            freq += step_hz;
        }
        results
    }

    fn run_step(
        &self,
        device: &mut dyn RadioDevice,
        freq_hz: f64,
        sample_rate_hz: f64,
        gain_db: f64,
        engine: &mut FftEngine,
    ) -> Option<ScanStepResult> {
        let cfg = RadioConfig {
            center_freq_hz: freq_hz,
            sample_rate_hz,
            gain_db,
            bandwidth_hz: sample_rate_hz,
            channel_mask: 1,
            block_size: self.fft_size,
        };
        let actuals = device.configure(&cfg).ok()?;
        device.start().ok()?;
        std::thread::sleep(self.settle_time);

        let mut peaks = Vec::with_capacity(self.averages as usize);
        let mut totals = Vec::with_capacity(self.averages as usize);
        let mut buf = vec![Complex32::new(0.0, 0.0); self.fft_size];
        let mut payload = vec![0.0f32; self.fft_size];

        for _ in 0..self.averages {
            if self.abort.load(Ordering::Acquire) {
                break;
            }
            match device.receive_block(&mut buf, Duration::from_secs(1)) {
                Ok(RecvOutcome::Ok { samples, .. }) if samples >= self.fft_size => {
                    let peak = engine.transform(&buf, &mut payload);
                    peaks.push(peak.peak_dbfs);
                    let total: f32 = payload.iter().sum::<f32>() / payload.len() as f32;
                    totals.push(total);
                }
                _ => continue,
            }
        }

        let _ = device.stop();

        if peaks.is_empty() {
            return Some(ScanStepResult {
                actual_freq_hz: actuals.center_freq_hz,
                avg_peak_dbfs: f32::MIN,
                max_peak_dbfs: f32::MIN,
                avg_total_dbfs: f32::MIN,
                valid_count: 0,
            });
        }

        let valid_count = peaks.len() as u32;
        let avg_peak = peaks.iter().sum::<f32>() / valid_count as f32;
        let max_peak = peaks.iter().cloned().fold(f32::MIN, f32::max);
        let avg_total = totals.iter().sum::<f32>() / totals.len() as f32;

        Some(ScanStepResult {
            actual_freq_hz: actuals.center_freq_hz,
            avg_peak_dbfs: avg_peak,
            max_peak_dbfs: max_peak,
            avg_total_dbfs: avg_total,
            valid_count,
        })
    }
}

/// Total observation window for one step: averages worth of samples at
/// `sample_rate_hz` plus settle time.
pub fn dwell_duration(fft_size: usize, averages: u32, sample_rate_hz: f64, settle: Duration) -> Duration {
    let capture_secs = (fft_size as f64 * averages as f64) / sample_rate_hz;
    settle + Duration::from_secs_f64(capture_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdrstream_backend::SimulatedDevice;

    #[test]
    fn scan_identifies_the_tone_offset_in_every_step() {
        let mut device = SimulatedDevice::new(50_000.0);
        let scanner = FrequencyScanner::new(1024, WindowKind::Hann, 2, Duration::from_millis(1));
        let results = scanner.scan(&mut device, 100e6, 100e6, 1e6, 2e6, 20.0);
        assert_eq!(results.len(), 1);
        assert!(results[0].valid_count > 0);
        assert!(results[0].avg_peak_dbfs > -60.0);
    }

    #[test]
    fn settle_time_floor_is_enforced() {
        let scanner = FrequencyScanner::new(1024, WindowKind::Hann, 1, Duration::from_millis(1));
        assert!(scanner.settle_time >= SETTLE_FLOOR);
    }

    #[test]
    fn abort_flag_truncates_the_scan() {
        let mut device = SimulatedDevice::new(0.0);
        let scanner = FrequencyScanner::new(256, WindowKind::Hann, 1, Duration::from_millis(1));
        scanner.abort_handle().store(true, Ordering::Release);
        let results = scanner.scan(&mut device, 100e6, 200e6, 10e6, 2e6, 10.0);
        assert!(results.is_empty());
    }

    #[test]
    fn dwell_duration_scales_with_averages() {
        let d1 = dwell_duration(1024, 1, 2.0e6, Duration::from_millis(50));
        let d4 = dwell_duration(1024, 4, 2.0e6, Duration::from_millis(50));
        assert!(d4 > d1);
    }
}
