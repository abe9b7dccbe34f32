//! Single-channel complex-to-dBFS transform: window, FFT, fftshift,
//! coherent-gain correction, dB conversion, peak detect.

use std::sync::Arc;

use num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

use crate::window::{Window, WindowKind};
use crate::POWER_EPSILON;

/// Result of transforming one block: the bin holding the strongest signal
/// and its power in dBFS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakInfo {
    pub peak_bin: u16,
    pub peak_dbfs: f32,
}

/// Reusable FFT plan plus precomputed window, amortized across calls at a
/// fixed size.
pub struct FftEngine {
    size: usize,
    window: Window,
    plan: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex32>,
}

impl FftEngine {
    pub fn new(size: usize, window_kind: WindowKind) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(size);
        FftEngine {
            size,
            window: Window::build(window_kind, size),
            plan,
            scratch: vec![Complex32::new(0.0, 0.0); size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn window_kind(&self) -> WindowKind {
        self.window.kind
    }

    /// Rebuild the window/plan for a new size or window kind. Cheap to call
    /// rarely (on a control-plane FFT-size change); not meant for the hot
    /// path.
    pub fn reconfigure(&mut self, size: usize, window_kind: WindowKind) {
        if size != self.size {
            let mut planner = FftPlanner::<f32>::new();
            self.plan = planner.plan_fft_forward(size);
            self.scratch = vec![Complex32::new(0.0, 0.0); size];
            self.size = size;
        }
        if size != self.window.len() || window_kind != self.window.kind {
            self.window = Window::build(window_kind, size);
        }
    }

    /// Transform `block` (must hold at least `size` samples) into `out`
    /// (must hold exactly `size` dBFS values, already fftshifted).
    pub fn transform(&mut self, block: &[Complex32], out: &mut [f32]) -> PeakInfo {
        assert!(block.len() >= self.size, "block shorter than fft size");
        assert_eq!(out.len(), self.size, "output buffer size mismatch");

        for (i, s) in self.scratch.iter_mut().enumerate() {
            *s = block[i] * self.window.coeffs[i];
        }
        self.plan.process(&mut self.scratch);

        let norm = (self.window.coherent_gain * self.size as f32).max(1e-12);
        let norm_sq = norm * norm;
        let half = self.size / 2;

        let mut peak_bin = 0usize;
        let mut peak_dbfs = f32::MIN;

        for (dst_offset, src_idx) in (half..self.size).chain(0..half).enumerate() {
            let c = self.scratch[src_idx];
            let power = (c.re * c.re + c.im * c.im) / norm_sq;
            let dbfs = 10.0 * (power.max(POWER_EPSILON)).log10();
            out[dst_offset] = dbfs;
            if dbfs > peak_dbfs {
                peak_dbfs = dbfs;
                peak_bin = dst_offset;
            }
        }

        PeakInfo {
            peak_bin: peak_bin as u16,
            peak_dbfs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn unit_sinusoid(n: usize, bin: usize) -> Vec<Complex32> {
        (0..n)
            .map(|i| {
                let phase = 2.0 * PI * bin as f32 * i as f32 / n as f32;
                Complex32::new(phase.cos(), phase.sin())
            })
            .collect()
    }

    #[test]
    fn peak_is_actually_the_max() {
        let n = 1024;
        let mut engine = FftEngine::new(n, WindowKind::Hann);
        let input = unit_sinusoid(n, 100);
        let mut out = vec![0.0f32; n];
        let peak = engine.transform(&input, &mut out);
        let max = out.iter().cloned().fold(f32::MIN, f32::max);
        assert_eq!(peak.peak_dbfs, max);
        assert_eq!(out[peak.peak_bin as usize], peak.peak_dbfs);
    }

    #[test]
    fn unit_sinusoid_peaks_near_zero_dbfs() {
        let n = 4096;
        let mut engine = FftEngine::new(n, WindowKind::Hann);
        let input = unit_sinusoid(n, 500);
        let mut out = vec![0.0f32; n];
        let peak = engine.transform(&input, &mut out);
        assert!(
            (peak.peak_dbfs - 0.0).abs() < 0.5,
            "expected ~0 dBFS, got {}",
            peak.peak_dbfs
        );
    }

    #[test]
    fn fftshift_places_negative_frequencies_in_the_lower_half() {
        let n = 1024;
        let mut engine = FftEngine::new(n, WindowKind::Rectangular);
        // bin 100 pre-shift -> post-shift index = n/2 + 100
        let input = unit_sinusoid(n, 100);
        let mut out = vec![0.0f32; n];
        let peak = engine.transform(&input, &mut out);
        assert_eq!(peak.peak_bin as usize, n / 2 + 100);
    }

    #[test]
    fn reconfigure_changes_effective_size() {
        let mut engine = FftEngine::new(512, WindowKind::Hann);
        engine.reconfigure(1024, WindowKind::Blackman);
        assert_eq!(engine.size(), 1024);
        assert_eq!(engine.window_kind(), WindowKind::Blackman);
    }
}
