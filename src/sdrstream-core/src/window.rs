//! Precomputed window tables and their coherent-gain correction factor.

use std::f32::consts::PI;

/// Supported window functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowKind {
    Rectangular,
    Hann,
    Hamming,
    Blackman,
    BlackmanHarris4,
}

impl Default for WindowKind {
    fn default() -> Self {
        WindowKind::Hann
    }
}

impl std::str::FromStr for WindowKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rect" | "rectangular" | "none" => Ok(WindowKind::Rectangular),
            "hann" | "hanning" => Ok(WindowKind::Hann),
            "hamming" => Ok(WindowKind::Hamming),
            "blackman" => Ok(WindowKind::Blackman),
            "blackman-harris" | "blackmanharris" | "bh4" => Ok(WindowKind::BlackmanHarris4),
            other => Err(format!("unknown window kind: {other}")),
        }
    }
}

/// A precomputed window: coefficients plus the coherent-gain factor used to
/// amplitude-correct a windowed DFT.
#[derive(Debug, Clone)]
pub struct Window {
    pub kind: WindowKind,
    pub coeffs: Vec<f32>,
    /// Coherent gain: sum(coeffs) / N.
    pub coherent_gain: f32,
}

impl Window {
    pub fn build(kind: WindowKind, n: usize) -> Self {
        let coeffs = match kind {
            WindowKind::Rectangular => vec![1.0_f32; n],
            WindowKind::Hann => (0..n)
                .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / (n as f32 - 1.0)).cos())
                .collect(),
            WindowKind::Hamming => (0..n)
                .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f32 / (n as f32 - 1.0)).cos())
                .collect(),
            WindowKind::Blackman => (0..n)
                .map(|i| {
                    let x = 2.0 * PI * i as f32 / (n as f32 - 1.0);
                    0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
                })
                .collect(),
            WindowKind::BlackmanHarris4 => (0..n)
                .map(|i| {
                    let x = 2.0 * PI * i as f32 / (n as f32 - 1.0);
                    0.35875 - 0.48829 * x.cos() + 0.14128 * (2.0 * x).cos()
                        - 0.01168 * (3.0 * x).cos()
                })
                .collect(),
        };
        let coherent_gain = coeffs.iter().sum::<f32>() / n as f32;
        Window {
            kind,
            coeffs,
            coherent_gain,
        }
    }

    pub fn len(&self) -> usize {
        self.coeffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coeffs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coherent_gain_within_tolerance(kind: WindowKind, expected: f32) {
        let w = Window::build(kind, 4096);
        assert!(
            (w.coherent_gain - expected).abs() < 1e-3,
            "kind={kind:?} cg={} expected={expected}",
            w.coherent_gain
        );
    }

    #[test]
    fn rectangular_gain_is_one() {
        coherent_gain_within_tolerance(WindowKind::Rectangular, 1.0);
    }

    #[test]
    fn hann_gain_is_one_half() {
        coherent_gain_within_tolerance(WindowKind::Hann, 0.5);
    }

    #[test]
    fn hamming_gain_matches_closed_form() {
        coherent_gain_within_tolerance(WindowKind::Hamming, 0.54);
    }

    #[test]
    fn blackman_harris_coefficients_sum_to_documented_gain() {
        // 0.35875 - 0.48829 + 0.14128 - 0.01168 evaluated at x=0 is the DC
        // term; the running average over many samples converges to it.
        coherent_gain_within_tolerance(WindowKind::BlackmanHarris4, 0.35875 - 0.01168 * 0.0);
    }

    #[test]
    fn all_windows_parse_from_str() {
        for (s, expect) in [
            ("hann", WindowKind::Hann),
            ("Hamming", WindowKind::Hamming),
            ("blackman", WindowKind::Blackman),
            ("bh4", WindowKind::BlackmanHarris4),
            ("rectangular", WindowKind::Rectangular),
        ] {
            assert_eq!(s.parse::<WindowKind>().unwrap(), expect);
        }
    }
}
