//! Narrow capability trait every radio backend implements, modeled on a
//! tagged sum of drivers behind one small interface: the acquisition loop
//! is generic over this trait and never knows which concrete device it
//! holds.

use std::time::Duration;

use num_complex::Complex32;

use crate::error::DynResult;

/// Requested configuration, applied at startup and on live retuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadioConfig {
    pub center_freq_hz: f64,
    pub sample_rate_hz: f64,
    pub gain_db: f64,
    pub bandwidth_hz: f64,
    pub channel_mask: u16,
    pub block_size: usize,
}

/// Values the device actually applied after quantization; these, not the
/// request, are authoritative and go into every subsequent frame header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadioActuals {
    pub center_freq_hz: f64,
    pub sample_rate_hz: f64,
    pub gain_db: f64,
    pub bandwidth_hz: f64,
}

/// Outcome of one `receive_block` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvOutcome {
    Ok { samples: usize, overflowed: bool },
    TimedOut,
}

/// Capability set the acquisition loop needs from a radio. Backends
/// implement this directly against hardware or, for tests and the
/// simulated source, entirely in software.
pub trait RadioDevice: Send {
    fn configure(&mut self, cfg: &RadioConfig) -> DynResult<RadioActuals>;
    fn tune(&mut self, hz: f64) -> DynResult<f64>;
    fn set_gain(&mut self, db: f64) -> DynResult<f64>;
    fn set_sample_rate(&mut self, hz: f64) -> DynResult<f64>;
    fn set_bandwidth(&mut self, hz: f64) -> DynResult<f64>;
    fn start(&mut self) -> DynResult<()>;
    fn stop(&mut self) -> DynResult<()>;

    /// Fill as much of `out` as the device has ready, blocking up to
    /// `timeout`. Returns the number of complex samples written.
    fn receive_block(&mut self, out: &mut [Complex32], timeout: Duration) -> DynResult<RecvOutcome>;
}
