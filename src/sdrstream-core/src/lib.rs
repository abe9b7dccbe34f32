//! Core primitives shared by every component of the streaming pipeline:
//! window functions, the FFT engine, the wire-level sample/frame types,
//! the error taxonomy, and the radio capability trait.

pub mod error;
pub mod fft;
pub mod frame;
pub mod radio;
pub mod status;
pub mod window;

pub use error::{CoreError, DynResult};
pub use fft::FftEngine;
pub use frame::{SampleBlock, SpectrumFrame, SpectrumHeader};
pub use radio::{RadioActuals, RadioConfig, RadioDevice, RecvOutcome};
pub use status::StatusRecord;
pub use window::{Window, WindowKind};

/// Epsilon used everywhere a power value must be kept away from zero before
/// taking a logarithm.
pub const POWER_EPSILON: f32 = 1e-20;
