//! Concrete `RadioDevice` implementations: a simulated source used by
//! tests and CI, and a SoapySDR-backed source for real hardware.

pub mod simulated;

#[cfg(feature = "soapysdr-backend")]
pub mod soapy;

pub use simulated::SimulatedDevice;
