//! Error taxonomy for the streaming core.
//!
//! Mirrors the transient/permanent split used throughout the radio-control
//! layer this crate was adapted from: transient failures are worth a retry,
//! permanent ones are not.

use thiserror::Error;

/// Catch-all result type used only at thread/FFI boundaries where the
/// concrete error type cannot cheaply cross (e.g. a `JoinHandle`'s panic
/// payload, or a callback registered with a C library).
pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Errors produced by the radio abstraction, the DSP stage, and the ring.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("radio configuration rejected: {0}")]
    Configuration(String),

    #[error("radio transport error: {0}")]
    Transport(String),

    #[error("device fault: {0}")]
    DeviceFault(String),

    #[error("operation not supported: {0}")]
    NotSupported(&'static str),

    #[error("operation timed out")]
    Timeout,
}

impl CoreError {
    /// Whether retrying the operation that produced this error is sensible.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CoreError::Transport(_) | CoreError::Timeout | CoreError::Configuration(_)
        )
    }
}
