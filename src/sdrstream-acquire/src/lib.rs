//! Acquisition loop (C4), control mailbox, control server (C5), IQ
//! recorder (C7), and frequency scanner (C8).

pub mod acquisition;
pub mod command;
pub mod control;
pub mod dsp_publish;
pub mod mailbox;
pub mod recorder;
pub mod scanner;

pub use acquisition::{AcquisitionLoop, AcquisitionState};
pub use command::{Command, Response};
pub use control::ControlServer;
pub use mailbox::Mailbox;
pub use recorder::IqRecorder;
pub use scanner::{FrequencyScanner, ScanStepResult};
