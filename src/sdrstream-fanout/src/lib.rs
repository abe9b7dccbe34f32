//! Fan-out server (C9): broadcasts spectrum frames from a ring reader to
//! network subscribers with per-subscriber back-pressure and drop
//! accounting.

pub mod frame_codec;
pub mod policy;
pub mod ring_bridge;
pub mod server;

pub use policy::{Decision, SubscriberState};
pub use server::{bind, run, FanoutState};
