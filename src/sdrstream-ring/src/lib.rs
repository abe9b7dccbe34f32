//! Lock-free single-writer/multi-reader spectrum ring, backed by named
//! shared memory. Writer and readers never share a lock: publication is a
//! release-store of a monotonic sequence number, consumption is an
//! acquire-load of the same counter (I1-I5 in the data model).

pub mod header;
pub mod reader;
pub mod writer;

pub use header::{RingDimensions, RingError};
pub use reader::{PollOutcome, RingReader};
pub use writer::RingWriter;

use sdrstream_core::frame::{RING_HEADER_LEN, WIRE_HEADER_LEN};

/// Per-slot frame header length plus a sanity check that it matches the
/// core crate's wire definition (ring header reuses the same field set,
/// just without the network-frame magic).
pub const SLOT_HEADER_LEN: usize = RING_HEADER_LEN;

fn _assert_headers_compatible() {
    // RING_HEADER_LEN carries one more reserved field than the wire
    // header; both describe the same fixed fields.
    debug_assert!(RING_HEADER_LEN >= WIRE_HEADER_LEN - 4);
}

pub fn slot_stride(fft_size: usize, channel_count: usize) -> usize {
    SLOT_HEADER_LEN + fft_size * channel_count * std::mem::size_of::<f32>()
}
