//! Writer side of the ring: creation and wait-free publication.

use sdrstream_core::frame::SpectrumFrame;
use shared_memory::{Shmem, ShmemConf};

use crate::header::{self, HeaderViewMut, RingDimensions, RingError, HEADER_LEN};
use crate::slot_stride;

pub struct RingWriter {
    shmem: Shmem,
    dims: RingDimensions,
    next_seq: u64,
}

// Shmem itself isn't Send in all versions; the mapping is a raw pointer we
// manage exclusively from the single owning thread, so this is sound as
// long as RingWriter is never shared between threads without synchronization
// beyond what the header atomics already provide.
unsafe impl Send for RingWriter {}

impl RingWriter {
    pub fn create(
        name: &str,
        ring_size: u32,
        fft_size: u32,
        channel_count: u32,
        sample_rate_hz: f64,
    ) -> Result<Self, RingError> {
        let stride = slot_stride(fft_size as usize, channel_count as usize) as u32;
        let dims = RingDimensions {
            ring_size,
            fft_size,
            channel_count,
            frame_stride: stride,
        };
        let total_len = HEADER_LEN + (ring_size as usize) * (stride as usize);
        let shmem = ShmemConf::new()
            .size(total_len)
            .flink(name)
            .create()
            .map_err(|e| RingError::Backend(e.to_string()))?;

        let bytes = unsafe { std::slice::from_raw_parts_mut(shmem.as_ptr(), total_len) };
        header::init_header(&mut bytes[..HEADER_LEN], dims, sample_rate_hz);

        Ok(RingWriter {
            shmem,
            dims,
            next_seq: 0,
        })
    }

    pub fn dimensions(&self) -> RingDimensions {
        self.dims
    }

    fn bytes_mut(&self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.shmem.as_ptr(), self.shmem.len()) }
    }

    /// Publish one frame. Never blocks (P7): copies into the next slot then
    /// release-stores the new write index.
    pub fn publish(&mut self, frame: &SpectrumFrame) -> u64 {
        let seq = self.next_seq;
        let slot_index = (seq % self.dims.ring_size as u64) as usize;
        let stride = self.dims.frame_stride as usize;
        let slot_offset = HEADER_LEN + slot_index * stride;

        let mut header = frame.header;
        header.seq = seq;
        {
            let bytes = self.bytes_mut();
            let slot = &mut bytes[slot_offset..slot_offset + stride];
            slot[..crate::SLOT_HEADER_LEN].copy_from_slice(&header.to_ring_bytes());
            let payload_bytes: &[u8] = bytemuck_cast_f32_slice(&frame.payload);
            slot[crate::SLOT_HEADER_LEN..crate::SLOT_HEADER_LEN + payload_bytes.len()]
                .copy_from_slice(payload_bytes);
        }

        let next_seq = seq + 1;
        self.next_seq = next_seq;
        let bytes = self.bytes_mut();
        let header_bytes = &mut bytes[..HEADER_LEN];
        let writer = HeaderViewMut::new(header_bytes).expect("header length checked at create");
        writer.publish(next_seq);
        next_seq
    }

    pub fn set_streaming(&self, streaming: bool) {
        let bytes = self.bytes_mut();
        let header_bytes = &mut bytes[..HEADER_LEN];
        let writer = HeaderViewMut::new(header_bytes).expect("header length checked at create");
        writer.set_streaming(streaming);
    }

    /// Announce shutdown (I5) and unlink the mapping name.
    pub fn close(self) {
        self.set_streaming(false);
        // Dropping `shmem` unmaps and (since we own the flink) unlinks the
        // backing object.
        drop(self);
    }
}

/// Reinterpret an `f32` slice as little-endian bytes without an
/// intermediate allocation. Host is assumed little-endian (x86_64/aarch64),
/// matching every byte layout elsewhere in this crate.
fn bytemuck_cast_f32_slice(values: &[f32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(values.as_ptr() as *const u8, std::mem::size_of_val(values))
    }
}
