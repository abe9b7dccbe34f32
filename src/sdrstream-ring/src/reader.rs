//! Reader side of the ring: attach to an existing mapping and poll it
//! without ever taking a lock.

use std::sync::atomic::Ordering;

use sdrstream_core::frame::{SpectrumFrame, SpectrumHeader};
use shared_memory::ShmemConf;

use crate::header::{HeaderView, RingDimensions, RingError, HEADER_LEN};

pub struct RingReader {
    shmem: shared_memory::Shmem,
    dims: RingDimensions,
    cursor: u64,
}

unsafe impl Send for RingReader {}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// No new frame since the last poll.
    Idle,
    /// A frame was read; `cursor` advanced by one.
    Frame(SpectrumFrame),
    /// The reader fell more than `ring_size` frames behind and has been
    /// resynchronized to the latest frame (I2).
    Resynced { new_cursor: u64 },
    /// The writer announced shutdown (I5); the reader should detach.
    EndOfStream,
}

impl RingReader {
    pub fn attach(name: &str, expected: RingDimensions) -> Result<Self, RingError> {
        let shmem = ShmemConf::new()
            .flink(name)
            .open()
            .map_err(|e| RingError::Backend(e.to_string()))?;
        let total_len = shmem.len();
        let bytes = unsafe { std::slice::from_raw_parts(shmem.as_ptr(), total_len) };
        let view = HeaderView::new(&bytes[..HEADER_LEN])?;
        view.validate(expected)?;
        let cursor = view.load_write_index(Ordering::Acquire);
        Ok(RingReader {
            shmem,
            dims: expected,
            cursor,
        })
    }

    pub fn dimensions(&self) -> RingDimensions {
        self.dims
    }

    fn bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.shmem.as_ptr(), self.shmem.len()) }
    }

    /// Poll once. Never blocks; callers loop with their own sleep interval
    /// (default 1 ms per the shared-ring-reader contract).
    pub fn poll(&mut self) -> PollOutcome {
        let bytes = self.bytes();
        let header_bytes: &[u8; HEADER_LEN] = bytes[..HEADER_LEN].try_into().unwrap();
        let view = HeaderView::new(header_bytes).expect("length checked at attach");

        if !view.is_streaming() {
            return PollOutcome::EndOfStream;
        }

        let write_index = view.load_write_index(Ordering::Acquire);
        if write_index == self.cursor {
            return PollOutcome::Idle;
        }

        if write_index.saturating_sub(self.cursor) > self.dims.ring_size as u64 {
            self.cursor = write_index - 1;
            return PollOutcome::Resynced {
                new_cursor: self.cursor,
            };
        }

        let slot_index = (self.cursor % self.dims.ring_size as u64) as usize;
        let stride = self.dims.frame_stride as usize;
        let slot_offset = HEADER_LEN + slot_index * stride;
        let slot = &bytes[slot_offset..slot_offset + stride];

        let header_buf: [u8; sdrstream_core::frame::RING_HEADER_LEN] = slot
            [..sdrstream_core::frame::RING_HEADER_LEN]
            .try_into()
            .unwrap();
        let header = SpectrumHeader::from_ring_bytes(&header_buf);

        let payload_bytes = &slot[sdrstream_core::frame::RING_HEADER_LEN..];
        let payload: Vec<f32> = payload_bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes(b.try_into().unwrap()))
            .collect();

        self.cursor += 1;
        PollOutcome::Frame(SpectrumFrame { header, payload })
    }

    /// Drain up to `max_frames` frames in one tick, as used by C10's
    /// external-process consumer loop.
    pub fn next_batch(&mut self, max_frames: usize) -> Vec<PollOutcome> {
        let mut out = Vec::with_capacity(max_frames.min(8));
        for _ in 0..max_frames {
            match self.poll() {
                PollOutcome::Idle => break,
                other @ PollOutcome::EndOfStream => {
                    out.push(other);
                    break;
                }
                other => out.push(other),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::RingWriter;
    use sdrstream_core::frame::SpectrumHeader;

    fn frame(seq: u64, fft_size: usize) -> SpectrumFrame {
        SpectrumFrame {
            header: SpectrumHeader {
                seq,
                capture_timestamp: seq as f64,
                center_freq_hz: 1.0e8,
                sample_rate_hz: 2.0e6,
                fft_size: fft_size as u16,
                channel_mask: 1,
                flags: 0,
                peak_bin: 0,
                peak_power_dbfs: -10.0,
            },
            payload: vec![-40.0; fft_size],
        }
    }

    #[test]
    fn writer_then_reader_round_trip_one_frame() {
        let name = format!("sdrstream-ring-test-{}", std::process::id());
        let mut writer = RingWriter::create(&name, 8, 16, 1, 2_000_000.0).unwrap();
        let dims = writer.dimensions();
        let mut reader = RingReader::attach(&name, dims).unwrap();

        writer.publish(&frame(0, 16));
        match reader.poll() {
            PollOutcome::Frame(f) => {
                assert_eq!(f.header.seq, 0);
                assert_eq!(f.payload.len(), 16);
            }
            other => panic!("expected a frame, got {other:?}"),
        }
        writer.close();
    }

    #[test]
    fn reader_resyncs_when_it_falls_far_behind() {
        let name = format!("sdrstream-ring-test-resync-{}", std::process::id());
        let mut writer = RingWriter::create(&name, 4, 8, 1, 1.0).unwrap();
        let dims = writer.dimensions();
        let mut reader = RingReader::attach(&name, dims).unwrap();

        for i in 0..20u64 {
            writer.publish(&frame(i, 8));
        }
        match reader.poll() {
            PollOutcome::Resynced { .. } => {}
            other => panic!("expected resync, got {other:?}"),
        }
        writer.close();
    }

    #[test]
    fn end_of_stream_observed_after_close() {
        let name = format!("sdrstream-ring-test-eos-{}", std::process::id());
        let writer = RingWriter::create(&name, 4, 8, 1, 1.0).unwrap();
        let dims = writer.dimensions();
        let mut reader = RingReader::attach(&name, dims).unwrap();
        writer.close();
        assert_eq!(reader.poll(), PollOutcome::EndOfStream);
    }
}
