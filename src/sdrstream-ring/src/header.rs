//! Ring header layout, byte-for-byte as specified: a fixed 64-byte region
//! at the start of the shared mapping, followed by `ring_size` frame slots.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

pub const MAGIC: u32 = 0x5344_5246; // "SDRF"
pub const VERSION: u32 = 1;
pub const HEADER_LEN: usize = 64;

/// View over the header region of the mapping. Never constructed by
/// value; always borrowed from the mapped bytes via `RingHeader::view`.
#[repr(C)]
pub struct RingHeaderLayout {
    pub magic: u32,
    pub version: u32,
    pub ring_size: u32,
    pub fft_size: u32,
    pub channel_count: u32,
    pub frame_stride: u32,
    pub write_index: AtomicU64,
    pub read_index_hint: AtomicU64,
    pub sample_rate_hz: f64,
    pub gps_locked: AtomicU8,
    pub streaming: AtomicU8,
}

/// Dimensions fixed for the lifetime of a mapping (I3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingDimensions {
    pub ring_size: u32,
    pub fft_size: u32,
    pub channel_count: u32,
    pub frame_stride: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum RingError {
    #[error("ring mapping too small for header")]
    MappingTooSmall,
    #[error("ring magic mismatch: expected {MAGIC:#x}, found {0:#x}")]
    BadMagic(u32),
    #[error("ring version mismatch: expected {VERSION}, found {0}")]
    BadVersion(u32),
    #[error("ring dimensions mismatch: expected {expected:?}, found {found:?}")]
    DimensionMismatch {
        expected: RingDimensions,
        found: RingDimensions,
    },
    #[error("shared memory backend error: {0}")]
    Backend(String),
}

/// Writes a freshly-created header into raw bytes. Caller guarantees the
/// slice is at least `HEADER_LEN` bytes and otherwise unused.
pub fn init_header(bytes: &mut [u8], dims: RingDimensions, sample_rate_hz: f64) {
    debug_assert!(bytes.len() >= HEADER_LEN);
    bytes[0..4].copy_from_slice(&MAGIC.to_le_bytes());
    bytes[4..8].copy_from_slice(&VERSION.to_le_bytes());
    bytes[8..12].copy_from_slice(&dims.ring_size.to_le_bytes());
    bytes[12..16].copy_from_slice(&dims.fft_size.to_le_bytes());
    bytes[16..20].copy_from_slice(&dims.channel_count.to_le_bytes());
    bytes[20..24].copy_from_slice(&dims.frame_stride.to_le_bytes());
    bytes[24..32].copy_from_slice(&0u64.to_le_bytes());
    bytes[32..40].copy_from_slice(&0u64.to_le_bytes());
    bytes[40..48].copy_from_slice(&sample_rate_hz.to_le_bytes());
    bytes[48] = 0;
    bytes[49] = 1; // streaming = true
    for b in &mut bytes[50..64] {
        *b = 0;
    }
}

/// Borrow the header fields out of raw mapped bytes for atomic access.
///
/// Safety: `bytes` must be at least `HEADER_LEN` long and must outlive the
/// returned view; alignment of a shared-memory mapping's base address is
/// page-aligned so the embedded `AtomicU64`/`AtomicU8` accesses are valid.
pub struct HeaderView<'a> {
    bytes: &'a [u8],
}

impl<'a> HeaderView<'a> {
    pub fn new(bytes: &'a [u8]) -> Result<Self, RingError> {
        if bytes.len() < HEADER_LEN {
            return Err(RingError::MappingTooSmall);
        }
        Ok(HeaderView { bytes })
    }

    fn u32_at(&self, offset: usize) -> u32 {
        u32::from_le_bytes(self.bytes[offset..offset + 4].try_into().unwrap())
    }

    fn f64_at(&self, offset: usize) -> f64 {
        f64::from_le_bytes(self.bytes[offset..offset + 8].try_into().unwrap())
    }

    pub fn magic(&self) -> u32 {
        self.u32_at(0)
    }

    pub fn version(&self) -> u32 {
        self.u32_at(4)
    }

    pub fn dimensions(&self) -> RingDimensions {
        RingDimensions {
            ring_size: self.u32_at(8),
            fft_size: self.u32_at(12),
            channel_count: self.u32_at(16),
            frame_stride: self.u32_at(20),
        }
    }

    pub fn sample_rate_hz(&self) -> f64 {
        self.f64_at(40)
    }

    fn write_index_atomic(&self) -> &AtomicU64 {
        let ptr = self.bytes[24..32].as_ptr() as *const AtomicU64;
        // Offset 24 within a page-aligned mapping is 8-byte aligned.
        unsafe { &*ptr }
    }

    fn streaming_atomic(&self) -> &AtomicU8 {
        let ptr = self.bytes[49..50].as_ptr() as *const AtomicU8;
        unsafe { &*ptr }
    }

    pub fn load_write_index(&self, order: Ordering) -> u64 {
        self.write_index_atomic().load(order)
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming_atomic().load(Ordering::Acquire) != 0
    }

    pub fn validate(&self, expected: RingDimensions) -> Result<(), RingError> {
        if self.magic() != MAGIC {
            return Err(RingError::BadMagic(self.magic()));
        }
        if self.version() != VERSION {
            return Err(RingError::BadVersion(self.version()));
        }
        let found = self.dimensions();
        if found != expected {
            return Err(RingError::DimensionMismatch { expected, found });
        }
        Ok(())
    }
}

pub struct HeaderViewMut<'a> {
    bytes: &'a mut [u8],
}

impl<'a> HeaderViewMut<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Result<Self, RingError> {
        if bytes.len() < HEADER_LEN {
            return Err(RingError::MappingTooSmall);
        }
        Ok(HeaderViewMut { bytes })
    }

    pub fn as_view(&self) -> HeaderView<'_> {
        HeaderView::new(self.bytes).expect("length checked at construction")
    }

    fn write_index_atomic(&self) -> &AtomicU64 {
        let ptr = self.bytes[24..32].as_ptr() as *const AtomicU64;
        unsafe { &*ptr }
    }

    fn streaming_atomic(&self) -> &AtomicU8 {
        let ptr = self.bytes[49..50].as_ptr() as *const AtomicU8;
        unsafe { &*ptr }
    }

    /// Writer-only: advance the write index with release ordering. Must be
    /// called only after the slot payload has been written.
    pub fn publish(&self, next_index: u64) {
        self.write_index_atomic().store(next_index, Ordering::Release);
    }

    pub fn set_streaming(&self, streaming: bool) {
        self.streaming_atomic()
            .store(streaming as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_then_validate_round_trips_dimensions() {
        let mut bytes = vec![0u8; HEADER_LEN];
        let dims = RingDimensions {
            ring_size: 64,
            fft_size: 1024,
            channel_count: 1,
            frame_stride: 48 + 1024 * 4,
        };
        init_header(&mut bytes, dims, 2_000_000.0);
        let view = HeaderView::new(&bytes).unwrap();
        assert!(view.validate(dims).is_ok());
        assert_eq!(view.sample_rate_hz(), 2_000_000.0);
        assert!(view.is_streaming());
        assert_eq!(view.load_write_index(Ordering::Acquire), 0);
    }

    #[test]
    fn dimension_mismatch_is_detected() {
        let mut bytes = vec![0u8; HEADER_LEN];
        let dims = RingDimensions {
            ring_size: 64,
            fft_size: 1024,
            channel_count: 1,
            frame_stride: 4144,
        };
        init_header(&mut bytes, dims, 1.0);
        let view = HeaderView::new(&bytes).unwrap();
        let wrong = RingDimensions {
            fft_size: 2048,
            ..dims
        };
        assert!(matches!(
            view.validate(wrong),
            Err(RingError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn publish_advances_write_index_and_is_observable() {
        let mut bytes = vec![0u8; HEADER_LEN];
        let dims = RingDimensions {
            ring_size: 8,
            fft_size: 16,
            channel_count: 1,
            frame_stride: 48 + 16 * 4,
        };
        init_header(&mut bytes, dims, 1.0);
        {
            let writer = HeaderViewMut::new(&mut bytes).unwrap();
            writer.publish(1);
        }
        let view = HeaderView::new(&bytes).unwrap();
        assert_eq!(view.load_write_index(Ordering::Acquire), 1);
    }
}
