//! Wire-level types: acquisition sample blocks and spectrum frames.
//!
//! `SpectrumHeader` is serialized two ways: a 48-byte ring-slot layout
//! (`to_ring_bytes`/`from_ring_bytes`, consumed by `sdrstream-ring`) and a
//! 44-byte network layout (`to_wire_bytes`/`from_wire_bytes`, consumed by
//! `sdrstream-fanout`). Both describe the same fields; only padding differs.

use num_complex::Complex32;

/// Bit 0 of `flags`: reference/GPS locked.
pub const FLAG_REFERENCE_LOCKED: u16 = 0x0001;

/// A contiguous run of complex samples read from the radio in one
/// acquisition call.
#[derive(Debug, Clone)]
pub struct SampleBlock {
    pub samples: Vec<Complex32>,
    /// Host monotonic timestamp (seconds since an arbitrary epoch) at the
    /// start of the block.
    pub host_timestamp: f64,
    pub overflowed: bool,
}

impl SampleBlock {
    pub fn new(capacity: usize) -> Self {
        SampleBlock {
            samples: vec![Complex32::new(0.0, 0.0); capacity],
            host_timestamp: 0.0,
            overflowed: false,
        }
    }
}

/// Fixed fields carried by every spectrum frame, independent of payload
/// size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectrumHeader {
    pub seq: u64,
    pub capture_timestamp: f64,
    pub center_freq_hz: f64,
    pub sample_rate_hz: f64,
    pub fft_size: u16,
    pub channel_mask: u16,
    pub flags: u16,
    pub peak_bin: i16,
    pub peak_power_dbfs: f32,
}

pub const RING_HEADER_LEN: usize = 48;
pub const WIRE_HEADER_LEN: usize = 44;
pub const WIRE_FRAME_MAGIC: u32 = 0x4646_5431; // "FFT1"

impl SpectrumHeader {
    pub fn is_reference_locked(&self) -> bool {
        self.flags & FLAG_REFERENCE_LOCKED != 0
    }

    pub fn to_ring_bytes(&self) -> [u8; RING_HEADER_LEN] {
        let mut buf = [0u8; RING_HEADER_LEN];
        buf[0..8].copy_from_slice(&self.seq.to_le_bytes());
        buf[8..16].copy_from_slice(&self.capture_timestamp.to_le_bytes());
        buf[16..24].copy_from_slice(&self.center_freq_hz.to_le_bytes());
        buf[24..32].copy_from_slice(&self.sample_rate_hz.to_le_bytes());
        buf[32..34].copy_from_slice(&self.fft_size.to_le_bytes());
        buf[34..36].copy_from_slice(&self.channel_mask.to_le_bytes());
        buf[36..38].copy_from_slice(&self.flags.to_le_bytes());
        buf[38..40].copy_from_slice(&self.peak_bin.to_le_bytes());
        buf[40..44].copy_from_slice(&self.peak_power_dbfs.to_le_bytes());
        // 44..48 reserved, left zero.
        buf
    }

    pub fn from_ring_bytes(buf: &[u8; RING_HEADER_LEN]) -> Self {
        SpectrumHeader {
            seq: u64::from_le_bytes(buf[0..8].try_into().unwrap()),
            capture_timestamp: f64::from_le_bytes(buf[8..16].try_into().unwrap()),
            center_freq_hz: f64::from_le_bytes(buf[16..24].try_into().unwrap()),
            sample_rate_hz: f64::from_le_bytes(buf[24..32].try_into().unwrap()),
            fft_size: u16::from_le_bytes(buf[32..34].try_into().unwrap()),
            channel_mask: u16::from_le_bytes(buf[34..36].try_into().unwrap()),
            flags: u16::from_le_bytes(buf[36..38].try_into().unwrap()),
            peak_bin: i16::from_le_bytes(buf[38..40].try_into().unwrap()),
            peak_power_dbfs: f32::from_le_bytes(buf[40..44].try_into().unwrap()),
        }
    }

    pub fn to_wire_bytes(&self) -> [u8; WIRE_HEADER_LEN] {
        let mut buf = [0u8; WIRE_HEADER_LEN];
        buf[0..4].copy_from_slice(&WIRE_FRAME_MAGIC.to_le_bytes());
        // 4..8 reserved.
        buf[8..16].copy_from_slice(&self.capture_timestamp.to_le_bytes());
        buf[16..24].copy_from_slice(&self.center_freq_hz.to_le_bytes());
        buf[24..32].copy_from_slice(&self.sample_rate_hz.to_le_bytes());
        buf[32..34].copy_from_slice(&self.fft_size.to_le_bytes());
        buf[34..36].copy_from_slice(&self.flags.to_le_bytes());
        buf[36..38].copy_from_slice(&self.peak_bin.to_le_bytes());
        buf[38..42].copy_from_slice(&self.peak_power_dbfs.to_le_bytes());
        // 42..44 reserved.
        buf
    }

    pub fn from_wire_bytes(buf: &[u8; WIRE_HEADER_LEN]) -> Option<Self> {
        let magic = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        if magic != WIRE_FRAME_MAGIC {
            return None;
        }
        Some(SpectrumHeader {
            seq: 0,
            capture_timestamp: f64::from_le_bytes(buf[8..16].try_into().unwrap()),
            center_freq_hz: f64::from_le_bytes(buf[16..24].try_into().unwrap()),
            sample_rate_hz: f64::from_le_bytes(buf[24..32].try_into().unwrap()),
            fft_size: u16::from_le_bytes(buf[32..34].try_into().unwrap()),
            channel_mask: 0,
            flags: u16::from_le_bytes(buf[34..36].try_into().unwrap()),
            peak_bin: i16::from_le_bytes(buf[36..38].try_into().unwrap()),
            peak_power_dbfs: f32::from_le_bytes(buf[38..42].try_into().unwrap()),
        })
    }
}

/// A complete spectrum frame: header plus per-channel dBFS payload,
/// channels concatenated in ascending order.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumFrame {
    pub header: SpectrumHeader,
    pub payload: Vec<f32>,
}

impl SpectrumFrame {
    pub fn channel_count(&self) -> usize {
        self.header.channel_mask.count_ones() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> SpectrumHeader {
        SpectrumHeader {
            seq: 42,
            capture_timestamp: 12345.678,
            center_freq_hz: 100_000_000.0,
            sample_rate_hz: 2_000_000.0,
            fft_size: 1024,
            channel_mask: 0b11,
            flags: FLAG_REFERENCE_LOCKED,
            peak_bin: -5,
            peak_power_dbfs: -3.25,
        }
    }

    #[test]
    fn ring_header_round_trips() {
        let h = sample_header();
        let bytes = h.to_ring_bytes();
        let back = SpectrumHeader::from_ring_bytes(&bytes);
        assert_eq!(h, back);
    }

    #[test]
    fn wire_header_round_trips_fields_it_carries() {
        let h = sample_header();
        let bytes = h.to_wire_bytes();
        let back = SpectrumHeader::from_wire_bytes(&bytes).unwrap();
        assert_eq!(back.capture_timestamp, h.capture_timestamp);
        assert_eq!(back.center_freq_hz, h.center_freq_hz);
        assert_eq!(back.peak_power_dbfs, h.peak_power_dbfs);
    }

    #[test]
    fn wire_header_rejects_bad_magic() {
        let mut bytes = sample_header().to_wire_bytes();
        bytes[0] = 0;
        assert!(SpectrumHeader::from_wire_bytes(&bytes).is_none());
    }

    #[test]
    fn reference_locked_flag_reads_back() {
        let h = sample_header();
        assert!(h.is_reference_locked());
    }
}
