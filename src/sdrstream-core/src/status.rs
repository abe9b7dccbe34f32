//! The status record (T3/C6): a low-frequency, fixed-layout summary of
//! acquisition health, carried both as a log record and as the `STT1`
//! network frame (§6), distinct from the per-FFT spectrum frame.

pub const STATUS_RECORD_LEN: usize = 56;
pub const STATUS_WIRE_MAGIC: u32 = 0x5354_5431; // "STT1"

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusRecord {
    pub timestamp: f64,
    pub temperature_c: f32,
    pub reference_locked: bool,
    pub frame_counter: u64,
    pub overflow_count: u64,
}

impl StatusRecord {
    pub fn to_wire_bytes(&self) -> [u8; STATUS_RECORD_LEN] {
        let mut buf = [0u8; STATUS_RECORD_LEN];
        buf[0..4].copy_from_slice(&STATUS_WIRE_MAGIC.to_le_bytes());
        buf[8..16].copy_from_slice(&self.timestamp.to_le_bytes());
        buf[16..20].copy_from_slice(&self.temperature_c.to_le_bytes());
        buf[20] = self.reference_locked as u8;
        buf[24..32].copy_from_slice(&self.frame_counter.to_le_bytes());
        buf[32..40].copy_from_slice(&self.overflow_count.to_le_bytes());
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_record_encodes_magic_and_counters() {
        let record = StatusRecord {
            timestamp: 1.5,
            temperature_c: 42.0,
            reference_locked: true,
            frame_counter: 99,
            overflow_count: 2,
        };
        let bytes = record.to_wire_bytes();
        assert_eq!(bytes.len(), STATUS_RECORD_LEN);
        let magic = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        assert_eq!(magic, STATUS_WIRE_MAGIC);
    }
}
