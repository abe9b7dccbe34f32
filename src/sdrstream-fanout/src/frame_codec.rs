//! Wire encoding for the network frame channel (§6): the `FFT1` spectrum
//! message, the `STT1` status message, and JSON control messages.

use std::io::Write;

use flate2::write::DeflateEncoder;
use flate2::Compression;
use sdrstream_core::frame::{SpectrumFrame, WIRE_HEADER_LEN};
use sdrstream_core::status::StatusRecord;

/// Leading byte on every wire message: 0 = raw, 1 = deflate-compressed.
pub const ENCODING_RAW: u8 = 0;
pub const ENCODING_DEFLATE: u8 = 1;

pub fn encode_spectrum_message(frame: &SpectrumFrame) -> Vec<u8> {
    let header_bytes = frame.header.to_wire_bytes();
    let mut out = Vec::with_capacity(WIRE_HEADER_LEN + frame.payload.len() * 4);
    out.extend_from_slice(&header_bytes);
    for v in &frame.payload {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Encodes the low-frequency `STT1` status message. Never compressed: it's
/// already a fixed 56 bytes, well under the compression threshold.
pub fn encode_status_message(record: &StatusRecord) -> Vec<u8> {
    record.to_wire_bytes().to_vec()
}

/// Wraps `payload` with a one-byte encoding tag, deflating it when it
/// exceeds `threshold` bytes (§4.9: compression only pays off above ~1 KiB).
pub fn frame_for_wire(payload: Vec<u8>, threshold: usize) -> Vec<u8> {
    if payload.len() <= threshold {
        let mut out = Vec::with_capacity(payload.len() + 1);
        out.push(ENCODING_RAW);
        out.extend_from_slice(&payload);
        return out;
    }
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::fast());
    if encoder.write_all(&payload).is_err() {
        let mut out = Vec::with_capacity(payload.len() + 1);
        out.push(ENCODING_RAW);
        out.extend_from_slice(&payload);
        return out;
    }
    match encoder.finish() {
        Ok(compressed) => {
            let mut out = Vec::with_capacity(compressed.len() + 1);
            out.push(ENCODING_DEFLATE);
            out.extend_from_slice(&compressed);
            out
        }
        Err(_) => {
            let mut out = Vec::with_capacity(payload.len() + 1);
            out.push(ENCODING_RAW);
            out.extend_from_slice(&payload);
            out
        }
    }
}

pub fn backpressure_notice_json(dropped_frames: u64, buffer_size: usize, timestamp: f64) -> String {
    serde_json::json!({
        "type": "backpressure",
        "droppedFrames": dropped_frames,
        "bufferSize": buffer_size,
        "timestamp": timestamp,
    })
    .to_string()
}

pub fn connected_greeting_json(fft_size: usize, channel_count: usize) -> String {
    serde_json::json!({
        "type": "connected",
        "capabilities": {
            "fftSize": fft_size,
            "channelCount": channel_count,
        },
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdrstream_core::frame::SpectrumHeader;

    #[test]
    fn encoded_spectrum_message_has_header_then_payload() {
        let frame = SpectrumFrame {
            header: SpectrumHeader {
                seq: 1,
                capture_timestamp: 0.0,
                center_freq_hz: 1.0e8,
                sample_rate_hz: 2.0e6,
                fft_size: 4,
                channel_mask: 1,
                flags: 0,
                peak_bin: 2,
                peak_power_dbfs: -3.0,
            },
            payload: vec![-10.0, -20.0, -5.0, -30.0],
        };
        let bytes = encode_spectrum_message(&frame);
        assert_eq!(bytes.len(), WIRE_HEADER_LEN + 4 * 4);
        let payload_start = WIRE_HEADER_LEN;
        let first = f32::from_le_bytes(bytes[payload_start..payload_start + 4].try_into().unwrap());
        assert_eq!(first, -10.0);
    }

    #[test]
    fn backpressure_notice_contains_drop_count() {
        let json = backpressure_notice_json(120, 2_000_000, 42.0);
        assert!(json.contains("\"droppedFrames\":120"));
    }

    #[test]
    fn small_payload_stays_raw() {
        let payload = vec![1u8; 100];
        let wired = frame_for_wire(payload.clone(), 1024);
        assert_eq!(wired[0], ENCODING_RAW);
        assert_eq!(&wired[1..], &payload[..]);
    }

    #[test]
    fn large_payload_gets_deflated() {
        let payload = vec![0u8; 8192];
        let wired = frame_for_wire(payload, 1024);
        assert_eq!(wired[0], ENCODING_DEFLATE);
        assert!(wired.len() < 8192);
    }

    #[test]
    fn status_message_round_trips_frame_counter() {
        let record = StatusRecord {
            timestamp: 3.0,
            temperature_c: 25.0,
            reference_locked: true,
            frame_counter: 42,
            overflow_count: 0,
        };
        let bytes = encode_status_message(&record);
        assert_eq!(bytes.len(), 56);
        let frame_counter = u64::from_le_bytes(bytes[24..32].try_into().unwrap());
        assert_eq!(frame_counter, 42);
    }
}
