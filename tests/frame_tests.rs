//! Frame Codec Tests
//!
//! Wire layout, capacity enforcement and decoder error classification.

use lora_pkt_fwd::config::{FRAME_CAPACITY, MAX_PAYLOAD_LEN};
use lora_pkt_fwd::protocol::frame::{CapacityExceeded, Frame, FrameError, ACK_BODY, NACK_BODY};
use lora_pkt_fwd::radio::state::{MachineState, TxOutcome};

/// Hand-built frame with an arbitrary declared length
fn raw_frame(kind: u8, declared: u16, payload: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0x01, kind];
    bytes.extend_from_slice(&declared.to_be_bytes());
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    bytes.extend_from_slice(payload);
    bytes.extend_from_slice(b"\r\n");
    bytes
}

// ============================================================================
// Uplink Encoding Tests
// ============================================================================

#[test]
fn test_uplink_exact_bytes() {
    let frame = Frame::encode_uplink(b"hi", -80, 5).unwrap();
    assert_eq!(
        frame.as_bytes(),
        &[0x01, 0x01, 0x00, 0x0C, 0xB0, 0x05, 0x00, 0x00, 0x68, 0x69, 0x0D, 0x0A]
    );
}

#[test]
fn test_uplink_accessors() {
    let frame = Frame::encode_uplink(b"hi", -80, 5).unwrap();
    assert_eq!(frame.len(), 12);
    assert_eq!(frame.declared_len(), 12);
    assert_eq!(frame.state(), Some(MachineState::ReceivedUplink));
    assert_eq!(frame.rssi(), -80);
    assert_eq!(frame.snr(), 5);
    assert_eq!(frame.payload(), b"hi");
}

#[test]
fn test_uplink_empty_payload() {
    let frame = Frame::encode_uplink(&[], -100, -7).unwrap();
    assert_eq!(frame.len(), 10);
    assert_eq!(frame.declared_len(), 10);
    assert!(frame.payload().is_empty());
    assert_eq!(frame.snr(), -7);
}

#[test]
fn test_uplink_length_field_matches_byte_count() {
    for n in [0usize, 1, 17, 64, 128, 200, MAX_PAYLOAD_LEN] {
        let payload: Vec<u8> = (0..n).map(|i| (i * 7) as u8).collect();
        let frame = Frame::encode_uplink(&payload, -60, 3).unwrap();
        assert_eq!(usize::from(frame.declared_len()), frame.len(), "payload {n}");
        assert_eq!(frame.len(), n + 10);
    }
}

#[test]
fn test_uplink_largest_payload_fills_buffer() {
    let payload = [0xA5; MAX_PAYLOAD_LEN];
    let frame = Frame::encode_uplink(&payload, -40, 9).unwrap();
    assert_eq!(frame.len(), FRAME_CAPACITY);
    assert_eq!(&frame.as_bytes()[FRAME_CAPACITY - 2..], b"\r\n");
}

#[test]
fn test_uplink_over_capacity_rejected() {
    let payload = [0u8; MAX_PAYLOAD_LEN + 1];
    let err = Frame::encode_uplink(&payload, -40, 9).unwrap_err();
    assert_eq!(
        err,
        CapacityExceeded {
            needed: FRAME_CAPACITY + 1,
            capacity: FRAME_CAPACITY
        }
    );
}

#[test]
fn test_uplink_rssi_saturates() {
    assert_eq!(Frame::encode_uplink(b"x", -200, 0).unwrap().rssi(), i8::MIN);
    assert_eq!(Frame::encode_uplink(b"x", 300, 0).unwrap().rssi(), i8::MAX);
    assert_eq!(Frame::encode_uplink(b"x", -128, 0).unwrap().rssi(), -128);
}

#[test]
fn test_uplink_reserved_metadata_zero() {
    let frame = Frame::encode_uplink(b"abc", -90, 2).unwrap();
    assert_eq!(&frame.metadata()[2..], &[0, 0]);
}

// ============================================================================
// Downlink Acknowledgement Tests
// ============================================================================

#[test]
fn test_ack_frame() {
    let frame = Frame::encode_downlink_ack(TxOutcome::Sent, 123);
    assert_eq!(frame.payload(), ACK_BODY);
    assert_eq!(frame.metadata(), [0x00, 0x00, 0x00, 0x7B]);
    assert_eq!(frame.on_air_ms(), 123);
    assert_eq!(frame.state(), Some(MachineState::SentDownlink));
    assert_eq!(frame.len(), 13);
    assert_eq!(frame.declared_len(), 13);
}

#[test]
fn test_nack_frame() {
    let frame = Frame::encode_downlink_ack(TxOutcome::Timeout, 3000);
    assert_eq!(frame.payload(), NACK_BODY);
    assert_eq!(frame.on_air_ms(), 3000);
    assert_eq!(frame.state(), Some(MachineState::SendTimeout));
    assert_eq!(frame.len(), 14);
}

#[test]
fn test_ack_large_duration_big_endian() {
    let frame = Frame::encode_downlink_ack(TxOutcome::Sent, 0x0102_0304);
    assert_eq!(frame.metadata(), [0x01, 0x02, 0x03, 0x04]);
}

// ============================================================================
// Decoder Tests
// ============================================================================

#[test]
fn test_decode_recovers_uplink() {
    let frame = Frame::encode_uplink(b"payload", -75, -3).unwrap();
    let decoded = Frame::decode(frame.as_bytes()).unwrap();
    assert_eq!(decoded, frame);
    assert_eq!(decoded.payload(), b"payload");
    assert_eq!(decoded.rssi(), -75);
    assert_eq!(decoded.snr(), -3);
}

#[test]
fn test_decode_empty_is_truncated() {
    assert_eq!(
        Frame::decode(&[]),
        Err(FrameError::Truncated {
            declared: 8,
            available: 0
        })
    );
}

#[test]
fn test_decode_missing_start_marker() {
    let mut bytes = raw_frame(1, 12, b"hi");
    bytes[0] = 0x02;
    assert_eq!(Frame::decode(&bytes), Err(FrameError::Malformed));
}

#[test]
fn test_decode_declared_50_received_30() {
    let full = raw_frame(1, 50, &[0x55; 40]);
    assert_eq!(full.len(), 50);
    assert_eq!(
        Frame::decode(&full[..30]),
        Err(FrameError::Truncated {
            declared: 50,
            available: 30
        })
    );
}

#[test]
fn test_decode_extra_bytes_length_mismatch() {
    let mut bytes = raw_frame(1, 12, b"hi");
    bytes.extend_from_slice(b"zz");
    assert_eq!(
        Frame::decode(&bytes),
        Err(FrameError::LengthMismatch {
            declared: 12,
            actual: 14
        })
    );
}

#[test]
fn test_decode_short_header_truncated() {
    assert_eq!(
        Frame::decode(&[0x01, 0x01]),
        Err(FrameError::Truncated {
            declared: 8,
            available: 2
        })
    );
}

#[test]
fn test_decode_impossible_length_malformed() {
    // Below the fixed overhead
    assert_eq!(Frame::decode(&raw_frame(1, 4, b"")), Err(FrameError::Malformed));
    // Above buffer capacity
    assert_eq!(Frame::decode(&raw_frame(1, 300, b"")), Err(FrameError::Malformed));
}

#[test]
fn test_decode_bad_terminator() {
    let mut bytes = raw_frame(1, 12, b"hi");
    let last = bytes.len() - 1;
    bytes[last] = b'X';
    assert_eq!(Frame::decode(&bytes), Err(FrameError::Malformed));
}

// ============================================================================
// Buffer Hygiene Tests
// ============================================================================

#[test]
fn test_clear_empties_frame() {
    let mut frame = Frame::encode_uplink(b"secret", -50, 1).unwrap();
    frame.clear();
    assert!(frame.is_empty());
    assert!(frame.payload().is_empty());
    assert_eq!(frame.declared_len(), 0);
}
