//! Packet Validator Tests

use lora_pkt_fwd::protocol::frame::{Frame, FrameError};
use lora_pkt_fwd::protocol::validator::{
    FrameValidator, PacketValidator, PolicyValidator, ValidationError,
};
use lora_pkt_fwd::radio::state::MachineState;

fn downlink(payload: &[u8]) -> Vec<u8> {
    Frame::encode_uplink(payload, 0, 0).unwrap().as_bytes().to_vec()
}

// ============================================================================
// Structural Validation Tests
// ============================================================================

#[test]
fn test_frame_validator_accepts_well_formed() {
    assert_eq!(FrameValidator.validate(&downlink(b"hello")), Ok(()));
}

#[test]
fn test_frame_validator_accepts_empty_payload() {
    assert_eq!(FrameValidator.validate(&downlink(b"")), Ok(()));
}

#[test]
fn test_frame_validator_rejects_empty_buffer() {
    assert_eq!(FrameValidator.validate(&[]), Err(ValidationError::Empty));
}

#[test]
fn test_frame_validator_rejects_plain_text() {
    assert_eq!(
        FrameValidator.validate(b"hello\r\n"),
        Err(ValidationError::Frame(FrameError::Malformed))
    );
}

#[test]
fn test_frame_validator_reports_truncation() {
    let bytes = downlink(b"0123456789");
    let result = FrameValidator.validate(&bytes[..bytes.len() - 3]);
    assert!(matches!(
        result,
        Err(ValidationError::Frame(FrameError::Truncated { declared: 20, available: 17 }))
    ));
}

fn gate<V: PacketValidator>(validator: V, buffer: &[u8]) -> Result<(), ValidationError> {
    validator.validate(buffer)
}

#[test]
fn test_validator_by_reference() {
    let validator = FrameValidator;
    assert_eq!(gate(&validator, &downlink(b"x")), Ok(()));
    let dynamic: &dyn PacketValidator = &validator;
    assert_eq!(gate(dynamic, &[]), Err(ValidationError::Empty));
}

// ============================================================================
// Policy Validation Tests
// ============================================================================

#[test]
fn test_policy_accepts() {
    let validator = PolicyValidator::new(|frame: &Frame| frame.payload().len() <= 4);
    assert_eq!(validator.validate(&downlink(b"abcd")), Ok(()));
}

#[test]
fn test_policy_rejects() {
    let validator = PolicyValidator::new(|frame: &Frame| frame.payload().len() <= 4);
    assert_eq!(
        validator.validate(&downlink(b"abcde")),
        Err(ValidationError::Rejected)
    );
}

#[test]
fn test_policy_not_consulted_for_malformed() {
    let validator = PolicyValidator::new(|_: &Frame| -> bool {
        panic!("policy must not see malformed input")
    });
    assert_eq!(
        validator.validate(&[0x7F, 0x00]),
        Err(ValidationError::Frame(FrameError::Malformed))
    );
}

#[test]
fn test_policy_on_type_byte() {
    let only_uplink_typed =
        PolicyValidator::new(|frame: &Frame| frame.state() == Some(MachineState::ReceivedUplink));
    assert_eq!(only_uplink_typed.validate(&downlink(b"ok")), Ok(()));

    let mut other = downlink(b"ok");
    other[1] = 0x42;
    assert_eq!(only_uplink_typed.validate(&other), Err(ValidationError::Rejected));
}

#[test]
fn test_error_display() {
    assert_eq!(ValidationError::Empty.to_string(), "empty submission");
    assert_eq!(
        ValidationError::from(FrameError::Malformed).to_string(),
        "invalid frame: malformed frame"
    );
}
