//! Frame Codec
//!
//! Builds uplink and acknowledgement frames and parses frames submitted
//! over serial. Every write is bounds-checked against `FRAME_CAPACITY`;
//! a frame that would not fit is rejected before any byte is written.

use core::fmt;

use heapless::Vec;

use crate::config::{FRAME_CAPACITY, FRAME_OVERHEAD, HEADER_LEN, MAX_PAYLOAD_LEN, START_MARKER, TERMINATOR};
use crate::radio::state::{MachineState, TxOutcome};

/// Acknowledgement body for a completed transmission
pub const ACK_BODY: &[u8] = b"ACK";

/// Acknowledgement body for a transmission that timed out
pub const NACK_BODY: &[u8] = b"NACK";

/// Frame would not fit in the fixed-capacity buffer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CapacityExceeded {
    /// Bytes the frame would need
    pub needed: usize,
    /// Bytes available
    pub capacity: usize,
}

impl fmt::Display for CapacityExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frame needs {} bytes, buffer holds {}",
            self.needed, self.capacity
        )
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for CapacityExceeded {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "CapacityExceeded({}/{})", self.needed, self.capacity);
    }
}

/// Inbound frame rejected by the decoder
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameError {
    /// Missing start marker, impossible length field or bad terminator
    Malformed,
    /// More bytes arrived than the length field declares
    LengthMismatch {
        /// Length field value
        declared: usize,
        /// Bytes received
        actual: usize,
    },
    /// Fewer bytes arrived than the length field declares
    Truncated {
        /// Length field value, or the header length if it was not yet received
        declared: usize,
        /// Bytes received
        available: usize,
    },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => f.write_str("malformed frame"),
            Self::LengthMismatch { declared, actual } => {
                write!(f, "length field says {declared} bytes, got {actual}")
            }
            Self::Truncated {
                declared,
                available,
            } => write!(f, "truncated frame: {available} of {declared} bytes"),
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for FrameError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Malformed => defmt::write!(f, "Malformed"),
            Self::LengthMismatch { declared, actual } => {
                defmt::write!(f, "LengthMismatch({}/{})", actual, declared);
            }
            Self::Truncated {
                declared,
                available,
            } => defmt::write!(f, "Truncated({}/{})", available, declared),
        }
    }
}

/// One serial frame, always complete and within capacity
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Vec<u8, FRAME_CAPACITY>,
}

impl Frame {
    /// Frame carrying a packet received over the air
    ///
    /// Metadata is `{rssi, snr, 0, 0}`. RSSI is saturated to a signed byte.
    pub fn encode_uplink(payload: &[u8], rssi: i16, snr: i8) -> Result<Self, CapacityExceeded> {
        let rssi = i8::try_from(rssi).unwrap_or(if rssi < 0 { i8::MIN } else { i8::MAX });
        let metadata = [rssi.to_be_bytes()[0], snr.to_be_bytes()[0], 0, 0];
        Self::build(MachineState::ReceivedUplink.as_u8(), metadata, payload)
    }

    /// Acknowledgement of a downlink transmission
    ///
    /// Body is `ACK` or `NACK`, metadata the on-air duration (big-endian).
    #[must_use]
    pub fn encode_downlink_ack(outcome: TxOutcome, on_air_ms: u32) -> Self {
        let body = match outcome {
            TxOutcome::Sent => ACK_BODY,
            TxOutcome::Timeout => NACK_BODY,
        };
        let mut frame = Self::empty();
        // Short bodies always fit
        let _ = frame.write(outcome.state().as_u8(), on_air_ms.to_be_bytes(), body);
        frame
    }

    /// Parse and validate a frame received over serial
    pub fn decode(buffer: &[u8]) -> Result<Self, FrameError> {
        let marker = buffer.first().ok_or(FrameError::Truncated {
            declared: HEADER_LEN,
            available: 0,
        })?;
        if *marker != START_MARKER {
            return Err(FrameError::Malformed);
        }
        if buffer.len() < 4 {
            return Err(FrameError::Truncated {
                declared: HEADER_LEN,
                available: buffer.len(),
            });
        }

        let declared = usize::from(u16::from_be_bytes([buffer[2], buffer[3]]));
        if !(FRAME_OVERHEAD..=FRAME_CAPACITY).contains(&declared) {
            return Err(FrameError::Malformed);
        }
        if buffer.len() < declared {
            return Err(FrameError::Truncated {
                declared,
                available: buffer.len(),
            });
        }
        if buffer.len() > declared {
            return Err(FrameError::LengthMismatch {
                declared,
                actual: buffer.len(),
            });
        }
        if buffer[declared - TERMINATOR.len()..] != TERMINATOR {
            return Err(FrameError::Malformed);
        }

        let bytes = Vec::from_slice(buffer).map_err(|()| FrameError::Malformed)?;
        Ok(Self { bytes })
    }

    fn empty() -> Self {
        Self { bytes: Vec::new() }
    }

    fn build(kind: u8, metadata: [u8; 4], payload: &[u8]) -> Result<Self, CapacityExceeded> {
        let mut frame = Self::empty();
        frame.write(kind, metadata, payload)?;
        Ok(frame)
    }

    fn write(&mut self, kind: u8, metadata: [u8; 4], payload: &[u8]) -> Result<(), CapacityExceeded> {
        let total = payload.len() + FRAME_OVERHEAD;
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(CapacityExceeded {
                needed: total,
                capacity: FRAME_CAPACITY,
            });
        }
        let overflow = |()| CapacityExceeded {
            needed: total,
            capacity: FRAME_CAPACITY,
        };

        self.bytes.clear();
        // Capacity is checked above, so none of these pushes can fail
        let [len_hi, len_lo] = u16::try_from(total).map_err(|_| overflow(()))?.to_be_bytes();
        self.bytes
            .extend_from_slice(&[START_MARKER, kind, len_hi, len_lo])
            .map_err(overflow)?;
        self.bytes.extend_from_slice(&metadata).map_err(overflow)?;
        self.bytes.extend_from_slice(payload).map_err(overflow)?;
        self.bytes.extend_from_slice(&TERMINATOR).map_err(overflow)?;
        Ok(())
    }

    /// Raw frame bytes, marker through terminator
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Frame length in bytes (equals the length field)
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True once the frame has been cleared
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Value of the length field
    #[must_use]
    pub fn declared_len(&self) -> u16 {
        match self.bytes.get(2..4) {
            Some(&[hi, lo]) => u16::from_be_bytes([hi, lo]),
            _ => 0,
        }
    }

    /// Raw type/state byte
    #[must_use]
    pub fn kind(&self) -> u8 {
        self.bytes.get(1).copied().unwrap_or(0)
    }

    /// Machine state recorded in the type byte, if it names one
    #[must_use]
    pub fn state(&self) -> Option<MachineState> {
        MachineState::from_u8(self.kind())
    }

    /// The four metadata bytes
    #[must_use]
    pub fn metadata(&self) -> [u8; 4] {
        match self.bytes.get(4..HEADER_LEN) {
            Some(&[a, b, c, d]) => [a, b, c, d],
            _ => [0; 4],
        }
    }

    /// Uplink RSSI in dBm
    #[must_use]
    pub fn rssi(&self) -> i8 {
        i8::from_be_bytes([self.metadata()[0]])
    }

    /// Uplink SNR in dB
    #[must_use]
    pub fn snr(&self) -> i8 {
        i8::from_be_bytes([self.metadata()[1]])
    }

    /// Acknowledged on-air duration in milliseconds
    #[must_use]
    pub fn on_air_ms(&self) -> u32 {
        u32::from_be_bytes(self.metadata())
    }

    /// Message bytes between header and terminator
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        let end = self.bytes.len().saturating_sub(TERMINATOR.len());
        self.bytes.get(HEADER_LEN..end).unwrap_or(&[])
    }

    /// Zero the buffer and drop its contents
    pub fn clear(&mut self) {
        self.bytes.iter_mut().for_each(|b| *b = 0);
        self.bytes.clear();
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("kind", &self.kind())
            .field("len", &self.len())
            .field("metadata", &self.metadata())
            .field("payload", &self.payload())
            .finish()
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Frame {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "Frame(type={}, len={}, payload={} bytes)",
            self.kind(),
            self.len(),
            self.payload().len()
        );
    }
}
