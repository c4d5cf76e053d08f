//! Forwarder State Machine
//!
//! The forwarder is always in exactly one [`MachineState`]. Radio
//! completions move it out of `Idle`; the forward loop moves it back after
//! performing the matching forwarding action.
//!
//! ```text
//!            rx done ┌────────────────┐
//!        ┌──────────►│ ReceivedUplink ├──┐ frame → serial
//!        │           └────────────────┘  │
//!        │ rx timeout┌────────────────┐  │
//!        ├──────────►│ ReceiveTimeout ├──┤
//!        │           └────────────────┘  │
//!   ┌────┴─┐ rx error┌────────────────┐  │
//!   │ Idle ├────────►│  ReceiveError  ├──┤
//!   └────┬─┘         └────────────────┘  │
//!     ▲  │  tx done  ┌────────────────┐  │
//!     │  ├──────────►│  SentDownlink  ├──┤ ACK → serial
//!     │  │tx timeout ┌────────────────┐  │
//!     │  └──────────►│  SendTimeout   ├──┤ NACK → serial
//!     │              └────────────────┘  │
//!     └──────────────────────────────────┘
//! ```

use crate::protocol::frame::Frame;

/// Forwarder state, encoded on the wire as the frame type byte
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum MachineState {
    /// Waiting for radio or serial activity
    #[default]
    Idle = 0,
    /// A packet was received over the air
    ReceivedUplink = 1,
    /// The receive window closed with nothing heard
    ReceiveTimeout = 2,
    /// A packet was heard but could not be received
    ReceiveError = 3,
    /// A downlink left the antenna
    SentDownlink = 4,
    /// A downlink did not complete in time
    SendTimeout = 5,
}

impl MachineState {
    /// Wire value
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parse a wire value
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Idle),
            1 => Some(Self::ReceivedUplink),
            2 => Some(Self::ReceiveTimeout),
            3 => Some(Self::ReceiveError),
            4 => Some(Self::SentDownlink),
            5 => Some(Self::SendTimeout),
            _ => None,
        }
    }

    /// Check if waiting for work
    #[must_use]
    pub const fn is_idle(self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Check if this state hands a frame to serial
    #[must_use]
    pub const fn forwards_frame(self) -> bool {
        matches!(
            self,
            Self::ReceivedUplink | Self::SentDownlink | Self::SendTimeout
        )
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for MachineState {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Idle => defmt::write!(f, "IDLE"),
            Self::ReceivedUplink => defmt::write!(f, "RX"),
            Self::ReceiveTimeout => defmt::write!(f, "RX_TIMEOUT"),
            Self::ReceiveError => defmt::write!(f, "RX_ERROR"),
            Self::SentDownlink => defmt::write!(f, "TX"),
            Self::SendTimeout => defmt::write!(f, "TX_TIMEOUT"),
        }
    }
}

/// Result of a downlink transmission
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxOutcome {
    /// Transmission completed
    Sent,
    /// Transmission timed out
    Timeout,
}

impl TxOutcome {
    /// State entered on this outcome
    #[must_use]
    pub const fn state(self) -> MachineState {
        match self {
            Self::Sent => MachineState::SentDownlink,
            Self::Timeout => MachineState::SendTimeout,
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for TxOutcome {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Sent => defmt::write!(f, "ACK"),
            Self::Timeout => defmt::write!(f, "NACK"),
        }
    }
}

/// A state transition together with the frame it produced
///
/// Constructed only through the per-event constructors, so a state that
/// forwards a frame always carries one and the others never do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    state: MachineState,
    frame: Option<Frame>,
}

impl Notification {
    /// Packet received over the air
    #[must_use]
    pub fn uplink(frame: Frame) -> Self {
        Self {
            state: MachineState::ReceivedUplink,
            frame: Some(frame),
        }
    }

    /// Downlink finished, with its acknowledgement frame
    #[must_use]
    pub fn downlink_ack(outcome: TxOutcome, frame: Frame) -> Self {
        Self {
            state: outcome.state(),
            frame: Some(frame),
        }
    }

    /// Receive window closed empty
    #[must_use]
    pub const fn receive_timeout() -> Self {
        Self {
            state: MachineState::ReceiveTimeout,
            frame: None,
        }
    }

    /// Reception failed
    #[must_use]
    pub const fn receive_error() -> Self {
        Self {
            state: MachineState::ReceiveError,
            frame: None,
        }
    }

    /// State entered
    #[must_use]
    pub const fn state(&self) -> MachineState {
        self.state
    }

    /// Frame to forward, if any
    #[must_use]
    pub const fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    /// Split into state and frame
    #[must_use]
    pub fn into_parts(self) -> (MachineState, Option<Frame>) {
        (self.state, self.frame)
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Notification {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Notification({}, {})", self.state, self.frame);
    }
}
