//! Radio Driver Contract
//!
//! The transceiver driver is an external collaborator. The forwarder only
//! depends on the operations below; drivers supply their own interior
//! synchronization, since both the forward loop and the completion context
//! call into them through shared references.

use crate::config::{RxSettings, TxSettings};
use crate::types::{Frequency, ModemKind};

/// Driver operating status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RadioStatus {
    /// Not receiving or transmitting
    #[default]
    Idle,
    /// Receive window open
    RxRunning,
    /// Transmission in progress
    TxRunning,
    /// Channel activity detection in progress
    Cad,
}

impl RadioStatus {
    /// Check if the radio can be re-armed
    #[must_use]
    pub const fn is_idle(self) -> bool {
        matches!(self, Self::Idle)
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for RadioStatus {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Idle => defmt::write!(f, "IDLE"),
            Self::RxRunning => defmt::write!(f, "RX_RUNNING"),
            Self::TxRunning => defmt::write!(f, "TX_RUNNING"),
            Self::Cad => defmt::write!(f, "CAD"),
        }
    }
}

/// Operations the forwarder needs from a half-duplex transceiver
pub trait Radio {
    /// Bring up the transceiver
    fn init(&self);

    /// Tune to a channel
    fn set_channel(&self, frequency: Frequency);

    /// Configure the transmitter
    fn set_tx_config(&self, settings: &TxSettings);

    /// Configure the receiver
    fn set_rx_config(&self, settings: &RxSettings);

    /// Open a receive window; completes with rx done, timeout or error
    fn receive(&self, timeout_ms: u32);

    /// Transmit a payload; completes with tx done or timeout
    fn send(&self, payload: &[u8]);

    /// Enter low-power sleep
    fn sleep(&self);

    /// Current operating status
    fn status(&self) -> RadioStatus;

    /// Estimated on-air duration of a payload in milliseconds
    fn time_on_air(&self, modem: ModemKind, payload_len: u8) -> u32;
}

impl<R: Radio + ?Sized> Radio for &R {
    fn init(&self) {
        (**self).init();
    }

    fn set_channel(&self, frequency: Frequency) {
        (**self).set_channel(frequency);
    }

    fn set_tx_config(&self, settings: &TxSettings) {
        (**self).set_tx_config(settings);
    }

    fn set_rx_config(&self, settings: &RxSettings) {
        (**self).set_rx_config(settings);
    }

    fn receive(&self, timeout_ms: u32) {
        (**self).receive(timeout_ms);
    }

    fn send(&self, payload: &[u8]) {
        (**self).send(payload);
    }

    fn sleep(&self) {
        (**self).sleep();
    }

    fn status(&self) -> RadioStatus {
        (**self).status()
    }

    fn time_on_air(&self, modem: ModemKind, payload_len: u8) -> u32 {
        (**self).time_on_air(modem, payload_len)
    }
}

/// Completion callbacks a driver delivers from its own context
///
/// Drivers call at most one of these at a time and never re-enter.
pub trait RadioEvents {
    /// Transmission finished
    fn on_tx_done(&self);

    /// Transmission did not finish within the TX timeout
    fn on_tx_timeout(&self);

    /// Packet received
    fn on_rx_done(&self, payload: &[u8], rssi: i16, snr: i8);

    /// Receive window closed empty
    fn on_rx_timeout(&self);

    /// Packet heard but not received (CRC or header error)
    fn on_rx_error(&self);
}
