//! Loopback Radio
//!
//! A software [`Radio`] that plays back whatever it last transmitted as the
//! next received packet. Lets the serial side of the forwarder be exercised
//! on the bench without an RF front end.
//!
//! Completions are not delivered from an interrupt. The owner calls
//! [`EchoRadio::service`] from its own context, which hands at most one
//! pending completion to a [`RadioEvents`] sink.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::Vec;

use crate::config::{RxSettings, TxSettings};
use crate::radio::driver::{Radio, RadioEvents, RadioStatus};
use crate::types::{
    Bandwidth, CodingRate, FskParams, Frequency, LoRaParams, Modem, ModemKind, SpreadingFactor,
};

/// Largest payload the radio FIFO holds
pub const RADIO_FIFO_SIZE: usize = 255;

/// RSSI reported for looped-back packets (dBm)
pub const ECHO_RSSI: i16 = -30;

/// SNR reported for looped-back packets (dB)
pub const ECHO_SNR: i8 = 10;

/// Completion waiting to be delivered
#[derive(Clone, Debug, PartialEq, Eq)]
enum Completion {
    TxDone,
    RxDone(Vec<u8, RADIO_FIFO_SIZE>),
    RxTimeout,
}

#[derive(Debug)]
struct EchoState {
    status: RadioStatus,
    channel: Option<Frequency>,
    modem: Modem,
    stored: Option<Vec<u8, RADIO_FIFO_SIZE>>,
    pending: Option<Completion>,
    sent: u32,
}

/// Loopback transceiver
pub struct EchoRadio {
    state: Mutex<CriticalSectionRawMutex, RefCell<EchoState>>,
}

impl EchoRadio {
    /// Create an idle loopback radio
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(EchoState {
                status: RadioStatus::Idle,
                channel: None,
                modem: Modem::LoRa(LoRaParams::new(
                    Bandwidth::Khz125,
                    SpreadingFactor::Sf7,
                    CodingRate::Cr4_5,
                )),
                stored: None,
                pending: None,
                sent: 0,
            })),
        }
    }

    /// Deliver the pending completion, if any
    ///
    /// Returns `true` when a callback was invoked.
    pub fn service<E: RadioEvents + ?Sized>(&self, events: &E) -> bool {
        // Taken out under the lock, delivered outside it: the sink calls back
        // into `sleep`.
        let completion = self.state.lock(|s| s.borrow_mut().pending.take());
        match completion {
            Some(Completion::TxDone) => events.on_tx_done(),
            Some(Completion::RxDone(payload)) => events.on_rx_done(&payload, ECHO_RSSI, ECHO_SNR),
            Some(Completion::RxTimeout) => events.on_rx_timeout(),
            None => return false,
        }
        true
    }

    /// Channel set by the forwarder
    #[must_use]
    pub fn channel(&self) -> Option<Frequency> {
        self.state.lock(|s| s.borrow().channel)
    }

    /// Number of transmissions accepted
    #[must_use]
    pub fn sent(&self) -> u32 {
        self.state.lock(|s| s.borrow().sent)
    }

    /// Check if a completion is waiting for [`EchoRadio::service`]
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.state.lock(|s| s.borrow().pending.is_some())
    }
}

impl Default for EchoRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl Radio for EchoRadio {
    fn init(&self) {
        self.state.lock(|s| {
            let mut s = s.borrow_mut();
            s.status = RadioStatus::Idle;
            s.stored = None;
            s.pending = None;
        });
        debug!("echo radio ready");
    }

    fn set_channel(&self, frequency: Frequency) {
        self.state.lock(|s| s.borrow_mut().channel = Some(frequency));
    }

    fn set_tx_config(&self, settings: &TxSettings) {
        self.state.lock(|s| s.borrow_mut().modem = settings.modem);
    }

    fn set_rx_config(&self, settings: &RxSettings) {
        self.state.lock(|s| s.borrow_mut().modem = settings.modem);
    }

    fn receive(&self, _timeout_ms: u32) {
        self.state.lock(|s| {
            let mut s = s.borrow_mut();
            s.status = RadioStatus::RxRunning;
            s.pending = Some(match s.stored.take() {
                Some(payload) => Completion::RxDone(payload),
                None => Completion::RxTimeout,
            });
        });
    }

    fn send(&self, payload: &[u8]) {
        let len = payload.len().min(RADIO_FIFO_SIZE);
        if len < payload.len() {
            warn!("echo radio truncated {} byte payload", payload.len());
        }
        self.state.lock(|s| {
            let mut s = s.borrow_mut();
            s.stored = Vec::from_slice(&payload[..len]).ok();
            s.status = RadioStatus::TxRunning;
            s.pending = Some(Completion::TxDone);
            s.sent = s.sent.wrapping_add(1);
        });
    }

    fn sleep(&self) {
        self.state.lock(|s| s.borrow_mut().status = RadioStatus::Idle);
    }

    fn status(&self) -> RadioStatus {
        self.state.lock(|s| s.borrow().status)
    }

    fn time_on_air(&self, modem: ModemKind, payload_len: u8) -> u32 {
        let configured = self.state.lock(|s| s.borrow().modem);
        match (modem, configured) {
            (ModemKind::LoRa, Modem::LoRa(params)) => params.time_on_air_ms(payload_len),
            (ModemKind::Fsk, Modem::Fsk(params)) => params.time_on_air_ms(payload_len),
            (ModemKind::LoRa, Modem::Fsk(_)) => LoRaParams::default().time_on_air_ms(payload_len),
            (ModemKind::Fsk, Modem::LoRa(_)) => FskParams::default().time_on_air_ms(payload_len),
        }
    }
}
