//! System configuration and protocol constants
//!
//! This module defines compile-time constants for the packet forwarder.
//! Frame layout, radio timeouts, buffer sizes and the start-up radio
//! configuration are centralized here.

use crate::types::{FskParams, Frequency, LoRaParams, Modem, Region};

/// Capacity of the uplink and downlink frame buffers in bytes
pub const FRAME_CAPACITY: usize = 255;

/// Start-of-frame marker
pub const START_MARKER: u8 = 0x01;

/// Frame header length (marker, type, length, metadata)
pub const HEADER_LEN: usize = 8;

/// Frame terminator
pub const TERMINATOR: [u8; 2] = *b"\r\n";

/// Header plus terminator
pub const FRAME_OVERHEAD: usize = HEADER_LEN + TERMINATOR.len();

/// Largest payload that fits in one frame
pub const MAX_PAYLOAD_LEN: usize = FRAME_CAPACITY - FRAME_OVERHEAD;

/// Receive window in milliseconds
pub const RX_TIMEOUT_MS: u32 = 1000;

/// Transmit-complete window in milliseconds
pub const TX_TIMEOUT_MS: u32 = 3000;

/// Pause before submitting a transmission, in milliseconds
pub const SETTLE_DELAY_MS: u32 = 1;

/// TX output power in dBm
pub const TX_OUTPUT_POWER_DBM: i8 = 14;

/// Depth of the radio-to-loop notification queue
///
/// The radio is half-duplex, so at most one completion is normally
/// outstanding; the extra slots absorb a late timeout racing a completion.
pub const NOTIFICATION_QUEUE_DEPTH: usize = 4;

/// Size of each serial byte pipe between the USB task and the loop
pub const SERIAL_PIPE_SIZE: usize = 512;

/// Forward loop poll period on the firmware (ms)
///
/// Long enough for the next USB packet of a split frame to land.
pub const POLL_INTERVAL_MS: u64 = 2;

/// How often the loopback radio delivers completions (ms)
pub const ECHO_SERVICE_MS: u64 = 10;

/// Greeting written to serial once at start-up
pub const BANNER: &[u8] = b"Hello LoRa\r\n";

/// USB VID (use test VID for development)
pub const USB_VID: u16 = 0x1209;

/// USB PID (get from pid.codes for production)
pub const USB_PID: u16 = 0x0001;

/// USB CDC ACM packet size
pub const USB_CDC_PACKET_SIZE: u16 = 64;

/// Channel plan selected at build time
#[cfg(feature = "region-as923")]
pub const DEFAULT_REGION: Region = Region::As923;
/// Channel plan selected at build time
#[cfg(all(feature = "region-au915", not(feature = "region-as923")))]
pub const DEFAULT_REGION: Region = Region::Au915;
/// Channel plan selected at build time
#[cfg(all(
    feature = "region-cn779",
    not(any(feature = "region-as923", feature = "region-au915"))
))]
pub const DEFAULT_REGION: Region = Region::Cn779;
/// Channel plan selected at build time
#[cfg(all(
    feature = "region-kr920",
    not(any(feature = "region-as923", feature = "region-au915", feature = "region-cn779"))
))]
pub const DEFAULT_REGION: Region = Region::Kr920;
/// Channel plan selected at build time
#[cfg(all(
    feature = "region-in865",
    not(any(
        feature = "region-as923",
        feature = "region-au915",
        feature = "region-cn779",
        feature = "region-kr920"
    ))
))]
pub const DEFAULT_REGION: Region = Region::In865;
/// Channel plan selected at build time
#[cfg(all(
    feature = "region-us915",
    not(any(
        feature = "region-as923",
        feature = "region-au915",
        feature = "region-cn779",
        feature = "region-kr920",
        feature = "region-in865"
    ))
))]
pub const DEFAULT_REGION: Region = Region::Us915;
/// Channel plan selected at build time
#[cfg(all(
    feature = "region-ru864",
    not(any(
        feature = "region-as923",
        feature = "region-au915",
        feature = "region-cn779",
        feature = "region-kr920",
        feature = "region-in865",
        feature = "region-us915"
    ))
))]
pub const DEFAULT_REGION: Region = Region::Ru864;
/// Channel plan selected at build time (EU868 unless another region is enabled)
#[cfg(not(any(
    feature = "region-as923",
    feature = "region-au915",
    feature = "region-cn779",
    feature = "region-kr920",
    feature = "region-in865",
    feature = "region-us915",
    feature = "region-ru864"
)))]
pub const DEFAULT_REGION: Region = Region::Eu868;

/// Settings handed to the driver's `set_tx_config`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxSettings {
    /// Modem and modulation
    pub modem: Modem,
    /// Output power in dBm
    pub power_dbm: i8,
    /// Transmit-complete timeout in milliseconds
    pub timeout_ms: u32,
}

/// Settings handed to the driver's `set_rx_config`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RxSettings {
    /// Modem and modulation
    pub modem: Modem,
    /// Continuous reception rather than single-shot
    pub continuous: bool,
}

/// Radio configuration, fixed at start-up
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RadioConfig {
    channel: Frequency,
    modem: Modem,
    power_dbm: i8,
    tx_timeout_ms: u32,
    rx_timeout_ms: u32,
}

impl RadioConfig {
    /// Create a configuration for a regional channel
    #[must_use]
    pub const fn new(region: Region, modem: Modem) -> Self {
        Self {
            channel: region.channel(),
            modem,
            power_dbm: TX_OUTPUT_POWER_DBM,
            tx_timeout_ms: TX_TIMEOUT_MS,
            rx_timeout_ms: RX_TIMEOUT_MS,
        }
    }

    /// Default LoRa configuration for a region
    #[must_use]
    pub fn lora(region: Region) -> Self {
        Self::new(region, Modem::LoRa(LoRaParams::default()))
    }

    /// Default FSK configuration for a region
    #[must_use]
    pub fn fsk(region: Region) -> Self {
        Self::new(region, Modem::Fsk(FskParams::default()))
    }

    /// Override the channel frequency (returns new config)
    #[must_use]
    pub const fn with_channel(self, channel: Frequency) -> Self {
        Self { channel, ..self }
    }

    /// Override the output power (returns new config)
    #[must_use]
    pub const fn with_power(self, power_dbm: i8) -> Self {
        Self { power_dbm, ..self }
    }

    /// Channel frequency
    #[must_use]
    pub const fn channel(&self) -> Frequency {
        self.channel
    }

    /// Modem and modulation parameters
    #[must_use]
    pub const fn modem(&self) -> &Modem {
        &self.modem
    }

    /// Output power in dBm
    #[must_use]
    pub const fn power_dbm(&self) -> i8 {
        self.power_dbm
    }

    /// Receive window in milliseconds
    #[must_use]
    pub const fn rx_timeout_ms(&self) -> u32 {
        self.rx_timeout_ms
    }

    /// Transmit-complete window in milliseconds
    #[must_use]
    pub const fn tx_timeout_ms(&self) -> u32 {
        self.tx_timeout_ms
    }

    /// Settings for the driver's transmit configuration
    #[must_use]
    pub const fn tx_settings(&self) -> TxSettings {
        TxSettings {
            modem: self.modem,
            power_dbm: self.power_dbm,
            timeout_ms: self.tx_timeout_ms,
        }
    }

    /// Settings for the driver's receive configuration
    #[must_use]
    pub const fn rx_settings(&self) -> RxSettings {
        RxSettings {
            modem: self.modem,
            continuous: true,
        }
    }
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self::lora(DEFAULT_REGION)
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for RadioConfig {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "Radio({}, {}, {} dBm)",
            self.channel,
            self.modem,
            self.power_dbm
        );
    }
}
