//! Shared types used across the packet forwarder
//!
//! This module defines domain-specific types that enforce invariants
//! at compile time and provide type safety throughout the codebase.

use core::fmt;

/// Channel frequency in Hertz with validation
///
/// Represents a valid carrier frequency within the sub-GHz ISM range
/// covered by the supported transceivers.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Frequency(u32);

impl Frequency {
    /// Minimum supported frequency (150 MHz)
    pub const MIN_HZ: u32 = 150_000_000;

    /// Maximum supported frequency (960 MHz)
    pub const MAX_HZ: u32 = 960_000_000;

    /// Create a new Frequency from Hz, returns None if out of range
    #[must_use]
    pub const fn from_hz(hz: u32) -> Option<Self> {
        if hz >= Self::MIN_HZ && hz <= Self::MAX_HZ {
            Some(Self(hz))
        } else {
            None
        }
    }

    /// Create a new Frequency from kHz
    #[must_use]
    pub const fn from_khz(khz: u32) -> Option<Self> {
        match khz.checked_mul(1000) {
            Some(hz) => Self::from_hz(hz),
            None => None,
        }
    }

    /// Get the frequency in Hz
    #[must_use]
    pub const fn as_hz(self) -> u32 {
        self.0
    }

    /// Get the frequency in kHz (truncated)
    #[must_use]
    pub const fn as_khz(self) -> u32 {
        self.0 / 1000
    }
}

impl fmt::Debug for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frequency({} Hz)", self.0)
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Frequency {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{} Hz", self.0);
    }
}

/// Regional channel plan
///
/// The forwarder listens and transmits on a single fixed channel per region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Region {
    /// Asia 923 MHz
    As923,
    /// Australia 915 MHz
    Au915,
    /// China 779 MHz
    Cn779,
    /// Europe 868 MHz
    #[default]
    Eu868,
    /// Korea 920 MHz
    Kr920,
    /// India 865 MHz
    In865,
    /// North America 915 MHz
    Us915,
    /// Russia 864 MHz
    Ru864,
}

impl Region {
    /// All supported regions
    pub const ALL: [Self; 8] = [
        Self::As923,
        Self::Au915,
        Self::Cn779,
        Self::Eu868,
        Self::Kr920,
        Self::In865,
        Self::Us915,
        Self::Ru864,
    ];

    /// Channel frequency in Hz
    #[must_use]
    pub const fn channel_hz(self) -> u32 {
        match self {
            Self::As923 => 923_200_000,
            Self::Au915 | Self::Us915 => 915_000_000,
            Self::Cn779 => 779_000_000,
            Self::Eu868 => 868_000_000,
            Self::Kr920 => 920_000_000,
            Self::In865 => 865_000_000,
            Self::Ru864 => 864_000_000,
        }
    }

    /// Channel frequency
    #[must_use]
    pub const fn channel(self) -> Frequency {
        // Every plan frequency lies inside the validated range
        Frequency(self.channel_hz())
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Region {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::As923 => defmt::write!(f, "AS923"),
            Self::Au915 => defmt::write!(f, "AU915"),
            Self::Cn779 => defmt::write!(f, "CN779"),
            Self::Eu868 => defmt::write!(f, "EU868"),
            Self::Kr920 => defmt::write!(f, "KR920"),
            Self::In865 => defmt::write!(f, "IN865"),
            Self::Us915 => defmt::write!(f, "US915"),
            Self::Ru864 => defmt::write!(f, "RU864"),
        }
    }
}

/// LoRa signal bandwidth
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Bandwidth {
    /// 125 kHz
    #[default]
    Khz125 = 0,
    /// 250 kHz
    Khz250 = 1,
    /// 500 kHz
    Khz500 = 2,
}

impl Bandwidth {
    /// Driver register index (0: 125 kHz, 1: 250 kHz, 2: 500 kHz)
    #[must_use]
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Get bandwidth in Hz
    #[must_use]
    pub const fn hz(self) -> u32 {
        match self {
            Self::Khz125 => 125_000,
            Self::Khz250 => 250_000,
            Self::Khz500 => 500_000,
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Bandwidth {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{} kHz", self.hz() / 1000);
    }
}

/// LoRa spreading factor (SF7..SF12)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SpreadingFactor {
    /// SF7: fastest, shortest range
    #[default]
    Sf7 = 7,
    /// SF8
    Sf8 = 8,
    /// SF9
    Sf9 = 9,
    /// SF10
    Sf10 = 10,
    /// SF11 (low data rate optimisation at 125 kHz)
    Sf11 = 11,
    /// SF12: slowest, longest range
    Sf12 = 12,
}

impl SpreadingFactor {
    /// Chips per symbol exponent
    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// Parse from a raw SF number
    #[must_use]
    pub const fn from_value(sf: u8) -> Option<Self> {
        match sf {
            7 => Some(Self::Sf7),
            8 => Some(Self::Sf8),
            9 => Some(Self::Sf9),
            10 => Some(Self::Sf10),
            11 => Some(Self::Sf11),
            12 => Some(Self::Sf12),
            _ => None,
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for SpreadingFactor {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "SF{}", self.value());
    }
}

/// LoRa forward error correction rate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CodingRate {
    /// 4/5
    #[default]
    Cr4_5 = 1,
    /// 4/6
    Cr4_6 = 2,
    /// 4/7
    Cr4_7 = 3,
    /// 4/8
    Cr4_8 = 4,
}

impl CodingRate {
    /// Driver register value (1..=4)
    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for CodingRate {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "4/{}", self.value() + 4);
    }
}

/// LoRa modulation parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoRaParams {
    /// Signal bandwidth
    pub bandwidth: Bandwidth,
    /// Spreading factor
    pub spreading_factor: SpreadingFactor,
    /// Coding rate
    pub coding_rate: CodingRate,
    /// Preamble length in symbols (same for TX and RX)
    pub preamble_len: u16,
    /// RX single-mode timeout in symbols
    pub symbol_timeout: u16,
    /// Implicit header / fixed payload length
    pub fixed_length: bool,
    /// IQ inversion
    pub iq_inverted: bool,
    /// Payload CRC
    pub crc_on: bool,
}

impl LoRaParams {
    /// Preamble length in symbols
    pub const PREAMBLE_LEN: u16 = 8;

    /// RX symbol timeout
    pub const SYMBOL_TIMEOUT: u16 = 5;

    /// Create parameters with the forwarder's defaults for the given modulation
    #[must_use]
    pub const fn new(
        bandwidth: Bandwidth,
        spreading_factor: SpreadingFactor,
        coding_rate: CodingRate,
    ) -> Self {
        Self {
            bandwidth,
            spreading_factor,
            coding_rate,
            preamble_len: Self::PREAMBLE_LEN,
            symbol_timeout: Self::SYMBOL_TIMEOUT,
            fixed_length: false,
            iq_inverted: false,
            crc_on: true,
        }
    }

    /// Whether low data rate optimisation is required (symbol time > 16 ms)
    #[must_use]
    pub const fn low_data_rate_optimize(&self) -> bool {
        let sf = self.spreading_factor.value() as u32;
        (1u32 << sf) * 1000 / (self.bandwidth.hz() / 1000) > 16_000
    }

    /// Time on air for a payload in milliseconds
    ///
    /// Semtech LoRa modem designer's guide (AN1200.13), rounded up.
    #[must_use]
    pub fn time_on_air_ms(&self, payload_len: u8) -> u32 {
        let sf = u64::from(self.spreading_factor.value());
        let bw = u64::from(self.bandwidth.hz());
        let cr = u64::from(self.coding_rate.value());
        let de = u64::from(self.low_data_rate_optimize());
        let ih = u64::from(self.fixed_length);
        let crc = u64::from(self.crc_on);

        // Symbol duration in ns: 2^SF / BW
        let t_sym_ns = (1_000_000_000u64 << sf) / bw;

        // Preamble is n_preamble + 4.25 symbols, kept in quarter symbols
        let preamble_quarters = (u64::from(self.preamble_len) * 4) + 17;

        // 8*PL - 4*SF + 28 + 16*CRC - 20*IH
        let bits = (8 * u64::from(payload_len) + 28 + 16 * crc).saturating_sub(4 * sf + 20 * ih);
        let per_block = 4 * (sf - 2 * de);
        let payload_symbols = 8 + bits.div_ceil(per_block) * (cr + 4);

        let total_ns = (preamble_quarters * t_sym_ns) / 4 + payload_symbols * t_sym_ns;
        u32::try_from(total_ns.div_ceil(1_000_000)).unwrap_or(u32::MAX)
    }
}

impl Default for LoRaParams {
    fn default() -> Self {
        Self::new(Bandwidth::Khz125, SpreadingFactor::Sf7, CodingRate::Cr4_5)
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for LoRaParams {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "LoRa({}, {}, CR {})",
            self.spreading_factor,
            self.bandwidth,
            self.coding_rate
        );
    }
}

/// (G)FSK modulation parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FskParams {
    /// Frequency deviation in Hz (TX only)
    pub deviation_hz: u32,
    /// Data rate in bits per second
    pub datarate_bps: u32,
    /// Receiver bandwidth in Hz
    pub bandwidth_hz: u32,
    /// AFC bandwidth in Hz
    pub afc_bandwidth_hz: u32,
    /// Preamble length in bytes
    pub preamble_len: u16,
    /// Fixed payload length
    pub fixed_length: bool,
    /// Payload CRC
    pub crc_on: bool,
}

impl FskParams {
    /// Sync word length in bytes, counted towards time on air
    const SYNC_WORD_LEN: u32 = 3;

    /// Time on air for a payload in milliseconds, rounded up
    #[must_use]
    pub fn time_on_air_ms(&self, payload_len: u8) -> u32 {
        let length_byte = u32::from(!self.fixed_length);
        let crc_bytes = if self.crc_on { 2 } else { 0 };
        let bytes = u32::from(self.preamble_len)
            + Self::SYNC_WORD_LEN
            + length_byte
            + u32::from(payload_len)
            + crc_bytes;
        let bits = u64::from(bytes) * 8 * 1000;
        let rate = u64::from(self.datarate_bps.max(1));
        u32::try_from(bits.div_ceil(rate)).unwrap_or(u32::MAX)
    }
}

impl Default for FskParams {
    fn default() -> Self {
        Self {
            deviation_hz: 25_000,
            datarate_bps: 50_000,
            bandwidth_hz: 50_000,
            afc_bandwidth_hz: 83_333,
            preamble_len: 5,
            fixed_length: false,
            crc_on: true,
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for FskParams {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "FSK({} bps, dev {} Hz)", self.datarate_bps, self.deviation_hz);
    }
}

/// Modem family, as passed to the driver's time-on-air query
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModemKind {
    /// (G)FSK
    Fsk,
    /// LoRa
    LoRa,
}

#[cfg(feature = "embedded")]
impl defmt::Format for ModemKind {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Fsk => defmt::write!(f, "FSK"),
            Self::LoRa => defmt::write!(f, "LoRa"),
        }
    }
}

/// Modem selection with its modulation parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Modem {
    /// LoRa modulation
    LoRa(LoRaParams),
    /// (G)FSK modulation
    Fsk(FskParams),
}

impl Modem {
    /// Modem family
    #[must_use]
    pub const fn kind(&self) -> ModemKind {
        match self {
            Self::LoRa(_) => ModemKind::LoRa,
            Self::Fsk(_) => ModemKind::Fsk,
        }
    }

    /// Time on air for a payload in milliseconds
    #[must_use]
    pub fn time_on_air_ms(&self, payload_len: u8) -> u32 {
        match self {
            Self::LoRa(params) => params.time_on_air_ms(payload_len),
            Self::Fsk(params) => params.time_on_air_ms(payload_len),
        }
    }
}

impl Default for Modem {
    fn default() -> Self {
        Self::LoRa(LoRaParams::default())
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Modem {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::LoRa(p) => defmt::write!(f, "{}", p),
            Self::Fsk(p) => defmt::write!(f, "{}", p),
        }
    }
}
