//! Single-Channel LoRa Packet Forwarder Library
//!
//! Bridges a half-duplex radio transceiver and a serial link. Packets heard
//! over the air are wrapped in a small binary frame and written to serial
//! (uplink); frames submitted over serial are validated and their payload
//! transmitted (downlink), with an ACK or NACK frame reporting the outcome.
//!
//! # Architecture
//!
//! ```text
//!  radio completion context              forward loop context
//! ┌──────────────────────────┐        ┌─────────────────────────────┐
//! │  Radio driver callbacks  │        │  Forwarder::poll            │
//! │           │              │        │   ├─ forward notification ──┼──► serial
//! │           ▼              │ Notifi-│   │                         │
//! │  EventDispatcher ────────┼─cation─┼──►│                         │
//! │   (sleep, encode frame)  │ queue  │   └─ intake ◄───────────────┼─── serial
//! └──────────────────────────┘        │      validate, decode, send │
//!                                     └─────────────────────────────┘
//! ```
//!
//! A state transition and the frame it produced travel together as one
//! [`radio::state::Notification`] through a bounded queue, so the loop
//! never observes one without the other.
//!
//! # Design Principles
//!
//! - **Bounded buffers**: every frame write is capacity-checked
//! - **Type-driven design**: custom types enforce invariants at compile time
//! - **No unsafe in application code**
//! - **Nothing fatal**: every error path returns the machine to `Idle`

#![cfg_attr(feature = "embedded", no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Re-export dependencies needed by applications (only in embedded mode)
#[cfg(feature = "embedded")]
pub use embassy_executor;
#[cfg(feature = "embedded")]
pub use embassy_stm32;
#[cfg(feature = "embedded")]
pub use embassy_time;
#[cfg(feature = "embedded")]
pub use embassy_usb;

// Must come first so the logging macros are visible below
#[macro_use]
mod fmt;

/// Radio Side
///
/// State machine, driver contract, event dispatch and the loopback radio.
pub mod radio;

/// Serial Framing
///
/// Frame codec and the downlink validator.
pub mod protocol;

/// Forward Loop
pub mod forward;

/// Serial transport over byte pipes
pub mod serial;

/// USB Subsystem
///
/// CDC ACM bridge between the host and the serial pipes.
#[cfg(feature = "embedded")]
pub mod usb;

/// Shared types used across modules
pub mod types;

/// System configuration and constants
pub mod config;

/// Prelude module for common imports
pub mod prelude {
    //! Convenient re-exports for common types and traits.

    pub use crate::config::*;
    pub use crate::types::*;

    pub use crate::forward::{ForwardStats, Forwarder, NoIndicator};
    pub use crate::protocol::frame::{CapacityExceeded, Frame, FrameError};
    pub use crate::protocol::validator::{
        FrameValidator, PacketValidator, PolicyValidator, ValidationError,
    };
    pub use crate::radio::dispatch::{DispatchError, EventDispatcher, ForwardLink};
    pub use crate::radio::driver::{Radio, RadioEvents, RadioStatus};
    pub use crate::radio::echo::EchoRadio;
    pub use crate::radio::state::{MachineState, Notification, TxOutcome};
    pub use crate::serial::{PipeSerial, SerialError, SerialPipe};

    // Common traits
    pub use embedded_hal::delay::DelayNs;
    pub use embedded_hal::digital::StatefulOutputPin;

    // Embassy
    #[cfg(feature = "embedded")]
    pub use embassy_time::{Duration, Instant, Timer};

    // Error handling
    pub use core::result::Result;
}
