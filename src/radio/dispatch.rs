//! Event Dispatcher
//!
//! Runs in the radio driver's completion context. Each entry point puts the
//! radio to sleep, builds the frame for the event (if any) and publishes
//! the new state together with that frame as one [`Notification`] on the
//! [`ForwardLink`]. The forward loop takes notifications off the other end,
//! so it never sees a state without its frame or a half-written frame.
//!
//! Entry points never block: a full queue drops the notification and
//! counts it.

use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};

use crate::config::NOTIFICATION_QUEUE_DEPTH;
use crate::protocol::frame::{CapacityExceeded, Frame};
use crate::radio::driver::{Radio, RadioEvents};
use crate::radio::state::{Notification, TxOutcome};

/// Radio-to-loop notification queue
pub type NotificationChannel =
    Channel<CriticalSectionRawMutex, Notification, NOTIFICATION_QUEUE_DEPTH>;

/// Failure to publish a radio event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchError {
    /// Received packet does not fit in a frame; `ReceiveError` was published instead
    Capacity(CapacityExceeded),
    /// Notification queue full; the event was dropped
    QueueFull,
}

impl From<CapacityExceeded> for DispatchError {
    fn from(err: CapacityExceeded) -> Self {
        Self::Capacity(err)
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Capacity(err) => write!(f, "uplink dropped: {err}"),
            Self::QueueFull => f.write_str("notification queue full"),
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for DispatchError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Capacity(err) => defmt::write!(f, "Capacity({})", err),
            Self::QueueFull => defmt::write!(f, "QueueFull"),
        }
    }
}

/// State shared between the completion context and the forward loop
///
/// Lives in a `static` on the firmware; `const`-constructible for that.
pub struct ForwardLink {
    channel: NotificationChannel,
    on_air_ms: AtomicU32,
    dropped: AtomicU32,
}

impl ForwardLink {
    /// Create an empty link
    #[must_use]
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
            on_air_ms: AtomicU32::new(0),
            dropped: AtomicU32::new(0),
        }
    }

    /// Dispatcher publishing onto this link
    #[must_use]
    pub fn dispatcher<R: Radio>(&self, radio: R) -> EventDispatcher<'_, R> {
        EventDispatcher { link: self, radio }
    }

    /// Take the oldest pending notification, if any
    pub fn try_take(&self) -> Option<Notification> {
        self.channel.try_receive().ok()
    }

    /// Check if a notification is waiting
    #[must_use]
    pub fn is_pending(&self) -> bool {
        !self.channel.is_empty()
    }

    /// Record the on-air estimate for the transmission about to start
    pub fn record_on_air(&self, on_air_ms: u32) {
        self.on_air_ms.store(on_air_ms, Ordering::Release);
    }

    /// On-air estimate of the most recent transmission
    #[must_use]
    pub fn last_on_air_ms(&self) -> u32 {
        self.on_air_ms.load(Ordering::Acquire)
    }

    /// Notifications lost to a full queue
    #[must_use]
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn publish(&self, notification: Notification) -> Result<(), DispatchError> {
        let state = notification.state();
        match self.channel.try_send(notification) {
            Ok(()) => {
                trace!("published {:?}", state);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("notification queue full, dropped {:?}", state);
                Err(DispatchError::QueueFull)
            }
        }
    }
}

impl Default for ForwardLink {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns radio completions into published state transitions
pub struct EventDispatcher<'a, R> {
    link: &'a ForwardLink,
    radio: R,
}

impl<R: Radio> EventDispatcher<'_, R> {
    /// Downlink left the antenna: publish `SentDownlink` with an ACK frame
    pub fn on_transmit_complete(&self, on_air_ms: u32) -> Result<(), DispatchError> {
        self.transmit_finished(TxOutcome::Sent, on_air_ms)
    }

    /// Downlink timed out: publish `SendTimeout` with a NACK frame
    pub fn on_transmit_timeout(&self, on_air_ms: u32) -> Result<(), DispatchError> {
        self.transmit_finished(TxOutcome::Timeout, on_air_ms)
    }

    /// Packet received: publish `ReceivedUplink` with its uplink frame
    ///
    /// A packet too large for a frame publishes `ReceiveError` instead, so
    /// the loop still returns to idle and re-arms.
    pub fn on_receive_complete(&self, payload: &[u8], rssi: i16, snr: i8) -> Result<(), DispatchError> {
        self.radio.sleep();
        match Frame::encode_uplink(payload, rssi, snr) {
            Ok(frame) => self.link.publish(Notification::uplink(frame)),
            Err(err) => {
                warn!("uplink of {} bytes dropped: {:?}", payload.len(), err);
                self.link.publish(Notification::receive_error())?;
                Err(err.into())
            }
        }
    }

    /// Receive window closed empty: publish `ReceiveTimeout`
    pub fn on_receive_timeout(&self) -> Result<(), DispatchError> {
        self.radio.sleep();
        self.link.publish(Notification::receive_timeout())
    }

    /// Reception failed: publish `ReceiveError`
    pub fn on_receive_error(&self) -> Result<(), DispatchError> {
        self.radio.sleep();
        self.link.publish(Notification::receive_error())
    }

    fn transmit_finished(&self, outcome: TxOutcome, on_air_ms: u32) -> Result<(), DispatchError> {
        self.radio.sleep();
        let frame = Frame::encode_downlink_ack(outcome, on_air_ms);
        self.link.publish(Notification::downlink_ack(outcome, frame))
    }
}

// Failures are already logged and counted by the entry points
impl<R: Radio> RadioEvents for EventDispatcher<'_, R> {
    fn on_tx_done(&self) {
        let _ = self.on_transmit_complete(self.link.last_on_air_ms());
    }

    fn on_tx_timeout(&self) {
        let _ = self.on_transmit_timeout(self.link.last_on_air_ms());
    }

    fn on_rx_done(&self, payload: &[u8], rssi: i16, snr: i8) {
        let _ = self.on_receive_complete(payload, rssi, snr);
    }

    fn on_rx_timeout(&self) {
        let _ = self.on_receive_timeout();
    }

    fn on_rx_error(&self) {
        let _ = self.on_receive_error();
    }
}
