//! Forward Loop
//!
//! The single control loop of the forwarder. Each [`Forwarder::poll`]:
//!
//! 1. takes at most one [`Notification`] off the [`ForwardLink`] and
//!    performs its forwarding action (frame to serial, or nothing), then
//!    returns to `Idle`; when already idle, re-arms reception if the radio
//!    is idle too
//! 2. drains whatever the host has written to serial into the downlink
//!    buffer
//! 3. validates and decodes a non-empty submission and puts its payload on
//!    the air after a short settle delay
//!
//! A submission that is a truncated frame is carried into the next
//! iteration as long as that iteration brings more bytes. The first
//! iteration that brings none submits it as it stands, so a short frame
//! is rejected rather than waited on forever.
//!
//! Nothing here is fatal. Rejected input, serial write failures and radio
//! timeouts are logged, counted and the loop carries on.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, StatefulOutputPin};
use embedded_io::{Read, ReadReady, Write};

use crate::config::{RadioConfig, BANNER, FRAME_CAPACITY, SETTLE_DELAY_MS};
use crate::protocol::frame::{Frame, FrameError};
use crate::protocol::validator::{PacketValidator, ValidationError};
use crate::radio::dispatch::ForwardLink;
use crate::radio::driver::Radio;
use crate::radio::state::{MachineState, Notification};

/// Activity indicator for boards without one
#[derive(Clone, Copy, Debug, Default)]
pub struct NoIndicator {
    lit: bool,
}

impl digital::ErrorType for NoIndicator {
    type Error = core::convert::Infallible;
}

impl digital::OutputPin for NoIndicator {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.lit = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.lit = true;
        Ok(())
    }
}

impl StatefulOutputPin for NoIndicator {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.lit)
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.lit)
    }
}

/// Running totals kept by the forward loop
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ForwardStats {
    /// Uplink frames written to serial
    pub uplinks_forwarded: u32,
    /// ACK and NACK frames written to serial
    pub acks_forwarded: u32,
    /// Downlinks handed to the radio
    pub downlinks_sent: u32,
    /// Serial submissions dropped by the validator or the decoder
    pub downlinks_rejected: u32,
    /// Frames lost to serial write failures
    pub serial_errors: u32,
}

#[cfg(feature = "embedded")]
impl defmt::Format for ForwardStats {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "up={} ack={} down={} rejected={} serial_err={}",
            self.uplinks_forwarded,
            self.acks_forwarded,
            self.downlinks_sent,
            self.downlinks_rejected,
            self.serial_errors
        );
    }
}

/// The forwarder's control loop and everything it owns
pub struct Forwarder<'a, R, S, V, D, L = NoIndicator> {
    link: &'a ForwardLink,
    radio: R,
    serial: S,
    validator: V,
    delay: D,
    indicator: L,
    config: RadioConfig,
    state: MachineState,
    downlink: [u8; FRAME_CAPACITY],
    received: usize,
    overrun: bool,
    stats: ForwardStats,
}

impl<'a, R, S, V, D> Forwarder<'a, R, S, V, D>
where
    R: Radio,
    S: Read + ReadReady + Write,
    V: PacketValidator,
    D: DelayNs,
{
    /// Create a forwarder without an activity indicator
    pub fn new(
        link: &'a ForwardLink,
        radio: R,
        serial: S,
        validator: V,
        delay: D,
        config: RadioConfig,
    ) -> Self {
        Self {
            link,
            radio,
            serial,
            validator,
            delay,
            indicator: NoIndicator::default(),
            config,
            state: MachineState::Idle,
            downlink: [0; FRAME_CAPACITY],
            received: 0,
            overrun: false,
            stats: ForwardStats::default(),
        }
    }

    /// Toggle `indicator` on every completed downlink
    pub fn with_indicator<L: StatefulOutputPin>(self, indicator: L) -> Forwarder<'a, R, S, V, D, L> {
        Forwarder {
            link: self.link,
            radio: self.radio,
            serial: self.serial,
            validator: self.validator,
            delay: self.delay,
            indicator,
            config: self.config,
            state: self.state,
            downlink: self.downlink,
            received: self.received,
            overrun: self.overrun,
            stats: self.stats,
        }
    }
}

impl<R, S, V, D, L> Forwarder<'_, R, S, V, D, L>
where
    R: Radio,
    S: Read + ReadReady + Write,
    V: PacketValidator,
    D: DelayNs,
    L: StatefulOutputPin,
{
    /// Greet the host, configure the radio and open the first receive window
    pub fn start(&mut self) {
        self.write_serial(BANNER);

        self.radio.init();
        self.radio.set_channel(self.config.channel());
        self.radio.set_tx_config(&self.config.tx_settings());
        self.radio.set_rx_config(&self.config.rx_settings());

        info!(
            "forwarding on {:?}, {:?}",
            self.config.channel(),
            self.config.modem()
        );

        self.radio.receive(self.config.rx_timeout_ms());
    }

    /// Run one loop iteration, returning the state that was handled
    pub fn poll(&mut self) -> MachineState {
        let handled = self.forward_pending();
        self.intake();
        handled
    }

    /// Run forever
    pub fn run(&mut self) -> ! {
        self.start();
        loop {
            self.poll();
        }
    }

    /// Current state; `Idle` between iterations
    pub fn state(&self) -> MachineState {
        self.state
    }

    /// Running totals
    pub fn stats(&self) -> ForwardStats {
        self.stats
    }

    /// Radio configuration in use
    pub fn config(&self) -> &RadioConfig {
        &self.config
    }

    /// Bytes held in the downlink buffer
    ///
    /// Non-zero between iterations only while a partial frame is held.
    pub fn pending_bytes(&self) -> usize {
        self.received
    }

    /// Activity indicator
    pub fn indicator(&mut self) -> &mut L {
        &mut self.indicator
    }

    fn forward_pending(&mut self) -> MachineState {
        let frame = self.link.try_take().and_then(|notification: Notification| {
            let (state, frame) = notification.into_parts();
            self.state = state;
            frame
        });

        let handled = self.state;
        match handled {
            MachineState::ReceivedUplink => {
                if let Some(frame) = frame {
                    if self.forward_frame(frame) {
                        self.stats.uplinks_forwarded = self.stats.uplinks_forwarded.wrapping_add(1);
                    }
                }
            }
            MachineState::ReceiveTimeout | MachineState::ReceiveError => {
                trace!("{:?}", handled);
            }
            MachineState::SentDownlink | MachineState::SendTimeout => {
                if handled == MachineState::SentDownlink {
                    if let Err(e) = self.indicator.toggle() {
                        warn!("indicator: {:?}", digital::Error::kind(&e));
                    }
                }
                if let Some(frame) = frame {
                    if self.forward_frame(frame) {
                        self.stats.acks_forwarded = self.stats.acks_forwarded.wrapping_add(1);
                    }
                }
            }
            MachineState::Idle => {
                if self.radio.status().is_idle() {
                    self.radio.receive(self.config.rx_timeout_ms());
                }
            }
        }

        self.state = MachineState::Idle;
        handled
    }

    /// Write a frame to serial and wipe it; `true` if written
    fn forward_frame(&mut self, mut frame: Frame) -> bool {
        debug!("forwarding {:?}", frame);
        let written = self.write_serial(frame.as_bytes());
        frame.clear();
        written
    }

    fn write_serial(&mut self, bytes: &[u8]) -> bool {
        match self.serial.write_all(bytes) {
            Ok(()) => true,
            Err(e) => {
                self.stats.serial_errors = self.stats.serial_errors.wrapping_add(1);
                warn!(
                    "serial write of {} bytes failed: {:?}",
                    bytes.len(),
                    embedded_io::Error::kind(&e)
                );
                false
            }
        }
    }

    fn intake(&mut self) {
        let fresh = self.read_serial();
        if self.received == 0 {
            return;
        }
        // A frame split across USB packets is held while it keeps growing
        if fresh > 0 && !self.overrun && self.is_partial() {
            trace!("holding {} byte partial frame", self.received);
            return;
        }

        if self.overrun {
            warn!("downlink submission exceeds {} bytes, dropped", FRAME_CAPACITY);
            self.stats.downlinks_rejected = self.stats.downlinks_rejected.wrapping_add(1);
        } else {
            match self.check_submission() {
                Ok(frame) => self.transmit(frame.payload()),
                Err(e) => {
                    warn!("downlink rejected: {:?}", e);
                    self.stats.downlinks_rejected = self.stats.downlinks_rejected.wrapping_add(1);
                }
            }
        }

        self.downlink.fill(0);
        self.received = 0;
        self.overrun = false;
    }

    /// Drain serial without blocking; returns the number of bytes read
    fn read_serial(&mut self) -> usize {
        let mut fresh = 0;
        loop {
            match self.serial.read_ready() {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    warn!("serial poll failed: {:?}", embedded_io::Error::kind(&e));
                    break;
                }
            }

            // Anything past capacity can't be a frame: swallow it and drop
            // the whole submission.
            let mut discard = [0u8; 32];
            let buf = if self.received < FRAME_CAPACITY {
                &mut self.downlink[self.received..]
            } else {
                &mut discard[..]
            };

            match self.serial.read(buf) {
                Ok(0) => break,
                Ok(n) => {
                    fresh += n;
                    if self.received < FRAME_CAPACITY {
                        self.received += n;
                    } else {
                        self.overrun = true;
                    }
                }
                Err(e) => {
                    warn!("serial read failed: {:?}", embedded_io::Error::kind(&e));
                    break;
                }
            }
        }
        fresh
    }

    fn is_partial(&self) -> bool {
        matches!(
            Frame::decode(&self.downlink[..self.received]),
            Err(FrameError::Truncated { .. })
        )
    }

    fn check_submission(&self) -> Result<Frame, ValidationError> {
        let submission = &self.downlink[..self.received];
        self.validator.validate(submission)?;
        Ok(Frame::decode(submission)?)
    }

    fn transmit(&mut self, payload: &[u8]) {
        self.delay.delay_ms(SETTLE_DELAY_MS);

        // Decoded payloads are at most MAX_PAYLOAD_LEN bytes
        let len = u8::try_from(payload.len()).unwrap_or(u8::MAX);
        let on_air_ms = self.radio.time_on_air(self.config.modem().kind(), len);
        self.link.record_on_air(on_air_ms);

        debug!("transmitting {} bytes, ~{} ms on air", payload.len(), on_air_ms);
        self.radio.send(payload);
        self.stats.downlinks_sent = self.stats.downlinks_sent.wrapping_add(1);
    }
}
