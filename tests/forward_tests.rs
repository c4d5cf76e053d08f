//! Forward Loop Tests
//!
//! Drives `Forwarder::poll` against recording mocks of the radio, the
//! serial port, the delay source and the LED.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, OutputPin, StatefulOutputPin};
use embedded_io::{ErrorKind, ErrorType, Read, ReadReady, Write};

use lora_pkt_fwd::config::{RadioConfig, RxSettings, TxSettings, BANNER};
use lora_pkt_fwd::forward::{ForwardStats, Forwarder};
use lora_pkt_fwd::protocol::frame::Frame;
use lora_pkt_fwd::protocol::validator::{FrameValidator, PacketValidator, PolicyValidator};
use lora_pkt_fwd::radio::dispatch::ForwardLink;
use lora_pkt_fwd::radio::driver::{Radio, RadioStatus};
use lora_pkt_fwd::radio::echo::EchoRadio;
use lora_pkt_fwd::radio::state::MachineState;
use lora_pkt_fwd::types::{ModemKind, Region};

// ============================================================================
// Mocks
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
enum Call {
    Init,
    SetChannel(u32),
    SetTx(TxSettings),
    SetRx(RxSettings),
    Receive(u32),
    Send(Vec<u8>),
    Sleep,
    TimeOnAir(ModemKind, u8),
}

struct MockRadio {
    calls: RefCell<Vec<Call>>,
    status: Cell<RadioStatus>,
    on_air_ms: u32,
}

impl MockRadio {
    fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            status: Cell::new(RadioStatus::Idle),
            on_air_ms: 57,
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    fn sent(&self) -> Vec<Vec<u8>> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Call::Send(p) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }

    fn receives(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| matches!(c, Call::Receive(_)))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

impl Radio for MockRadio {
    fn init(&self) {
        self.record(Call::Init);
    }

    fn set_channel(&self, frequency: lora_pkt_fwd::types::Frequency) {
        self.record(Call::SetChannel(frequency.as_hz()));
    }

    fn set_tx_config(&self, settings: &TxSettings) {
        self.record(Call::SetTx(*settings));
    }

    fn set_rx_config(&self, settings: &RxSettings) {
        self.record(Call::SetRx(*settings));
    }

    fn receive(&self, timeout_ms: u32) {
        self.record(Call::Receive(timeout_ms));
    }

    fn send(&self, payload: &[u8]) {
        self.record(Call::Send(payload.to_vec()));
    }

    fn sleep(&self) {
        self.record(Call::Sleep);
    }

    fn status(&self) -> RadioStatus {
        self.status.get()
    }

    fn time_on_air(&self, modem: ModemKind, payload_len: u8) -> u32 {
        self.record(Call::TimeOnAir(modem, payload_len));
        self.on_air_ms
    }
}

#[derive(Default)]
struct MockSerial {
    input: RefCell<VecDeque<u8>>,
    output: RefCell<Vec<u8>>,
    fail_writes: Cell<bool>,
}

impl MockSerial {
    fn feed(&self, bytes: &[u8]) {
        self.input.borrow_mut().extend(bytes);
    }

    fn output(&self) -> Vec<u8> {
        self.output.borrow().clone()
    }

    fn clear_output(&self) {
        self.output.borrow_mut().clear();
    }
}

impl ErrorType for &MockSerial {
    type Error = ErrorKind;
}

impl ReadReady for &MockSerial {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.input.borrow().is_empty())
    }
}

impl Read for &MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut input = self.input.borrow_mut();
        let n = buf.len().min(input.len());
        for (slot, byte) in buf.iter_mut().zip(input.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for &MockSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.fail_writes.get() {
            return Err(ErrorKind::BrokenPipe);
        }
        self.output.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[derive(Default)]
struct MockClock {
    elapsed_ns: Cell<u64>,
}

impl DelayNs for &MockClock {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns.set(self.elapsed_ns.get() + u64::from(ns));
    }
}

#[derive(Default)]
struct MockLed {
    lit: Cell<bool>,
    toggles: Cell<u32>,
}

impl digital::ErrorType for &MockLed {
    type Error = core::convert::Infallible;
}

impl OutputPin for &MockLed {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.lit.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.lit.set(true);
        Ok(())
    }
}

impl StatefulOutputPin for &MockLed {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.lit.get())
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.lit.get())
    }

    fn toggle(&mut self) -> Result<(), Self::Error> {
        self.toggles.set(self.toggles.get() + 1);
        self.lit.set(!self.lit.get());
        Ok(())
    }
}

struct Bench {
    link: ForwardLink,
    radio: MockRadio,
    serial: MockSerial,
    clock: MockClock,
    led: MockLed,
}

impl Bench {
    fn new() -> Self {
        Self {
            link: ForwardLink::new(),
            radio: MockRadio::new(),
            serial: MockSerial::default(),
            clock: MockClock::default(),
            led: MockLed::default(),
        }
    }

    fn forwarder_with<V: PacketValidator>(
        &self,
        validator: V,
    ) -> Forwarder<'_, &MockRadio, &MockSerial, V, &MockClock, &MockLed> {
        Forwarder::new(
            &self.link,
            &self.radio,
            &self.serial,
            validator,
            &self.clock,
            RadioConfig::lora(Region::Eu868),
        )
        .with_indicator(&self.led)
    }

    fn forwarder(&self) -> Forwarder<'_, &MockRadio, &MockSerial, FrameValidator, &MockClock, &MockLed> {
        self.forwarder_with(FrameValidator)
    }
}

fn submission(payload: &[u8]) -> Vec<u8> {
    Frame::encode_uplink(payload, 0, 0).unwrap().as_bytes().to_vec()
}

// ============================================================================
// Start-up Tests
// ============================================================================

#[test]
fn test_start_greets_and_configures() {
    let bench = Bench::new();
    let mut forwarder = bench.forwarder();
    forwarder.start();

    assert_eq!(bench.serial.output(), BANNER);

    let config = RadioConfig::lora(Region::Eu868);
    assert_eq!(
        bench.radio.calls(),
        [
            Call::Init,
            Call::SetChannel(868_000_000),
            Call::SetTx(config.tx_settings()),
            Call::SetRx(config.rx_settings()),
            Call::Receive(1000),
        ]
    );
    assert_eq!(forwarder.state(), MachineState::Idle);
}

// ============================================================================
// Forwarding Action Tests
// ============================================================================

#[test]
fn test_uplink_written_to_serial() {
    let bench = Bench::new();
    let mut forwarder = bench.forwarder();
    bench.radio.status.set(RadioStatus::RxRunning);

    bench
        .link
        .dispatcher(&bench.radio)
        .on_receive_complete(b"hi", -80, 5)
        .unwrap();

    assert_eq!(forwarder.poll(), MachineState::ReceivedUplink);
    assert_eq!(
        bench.serial.output(),
        [0x01, 0x01, 0x00, 0x0C, 0xB0, 0x05, 0x00, 0x00, 0x68, 0x69, 0x0D, 0x0A]
    );
    assert_eq!(forwarder.state(), MachineState::Idle);
    assert_eq!(forwarder.stats().uplinks_forwarded, 1);
}

#[test]
fn test_every_state_returns_to_idle() {
    let bench = Bench::new();
    let mut forwarder = bench.forwarder();
    let dispatcher = bench.link.dispatcher(&bench.radio);

    dispatcher.on_receive_complete(b"up", -70, 2).unwrap();
    assert_eq!(forwarder.poll(), MachineState::ReceivedUplink);
    assert_eq!(forwarder.state(), MachineState::Idle);

    dispatcher.on_receive_timeout().unwrap();
    assert_eq!(forwarder.poll(), MachineState::ReceiveTimeout);
    assert_eq!(forwarder.state(), MachineState::Idle);

    dispatcher.on_receive_error().unwrap();
    assert_eq!(forwarder.poll(), MachineState::ReceiveError);
    assert_eq!(forwarder.state(), MachineState::Idle);

    dispatcher.on_transmit_complete(10).unwrap();
    assert_eq!(forwarder.poll(), MachineState::SentDownlink);
    assert_eq!(forwarder.state(), MachineState::Idle);

    dispatcher.on_transmit_timeout(10).unwrap();
    assert_eq!(forwarder.poll(), MachineState::SendTimeout);
    assert_eq!(forwarder.state(), MachineState::Idle);

    assert_eq!(forwarder.poll(), MachineState::Idle);
}

#[test]
fn test_receive_timeout_writes_nothing() {
    let bench = Bench::new();
    let mut forwarder = bench.forwarder();
    bench.link.dispatcher(&bench.radio).on_receive_timeout().unwrap();

    forwarder.poll();
    assert!(bench.serial.output().is_empty());
    // Re-armed on the following idle iteration
    assert_eq!(bench.radio.receives(), 0);
    forwarder.poll();
    assert_eq!(bench.radio.receives(), 1);
}

#[test]
fn test_sent_downlink_writes_ack_and_toggles_led() {
    let bench = Bench::new();
    let mut forwarder = bench.forwarder();
    bench
        .link
        .dispatcher(&bench.radio)
        .on_transmit_complete(123)
        .unwrap();

    assert_eq!(forwarder.poll(), MachineState::SentDownlink);
    let ack = Frame::decode(&bench.serial.output()).unwrap();
    assert_eq!(ack.payload(), b"ACK");
    assert_eq!(ack.metadata(), [0, 0, 0, 0x7B]);
    assert_eq!(bench.led.toggles.get(), 1);
    assert_eq!(forwarder.stats().acks_forwarded, 1);
}

#[test]
fn test_send_timeout_writes_nack() {
    let bench = Bench::new();
    let mut forwarder = bench.forwarder();
    bench
        .link
        .dispatcher(&bench.radio)
        .on_transmit_timeout(900)
        .unwrap();

    assert_eq!(forwarder.poll(), MachineState::SendTimeout);
    let nack = Frame::decode(&bench.serial.output()).unwrap();
    assert_eq!(nack.payload(), b"NACK");
    assert_eq!(nack.on_air_ms(), 900);
    assert_eq!(bench.led.toggles.get(), 0);
}

#[test]
fn test_one_notification_per_iteration() {
    let bench = Bench::new();
    let mut forwarder = bench.forwarder();
    let dispatcher = bench.link.dispatcher(&bench.radio);
    dispatcher.on_receive_complete(b"a", -50, 1).unwrap();
    dispatcher.on_receive_complete(b"b", -50, 1).unwrap();

    forwarder.poll();
    assert_eq!(Frame::decode(&bench.serial.output()).unwrap().payload(), b"a");
    bench.serial.clear_output();

    forwarder.poll();
    assert_eq!(Frame::decode(&bench.serial.output()).unwrap().payload(), b"b");
}

#[test]
fn test_serial_failure_is_not_fatal() {
    let bench = Bench::new();
    let mut forwarder = bench.forwarder();
    bench.serial.fail_writes.set(true);
    bench
        .link
        .dispatcher(&bench.radio)
        .on_receive_complete(b"lost", -50, 1)
        .unwrap();

    assert_eq!(forwarder.poll(), MachineState::ReceivedUplink);
    assert_eq!(forwarder.state(), MachineState::Idle);
    assert_eq!(
        forwarder.stats(),
        ForwardStats {
            serial_errors: 1,
            ..ForwardStats::default()
        }
    );
}

// ============================================================================
// Re-arm Tests
// ============================================================================

#[test]
fn test_idle_rearms_when_radio_idle() {
    let bench = Bench::new();
    let mut forwarder = bench.forwarder();
    forwarder.poll();
    assert_eq!(bench.radio.calls(), [Call::Receive(1000)]);
}

#[test]
fn test_idle_leaves_busy_radio_alone() {
    let bench = Bench::new();
    let mut forwarder = bench.forwarder();
    bench.radio.status.set(RadioStatus::RxRunning);
    forwarder.poll();
    forwarder.poll();
    assert_eq!(bench.radio.receives(), 0);
}

// ============================================================================
// Downlink Intake Tests
// ============================================================================

#[test]
fn test_valid_submission_transmitted() {
    let bench = Bench::new();
    let mut forwarder = bench.forwarder();
    bench.radio.status.set(RadioStatus::RxRunning);
    bench.serial.feed(&submission(b"downlink"));

    forwarder.poll();

    assert_eq!(
        bench.radio.calls(),
        [
            Call::TimeOnAir(ModemKind::LoRa, 8),
            Call::Send(b"downlink".to_vec()),
        ]
    );
    assert!(bench.clock.elapsed_ns.get() >= 1_000_000);
    assert_eq!(bench.link.last_on_air_ms(), 57);
    assert_eq!(forwarder.pending_bytes(), 0);
    assert_eq!(forwarder.stats().downlinks_sent, 1);
}

#[test]
fn test_plain_text_rejected() {
    let bench = Bench::new();
    let mut forwarder = bench.forwarder();
    bench.serial.feed(b"not a frame\r\n");

    forwarder.poll();

    assert!(bench.radio.sent().is_empty());
    assert_eq!(bench.clock.elapsed_ns.get(), 0);
    assert_eq!(forwarder.pending_bytes(), 0);
    assert_eq!(forwarder.stats().downlinks_rejected, 1);
}

#[test]
fn test_truncated_submission_never_transmitted() {
    let bench = Bench::new();
    let mut forwarder = bench.forwarder();

    // Declares 50 bytes, only 30 arrive
    let mut full = vec![0x01, 0x01, 0x00, 50, 0, 0, 0, 0];
    full.extend_from_slice(&[0x55; 40]);
    full.extend_from_slice(b"\r\n");
    bench.serial.feed(&full[..30]);

    forwarder.poll();
    assert_eq!(forwarder.pending_bytes(), 30);

    // Nothing more arrives: dropped
    forwarder.poll();
    assert!(bench.radio.sent().is_empty());
    assert_eq!(forwarder.pending_bytes(), 0);
    assert_eq!(forwarder.stats().downlinks_rejected, 1);
}

#[test]
fn test_split_submission_reassembled() {
    let bench = Bench::new();
    let mut forwarder = bench.forwarder();
    let bytes = submission(&[0x42; 100]);

    bench.serial.feed(&bytes[..64]);
    forwarder.poll();
    assert!(bench.radio.sent().is_empty());

    bench.serial.feed(&bytes[64..]);
    forwarder.poll();
    assert_eq!(bench.radio.sent(), [vec![0x42; 100]]);
}

#[test]
fn test_oversized_submission_discarded() {
    let bench = Bench::new();
    let mut forwarder = bench.forwarder();
    bench.serial.feed(&[0x01; 300]);

    forwarder.poll();

    assert!(bench.radio.sent().is_empty());
    assert!(bench.serial.input.borrow().is_empty());
    assert_eq!(forwarder.pending_bytes(), 0);
    assert_eq!(forwarder.stats().downlinks_rejected, 1);
}

#[test]
fn test_policy_rejection_blocks_transmit() {
    let bench = Bench::new();
    let mut forwarder = bench.forwarder_with(PolicyValidator::new(|f: &Frame| f.payload() != b"deny"));

    bench.serial.feed(&submission(b"deny"));
    forwarder.poll();
    assert!(bench.radio.sent().is_empty());

    bench.serial.feed(&submission(b"allow"));
    forwarder.poll();
    assert_eq!(bench.radio.sent(), [b"allow".to_vec()]);
}

// ============================================================================
// Loopback Round Trip
// ============================================================================

#[test]
fn test_round_trip_through_echo_radio() {
    let link = ForwardLink::new();
    let radio = EchoRadio::new();
    let serial = MockSerial::default();
    let clock = MockClock::default();
    let led = MockLed::default();
    let dispatcher = link.dispatcher(&radio);

    let mut forwarder = Forwarder::new(
        &link,
        &radio,
        &serial,
        FrameValidator,
        &clock,
        RadioConfig::default(),
    )
    .with_indicator(&led);

    forwarder.start();
    // First window closes empty
    radio.service(&dispatcher);
    assert_eq!(forwarder.poll(), MachineState::ReceiveTimeout);
    serial.clear_output();

    serial.feed(&submission(b"echo me"));
    forwarder.poll();
    assert_eq!(radio.sent(), 1);

    // Transmission completes: ACK with the estimate recorded before sending
    radio.service(&dispatcher);
    assert_eq!(forwarder.poll(), MachineState::SentDownlink);
    let ack = Frame::decode(&serial.output()).unwrap();
    assert_eq!(ack.payload(), b"ACK");
    assert_eq!(ack.on_air_ms(), radio.time_on_air(ModemKind::LoRa, 7));
    assert_eq!(led.toggles.get(), 1);
    serial.clear_output();

    // Idle iteration re-arms; the echo comes back as an uplink
    forwarder.poll();
    radio.service(&dispatcher);
    assert_eq!(forwarder.poll(), MachineState::ReceivedUplink);
    let uplink = Frame::decode(&serial.output()).unwrap();
    assert_eq!(uplink.payload(), b"echo me");
    assert_eq!(uplink.rssi(), -30);
}
