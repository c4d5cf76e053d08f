//! LoRa Packet Forwarder Bench Firmware
//!
//! Entry point for the STM32G474 build. Bridges the USB CDC serial port to
//! the loopback radio: frames written by the host are validated and
//! "transmitted", acknowledged, then come back as uplinks.

#![no_std]
#![no_main]

use defmt::info;
use embassy_executor::Spawner;
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_stm32::usb::{self, Driver};
use embassy_stm32::{bind_interrupts, peripherals};
use embassy_time::Delay;
use embassy_usb::class::cdc_acm::{CdcAcmClass, Receiver, Sender, State};
use embassy_usb::{Builder, UsbDevice};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use lora_pkt_fwd::prelude::*;
use lora_pkt_fwd::usb::cdc::{self, UsbDeviceInfo, UsbStrings};

// Bind interrupt handlers
bind_interrupts!(struct Irqs {
    USB_LP => usb::InterruptHandler<peripherals::USB>;
});

type UsbDriver = Driver<'static, peripherals::USB>;

static LINK: ForwardLink = ForwardLink::new();
static RADIO: EchoRadio = EchoRadio::new();
static HOST_TO_RADIO: SerialPipe = SerialPipe::new();
static RADIO_TO_HOST: SerialPipe = SerialPipe::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("LoRa packet forwarder v{}", env!("CARGO_PKG_VERSION"));

    // USB needs a 48 MHz clock; HSI48 trimmed from USB SOF
    let mut config = embassy_stm32::Config::default();
    {
        use embassy_stm32::rcc::{mux, Hsi48Config};
        config.rcc.hsi48 = Some(Hsi48Config { sync_from_usb: true });
        config.rcc.mux.clk48sel = mux::Clk48sel::HSI48;
    }
    let p = embassy_stm32::init(config);

    info!("Peripherals initialized");

    // Status LED (PA5 on Nucleo boards), toggled per completed downlink
    let led = Output::new(p.PA5, Level::Low, Speed::Low);

    // PA12 = D+, PA11 = D-
    let driver = Driver::new(p.USB, Irqs, p.PA12, p.PA11);

    static CONFIG_DESC: StaticCell<[u8; 256]> = StaticCell::new();
    static BOS_DESC: StaticCell<[u8; 256]> = StaticCell::new();
    static CONTROL_BUF: StaticCell<[u8; 64]> = StaticCell::new();
    static CDC_STATE: StaticCell<State> = StaticCell::new();

    let info = UsbDeviceInfo::default();
    let mut builder = Builder::new(
        driver,
        cdc::device_config(info, &UsbStrings::default()),
        CONFIG_DESC.init([0; 256]),
        BOS_DESC.init([0; 256]),
        &mut [],
        CONTROL_BUF.init([0; 64]),
    );
    let class = CdcAcmClass::new(&mut builder, CDC_STATE.init(State::new()), USB_CDC_PACKET_SIZE);
    let (sender, receiver) = class.split();
    let device = builder.build();

    info!("{} ready", info);

    spawner.spawn(usb_task(device)).unwrap();
    spawner.spawn(host_rx_task(receiver)).unwrap();
    spawner.spawn(host_tx_task(sender)).unwrap();
    spawner.spawn(radio_task()).unwrap();
    spawner.spawn(forward_task(led)).unwrap();

    info!("Tasks spawned");
}

/// USB device state machine
#[embassy_executor::task]
async fn usb_task(mut device: UsbDevice<'static, UsbDriver>) -> ! {
    device.run().await
}

/// Host to forwarder bytes
#[embassy_executor::task]
async fn host_rx_task(receiver: Receiver<'static, UsbDriver>) -> ! {
    cdc::run_host_to_pipe(receiver, &HOST_TO_RADIO).await
}

/// Forwarder to host bytes
#[embassy_executor::task]
async fn host_tx_task(sender: Sender<'static, UsbDriver>) -> ! {
    cdc::run_pipe_to_host(sender, &RADIO_TO_HOST).await
}

/// Completion context: delivers loopback radio events to the dispatcher
#[embassy_executor::task]
async fn radio_task() -> ! {
    let dispatcher = LINK.dispatcher(&RADIO);
    loop {
        RADIO.service(&dispatcher);
        Timer::after(Duration::from_millis(ECHO_SERVICE_MS)).await;
    }
}

/// Forward loop
#[embassy_executor::task]
async fn forward_task(led: Output<'static>) -> ! {
    let serial = PipeSerial::new(&HOST_TO_RADIO, &RADIO_TO_HOST);
    let mut forwarder = Forwarder::new(
        &LINK,
        &RADIO,
        serial,
        FrameValidator,
        Delay,
        RadioConfig::default(),
    )
    .with_indicator(led);

    forwarder.start();
    loop {
        forwarder.poll();
        Timer::after(Duration::from_millis(POLL_INTERVAL_MS)).await;
    }
}
