//! USB CDC ACM Bridge
//!
//! Moves bytes between the CDC ACM endpoints and the [`SerialPipe`]s read
//! and written by the forward loop. Frames are not interpreted here; a
//! frame longer than one packet simply spans several.

use embassy_usb::class::cdc_acm::{Receiver, Sender};
use embassy_usb::driver::{Driver, EndpointError};

use crate::config::{USB_CDC_PACKET_SIZE, USB_PID, USB_VID};
use crate::serial::SerialPipe;

const PACKET_SIZE: usize = USB_CDC_PACKET_SIZE as usize;

/// USB device descriptor strings
pub struct UsbStrings {
    /// Manufacturer name
    pub manufacturer: &'static str,
    /// Product name
    pub product: &'static str,
    /// Serial number
    pub serial: &'static str,
}

impl Default for UsbStrings {
    fn default() -> Self {
        Self {
            manufacturer: "LoRa Packet Forwarder",
            product: "Single-Channel Forwarder",
            serial: "0001",
        }
    }
}

/// USB device info for descriptor
#[derive(Clone, Copy, Debug)]
pub struct UsbDeviceInfo {
    /// Vendor ID
    pub vid: u16,
    /// Product ID
    pub pid: u16,
    /// Device release number
    pub device_release: u16,
    /// Bus current draw in mA
    pub max_power_ma: u16,
}

impl Default for UsbDeviceInfo {
    fn default() -> Self {
        Self {
            vid: USB_VID,
            pid: USB_PID,
            device_release: 0x0100,
            max_power_ma: 100,
        }
    }
}

impl defmt::Format for UsbDeviceInfo {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "USB({:04X}:{:04X})", self.vid, self.pid);
    }
}

/// Build the device configuration for `embassy_usb::Builder`
#[must_use]
pub fn device_config(info: UsbDeviceInfo, strings: &UsbStrings) -> embassy_usb::Config<'static> {
    let mut config = embassy_usb::Config::new(info.vid, info.pid);
    config.device_release = info.device_release;
    config.manufacturer = Some(strings.manufacturer);
    config.product = Some(strings.product);
    config.serial_number = Some(strings.serial);
    config.max_power = info.max_power_ma;
    config.max_packet_size_0 = 64;
    config
}

/// Why a bridge direction stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkDown {
    /// Host closed the port or the bus was reset
    Disconnected,
    /// Host sent a packet larger than the read buffer
    Overflow,
}

impl From<EndpointError> for LinkDown {
    fn from(err: EndpointError) -> Self {
        match err {
            EndpointError::BufferOverflow => Self::Overflow,
            EndpointError::Disabled => Self::Disconnected,
        }
    }
}

impl defmt::Format for LinkDown {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Disconnected => defmt::write!(f, "disconnected"),
            Self::Overflow => defmt::write!(f, "overflow"),
        }
    }
}

/// Copy host packets into `pipe` until the link drops
pub async fn host_to_pipe<'d, D: Driver<'d>>(
    receiver: &mut Receiver<'d, D>,
    pipe: &SerialPipe,
) -> LinkDown {
    let mut packet = [0u8; PACKET_SIZE];
    loop {
        match receiver.read_packet(&mut packet).await {
            Ok(n) => pipe.write_all(&packet[..n]).await,
            Err(e) => return e.into(),
        }
    }
}

/// Copy `pipe` contents to the host until the link drops
pub async fn pipe_to_host<'d, D: Driver<'d>>(
    sender: &mut Sender<'d, D>,
    pipe: &SerialPipe,
) -> LinkDown {
    let mut packet = [0u8; PACKET_SIZE];
    loop {
        let n = pipe.read(&mut packet).await;
        if let Err(e) = sender.write_packet(&packet[..n]).await {
            return e.into();
        }
        // A full packet only ends the transfer once followed by a short one
        if n == PACKET_SIZE && pipe.is_empty() {
            if let Err(e) = sender.write_packet(&[]).await {
                return e.into();
            }
        }
    }
}

/// Run the host-to-forwarder direction forever, across reconnects
pub async fn run_host_to_pipe<'d, D: Driver<'d>>(mut receiver: Receiver<'d, D>, pipe: &SerialPipe) -> ! {
    loop {
        receiver.wait_connection().await;
        info!("usb serial connected");
        let reason = host_to_pipe(&mut receiver, pipe).await;
        warn!("usb serial rx stopped: {}", reason);
    }
}

/// Run the forwarder-to-host direction forever, across reconnects
///
/// Bytes queued while the host is away are discarded on reconnect.
pub async fn run_pipe_to_host<'d, D: Driver<'d>>(mut sender: Sender<'d, D>, pipe: &SerialPipe) -> ! {
    loop {
        sender.wait_connection().await;
        pipe.clear();
        let reason = pipe_to_host(&mut sender, pipe).await;
        warn!("usb serial tx stopped: {}", reason);
    }
}
