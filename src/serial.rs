//! Serial Transport
//!
//! The forward loop talks to serial through `embedded-io`: `ReadReady` +
//! `Read` for non-blocking intake, `Write` for frame output. On the
//! firmware the bytes travel through a pair of [`SerialPipe`]s filled and
//! drained by the USB CDC task; [`PipeSerial`] is the loop's end.

use core::fmt;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pipe::{Pipe, TryReadError, TryWriteError};
use embedded_io::{ErrorKind, ErrorType, Read, ReadReady, Write, WriteReady};

use crate::config::SERIAL_PIPE_SIZE;

/// Byte pipe between the USB task and the forward loop
pub type SerialPipe = Pipe<CriticalSectionRawMutex, SERIAL_PIPE_SIZE>;

/// Serial output could not be queued
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SerialError {
    /// Not enough room for the whole write
    Overflow {
        /// Bytes requested
        requested: usize,
        /// Bytes free
        free: usize,
    },
}

impl fmt::Display for SerialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overflow { requested, free } => {
                write!(f, "serial output full: {requested} bytes, {free} free")
            }
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for SerialError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Overflow { requested, free } => {
                defmt::write!(f, "Overflow({}/{})", requested, free);
            }
        }
    }
}

impl embedded_io::Error for SerialError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Overflow { .. } => ErrorKind::OutOfMemory,
        }
    }
}

/// Forward loop's end of the serial pipes
///
/// Writes are all-or-nothing so a frame is never split on the wire.
#[derive(Clone, Copy)]
pub struct PipeSerial<'a> {
    rx: &'a SerialPipe,
    tx: &'a SerialPipe,
}

impl<'a> PipeSerial<'a> {
    /// Bytes from the host arrive on `rx`, frames for the host go to `tx`
    #[must_use]
    pub const fn new(rx: &'a SerialPipe, tx: &'a SerialPipe) -> Self {
        Self { rx, tx }
    }

    /// Bytes waiting to be read
    #[must_use]
    pub fn available(&self) -> usize {
        self.rx.len()
    }
}

impl ErrorType for PipeSerial<'_> {
    type Error = SerialError;
}

impl ReadReady for PipeSerial<'_> {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.rx.is_empty())
    }
}

impl Read for PipeSerial<'_> {
    /// Blocks (spins) while the pipe is empty; check `read_ready` first
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            match self.rx.try_read(buf) {
                Ok(n) => return Ok(n),
                Err(TryReadError::Empty) => core::hint::spin_loop(),
            }
        }
    }
}

impl WriteReady for PipeSerial<'_> {
    fn write_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.tx.is_full())
    }
}

impl Write for PipeSerial<'_> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let free = self.tx.free_capacity();
        if buf.len() > free {
            return Err(SerialError::Overflow {
                requested: buf.len(),
                free,
            });
        }
        match self.tx.try_write(buf) {
            Ok(n) => Ok(n),
            Err(TryWriteError::Full) => Err(SerialError::Overflow {
                requested: buf.len(),
                free: 0,
            }),
        }
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
