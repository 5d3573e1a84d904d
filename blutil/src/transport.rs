//! Byte-oriented serial channel.
//!
//! [`Transport`] layers the few primitives the AT protocol needs on top of a
//! [`Port`]: single-byte reads with a deadline, bounded bulk reads, and the
//! DTR reset pulse.

use crate::error::Result;
use crate::port::Port;
use log::trace;
use std::io::ErrorKind;
use std::thread;
use std::time::{Duration, Instant};

/// Default read timeout of the channel.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(800);

/// Time DTR is held low during a reset pulse.
pub const RESET_SETTLE: Duration = Duration::from_millis(100);

/// Serial channel owning its port.
pub struct Transport<P: Port> {
    port: P,
}

impl<P: Port> Transport<P> {
    /// Wrap an already opened port.
    pub fn new(port: P) -> Self {
        Self { port }
    }

    /// Get a reference to the underlying port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Get a mutable reference to the underlying port.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Consume the transport and return the underlying port.
    pub fn into_port(self) -> P {
        self.port
    }

    /// Write all bytes and flush.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        trace!("TX {:?}", String::from_utf8_lossy(bytes));
        self.port
            .write_all_bytes(bytes)
    }

    /// Read a single byte, waiting at most `timeout`.
    ///
    /// Returns `None` when the wait expired without data.
    pub fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>> {
        if timeout.is_zero() {
            return Ok(None);
        }
        self.port
            .set_timeout(timeout)?;

        let mut buf = [0u8; 1];
        match self
            .port
            .read(&mut buf)
        {
            Ok(1) => Ok(Some(buf[0])),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Read until `max` bytes have arrived or `timeout` has elapsed.
    ///
    /// The result may be empty.
    pub fn read_up_to(&mut self, max: usize, timeout: Duration) -> Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        let mut data = Vec::with_capacity(max.min(1024));
        let mut buf = [0u8; 256];

        while data.len() < max {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            self.port
                .set_timeout(remaining)?;

            let want = buf
                .len()
                .min(max - data.len());
            match self
                .port
                .read(&mut buf[..want])
            {
                Ok(0) => break,
                Ok(n) => data.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::TimedOut => break,
                Err(e) => return Err(e.into()),
            }
        }

        trace!("RX {:?}", String::from_utf8_lossy(&data));
        Ok(data)
    }

    /// Pulse DTR low then high to hardware-reset the module.
    pub fn assert_reset(&mut self) -> Result<()> {
        self.port
            .set_dtr(false)?;
        thread::sleep(RESET_SETTLE);
        self.port
            .set_dtr(true)
    }

    /// Drop anything buffered in either direction.
    pub fn discard_input(&mut self) -> Result<()> {
        self.port
            .clear_buffers()
    }
}

#[cfg(feature = "native")]
mod native_impl {
    use super::{DEFAULT_TIMEOUT, Result, Transport};
    use crate::port::{NativePort, SerialConfig};
    use log::debug;

    impl Transport<NativePort> {
        /// Open `port_name` at `baud_rate` with the default channel timeout.
        pub fn open(port_name: &str, baud_rate: u32) -> Result<Self> {
            let config = SerialConfig::new(port_name, baud_rate).with_timeout(DEFAULT_TIMEOUT);
            let port = NativePort::open(&config)?;
            debug!("Opened {port_name} at {baud_rate} baud");
            Ok(Self::new(port))
        }
    }
}
