//! Serial driver for low-level vehicle controller communication
//!
//! Write-only, line-oriented I/O with the vehicle microcontroller. The
//! firmware never answers, so there is no read path.

use async_trait::async_trait;
use rcfleet_core::{FleetError, Result};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, error};

/// Line terminator expected by the firmware
pub const LINE_TERMINATOR: &str = "\n";

/// Trait for serial transport abstraction
///
/// Lets the link manager run against an in-memory connection in tests and in
/// mock mode.
#[async_trait]
pub trait SerialTransport: Send {
    /// Write one line; the terminator is appended by the transport
    async fn write_line(&mut self, line: &str) -> Result<()>;

    /// Device path this transport is bound to
    fn port_path(&self) -> &str;
}

/// Opens transports for a device path
///
/// Separated from the link manager so discovery, caching and reopen logic can
/// be tested without hardware.
#[async_trait]
pub trait TransportOpener: Send + Sync {
    async fn open(&self, path: &str, baud_rate: u32) -> Result<Box<dyn SerialTransport>>;
}

/// Serial driver for hardware communication
pub struct SerialDriver {
    port: SerialStream,
    port_path: String,
    timeout_duration: Duration,
    debug_uart: bool,
}

impl SerialDriver {
    /// Open a serial device at 8N1 with no flow control
    ///
    /// # Arguments
    /// * `port_path` - Path to the serial device (e.g., "/dev/ttyACM0")
    /// * `baud_rate` - Line speed; must match the firmware
    /// * `write_timeout` - Bound on each write and flush
    /// * `debug_uart` - Log every transmitted line
    pub fn open(
        port_path: &str,
        baud_rate: u32,
        write_timeout: Duration,
        debug_uart: bool,
    ) -> Result<Self> {
        debug!("Opening serial port: {} @ {} baud", port_path, baud_rate);

        let port = tokio_serial::new(port_path, baud_rate)
            .timeout(write_timeout)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| {
                error!("Failed to open serial port {}: {}", port_path, e);
                FleetError::LinkUnavailable(format!("Failed to open {}: {}", port_path, e))
            })?;

        debug!("Serial port opened successfully");

        Ok(Self {
            port,
            port_path: port_path.to_string(),
            timeout_duration: write_timeout,
            debug_uart,
        })
    }
}

#[async_trait]
impl SerialTransport for SerialDriver {
    async fn write_line(&mut self, line: &str) -> Result<()> {
        let frame = format!("{}{}", line, LINE_TERMINATOR);

        if self.debug_uart {
            debug!("TX: {:?}", frame);
        }

        timeout(self.timeout_duration, self.port.write_all(frame.as_bytes()))
            .await
            .map_err(|_| {
                error!("Write timeout on {}", self.port_path);
                FleetError::LinkUnavailable("Write operation timed out".to_string())
            })?
            .map_err(|e| {
                error!("Write failed on {}: {}", self.port_path, e);
                FleetError::LinkUnavailable(format!("Write failed: {}", e))
            })?;

        timeout(self.timeout_duration, self.port.flush())
            .await
            .map_err(|_| FleetError::LinkUnavailable("Flush operation timed out".to_string()))?
            .map_err(|e| FleetError::LinkUnavailable(format!("Flush failed: {}", e)))?;

        Ok(())
    }

    fn port_path(&self) -> &str {
        &self.port_path
    }
}

/// Opens real serial devices
#[derive(Debug, Clone)]
pub struct SerialDriverOpener {
    write_timeout: Duration,
    debug_uart: bool,
}

impl SerialDriverOpener {
    pub fn new(write_timeout: Duration, debug_uart: bool) -> Self {
        Self {
            write_timeout,
            debug_uart,
        }
    }
}

#[async_trait]
impl TransportOpener for SerialDriverOpener {
    async fn open(&self, path: &str, baud_rate: u32) -> Result<Box<dyn SerialTransport>> {
        let driver = SerialDriver::open(path, baud_rate, self.write_timeout, self.debug_uart)?;
        Ok(Box::new(driver))
    }
}
