//! In-memory link for running without hardware
//!
//! [`LoggingOpener`] backs the daemon's `--mock` mode: lines are logged and
//! nothing is kept. [`MockOpener`] is for tests; it records every open and
//! every byte written so tests can assert on the exact wire output, and can
//! be told to fail the next open or write.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rcfleet_core::{FleetError, Result, SerialEndpoint};
use tracing::info;

use crate::port_resolver::EndpointSource;
use crate::serial_driver::{SerialTransport, TransportOpener, LINE_TERMINATOR};

/// Path reported by the mock endpoint source
pub const MOCK_ENDPOINT_PATH: &str = "mock://rc0";

/// Fixed endpoint list
#[derive(Debug, Clone, Default)]
pub struct StaticEndpoints {
    endpoints: Vec<SerialEndpoint>,
}

impl StaticEndpoints {
    pub fn new(endpoints: Vec<SerialEndpoint>) -> Self {
        Self { endpoints }
    }

    /// A single endpoint that looks like a vehicle controller
    pub fn mock_controller() -> Self {
        Self::new(vec![SerialEndpoint::new(MOCK_ENDPOINT_PATH)
            .with_description("Mock Arduino vehicle controller")
            .with_manufacturer("rcfleet")])
    }
}

impl EndpointSource for StaticEndpoints {
    fn enumerate(&self) -> Result<Vec<SerialEndpoint>> {
        Ok(self.endpoints.clone())
    }
}

/// Opens connections that log each line and keep nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingOpener;

#[async_trait]
impl TransportOpener for LoggingOpener {
    async fn open(&self, path: &str, baud_rate: u32) -> Result<Box<dyn SerialTransport>> {
        info!("Mock link opened on {} @ {} baud", path, baud_rate);
        Ok(Box::new(LoggingConnection {
            path: path.to_string(),
        }))
    }
}

struct LoggingConnection {
    path: String,
}

#[async_trait]
impl SerialTransport for LoggingConnection {
    async fn write_line(&mut self, line: &str) -> Result<()> {
        info!("Mock TX on {}: {}", self.path, line);
        Ok(())
    }

    fn port_path(&self) -> &str {
        &self.path
    }
}

#[derive(Default)]
struct MockWire {
    bytes: Mutex<String>,
    opened: Mutex<Vec<String>>,
    fail_next_write: AtomicBool,
    failing_opens: AtomicU32,
}

/// Opens in-memory connections that share one wire buffer
#[derive(Clone, Default)]
pub struct MockOpener {
    wire: Arc<MockWire>,
}

impl MockOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, across all connections
    pub fn wire(&self) -> String {
        self.wire
            .bytes
            .lock()
            .map(|bytes| bytes.clone())
            .unwrap_or_default()
    }

    /// Written lines, each with its terminator
    pub fn lines(&self) -> Vec<String> {
        self.wire()
            .split_inclusive(LINE_TERMINATOR)
            .map(str::to_string)
            .collect()
    }

    /// Paths opened so far, in order
    pub fn opened_paths(&self) -> Vec<String> {
        self.wire
            .opened
            .lock()
            .map(|opened| opened.clone())
            .unwrap_or_default()
    }

    /// Make the next write on any connection fail
    pub fn fail_next_write(&self) {
        self.wire.fail_next_write.store(true, Ordering::SeqCst);
    }

    /// Make the next `count` opens fail
    pub fn fail_next_opens(&self, count: u32) {
        self.wire.failing_opens.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl TransportOpener for MockOpener {
    async fn open(&self, path: &str, baud_rate: u32) -> Result<Box<dyn SerialTransport>> {
        let should_fail = self
            .wire
            .failing_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(FleetError::LinkUnavailable(format!(
                "Failed to open {}: mock open failure",
                path
            )));
        }

        info!("Mock link opened on {} @ {} baud", path, baud_rate);
        if let Ok(mut opened) = self.wire.opened.lock() {
            opened.push(path.to_string());
        }
        Ok(Box::new(MockConnection {
            path: path.to_string(),
            wire: self.wire.clone(),
        }))
    }
}

/// One in-memory connection
pub struct MockConnection {
    path: String,
    wire: Arc<MockWire>,
}

impl MockConnection {
    fn push(&self, text: &str) -> Result<()> {
        let mut bytes = self
            .wire
            .bytes
            .lock()
            .map_err(|_| FleetError::LinkUnavailable("Mock wire poisoned".to_string()))?;
        bytes.push_str(text);
        Ok(())
    }
}

#[async_trait]
impl SerialTransport for MockConnection {
    async fn write_line(&mut self, line: &str) -> Result<()> {
        if self.wire.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(FleetError::LinkUnavailable(
                "Write failed: mock write failure".to_string(),
            ));
        }

        // Split the write so unserialized callers would interleave
        self.push(line)?;
        tokio::task::yield_now().await;
        self.push(LINE_TERMINATOR)?;

        info!("Mock TX on {}: {}", self.path, line);
        Ok(())
    }

    fn port_path(&self) -> &str {
        &self.path
    }
}
