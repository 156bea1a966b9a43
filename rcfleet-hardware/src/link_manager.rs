//! Serial link management
//!
//! [`SerialLinkManager`] owns at most one live connection to the vehicle
//! controller. The connection is opened lazily on the first write, kept for
//! subsequent writes, and dropped as soon as a write fails so the next write
//! opens a fresh one. Every open and write runs inside one async mutex, so
//! concurrent callers never duplicate an open and their lines never interleave
//! on the wire.
//!
//! Opens and writes run on a spawned task. A caller that stops waiting does
//! not cut a write short: the line is still written (or fails) and the link
//! state is updated either way.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rcfleet_core::api::LinkStatus;
use rcfleet_core::{FleetError, Result, SerialConfig};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::port_resolver::PortResolver;
use crate::serial_driver::{SerialDriverOpener, SerialTransport, TransportOpener};

/// Anything the command dispatcher can hand validated lines to
#[async_trait]
pub trait CommandTransport: Send + Sync {
    /// Write one command line
    async fn write_command(&self, command: &str) -> Result<()>;

    /// Snapshot of the link for diagnostics
    async fn status(&self) -> LinkStatus;
}

/// Cached endpoint and live connection
///
/// The link is open iff `connection` is present.
#[derive(Default)]
pub struct LinkState {
    endpoint: Option<String>,
    connection: Option<Box<dyn SerialTransport>>,
}

impl LinkState {
    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }
}

#[derive(Default)]
struct LinkCounters {
    opens: AtomicU32,
    write_failures: AtomicU32,
}

/// Everything a spawned open or write needs
#[derive(Clone)]
struct LinkWorker {
    state: Arc<Mutex<LinkState>>,
    resolver: PortResolver,
    opener: Arc<dyn TransportOpener>,
    baud_rate: u32,
    settle_delay: Duration,
    pinned: Option<String>,
    counters: Arc<LinkCounters>,
}

impl LinkWorker {
    /// Discovery enumerates host devices, which may block
    async fn resolve(&self) -> Result<String> {
        let resolver = self.resolver.clone();
        tokio::task::spawn_blocking(move || resolver.resolve())
            .await
            .map_err(|e| FleetError::LinkUnavailable(format!("Discovery task failed: {}", e)))?
    }

    /// Return the live connection, opening one if needed
    ///
    /// Caller must hold the state lock.
    async fn get_or_open<'a>(
        &self,
        state: &'a mut LinkState,
    ) -> Result<&'a mut Box<dyn SerialTransport>> {
        if state.connection.is_none() {
            let path = match state.endpoint.clone() {
                Some(path) => path,
                None => self.resolve().await?,
            };

            let connection = match self.opener.open(&path, self.baud_rate).await {
                Ok(connection) => connection,
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    state.endpoint = self.pinned.clone();
                    return Err(e);
                }
            };

            if !self.settle_delay.is_zero() {
                debug!(
                    "Waiting {:?} for the controller to settle",
                    self.settle_delay
                );
                tokio::time::sleep(self.settle_delay).await;
            }

            self.counters.opens.fetch_add(1, Ordering::Relaxed);
            info!("Serial link open on {}", connection.port_path());
            state.endpoint = Some(path);
            state.connection = Some(connection);
        }

        state
            .connection
            .as_mut()
            .ok_or_else(|| FleetError::LinkUnavailable("Link not open".to_string()))
    }

    async fn write(self, line: String) -> Result<()> {
        let mut state = self.state.lock().await;

        let connection = self.get_or_open(&mut state).await?;
        if let Err(e) = connection.write_line(&line).await {
            warn!("Write of {:?} failed, closing link: {}", line, e);
            state.connection = None;
            self.counters.write_failures.fetch_add(1, Ordering::Relaxed);
            return Err(match e {
                FleetError::LinkUnavailable(_) => e,
                other => FleetError::LinkUnavailable(other.to_string()),
            });
        }

        debug!("Sent {:?}", line);
        Ok(())
    }
}

/// Wait for a spawned link task; the task keeps running if this is dropped
async fn join(task: tokio::task::JoinHandle<Result<()>>) -> Result<()> {
    task.await
        .map_err(|e| FleetError::LinkUnavailable(format!("Link task failed: {}", e)))?
}

/// Owner of the single serial connection
pub struct SerialLinkManager {
    worker: LinkWorker,
}

impl SerialLinkManager {
    pub fn new(
        resolver: PortResolver,
        opener: Arc<dyn TransportOpener>,
        baud_rate: u32,
        settle_delay: Duration,
    ) -> Self {
        Self {
            worker: LinkWorker {
                state: Arc::new(Mutex::new(LinkState::default())),
                resolver,
                opener,
                baud_rate,
                settle_delay,
                pinned: None,
                counters: Arc::new(LinkCounters::default()),
            },
        }
    }

    /// Link manager over real serial devices, configured from `[serial]`
    pub fn from_config(config: &SerialConfig, resolver: PortResolver) -> Self {
        let opener = SerialDriverOpener::new(config.write_timeout(), config.debug_uart);
        let manager = Self::new(
            resolver,
            Arc::new(opener),
            config.baud_rate,
            config.settle_delay(),
        );
        match &config.port {
            Some(path) => manager.with_pinned_endpoint(path.clone()),
            None => manager,
        }
    }

    /// Skip discovery and always open `path`
    ///
    /// A pinned endpoint survives open failures and invalidation.
    pub fn with_pinned_endpoint(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        info!("Serial endpoint pinned to {}", path);
        self.worker.state = Arc::new(Mutex::new(LinkState {
            endpoint: Some(path.clone()),
            connection: None,
        }));
        self.worker.pinned = Some(path);
        self
    }

    /// Write one command line, opening the link if needed
    ///
    /// A failed write closes the link and is not retried.
    pub async fn write_command(&self, command: &str) -> Result<()> {
        let line = command.trim().to_string();
        join(tokio::spawn(self.worker.clone().write(line))).await
    }

    /// Close the link and forget the cached endpoint
    pub async fn invalidate_endpoint(&self) {
        let mut state = self.worker.state.lock().await;
        if state.connection.take().is_some() {
            info!("Serial link closed");
        }
        state.endpoint = self.worker.pinned.clone();
    }

    pub async fn status(&self) -> LinkStatus {
        let state = self.worker.state.lock().await;
        LinkStatus {
            open: state.is_open(),
            endpoint: state.endpoint.clone(),
            opens: self.worker.counters.opens.load(Ordering::Relaxed),
            write_failures: self.worker.counters.write_failures.load(Ordering::Relaxed),
        }
    }

    /// Resolver used for discovery, exposed for diagnostics
    pub fn resolver(&self) -> &PortResolver {
        &self.worker.resolver
    }
}

#[async_trait]
impl CommandTransport for SerialLinkManager {
    async fn write_command(&self, command: &str) -> Result<()> {
        SerialLinkManager::write_command(self, command).await
    }

    async fn status(&self) -> LinkStatus {
        SerialLinkManager::status(self).await
    }
}
