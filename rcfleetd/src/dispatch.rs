//! Command dispatch
//!
//! Validates a steering command, checks the caller's grant, and hands the
//! command to the vehicle transport. Nothing is persisted.

use std::sync::Arc;

use rcfleet_core::{FleetError, IdentityId, Result, SteerCommand, VehicleId};
use rcfleet_hardware::CommandTransport;
use tracing::{debug, info, warn};

use crate::fleet::FleetAccessRegistry;

pub(crate) struct CommandDispatcher {
    registry: Arc<FleetAccessRegistry>,
    transport: Option<Arc<dyn CommandTransport>>,
}

impl CommandDispatcher {
    /// `transport` is `None` when the daemon runs without a vehicle link
    pub fn new(
        registry: Arc<FleetAccessRegistry>,
        transport: Option<Arc<dyn CommandTransport>>,
    ) -> Self {
        Self {
            registry,
            transport,
        }
    }

    pub fn has_transport(&self) -> bool {
        self.transport.is_some()
    }

    /// Send `command` to `vehicle` on behalf of `identity`
    ///
    /// Checks run in order: vocabulary, grant, transport. Link failures come
    /// back as `TransportUnavailable` with the cause attached.
    pub async fn dispatch(
        &self,
        identity: IdentityId,
        vehicle: VehicleId,
        command: &str,
    ) -> Result<SteerCommand> {
        let command: SteerCommand = command.parse()?;

        let registry = self.registry.clone();
        let granted = tokio::task::spawn_blocking(move || registry.has_access(identity, vehicle))
            .await
            .map_err(|e| FleetError::Storage(format!("Grant check failed: {}", e)))??;
        if !granted {
            debug!(
                "Identity {} has no grant for vehicle {}, rejecting {}",
                identity, vehicle, command
            );
            return Err(FleetError::AccessDenied);
        }

        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| FleetError::transport(FleetError::TransportDisabled))?;

        transport
            .write_command(command.as_wire())
            .await
            .map_err(|e| {
                warn!("Failed to send {} to vehicle {}: {}", command, vehicle, e);
                if e.is_transport_error() {
                    FleetError::transport(e)
                } else {
                    e
                }
            })?;

        info!(
            "Identity {} sent {} to vehicle {}",
            identity, command, vehicle
        );
        Ok(command)
    }
}
