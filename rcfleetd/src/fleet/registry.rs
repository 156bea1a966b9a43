//! Fleet access registry
//!
//! Owns the identity-vehicle grant relationship and the fallback vehicle.
//! A grant is the only thing that decides whether an identity may command a
//! vehicle.

use std::sync::Arc;

use rcfleet_core::api::FleetOverview;
use rcfleet_core::{
    AccessLevel, AccessMode, FleetConfig, FleetError, Grant, Identity, IdentityId, Result, Role,
    Vehicle, VehicleId,
};
use tracing::{debug, info};

use super::FleetStore;

pub(crate) struct FleetAccessRegistry {
    store: Arc<dyn FleetStore>,
    config: FleetConfig,
}

impl FleetAccessRegistry {
    pub fn new(store: Arc<dyn FleetStore>, config: FleetConfig) -> Self {
        Self { store, config }
    }

    pub fn fallback_vehicle_name(&self) -> &str {
        &self.config.fallback_vehicle
    }

    /// Make sure the fallback vehicle exists and return its id
    pub fn ensure_fallback_vehicle(&self) -> Result<VehicleId> {
        self.ensure_vehicle(&self.config.fallback_vehicle)
    }

    /// Make sure a vehicle with this name exists and return its id
    ///
    /// New vehicles get the configured default calibration.
    pub fn ensure_vehicle(&self, name: &str) -> Result<VehicleId> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FleetError::InvalidInput(
                "Vehicle name cannot be empty".to_string(),
            ));
        }
        let vehicle = self
            .store
            .insert_vehicle_if_absent(name, &self.config.default_calibration)?;
        Ok(vehicle.id)
    }

    pub fn grant(&self, identity: IdentityId, vehicle: VehicleId) -> Result<()> {
        self.grant_with_level(identity, vehicle, AccessLevel::Driver)
    }

    /// Grant access; a no-op when the pair already has a grant
    ///
    /// In single-vehicle mode the identity's other grants are replaced.
    pub fn grant_with_level(
        &self,
        identity: IdentityId,
        vehicle: VehicleId,
        access_level: AccessLevel,
    ) -> Result<()> {
        let grant = Grant {
            identity_id: identity,
            vehicle_id: vehicle,
            access_level,
        };

        match self.config.access_mode {
            AccessMode::Grants => {
                if self.store.insert_grant_if_absent(&grant)? {
                    info!(
                        "Granted vehicle {} to identity {} as {}",
                        vehicle,
                        identity,
                        access_level.as_str()
                    );
                }
            }
            AccessMode::SingleVehicle => {
                self.store.replace_grants(&grant)?;
                info!("Assigned vehicle {} to identity {}", vehicle, identity);
            }
        }
        Ok(())
    }

    pub fn revoke(&self, identity: IdentityId, vehicle: VehicleId) -> Result<bool> {
        let removed = self.store.delete_grant(identity, vehicle)?;
        if removed {
            info!("Revoked vehicle {} from identity {}", vehicle, identity);
        }
        Ok(removed)
    }

    pub fn has_access(&self, identity: IdentityId, vehicle: VehicleId) -> Result<bool> {
        self.store.grant_exists(identity, vehicle)
    }

    /// Vehicles the identity may command, ordered by name
    pub fn list_vehicles_for(&self, identity: IdentityId) -> Result<Vec<Vehicle>> {
        self.store.vehicles_for(identity)
    }

    /// Grant the fallback vehicle to an identity that has none
    pub fn ensure_identity_has_a_vehicle(&self, identity: IdentityId) -> Result<()> {
        if !self.store.vehicles_for(identity)?.is_empty() {
            return Ok(());
        }

        debug!(
            "Identity {} has no vehicles, assigning '{}'",
            identity, self.config.fallback_vehicle
        );
        let fallback = self.ensure_fallback_vehicle()?;
        self.grant(identity, fallback)
    }

    /// Create an identity and grant it the fallback vehicle
    ///
    /// Without an explicit role the first identity becomes an administrator.
    pub fn register_identity(&self, name: &str, role: Option<Role>) -> Result<Identity> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FleetError::InvalidInput(
                "Identity name cannot be empty".to_string(),
            ));
        }

        let identity = self.store.create_identity(name, role)?;
        info!(
            "Registered identity {} ({}) as {}",
            identity.id,
            identity.name,
            identity.role.as_str()
        );

        let fallback = self.ensure_fallback_vehicle()?;
        self.grant(identity.id, fallback)?;
        Ok(identity)
    }

    pub fn identity(&self, id: IdentityId) -> Result<Identity> {
        self.store
            .identity(id)?
            .ok_or(FleetError::UnknownIdentity(id))
    }

    pub fn set_role(&self, id: IdentityId, role: Role) -> Result<Identity> {
        if !self.store.set_role(id, role)? {
            return Err(FleetError::UnknownIdentity(id));
        }
        info!("Identity {} is now {}", id, role.as_str());
        self.identity(id)
    }

    /// Delete an identity together with its grants
    pub fn delete_identity(&self, id: IdentityId) -> Result<()> {
        if !self.store.delete_identity(id)? {
            return Err(FleetError::UnknownIdentity(id));
        }
        info!("Deleted identity {}", id);
        Ok(())
    }

    pub fn overview(&self) -> Result<FleetOverview> {
        Ok(FleetOverview {
            identities: self.store.identities()?,
            vehicles: self.store.vehicles()?,
            grants: self.store.grants()?,
        })
    }
}
