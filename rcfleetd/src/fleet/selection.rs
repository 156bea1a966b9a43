//! Active vehicle selection
//!
//! Each identity has an in-memory pointer to the vehicle it is currently
//! controlling. Whenever the pointer is handed out it refers to a vehicle the
//! identity holds a grant for: stale or missing pointers are replaced during
//! resolution. Requests for the same identity are serialized on that
//! identity's lock; different identities never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use rcfleet_core::{FleetError, IdentityId, Result, VehicleId};
use tracing::debug;

use super::registry::FleetAccessRegistry;

/// Selection state of one identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum SelectionState {
    #[default]
    Unset,
    /// Candidate handed back by the client, not yet checked against grants
    Pending(VehicleId),
    /// Validated against the identity's grants at the last resolution
    Resolved(VehicleId),
}

impl SelectionState {
    fn candidate(self) -> Option<VehicleId> {
        match self {
            SelectionState::Unset => None,
            SelectionState::Pending(id) | SelectionState::Resolved(id) => Some(id),
        }
    }
}

type Slot = Arc<Mutex<SelectionState>>;

pub(crate) struct ActiveSelectionResolver {
    registry: Arc<FleetAccessRegistry>,
    selections: RwLock<HashMap<IdentityId, Slot>>,
}

impl ActiveSelectionResolver {
    pub fn new(registry: Arc<FleetAccessRegistry>) -> Self {
        Self {
            registry,
            selections: RwLock::new(HashMap::new()),
        }
    }

    fn slot(&self, identity: IdentityId) -> Slot {
        if let Some(slot) = self
            .selections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&identity)
        {
            return slot.clone();
        }

        self.selections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(identity)
            .or_default()
            .clone()
    }

    /// Resolve the identity's active vehicle
    ///
    /// Returns `None` when the identity has no grants and the fallback could
    /// not be assigned.
    pub fn resolve(&self, identity: IdentityId) -> Result<Option<VehicleId>> {
        let slot = self.slot(identity);
        let mut state = slot.lock().unwrap_or_else(PoisonError::into_inner);

        let mut vehicles = self.registry.list_vehicles_for(identity)?;
        if vehicles.is_empty() {
            self.registry.ensure_identity_has_a_vehicle(identity)?;
            vehicles = self.registry.list_vehicles_for(identity)?;
        }

        let Some(first) = vehicles.first() else {
            debug!("Identity {} has no vehicle available", identity);
            *state = SelectionState::Unset;
            return Ok(None);
        };

        let chosen = match state.candidate() {
            Some(candidate) if vehicles.iter().any(|v| v.id == candidate) => candidate,
            stale => {
                if let Some(stale) = stale {
                    debug!(
                        "Identity {} lost access to vehicle {}, switching to {}",
                        identity, stale, first.id
                    );
                }
                first.id
            }
        };

        *state = SelectionState::Resolved(chosen);
        Ok(Some(chosen))
    }

    /// Resolve, failing with `NoVehicleAvailable` instead of returning `None`
    pub fn require(&self, identity: IdentityId) -> Result<VehicleId> {
        self.resolve(identity)?
            .ok_or(FleetError::NoVehicleAvailable)
    }

    /// Make `vehicle` the active one; requires a grant
    pub fn select(&self, identity: IdentityId, vehicle: VehicleId) -> Result<()> {
        let slot = self.slot(identity);
        let mut state = slot.lock().unwrap_or_else(PoisonError::into_inner);

        if !self.registry.has_access(identity, vehicle)? {
            return Err(FleetError::AccessDenied);
        }

        debug!("Identity {} selected vehicle {}", identity, vehicle);
        *state = SelectionState::Resolved(vehicle);
        Ok(())
    }

    /// Store an unvalidated candidate carried over from a previous session
    pub fn restore(&self, identity: IdentityId, vehicle: VehicleId) {
        let slot = self.slot(identity);
        *slot.lock().unwrap_or_else(PoisonError::into_inner) = SelectionState::Pending(vehicle);
    }

    /// Drop the identity's selection
    pub fn forget(&self, identity: IdentityId) {
        self.selections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&identity);
    }

    pub fn state(&self, identity: IdentityId) -> SelectionState {
        self.selections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&identity)
            .map(|slot| *slot.lock().unwrap_or_else(PoisonError::into_inner))
            .unwrap_or_default()
    }
}
