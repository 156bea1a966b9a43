//! Fleet access: persisted grants and per-identity vehicle selection

pub(crate) mod registry;
pub(crate) mod selection;
pub(crate) mod store;

pub(crate) use registry::FleetAccessRegistry;
pub(crate) use selection::{ActiveSelectionResolver, SelectionState};
pub(crate) use store::{FleetStore, SqliteFleetStore};
