//! API models for the rcfleet REST API
//!
//! Request and response bodies shared by the daemon and any HTTP client.

use crate::types::{
    AccessLevel, Grant, Identity, IdentityId, Role, SerialEndpoint, SteerCommand, Vehicle,
    VehicleId,
};
use serde::{Deserialize, Serialize};

/// Generic API response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum ApiResponse<T> {
    #[serde(rename = "success")]
    Success { data: T },
    #[serde(rename = "error")]
    Error { error: String },
}

impl<T> ApiResponse<T> {
    /// Create a successful response
    pub fn success(data: T) -> Self {
        Self::Success { data }
    }

    /// Create an error response
    pub fn error(error: String) -> Self {
        Self::Error { error }
    }
}

/// Snapshot of the serial link
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStatus {
    /// Whether a live connection is held
    pub open: bool,
    /// Endpoint path cached from discovery or configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Successful opens since start
    pub opens: u32,
    /// Writes that failed and tore the link down
    pub write_failures: u32,
}

/// Server information response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoResponse {
    /// Server version
    pub version: String,
    /// Server uptime in seconds
    pub uptime: u64,
    /// Software information
    pub software: String,
    /// Transport mode: "serial", "mock", or "disabled"
    pub transport: String,
    /// Link snapshot (absent when no transport is configured)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<LinkStatus>,
    /// Name of the fallback vehicle
    pub fallback_vehicle: String,
}

/// Registration request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
}

/// Login request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Active vehicle remembered by the client from a previous session
    #[serde(default)]
    pub active_vehicle_id: Option<VehicleId>,
}

/// Dashboard payload: the caller, their vehicles, and the active one
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardResponse {
    pub identity: Identity,
    pub vehicles: Vec<Vehicle>,
    pub active_vehicle_id: Option<VehicleId>,
}

/// Vehicle list response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleListResponse {
    pub vehicles: Vec<Vehicle>,
    pub count: usize,
}

/// Active vehicle selection request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectVehicleRequest {
    pub vehicle_id: VehicleId,
}

/// Active vehicle selection response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectVehicleResponse {
    pub active_vehicle_id: VehicleId,
}

/// Steering control request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlRequest {
    #[serde(default)]
    pub cmd: String,
}

/// Steering control response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlResponse {
    pub sent: SteerCommand,
    pub vehicle_id: VehicleId,
}

/// Administrator grant request; the vehicle is created if absent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantRequest {
    pub identity_id: IdentityId,
    pub vehicle_name: String,
    #[serde(default)]
    pub access_level: AccessLevel,
}

/// Role change request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleRequest {
    pub role: Role,
}

/// Administrator overview of the whole fleet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetOverview {
    pub identities: Vec<Identity>,
    pub vehicles: Vec<Vehicle>,
    pub grants: Vec<Grant>,
}

/// One discovered endpoint with its likelihood score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredEndpoint {
    pub endpoint: SerialEndpoint,
    pub score: u32,
}

/// Endpoint discovery response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortListResponse {
    pub ports: Vec<ScoredEndpoint>,
    /// Endpoint the resolver would pick
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<String>,
}
