//! Vehicle handlers for listing and active vehicle selection

use crate::api::error::ApiError;
use crate::api::identity::AuthenticatedIdentity;
use crate::api::AppState;
use crate::api_ok;
use axum::{extract::State, Json};
use rcfleet_core::api::{
    ApiResponse, SelectVehicleRequest, SelectVehicleResponse, VehicleListResponse,
};
use tracing::debug;

/// List the vehicles the caller may command, ordered by name.
///
/// An identity left without grants is given the fallback vehicle first, so
/// the list is never empty for a healthy store.
///
/// # Endpoint
///
/// `GET /api/v0/vehicles`
pub(crate) async fn list_vehicles(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
) -> Result<Json<ApiResponse<VehicleListResponse>>, ApiError> {
    debug!("Request: GET /api/v0/vehicles");

    let vehicles = state
        .blocking(move |s| {
            s.registry.ensure_identity_has_a_vehicle(identity.id)?;
            s.registry.list_vehicles_for(identity.id)
        })
        .await?;

    api_ok!(VehicleListResponse {
        count: vehicles.len(),
        vehicles,
    })
}

/// Make a vehicle the caller's active one.
///
/// # Endpoint
///
/// `POST /api/v0/vehicles/select`
///
/// # Request Body
///
/// `{"vehicle_id": 3}`
///
/// # Errors
///
/// `403` when the caller holds no grant for the vehicle, including when the
/// vehicle does not exist.
pub(crate) async fn select_vehicle(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    Json(request): Json<SelectVehicleRequest>,
) -> Result<Json<ApiResponse<SelectVehicleResponse>>, ApiError> {
    debug!("Request: POST /api/v0/vehicles/select");

    let vehicle = request.vehicle_id;
    state
        .blocking(move |s| s.selection.select(identity.id, vehicle))
        .await?;

    api_ok!(SelectVehicleResponse {
        active_vehicle_id: request.vehicle_id,
    })
}
