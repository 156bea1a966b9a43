//! Administrator handlers for grants, roles, identities and link diagnostics
//!
//! Every handler here takes an [`AdminIdentity`], so operators get `403`.

use crate::api::error::ApiError;
use crate::api::identity::AdminIdentity;
use crate::api::AppState;
use crate::{api_fail, api_ok};
use axum::{
    extract::{Path, State},
    Json,
};
use rcfleet_core::api::{
    ApiResponse, FleetOverview, GrantRequest, LinkStatus, PortListResponse, RoleRequest,
};
use rcfleet_core::{FleetError, Grant, Identity, IdentityId, VehicleId};
use tracing::{debug, info};

/// Identities, vehicles and grants.
///
/// # Endpoint
///
/// `GET /api/v0/admin/overview`
pub(crate) async fn overview(
    State(state): State<AppState>,
    AdminIdentity(_admin): AdminIdentity,
) -> Result<Json<ApiResponse<FleetOverview>>, ApiError> {
    debug!("Request: GET /api/v0/admin/overview");

    api_ok!(state.blocking(|s| s.registry.overview()).await?)
}

/// Grant a vehicle to an identity.
///
/// The vehicle is created with the default calibration when no vehicle has
/// that name. Granting an existing pair is a no-op.
///
/// # Endpoint
///
/// `POST /api/v0/admin/grants`
///
/// # Request Body
///
/// `{"identity_id": 2, "vehicle_name": "Blue", "access_level": "owner"}`
pub(crate) async fn grant(
    State(state): State<AppState>,
    AdminIdentity(admin): AdminIdentity,
    Json(request): Json<GrantRequest>,
) -> Result<Json<ApiResponse<Grant>>, ApiError> {
    debug!("Request: POST /api/v0/admin/grants");

    let (identity, vehicle) = {
        let request = request.clone();
        state
            .blocking(move |s| {
                let identity = s.registry.identity(request.identity_id)?;
                let vehicle = s.registry.ensure_vehicle(&request.vehicle_name)?;
                s.registry
                    .grant_with_level(identity.id, vehicle, request.access_level)?;
                Ok((identity, vehicle))
            })
            .await?
    };

    info!(
        "Administrator {} granted '{}' to {}",
        admin.id,
        request.vehicle_name.trim(),
        identity.name
    );
    api_ok!(Grant {
        identity_id: identity.id,
        vehicle_id: vehicle,
        access_level: request.access_level,
    })
}

/// Revoke a grant.
///
/// # Endpoint
///
/// `DELETE /api/v0/admin/grants/:identity_id/:vehicle_id`
pub(crate) async fn revoke(
    State(state): State<AppState>,
    AdminIdentity(_admin): AdminIdentity,
    Path((identity_id, vehicle_id)): Path<(i64, i64)>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    debug!(
        "Request: DELETE /api/v0/admin/grants/{}/{}",
        identity_id, vehicle_id
    );

    let removed = state
        .blocking(move |s| {
            s.registry
                .revoke(IdentityId(identity_id), VehicleId(vehicle_id))
        })
        .await?;
    if !removed {
        return Err(ApiError::not_found("Grant not found"));
    }
    api_ok!(())
}

/// Change an identity's role.
///
/// # Endpoint
///
/// `PUT /api/v0/admin/identities/:id/role`
///
/// # Request Body
///
/// `{"role": "administrator"}`
pub(crate) async fn set_role(
    State(state): State<AppState>,
    AdminIdentity(_admin): AdminIdentity,
    Path(id): Path<i64>,
    Json(request): Json<RoleRequest>,
) -> Result<Json<ApiResponse<Identity>>, ApiError> {
    debug!("Request: PUT /api/v0/admin/identities/{}/role", id);

    let role = request.role;
    api_ok!(
        state
            .blocking(move |s| s.registry.set_role(IdentityId(id), role))
            .await?
    )
}

/// Delete an identity with its grants and active selection.
///
/// Administrators cannot delete themselves.
///
/// # Endpoint
///
/// `DELETE /api/v0/admin/identities/:id`
pub(crate) async fn delete_identity(
    State(state): State<AppState>,
    AdminIdentity(admin): AdminIdentity,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    debug!("Request: DELETE /api/v0/admin/identities/{}", id);

    let id = IdentityId(id);
    if id == admin.id {
        return api_fail!("Cannot delete your own identity");
    }

    state
        .blocking(move |s| {
            s.registry.delete_identity(id)?;
            s.selection.forget(id);
            Ok(())
        })
        .await?;
    api_ok!(())
}

/// Serial endpoints ranked by how likely they are to be the controller.
///
/// # Endpoint
///
/// `GET /api/v0/admin/ports`
pub(crate) async fn list_ports(
    State(state): State<AppState>,
    AdminIdentity(_admin): AdminIdentity,
) -> Result<Json<ApiResponse<PortListResponse>>, ApiError> {
    debug!("Request: GET /api/v0/admin/ports");

    // Enumeration queries the OS and may block
    let (ports, selected) = state
        .blocking(|s| {
            let resolver = s.port_resolver();
            let ports = resolver.ranked()?;
            Ok((ports, resolver.resolve().ok()))
        })
        .await?;

    debug!("Found {} endpoints, selected {:?}", ports.len(), selected);
    api_ok!(PortListResponse { ports, selected })
}

/// Close the link and forget the discovered endpoint.
///
/// The next command runs discovery again. A pinned endpoint is kept.
///
/// # Endpoint
///
/// `POST /api/v0/admin/link/reset`
pub(crate) async fn reset_link(
    State(state): State<AppState>,
    AdminIdentity(admin): AdminIdentity,
) -> Result<Json<ApiResponse<LinkStatus>>, ApiError> {
    debug!("Request: POST /api/v0/admin/link/reset");

    let Some(link) = &state.link else {
        return Err(FleetError::transport(FleetError::TransportDisabled).into());
    };

    link.invalidate_endpoint().await;
    info!("Administrator {} reset the vehicle link", admin.id);
    api_ok!(link.status().await)
}
