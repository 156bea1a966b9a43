//! Identity registration handler

use crate::api::error::ApiError;
use crate::api::AppState;
use crate::api_ok;
use axum::{extract::State, Json};
use rcfleet_core::api::{ApiResponse, RegisterRequest};
use rcfleet_core::Identity;
use tracing::{debug, info};

/// Register a new identity.
///
/// The identity is granted the fallback vehicle straight away. The first
/// identity registered becomes an administrator.
///
/// # Endpoint
///
/// `POST /api/v0/identities/register`
///
/// # Request Body
///
/// `{"name": "alice"}`
pub(crate) async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<ApiResponse<Identity>>, ApiError> {
    debug!("Request: POST /api/v0/identities/register");

    let name = request.name;
    let identity = state
        .blocking(move |s| s.registry.register_identity(&name, None))
        .await?;

    info!("Registered '{}' with id {}", identity.name, identity.id);
    api_ok!(identity)
}
