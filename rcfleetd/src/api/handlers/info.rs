//! Info handlers for system information and root endpoint

use crate::api::error::ApiError;
use crate::api::AppState;

use axum::{extract::State, Json};
use rcfleet_core::api::{ApiResponse, InfoResponse};
use serde_json::{json, Value};
use tracing::debug;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Handle the root endpoint.
///
/// Basic service identification, useful as a health check.
///
/// # Endpoint
///
/// `GET /`
pub(crate) async fn root() -> Result<Json<ApiResponse<Value>>, ApiError> {
    debug!("Request: GET /");

    let data = json!({
        "service": "rcfleet vehicle control server",
        "version": VERSION,
        "status": "ok"
    });

    Ok(Json(ApiResponse::success(data)))
}

/// Retrieve system information.
///
/// # Endpoint
///
/// `GET /api/v0/info`
///
/// # Returns
///
/// - `version` - Server version
/// - `uptime` - Server uptime in seconds
/// - `transport` - `serial`, `mock` or `disabled`
/// - `link` - Serial link snapshot, absent when the transport is disabled
/// - `fallback_vehicle` - Vehicle every identity falls back to
pub(crate) async fn get_info(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<InfoResponse>>, ApiError> {
    debug!("Request: GET /api/v0/info");

    let link = match &state.link {
        Some(link) => Some(link.status().await),
        None => None,
    };

    let info_response = InfoResponse {
        version: VERSION.to_string(),
        uptime: state.start_time.elapsed().as_secs(),
        software: format!("rcfleetd v{}", VERSION),
        transport: state.transport_mode.as_str().to_string(),
        link,
        fallback_vehicle: state.registry.fallback_vehicle_name().to_string(),
    };

    Ok(Json(ApiResponse::success(info_response)))
}
