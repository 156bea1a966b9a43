//! Steering control handler

use crate::api::error::ApiError;
use crate::api::identity::AuthenticatedIdentity;
use crate::api::AppState;
use crate::api_ok;
use axum::{extract::State, Json};
use rcfleet_core::api::{ApiResponse, ControlRequest, ControlResponse};
use rcfleet_core::SteerCommand;
use tracing::debug;

/// Send a steering command to the caller's active vehicle.
///
/// The command is validated before the active vehicle is resolved, so an
/// unknown command never touches the selection or the link.
///
/// # Endpoint
///
/// `POST /api/v0/control`
///
/// # Request Body
///
/// `{"cmd": "STEER:L"}` with one of `STEER:L`, `STEER:R`, `STEER:C`
///
/// # Errors
///
/// - `400` for an unknown command
/// - `403` when the grant disappeared between resolution and dispatch
/// - `409` when no vehicle is available
/// - `503` when the vehicle link is down or not configured
pub(crate) async fn control(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    Json(request): Json<ControlRequest>,
) -> Result<Json<ApiResponse<ControlResponse>>, ApiError> {
    debug!("Request: POST /api/v0/control");

    let command: SteerCommand = request.cmd.parse()?;
    let vehicle = state
        .blocking(move |s| s.selection.require(identity.id))
        .await?;

    let sent = state
        .dispatcher
        .dispatch(identity.id, vehicle, command.as_wire())
        .await?;

    api_ok!(ControlResponse {
        sent,
        vehicle_id: vehicle,
    })
}

#[cfg(test)]
mod tests {
    use crate::api::handlers::test_support::{
        test_app, test_app_with_store, test_app_without_transport,
    };
    use crate::fleet::store::testing::GrantlessStore;
    use std::sync::Arc;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_control_sends_one_line() {
        let app = test_app();
        let u1 = app.register("U1");

        let (status, json) = app
            .send(
                Method::POST,
                "/api/v0/control",
                Some(&u1),
                Some(json!({"cmd": "STEER:L"})),
            )
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["sent"], "STEER:L");
        assert_eq!(app.opener.wire(), "STEER:L\n");
    }

    #[tokio::test]
    async fn test_control_rejects_unknown_command() {
        let app = test_app();
        let u1 = app.register("U1");

        for cmd in ["STEER:X", "steer:l", ""] {
            let (status, json) = app
                .send(
                    Method::POST,
                    "/api/v0/control",
                    Some(&u1),
                    Some(json!({ "cmd": cmd })),
                )
                .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(json["error"], "Unknown command");
        }
        assert!(app.opener.wire().is_empty());
    }

    #[tokio::test]
    async fn test_control_uses_selected_vehicle() {
        let app = test_app();
        let alice = app.register("alice");
        let blue = app.state.registry.ensure_vehicle("Blue").unwrap();
        app.state.registry.grant(alice.id, blue).unwrap();
        app.state.selection.select(alice.id, blue).unwrap();

        let (_, json) = app
            .send(
                Method::POST,
                "/api/v0/control",
                Some(&alice),
                Some(json!({"cmd": "STEER:R"})),
            )
            .await;

        assert_eq!(json["data"]["vehicle_id"], blue.0);
        assert_eq!(app.opener.lines(), vec!["STEER:R\n"]);
    }

    #[tokio::test]
    async fn test_control_without_transport_is_unavailable() {
        let app = test_app_without_transport();
        let alice = app.register("alice");

        let (status, json) = app
            .send(
                Method::POST,
                "/api/v0/control",
                Some(&alice),
                Some(json!({"cmd": "STEER:C"})),
            )
            .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["error"], "No vehicle transport configured");
    }

    #[tokio::test]
    async fn test_control_write_failure_is_reported() {
        let app = test_app();
        let alice = app.register("alice");
        app.opener.fail_next_opens(1);

        let (status, json) = app
            .send(
                Method::POST,
                "/api/v0/control",
                Some(&alice),
                Some(json!({"cmd": "STEER:L"})),
            )
            .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["error"], "Vehicle link unavailable");

        let (status, _) = app
            .send(
                Method::POST,
                "/api/v0/control",
                Some(&alice),
                Some(json!({"cmd": "STEER:L"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(app.opener.wire(), "STEER:L\n");
    }

    #[tokio::test]
    async fn test_control_requires_identity() {
        let app = test_app();
        let (status, _) = app
            .send(
                Method::POST,
                "/api/v0/control",
                None,
                Some(json!({"cmd": "STEER:L"})),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_control_without_any_vehicle_is_conflict() {
        let app = test_app_with_store(Arc::new(GrantlessStore::new()));
        let alice = app.register("alice");

        let (status, json) = app
            .send(
                Method::POST,
                "/api/v0/control",
                Some(&alice),
                Some(json!({"cmd": "STEER:L"})),
            )
            .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"], "No vehicle available");
        assert!(app.opener.wire().is_empty());
    }
}
