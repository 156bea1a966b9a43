//! Session handlers: login, logout and the dashboard

use crate::api::error::ApiError;
use crate::api::identity::AuthenticatedIdentity;
use crate::api::AppState;
use crate::api_ok;
use axum::{extract::State, Json};
use rcfleet_core::api::{ApiResponse, DashboardResponse, LoginRequest};
use rcfleet_core::Identity;
use tracing::{debug, info};

fn dashboard_for(
    state: &AppState,
    identity: Identity,
) -> rcfleet_core::Result<DashboardResponse> {
    let active_vehicle_id = state.selection.resolve(identity.id)?;
    let vehicles = state.registry.list_vehicles_for(identity.id)?;

    Ok(DashboardResponse {
        identity,
        vehicles,
        active_vehicle_id,
    })
}

/// Start a session.
///
/// Makes sure the caller holds at least one vehicle, then restores the
/// active vehicle the client remembered. The candidate is checked against
/// the caller's grants before it is used.
///
/// # Endpoint
///
/// `POST /api/v0/session/login`
///
/// # Request Body
///
/// Optional: `{"active_vehicle_id": 3}`
pub(crate) async fn login(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    request: Option<Json<LoginRequest>>,
) -> Result<Json<ApiResponse<DashboardResponse>>, ApiError> {
    debug!("Request: POST /api/v0/session/login");

    let remembered = request.and_then(|Json(req)| req.active_vehicle_id);
    info!("Identity {} ({}) logged in", identity.id, identity.name);

    let dashboard = state
        .blocking(move |s| {
            s.registry.ensure_identity_has_a_vehicle(identity.id)?;
            match remembered {
                Some(vehicle) => s.selection.restore(identity.id, vehicle),
                None => s.selection.forget(identity.id),
            }
            dashboard_for(s, identity)
        })
        .await?;
    api_ok!(dashboard)
}

/// End a session by dropping the active vehicle.
///
/// # Endpoint
///
/// `POST /api/v0/session/logout`
pub(crate) async fn logout(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    debug!("Request: POST /api/v0/session/logout");

    debug!(
        "Dropping selection {:?} of identity {}",
        state.selection.state(identity.id),
        identity.id
    );
    state.selection.forget(identity.id);
    info!("Identity {} logged out", identity.id);
    api_ok!(())
}

/// Caller, their vehicles, and the active one.
///
/// # Endpoint
///
/// `GET /api/v0/dashboard`
pub(crate) async fn dashboard(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
) -> Result<Json<ApiResponse<DashboardResponse>>, ApiError> {
    debug!("Request: GET /api/v0/dashboard");

    let dashboard = state
        .blocking(move |s| dashboard_for(s, identity))
        .await?;
    api_ok!(dashboard)
}

#[cfg(test)]
mod tests {
    use crate::api::handlers::test_support::test_app;
    use crate::fleet::SelectionState;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_login_requires_identity() {
        let app = test_app();
        let (status, json) = app
            .send(Method::POST, "/api/v0/session/login", None, None)
            .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"], "Missing identity");
    }

    #[tokio::test]
    async fn test_login_without_body_resolves_fallback() {
        let app = test_app();
        let alice = app.register("alice");

        let (status, json) = app
            .send(Method::POST, "/api/v0/session/login", Some(&alice), None)
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["identity"]["name"], "alice");
        assert_eq!(json["data"]["vehicles"][0]["name"], "DefaultCar");
        assert_eq!(
            json["data"]["active_vehicle_id"],
            json["data"]["vehicles"][0]["id"]
        );
    }

    #[tokio::test]
    async fn test_login_restores_granted_candidate() {
        let app = test_app();
        let alice = app.register("alice");
        let blue = app.state.registry.ensure_vehicle("Blue").unwrap();
        app.state.registry.grant(alice.id, blue).unwrap();

        let (_, json) = app
            .send(
                Method::POST,
                "/api/v0/session/login",
                Some(&alice),
                Some(json!({"active_vehicle_id": blue.0})),
            )
            .await;

        assert_eq!(json["data"]["active_vehicle_id"], blue.0);
    }

    #[tokio::test]
    async fn test_login_replaces_ungranted_candidate() {
        let app = test_app();
        let alice = app.register("alice");
        let red = app.state.registry.ensure_vehicle("Red").unwrap();

        let (_, json) = app
            .send(
                Method::POST,
                "/api/v0/session/login",
                Some(&alice),
                Some(json!({"active_vehicle_id": red.0})),
            )
            .await;

        assert_ne!(json["data"]["active_vehicle_id"], red.0);
        let fallback = app.state.registry.ensure_fallback_vehicle().unwrap();
        assert_eq!(json["data"]["active_vehicle_id"], fallback.0);
    }

    #[tokio::test]
    async fn test_login_regrants_identity_left_without_vehicles() {
        let app = test_app();
        let alice = app.register("alice");
        let fallback = app.state.registry.ensure_fallback_vehicle().unwrap();
        app.state.registry.revoke(alice.id, fallback).unwrap();

        let (status, json) = app
            .send(Method::POST, "/api/v0/session/login", Some(&alice), None)
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["vehicles"].as_array().unwrap().len(), 1);
        assert!(app.state.registry.has_access(alice.id, fallback).unwrap());
    }

    #[tokio::test]
    async fn test_logout_forgets_selection() {
        let app = test_app();
        let alice = app.register("alice");
        app.send(Method::POST, "/api/v0/session/login", Some(&alice), None)
            .await;

        let (status, json) = app
            .send(Method::POST, "/api/v0/session/logout", Some(&alice), None)
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "success");
        assert_eq!(app.state.selection.state(alice.id), SelectionState::Unset);
    }

    #[tokio::test]
    async fn test_dashboard_rejects_unknown_identity() {
        let app = test_app();
        let ghost = rcfleet_core::Identity {
            id: rcfleet_core::IdentityId(404),
            name: "ghost".to_string(),
            role: rcfleet_core::Role::Operator,
        };

        let (status, json) = app
            .send(Method::GET, "/api/v0/dashboard", Some(&ghost), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"], "Unknown identity");
    }

    #[tokio::test]
    async fn test_dashboard_lists_vehicles_by_name() {
        let app = test_app();
        let alice = app.register("alice");
        let zulu = app.state.registry.ensure_vehicle("Zulu").unwrap();
        let alpha = app.state.registry.ensure_vehicle("Alpha").unwrap();
        app.state.registry.grant(alice.id, zulu).unwrap();
        app.state.registry.grant(alice.id, alpha).unwrap();

        let (_, json) = app
            .send(Method::GET, "/api/v0/dashboard", Some(&alice), None)
            .await;

        let names: Vec<&str> = json["data"]["vehicles"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Alpha", "DefaultCar", "Zulu"]);
        assert_eq!(json["data"]["active_vehicle_id"], alpha.0);
    }
}
