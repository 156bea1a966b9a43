//! API module for the rcfleet server
//!
//! Contains the REST API implementation with Axum router and handlers.

pub(crate) mod handlers;
pub(crate) mod identity;

use crate::config::RuntimeConfig;
use crate::dispatch::CommandDispatcher;
use crate::fleet::{ActiveSelectionResolver, FleetAccessRegistry};
use crate::hardware::connection::TransportMode;
use crate::hardware::{CommandTransport, PortResolver, SerialLinkManager};
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use rcfleet_core::FleetError;
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

/// Application state shared across all handlers
#[derive(Clone)]
pub(crate) struct AppState {
    /// Grants and vehicles
    pub registry: Arc<FleetAccessRegistry>,
    /// Per-identity active vehicle
    pub selection: Arc<ActiveSelectionResolver>,
    /// Validated command path to the vehicles
    pub dispatcher: Arc<CommandDispatcher>,
    /// Serial link (None when the transport is disabled)
    pub link: Option<Arc<SerialLinkManager>>,
    /// How commands reach the vehicles
    pub transport_mode: TransportMode,
    /// Runtime configuration
    pub config: Arc<RuntimeConfig>,
    /// Server start time for uptime calculation
    pub start_time: Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(
        registry: Arc<FleetAccessRegistry>,
        config: Arc<RuntimeConfig>,
        link: Option<Arc<SerialLinkManager>>,
        transport_mode: TransportMode,
    ) -> Self {
        let transport = link
            .clone()
            .map(|link| link as Arc<dyn CommandTransport>);

        let dispatcher = CommandDispatcher::new(registry.clone(), transport);
        if !dispatcher.has_transport() {
            warn!("No vehicle transport; control requests will be refused");
        }

        Self {
            selection: Arc::new(ActiveSelectionResolver::new(registry.clone())),
            dispatcher: Arc::new(dispatcher),
            registry,
            link,
            transport_mode,
            config,
            start_time: Instant::now(),
        }
    }

    /// Run store-backed work on the blocking pool
    ///
    /// Registry and selection calls hit SQLite synchronously and must not
    /// run on the async workers.
    pub async fn blocking<T, F>(&self, work: F) -> rcfleet_core::Result<T>
    where
        F: FnOnce(&AppState) -> rcfleet_core::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let state = self.clone();
        tokio::task::spawn_blocking(move || work(&state))
            .await
            .map_err(|e| FleetError::Storage(format!("Blocking task failed: {}", e)))?
    }

    /// Resolver for endpoint diagnostics
    ///
    /// Uses the link's own resolver so mock mode lists the mock endpoint.
    pub fn port_resolver(&self) -> PortResolver {
        self.link
            .as_ref()
            .map(|link| link.resolver().clone())
            .unwrap_or_else(PortResolver::system)
    }
}

/// Create the main API router with all endpoints
pub(crate) fn create_router(state: AppState) -> Router {
    info!("Setting up API router...");

    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(tower_http::cors::Any);

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(64 * 1024));

    Router::new()
        // Identity and session endpoints
        .route(
            "/api/v0/identities/register",
            post(handlers::identities::register),
        )
        .route("/api/v0/session/login", post(handlers::session::login))
        .route("/api/v0/session/logout", post(handlers::session::logout))
        .route("/api/v0/dashboard", get(handlers::session::dashboard))
        // Vehicle endpoints
        .route("/api/v0/vehicles", get(handlers::vehicles::list_vehicles))
        .route(
            "/api/v0/vehicles/select",
            post(handlers::vehicles::select_vehicle),
        )
        // Control endpoint
        .route("/api/v0/control", post(handlers::control::control))
        // Administrator endpoints
        .route("/api/v0/admin/overview", get(handlers::admin::overview))
        .route("/api/v0/admin/grants", post(handlers::admin::grant))
        .route(
            "/api/v0/admin/grants/:identity_id/:vehicle_id",
            delete(handlers::admin::revoke),
        )
        .route(
            "/api/v0/admin/identities/:id/role",
            put(handlers::admin::set_role),
        )
        .route(
            "/api/v0/admin/identities/:id",
            delete(handlers::admin::delete_identity),
        )
        .route("/api/v0/admin/ports", get(handlers::admin::list_ports))
        .route("/api/v0/admin/link/reset", post(handlers::admin::reset_link))
        // System info endpoint
        .route("/api/v0/info", get(handlers::info::get_info))
        // Root endpoint
        .route("/", get(handlers::info::root))
        .layer(middleware_stack)
        .with_state(state)
}

/// Error handling utilities
pub(crate) mod error {
    use axum::{
        http::StatusCode,
        response::{IntoResponse, Response},
        Json,
    };
    use rcfleet_core::api::ApiResponse;
    use rcfleet_core::FleetError;

    use tracing::{error, warn};

    /// Custom error type for API responses
    #[derive(Debug)]
    pub struct ApiError {
        pub status_code: StatusCode,
        pub message: String,
    }

    impl ApiError {
        /// Create a new API error
        pub fn new(status_code: StatusCode, message: impl Into<String>) -> Self {
            Self {
                status_code,
                message: message.into(),
            }
        }

        /// Create a bad request error
        pub fn bad_request(message: impl Into<String>) -> Self {
            Self::new(StatusCode::BAD_REQUEST, message)
        }

        /// Missing or unknown caller identity
        pub fn unauthorized(message: impl Into<String>) -> Self {
            Self::new(StatusCode::UNAUTHORIZED, message)
        }

        pub fn forbidden(message: impl Into<String>) -> Self {
            Self::new(StatusCode::FORBIDDEN, message)
        }

        pub fn not_found(message: impl Into<String>) -> Self {
            Self::new(StatusCode::NOT_FOUND, message)
        }

        pub fn conflict(message: impl Into<String>) -> Self {
            Self::new(StatusCode::CONFLICT, message)
        }

        /// Create an internal server error
        pub fn internal_error(message: impl Into<String>) -> Self {
            Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
        }

        /// Create a service unavailable error (for hardware issues)
        pub fn service_unavailable(message: impl Into<String>) -> Self {
            Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
        }
    }

    impl IntoResponse for ApiError {
        fn into_response(self) -> Response {
            if self.status_code.is_server_error() {
                error!("API Error {}: {}", self.status_code, self.message);
            } else {
                warn!("API Error {}: {}", self.status_code, self.message);
            }

            let response: ApiResponse<()> = ApiResponse::error(self.message);

            (self.status_code, Json(response)).into_response()
        }
    }

    /// Convert FleetError to ApiError
    ///
    /// Messages never carry device paths or storage details; the cause is
    /// logged instead.
    impl From<FleetError> for ApiError {
        fn from(err: FleetError) -> Self {
            match err {
                FleetError::CommandRejected(_) => Self::bad_request("Unknown command"),
                FleetError::InvalidInput(msg) => Self::bad_request(msg),
                FleetError::AccessDenied => Self::forbidden("No access to this vehicle"),
                FleetError::NoVehicleAvailable => Self::conflict("No vehicle available"),
                FleetError::IdentityExists(_) => Self::conflict("Identity name already taken"),
                FleetError::UnknownIdentity(_) => Self::not_found("Identity not found"),
                FleetError::TransportUnavailable(cause) => {
                    error!("Vehicle transport failure: {}", cause);
                    match *cause {
                        FleetError::TransportDisabled => {
                            Self::service_unavailable("No vehicle transport configured")
                        }
                        FleetError::NoPortFound => {
                            Self::service_unavailable("Vehicle controller not found")
                        }
                        _ => Self::service_unavailable("Vehicle link unavailable"),
                    }
                }
                FleetError::TransportDisabled => {
                    Self::service_unavailable("No vehicle transport configured")
                }
                FleetError::NoPortFound => Self::service_unavailable("Vehicle controller not found"),
                FleetError::LinkUnavailable(msg) => {
                    error!("Serial link failure: {}", msg);
                    Self::service_unavailable("Vehicle link unavailable")
                }
                FleetError::Storage(msg) => {
                    error!("Storage failure: {}", msg);
                    Self::internal_error("Internal storage error")
                }
                other => {
                    error!("Internal failure: {}", other);
                    Self::internal_error("Internal server error")
                }
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_unknown_vehicle_and_missing_grant_look_the_same() {
            let err = ApiError::from(FleetError::AccessDenied);
            assert_eq!(err.status_code, StatusCode::FORBIDDEN);
            assert_eq!(err.message, "No access to this vehicle");
        }

        #[test]
        fn test_transport_errors_do_not_leak_paths() {
            let err = ApiError::from(FleetError::transport(FleetError::LinkUnavailable(
                "Failed to open /dev/ttyACM0: busy".to_string(),
            )));
            assert_eq!(err.status_code, StatusCode::SERVICE_UNAVAILABLE);
            assert!(!err.message.contains("/dev/"));

            let err = ApiError::from(FleetError::transport(FleetError::TransportDisabled));
            assert_eq!(err.message, "No vehicle transport configured");

            let err = ApiError::from(FleetError::transport(FleetError::NoPortFound));
            assert_eq!(err.message, "Vehicle controller not found");
        }

        #[test]
        fn test_error_kinds_map_to_distinct_statuses() {
            let cases = [
                (FleetError::CommandRejected("X".into()), StatusCode::BAD_REQUEST),
                (FleetError::NoVehicleAvailable, StatusCode::CONFLICT),
                (FleetError::IdentityExists("a".into()), StatusCode::CONFLICT),
                (
                    FleetError::UnknownIdentity(rcfleet_core::IdentityId(1)),
                    StatusCode::NOT_FOUND,
                ),
                (
                    FleetError::Storage("disk I/O error".into()),
                    StatusCode::INTERNAL_SERVER_ERROR,
                ),
            ];
            for (err, status) in cases {
                assert_eq!(ApiError::from(err).status_code, status);
            }

            let storage = ApiError::from(FleetError::Storage("disk I/O error".into()));
            assert!(!storage.message.contains("disk"));
        }
    }
}

/// Helper macros for common responses
#[macro_export]
macro_rules! api_ok {
    ($data:expr) => {
        Ok(axum::Json(rcfleet_core::api::ApiResponse::success($data)))
    };
}

#[macro_export]
macro_rules! api_fail {
    ($message:expr) => {
        Err($crate::api::error::ApiError::bad_request($message))
    };
}

#[cfg(test)]
mod tests {
    use super::handlers::test_support::test_app;
    use rcfleet_core::FleetError;

    #[tokio::test(flavor = "current_thread")]
    async fn test_blocking_runs_off_the_runtime_thread() {
        let app = test_app();
        let runtime_thread = std::thread::current().id();

        let worker_thread = app
            .state
            .blocking(|_| Ok(std::thread::current().id()))
            .await
            .unwrap();
        assert_ne!(worker_thread, runtime_thread);
    }

    #[tokio::test]
    async fn test_blocking_passes_store_errors_through() {
        let app = test_app();
        let result = app
            .state
            .blocking(|s| s.registry.identity(rcfleet_core::IdentityId(404)))
            .await;
        assert!(matches!(result, Err(FleetError::UnknownIdentity(_))));
    }
}
