//! Caller identity extraction
//!
//! Authentication happens in front of the daemon. The fronting layer passes
//! the authenticated identity id in the `x-fleet-identity` header; these
//! extractors look it up and reject the request when it is missing or stale.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use rcfleet_core::{FleetError, Identity, IdentityId};
use tracing::debug;

use super::error::ApiError;
use super::AppState;

/// Header carrying the authenticated identity id
pub(crate) const IDENTITY_HEADER: &str = "x-fleet-identity";

/// Any registered identity
#[derive(Debug, Clone)]
pub(crate) struct AuthenticatedIdentity(pub Identity);

/// An identity with the administrator role
#[derive(Debug, Clone)]
pub(crate) struct AdminIdentity(pub Identity);

fn identity_id(parts: &Parts) -> Result<IdentityId, ApiError> {
    let value = parts
        .headers
        .get(IDENTITY_HEADER)
        .ok_or_else(|| ApiError::unauthorized("Missing identity"))?;

    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .map(IdentityId)
        .ok_or_else(|| ApiError::unauthorized("Invalid identity"))
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let id = identity_id(parts)?;
        match state.blocking(move |s| s.registry.identity(id)).await {
            Ok(identity) => Ok(Self(identity)),
            Err(FleetError::UnknownIdentity(_)) => {
                debug!("Rejected request for unknown identity {}", id);
                Err(ApiError::unauthorized("Unknown identity"))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let AuthenticatedIdentity(identity) =
            AuthenticatedIdentity::from_request_parts(parts, state).await?;
        if !identity.is_administrator() {
            return Err(ApiError::forbidden("Administrator role required"));
        }
        Ok(Self(identity))
    }
}
