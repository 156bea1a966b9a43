//! API request handlers for the rcfleet daemon REST API.
//!
//! # Handler Modules
//!
//! - [`info`] - System information and root endpoint
//! - [`identities`] - Identity registration
//! - [`session`] - Login, logout and the dashboard
//! - [`vehicles`] - Vehicle listing and active vehicle selection
//! - [`control`] - Steering commands
//! - [`admin`] - Grants, roles, identity deletion and link diagnostics
//!
//! # API Structure
//!
//! All handlers follow a consistent pattern:
//! - Accept `State<AppState>` for accessing shared application state
//! - Take the caller from the `AuthenticatedIdentity` or `AdminIdentity` extractor
//! - Return `Result<Json<ApiResponse<T>>, ApiError>` for uniform responses
//! - Log operations using the `tracing` crate

pub mod admin;
pub mod control;
pub mod identities;
pub mod info;
pub mod session;
pub mod vehicles;
