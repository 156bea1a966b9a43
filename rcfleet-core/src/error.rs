//! Error types for the rcfleet system

use thiserror::Error;

use crate::types::IdentityId;

/// Core error type for rcfleet operations
#[derive(Error, Debug)]
pub enum FleetError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The host reports no serial endpoints at all
    #[error("No serial port found")]
    NoPortFound,

    /// Opening or writing the serial link failed
    #[error("Serial link unavailable: {0}")]
    LinkUnavailable(String),

    /// Dispatcher-level transport failure, with the underlying cause attached
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(#[source] Box<FleetError>),

    /// The daemon runs without a vehicle transport
    #[error("No vehicle transport configured")]
    TransportDisabled,

    /// Command outside the steering vocabulary
    #[error("Command rejected: {0:?}")]
    CommandRejected(String),

    /// Identity holds no grant for the vehicle (also used for unknown vehicles)
    #[error("Access denied")]
    AccessDenied,

    /// Identity has no grants and the fallback could not be assigned
    #[error("No vehicle available")]
    NoVehicleAvailable,

    /// Identity id that does not exist in the store
    #[error("Unknown identity: {0}")]
    UnknownIdentity(IdentityId),

    /// Registration with a name that is already taken
    #[error("Identity already exists: {0}")]
    IdentityExists(String),

    /// Persistence layer errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid input or arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl FleetError {
    /// Wrap a link-level failure the way the dispatcher reports it.
    pub fn transport(cause: FleetError) -> Self {
        FleetError::TransportUnavailable(Box::new(cause))
    }

    /// True for failures local to the serial transport.
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            FleetError::NoPortFound
                | FleetError::LinkUnavailable(_)
                | FleetError::TransportUnavailable(_)
                | FleetError::TransportDisabled
        )
    }
}

/// Result type alias for rcfleet operations
pub type Result<T> = std::result::Result<T, FleetError>;

impl From<serde_json::Error> for FleetError {
    fn from(err: serde_json::Error) -> Self {
        FleetError::Serialization(err.to_string())
    }
}
