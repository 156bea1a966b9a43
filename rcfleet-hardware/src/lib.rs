//! rcfleet-hardware
//!
//! Hardware abstraction crate for the vehicle controller link. It finds the
//! microcontroller's serial endpoint, owns the single connection to it, and
//! writes newline-terminated steering commands.
//
//! Public API:
//! - `port_resolver::PortResolver` : endpoint discovery and scoring
//! - `link_manager::SerialLinkManager` : lazily opened, serialized link
//! - `serial_driver::SerialDriver` : low-level serial I/O driver
//! - `mock` : in-memory link for tests and `--mock` mode

pub mod link_manager;
pub mod mock;
pub mod port_resolver;
pub mod serial_driver;

pub use link_manager::{CommandTransport, LinkState, SerialLinkManager};
pub use mock::{LoggingOpener, MockOpener, StaticEndpoints};
pub use port_resolver::{score_endpoint, EndpointSource, PortResolver, SystemEndpoints};
pub use serial_driver::{SerialDriver, SerialDriverOpener, SerialTransport, TransportOpener};
