//! Moxy: a recording HTTP gateway for SOAP and REST backends.
//!
//! Inbound calls are resolved to a configured (or auto-provisioned) service and
//! either relayed to the backend under the service's timeout or answered from a
//! mock group. Every call is recorded and can be replayed.

pub mod config;
pub mod error;
pub mod forward;
pub mod metrics;
pub mod mock;
pub mod model;
pub mod registry;
pub mod server;
pub mod store;
pub mod transport;

pub use error::GatewayError;
