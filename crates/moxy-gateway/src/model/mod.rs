//! Records the gateway reads and writes through the persistence store.
//!
//! - `environment` - deployment environments (group + name)
//! - `service` - forwarding configuration per local target
//! - `mock` - mock groups and their recorded responses
//! - `request_data` - audit/replay history

mod environment;
mod mock;
mod request_data;
mod service;

pub use environment::Environment;
pub use mock::{parse_header_pairs, Mock, MockGroup, MockGroupId};
pub use request_data::RequestData;
pub use service::{
    HttpMethod, Service, ServiceKey, ServiceKind, DEFAULT_TIMEOUT_MS, UNASSIGNED_ID,
};
