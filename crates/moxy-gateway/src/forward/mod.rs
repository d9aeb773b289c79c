//! Forwarding of resolved calls to a backend or a mock group.

mod content;
mod engine;
mod envelope;
pub mod headers;


pub use content::check_content_type;
pub use engine::{ForwardOptions, ForwardingEngine, InboundRequest, ResolvedTarget};
pub use envelope::ResponseEnvelope;
