//! Service configuration and its protocol/method tagging.

use super::mock::MockGroupId;
use crate::error::GatewayError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Id carried by a service (or any record) that has not been persisted yet.
pub const UNASSIGNED_ID: i64 = -1;

/// Backend deadline applied to services that do not configure one.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// HTTP methods a REST service can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }

    /// Whether the request payload travels as a body. The others carry their
    /// content in the query string.
    pub fn has_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }

    pub fn to_hyper(self) -> hyper::Method {
        match self {
            HttpMethod::Get => hyper::Method::GET,
            HttpMethod::Post => hyper::Method::POST,
            HttpMethod::Put => hyper::Method::PUT,
            HttpMethod::Delete => hyper::Method::DELETE,
            HttpMethod::Patch => hyper::Method::PATCH,
            HttpMethod::Head => hyper::Method::HEAD,
            HttpMethod::Options => hyper::Method::OPTIONS,
        }
    }
}

impl FromStr for HttpMethod {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            _ => Err(GatewayError::UnsupportedHttpMethod(s.to_string())),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Protocol a service speaks. REST services are additionally keyed by method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(tag = "protocol", rename_all = "lowercase")]
pub enum ServiceKind {
    Soap,
    Rest { method: HttpMethod },
}

impl ServiceKind {
    pub fn rest(method: HttpMethod) -> Self {
        ServiceKind::Rest { method }
    }

    pub fn protocol(&self) -> &'static str {
        match self {
            ServiceKind::Soap => "soap",
            ServiceKind::Rest { .. } => "rest",
        }
    }

    /// Method used towards the backend. SOAP always posts.
    pub fn method(&self) -> HttpMethod {
        match self {
            ServiceKind::Soap => HttpMethod::Post,
            ServiceKind::Rest { method } => *method,
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceKind::Soap => f.write_str("soap"),
            ServiceKind::Rest { method } => write!(f, "rest {method}"),
        }
    }
}

/// Composite lookup key. Resolution by this key must be unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceKey {
    pub kind: ServiceKind,
    pub local_target: String,
    pub environment: String,
}

impl ServiceKey {
    pub fn new(kind: ServiceKind, local_target: &str, environment: &str) -> Self {
        Self {
            kind,
            local_target: local_target.to_string(),
            environment: environment.to_string(),
        }
    }

    pub fn not_found(&self) -> GatewayError {
        GatewayError::ServiceNotFound {
            kind: self.kind.to_string(),
            local_target: self.local_target.clone(),
            environment: self.environment.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Service {
    #[serde(default = "unassigned_id")]
    pub id: i64,
    #[serde(flatten)]
    pub kind: ServiceKind,
    #[serde(default)]
    pub description: String,
    pub local_target: String,
    pub remote_target: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub record_xml_data: bool,
    #[serde(default)]
    pub record_all_data: bool,
    #[serde(default)]
    pub use_mock_group: bool,
    pub environment_id: i64,
    #[serde(default)]
    pub mock_group_id: MockGroupId,
}

fn unassigned_id() -> i64 {
    UNASSIGNED_ID
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl Service {
    /// Definition written on the first unmatched request for a known environment.
    pub fn auto_generated(
        kind: ServiceKind,
        local_target: &str,
        remote_target: &str,
        environment_id: i64,
    ) -> Self {
        Self {
            id: UNASSIGNED_ID,
            kind,
            description: "auto-generated".to_string(),
            local_target: local_target.to_string(),
            remote_target: remote_target.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            record_xml_data: false,
            record_all_data: false,
            use_mock_group: false,
            environment_id,
            mock_group_id: MockGroupId::NONE,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id != UNASSIGNED_ID
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
