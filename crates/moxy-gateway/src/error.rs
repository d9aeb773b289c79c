//! Error taxonomy for the forwarding core.
//!
//! Every failure the core can produce is a distinct [`GatewayError`] variant so the
//! transport layer can map it to a user-visible status without string matching.

use hyper::StatusCode;

/// Terminal failure of a single gateway call. None of these are retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("cannot derive a local target from remote target '{0}'")]
    InvalidRemoteTarget(String),

    #[error("unknown environment '{group}/{name}'")]
    UnknownEnvironment { group: String, name: String },

    #[error("environment name '{name}' exists in several groups: {}", groups.join(", "))]
    AmbiguousEnvironment { name: String, groups: Vec<String> },

    #[error("no {kind} service for '{local_target}' in environment '{environment}'")]
    ServiceNotFound {
        kind: String,
        local_target: String,
        environment: String,
    },

    #[error("no mock in group {0} matched the request")]
    NoMockMatched(i64),

    #[error("unsupported HTTP method: {0}")]
    UnsupportedHttpMethod(String),

    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("backend '{url}' did not answer within {timeout_ms}ms")]
    BackendTimeout { url: String, timeout_ms: u64 },

    #[error("backend '{url}' unavailable: {reason}")]
    BackendUnavailable { url: String, reason: String },

    #[error("request record {0} not found")]
    RequestNotFound(i64),

    #[error("persistence store failure: {0}")]
    Store(String),
}

impl GatewayError {
    /// HTTP status the transport layer answers with for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidRemoteTarget(_) => StatusCode::BAD_REQUEST,
            GatewayError::UnknownEnvironment { .. } => StatusCode::NOT_FOUND,
            GatewayError::AmbiguousEnvironment { .. } => StatusCode::CONFLICT,
            GatewayError::ServiceNotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::NoMockMatched(_) => StatusCode::NOT_FOUND,
            GatewayError::UnsupportedHttpMethod(_) => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::UnsupportedContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            GatewayError::BackendTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::BackendUnavailable { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::RequestNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable name, used in error bodies and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::InvalidRemoteTarget(_) => "invalidRemoteTarget",
            GatewayError::UnknownEnvironment { .. } => "unknownEnvironment",
            GatewayError::AmbiguousEnvironment { .. } => "ambiguousEnvironment",
            GatewayError::ServiceNotFound { .. } => "serviceNotFound",
            GatewayError::NoMockMatched(_) => "noMockMatched",
            GatewayError::UnsupportedHttpMethod(_) => "unsupportedHttpMethod",
            GatewayError::UnsupportedContentType(_) => "unsupportedContentType",
            GatewayError::BackendTimeout { .. } => "backendTimeout",
            GatewayError::BackendUnavailable { .. } => "backendUnavailable",
            GatewayError::RequestNotFound(_) => "requestNotFound",
            GatewayError::Store(_) => "store",
        }
    }
}

impl From<anyhow::Error> for GatewayError {
    fn from(err: anyhow::Error) -> Self {
        GatewayError::Store(format!("{err:#}"))
    }
}
