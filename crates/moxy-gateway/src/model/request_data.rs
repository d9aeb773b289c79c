use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit record of one forwarded or mocked call. Written once, after the
/// round trip completes, and reused as the lookup key for replays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestData {
    pub id: i64,
    pub sender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soap_action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_call: Option<String>,
    pub environment_id: i64,
    pub local_target: String,
    pub remote_target: String,
    /// Request content as matched against mocks (body, or URL plus decoded query).
    pub request: String,
    /// Raw inbound query string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Inbound headers in arrival order, minus connection framing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub request_headers: Vec<(String, String)>,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    /// Observed latency, including any artificial mock delay.
    pub time_in_millis: u64,
    pub status: u16,
    pub service_id: i64,
}
