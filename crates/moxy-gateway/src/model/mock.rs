use crate::mock::BodyPredicate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Mock group identifier. [`MockGroupId::NONE`] marks a service without a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct MockGroupId(pub i64);

impl MockGroupId {
    pub const NONE: MockGroupId = MockGroupId(-1);

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }
}

impl Default for MockGroupId {
    fn default() -> Self {
        Self::NONE
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MockGroup {
    pub id: MockGroupId,
    pub name: String,
}

/// Recorded response returned instead of calling the backend.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Mock {
    #[serde(default = "unassigned_id")]
    pub id: i64,
    #[serde(default)]
    pub mock_group_id: MockGroupId,
    /// Content rule deciding whether this mock answers a request.
    #[serde(default)]
    pub predicate: BodyPredicate,
    #[serde(default = "default_status")]
    pub http_status: u16,
    #[serde(default)]
    pub response: String,
    /// `name:value` pairs separated by `;`
    #[serde(default)]
    pub http_headers: String,
    /// Artificial latency before the response is released.
    #[serde(default)]
    pub timeout_ms: u64,
}

fn unassigned_id() -> i64 {
    super::UNASSIGNED_ID
}

fn default_status() -> u16 {
    200
}

impl Mock {
    pub fn headers(&self) -> Vec<(String, String)> {
        parse_header_pairs(&self.http_headers)
    }

    /// Delay to apply before responding, clamped to `ceiling`.
    pub fn delay(&self, ceiling: Duration) -> Duration {
        Duration::from_millis(self.timeout_ms).min(ceiling)
    }
}

/// Parse `Content-Type:text/xml;X-Trace:abc` into ordered pairs.
/// A segment without a `:` continues the previous value, so media type
/// parameters such as `; charset=utf-8` stay attached to their header.
pub fn parse_header_pairs(encoded: &str) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    for segment in encoded.split(';') {
        match segment.split_once(':') {
            Some((name, value)) => {
                let name = name.trim();
                if !name.is_empty() {
                    pairs.push((name.to_string(), value.trim().to_string()));
                }
            }
            None => {
                let param = segment.trim();
                if param.is_empty() {
                    continue;
                }
                if let Some((_, value)) = pairs.last_mut() {
                    value.push_str("; ");
                    value.push_str(param);
                }
            }
        }
    }
    pairs
}
