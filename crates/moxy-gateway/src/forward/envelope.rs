//! Response envelope handed back to the transport layer.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{
    HeaderName, HeaderValue, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING,
};
use hyper::{HeaderMap, Response, StatusCode};
use tracing::debug;

/// Fully buffered outcome of a forwarded, mocked or replayed call.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    pub status: StatusCode,
    /// Ordered header pairs. Always carries the proxy marker.
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub content_type: Option<String>,
    /// Deliver with chunked transfer coding. Replays are always sent plain.
    pub chunked: bool,
}

impl ResponseEnvelope {
    pub fn new(status: StatusCode, body: Bytes) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body,
            content_type: None,
            chunked: true,
        }
    }

    /// Copy the printable headers of `map`, keeping their order.
    pub fn with_headers(mut self, map: &HeaderMap) -> Self {
        for (name, value) in map {
            match value.to_str() {
                Ok(value) => self.headers.push((name.to_string(), value.to_string())),
                Err(_) => debug!("Dropping non-text header value for {}", name),
            }
        }
        self
    }

    pub fn with_content_type(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }

    /// Set `name: true`, replacing any value the backend already sent.
    pub fn mark(&mut self, name: &HeaderName) {
        self.headers
            .retain(|(n, _)| !n.eq_ignore_ascii_case(name.as_str()));
        self.headers
            .push((name.as_str().to_string(), "true".to_string()));
    }

    /// First value of `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Serialize into a hyper response. Framing headers are recomputed; the
    /// content type comes from `content_type` rather than the header list.
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(self.body.clone()));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) else {
                debug!("Skipping invalid header {}: {}", name, value);
                continue;
            };
            if [CONTENT_LENGTH, TRANSFER_ENCODING, CONNECTION, CONTENT_TYPE].contains(&name) {
                continue;
            }
            headers.append(name, value);
        }

        if let Some(value) = self
            .content_type
            .as_deref()
            .and_then(|ct| HeaderValue::from_str(ct).ok())
        {
            headers.insert(CONTENT_TYPE, value);
        }

        if self.chunked && !self.body.is_empty() {
            headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        }

        response
    }
}
