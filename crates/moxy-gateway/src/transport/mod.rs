//! Backend transport collaborator.
//!
//! The forwarding engine hands a fully built [`BackendRequest`] to a
//! [`BackendTransport`] and gets the buffered backend answer back. Deadlines are
//! enforced by the engine around the call, so an implementation that never
//! returns still produces a timeout.

mod client;
mod tls;

pub use client::HyperTransport;

use crate::model::HttpMethod;
use async_trait::async_trait;
use bytes::Bytes;
use hyper::{HeaderMap, StatusCode};
use std::time::Duration;

/// One outbound call, fully buffered.
#[derive(Debug, Clone)]
pub struct BackendRequest {
    pub url: String,
    pub method: HttpMethod,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Content type the backend declared, if any.
    pub content_type: Option<String>,
}

impl BackendResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        let content_type = headers
            .get(hyper::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Self {
            status,
            headers,
            body,
            content_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("backend call timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),
}

#[async_trait]
pub trait BackendTransport: Send + Sync {
    async fn call(&self, request: BackendRequest) -> Result<BackendResponse, TransportError>;
}
