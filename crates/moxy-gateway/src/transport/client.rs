//! Pooled hyper client used to reach SOAP and REST backends.

use super::tls::NoVerifier;
use super::{BackendRequest, BackendResponse, BackendTransport, TransportError};
use crate::config::ConnectionPoolConfig;
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{CONNECTION, CONTENT_LENGTH, HOST, TRANSFER_ENCODING};
use hyper::Request;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub type HttpClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>;

/// [`BackendTransport`] over a shared, pooled HTTP/1.1 client (HTTP and HTTPS).
#[derive(Clone)]
pub struct HyperTransport {
    client: HttpClient,
}

impl HyperTransport {
    pub fn new(pool: &ConnectionPoolConfig) -> Result<Self, anyhow::Error> {
        // Both ring and aws-lc-rs are linked in; pick one before building configs.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let mut http_connector = HttpConnector::new();
        http_connector.set_keepalive(Some(Duration::from_secs(pool.keepalive_timeout_secs)));
        http_connector.set_connect_timeout(Some(Duration::from_secs(pool.connect_timeout_secs)));
        http_connector.enforce_http(false);

        let https_connector = if pool.tls_skip_verify {
            warn!("TLS certificate verification DISABLED for backends (development/testing only)");
            hyper_rustls::HttpsConnectorBuilder::new()
                .with_tls_config(
                    rustls::ClientConfig::builder()
                        .dangerous()
                        .with_custom_certificate_verifier(Arc::new(NoVerifier))
                        .with_no_client_auth(),
                )
                .https_or_http()
                .enable_http1()
                .wrap_connector(http_connector)
        } else {
            hyper_rustls::HttpsConnectorBuilder::new()
                .with_native_roots()
                .map_err(|e| anyhow::anyhow!("Failed to load native root certificates: {e}"))?
                .https_or_http()
                .enable_http1()
                .wrap_connector(http_connector)
        };

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(pool.idle_timeout_secs))
            .pool_max_idle_per_host(pool.max_idle_per_host)
            .build(https_connector);

        info!(
            "Connection pool configured (HTTP/1.1): max_idle={}, idle_timeout={}s, keepalive={}s",
            pool.max_idle_per_host, pool.idle_timeout_secs, pool.keepalive_timeout_secs
        );

        Ok(Self { client })
    }

    async fn send(&self, request: BackendRequest) -> Result<BackendResponse, TransportError> {
        let mut builder = Request::builder()
            .method(request.method.to_hyper())
            .uri(request.url.as_str());

        // Hop-by-hop and framing headers are recomputed for the outbound body.
        let skipped = [HOST, CONTENT_LENGTH, TRANSFER_ENCODING, CONNECTION];
        for (name, value) in request.headers.iter() {
            if !skipped.contains(name) {
                builder = builder.header(name, value);
            }
        }

        let outbound = builder
            .body(Full::new(request.body))
            .map_err(|e| TransportError::Network(format!("invalid request: {e}")))?;

        let response = self
            .client
            .request(outbound)
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| TransportError::Network(format!("failed to read response body: {e}")))?
            .to_bytes();

        debug!(
            "Backend {} answered {} ({} bytes)",
            request.url,
            parts.status,
            body.len()
        );
        Ok(BackendResponse::new(parts.status, parts.headers, body))
    }
}

#[async_trait]
impl BackendTransport for HyperTransport {
    async fn call(&self, request: BackendRequest) -> Result<BackendResponse, TransportError> {
        let timeout = request.timeout;
        tokio::time::timeout(timeout, self.send(request))
            .await
            .map_err(|_| TransportError::Timeout)?
    }
}
