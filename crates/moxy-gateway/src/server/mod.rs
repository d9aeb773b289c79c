//! HTTP surface of the gateway.

mod responses;
mod router;

use crate::forward::ForwardingEngine;
use crate::registry::ServiceRegistry;
use crate::store::PersistenceStore;
use crate::transport::BackendTransport;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use router::route_request;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info};

/// Everything a request handler needs, shared across connections.
pub struct GatewayState {
    pub store: Arc<dyn PersistenceStore>,
    pub registry: ServiceRegistry,
    pub engine: ForwardingEngine,
}

impl GatewayState {
    pub fn new(
        store: Arc<dyn PersistenceStore>,
        transport: Arc<dyn BackendTransport>,
        mock_ceiling: Duration,
    ) -> Self {
        Self {
            registry: ServiceRegistry::new(store.clone()),
            engine: ForwardingEngine::new(store.clone(), transport).with_mock_ceiling(mock_ceiling),
            store,
        }
    }
}

pub struct GatewayServer {
    listener: TcpListener,
    state: Arc<GatewayState>,
}

impl GatewayServer {
    pub async fn bind(addr: SocketAddr, state: Arc<GatewayState>) -> Result<Self, anyhow::Error> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, state })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, anyhow::Error> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the task is dropped.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        info!("Moxy gateway listening on http://{}", self.local_addr()?);

        loop {
            let (stream, remote) = self.listener.accept().await?;
            let io = TokioIo::new(stream);
            let state = Arc::clone(&self.state);

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let state = Arc::clone(&state);
                    async move { route_request(req, state, remote).await }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("Gateway connection error: {}", e);
                }
            });
        }
    }
}
