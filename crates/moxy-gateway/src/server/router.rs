//! Route parsing and dispatch for the gateway's HTTP surface.

use super::responses::{error_response, json_response, not_found, text_response};
use super::GatewayState;
use crate::error::GatewayError;
use crate::forward::{ForwardOptions, InboundRequest, ResolvedTarget};
use crate::metrics::collect_metrics;
use crate::model::{HttpMethod, ServiceKey, ServiceKind};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{HeaderMap, Method, Request, Response, StatusCode};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

/// Routes that resolve a service and forward the call.
#[derive(Debug, Clone, PartialEq)]
enum GatewayRoute {
    /// POST /soap/:environment/:localTarget...
    Soap {
        environment: String,
        local_target: String,
    },
    /// POST /soap-auto/:group/:environment/:remoteUrl...
    SoapAuto {
        group: String,
        environment: String,
        remote_url: String,
    },
    /// ANY /rest/:environment/:call...
    Rest { environment: String, call: String },
    /// ANY /rest-auto/:group/:environment/:remoteUrl...
    RestAuto {
        group: String,
        environment: String,
        remote_url: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Route {
    Gateway(GatewayRoute),
    /// POST /replay/:id
    Replay(i64),
    /// GET /metrics
    Metrics,
    /// GET /admin/services
    Services,
    /// GET /admin/requests/:id
    RequestRecord(i64),
}

impl Route {
    fn parse(method: &Method, path: &str) -> Option<Self> {
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();

        let gateway = match segments.as_slice() {
            ["soap", environment, rest @ ..] if !rest.is_empty() => Some(GatewayRoute::Soap {
                environment: environment.to_string(),
                local_target: rest.join("/"),
            }),
            ["soap-auto", group, environment, rest @ ..] if !rest.is_empty() => {
                Some(GatewayRoute::SoapAuto {
                    group: group.to_string(),
                    environment: environment.to_string(),
                    remote_url: remote_url(rest),
                })
            }
            ["rest", environment, rest @ ..] if !rest.is_empty() => Some(GatewayRoute::Rest {
                environment: environment.to_string(),
                call: rest.join("/"),
            }),
            ["rest-auto", group, environment, rest @ ..] if !rest.is_empty() => {
                Some(GatewayRoute::RestAuto {
                    group: group.to_string(),
                    environment: environment.to_string(),
                    remote_url: remote_url(rest),
                })
            }
            _ => None,
        };
        if let Some(gateway) = gateway {
            return Some(Route::Gateway(gateway));
        }

        match (method, segments.as_slice()) {
            (&Method::POST, ["replay", id]) => id.parse().ok().map(Route::Replay),
            (&Method::GET, ["metrics"]) => Some(Route::Metrics),
            (&Method::GET, ["admin", "services"]) => Some(Route::Services),
            (&Method::GET, ["admin", "requests", id]) => {
                id.parse().ok().map(Route::RequestRecord)
            }
            _ => None,
        }
    }
}

/// Rebuild a backend URL carried in the path. Clients may percent-encode it whole.
fn remote_url(segments: &[&str]) -> String {
    let joined = segments.join("/");
    if joined.contains("://") {
        return joined;
    }
    match urlencoding::decode(&joined) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => joined,
    }
}

/// Client address, preferring the first `X-Forwarded-For` hop.
fn sender(headers: &HeaderMap, remote: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| remote.ip().to_string())
}

/// Main request router
pub async fn route_request(
    req: Request<Incoming>,
    state: Arc<GatewayState>,
    remote: SocketAddr,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    debug!("Gateway: {} {}", method, path);

    let Some(route) = Route::parse(&method, &path) else {
        return Ok(not_found());
    };

    let response = match route {
        Route::Metrics => text_response(collect_metrics()),
        Route::Services => match state.store.all_services() {
            Ok(services) => json_response(StatusCode::OK, &services),
            Err(e) => error_response(&GatewayError::from(e)),
        },
        Route::RequestRecord(id) => match state.store.load_request_data(id) {
            Ok(Some(record)) => json_response(StatusCode::OK, &record),
            Ok(None) => error_response(&GatewayError::RequestNotFound(id)),
            Err(e) => error_response(&GatewayError::from(e)),
        },
        Route::Replay(id) => match state.engine.replay(id).await {
            Ok(envelope) => envelope.into_response(),
            Err(e) => error_response(&e),
        },
        Route::Gateway(route) => {
            let (parts, body) = req.into_parts();
            let body = body.collect().await?.to_bytes();
            match dispatch(route, &parts, body, &state, remote).await {
                Ok(response) => response,
                Err(e) => {
                    debug!("Gateway call {} {} failed: {}", method, path, e);
                    error_response(&e)
                }
            }
        }
    };

    Ok(response)
}

/// Resolve the service for a gateway route and forward the call.
async fn dispatch(
    route: GatewayRoute,
    parts: &hyper::http::request::Parts,
    body: Bytes,
    state: &GatewayState,
    remote: SocketAddr,
) -> Result<Response<Full<Bytes>>, GatewayError> {
    let method: HttpMethod = parts.method.as_str().parse()?;
    let registry = &state.registry;

    let target = match route {
        GatewayRoute::Soap {
            environment,
            local_target,
        } => {
            let service = registry
                .resolve(ServiceKind::Soap, &local_target, &environment)?
                .ok_or_else(|| {
                    ServiceKey::new(ServiceKind::Soap, &local_target, &environment).not_found()
                })?;
            ResolvedTarget::direct(service)
        }
        GatewayRoute::SoapAuto {
            group,
            environment,
            remote_url,
        } => ResolvedTarget::direct(registry.resolve_or_auto_create(
            &group,
            &environment,
            &remote_url,
            ServiceKind::Soap,
        )?),
        GatewayRoute::Rest { environment, call } => {
            let matched = registry
                .match_rest_call(&environment, method, &call)?
                .ok_or_else(|| {
                    ServiceKey::new(ServiceKind::rest(method), &call, &environment).not_found()
                })?;
            ResolvedTarget::rest(matched, &call)
        }
        GatewayRoute::RestAuto {
            group,
            environment,
            remote_url,
        } => ResolvedTarget::direct(registry.resolve_or_auto_create(
            &group,
            &environment,
            &remote_url,
            ServiceKind::rest(method),
        )?),
    };

    let request = InboundRequest {
        sender: sender(&parts.headers, remote),
        method,
        headers: parts.headers.clone(),
        body,
        query: parts.uri.query().map(str::to_string),
    };

    let envelope = state
        .engine
        .forward(&target, request, ForwardOptions::default())
        .await?;
    Ok(envelope.into_response())
}
