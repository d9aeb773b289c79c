//! Forwarding decision engine.
//!
//! Given a resolved service, the engine either answers from the service's mock
//! group or relays the call to the backend, bounds the wait, assembles the
//! response envelope and writes the audit record.

use super::content::check_content_type;
use super::envelope::ResponseEnvelope;
use super::headers::{
    soap_action, MoxyHeadersExt, SOAP_ACTION, SOAP_CONTENT_TYPE, X_MOXY_MOCKED, X_MOXY_PROXIED,
    X_MOXY_REPLAYED,
};
use crate::error::GatewayError;
use crate::metrics;
use crate::mock::{MockResolver, MOCK_DELAY_CEILING};
use crate::model::{HttpMethod, RequestData, Service, ServiceKind, UNASSIGNED_ID};
use crate::registry::{effective_remote_url, RestMatch};
use crate::store::PersistenceStore;
use crate::transport::{BackendRequest, BackendTransport, TransportError};
use bytes::Bytes;
use chrono::Utc;
use hyper::header::{
    HeaderName, HeaderValue, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, HOST, TRANSFER_ENCODING,
};
use hyper::{HeaderMap, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// A service together with the backend URL this call goes to.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTarget {
    pub service: Service,
    pub url: String,
    /// Inbound REST call, recorded for replays.
    pub call: Option<String>,
}

impl ResolvedTarget {
    /// Call straight to the service's remote target.
    pub fn direct(service: Service) -> Self {
        let call = match service.kind {
            ServiceKind::Soap => None,
            ServiceKind::Rest { .. } => Some(service.local_target.clone()),
        };
        Self {
            url: service.remote_target.clone(),
            call,
            service,
        }
    }

    pub fn rest(matched: RestMatch, call: &str) -> Self {
        Self {
            service: matched.service,
            url: matched.effective_url,
            call: Some(call.to_string()),
        }
    }
}

/// Inbound call as seen by the transport layer.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub sender: String,
    pub method: HttpMethod,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Raw, still percent-encoded query string.
    pub query: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardOptions {
    pub is_replay: bool,
    /// Caller-imposed bound on the whole dispatch, on top of the service
    /// timeout and the mock delay ceiling.
    pub deadline: Option<Duration>,
}

impl ForwardOptions {
    pub fn replay() -> Self {
        Self {
            is_replay: true,
            deadline: None,
        }
    }
}

/// Outbound URL and the content used for mock matching and auditing.
struct Outbound {
    url: String,
    content: String,
    body: Bytes,
}

impl Outbound {
    fn build(target: &ResolvedTarget, request: &InboundRequest) -> Self {
        let raw_query = request.query.as_deref().filter(|q| !q.is_empty());
        let url = match raw_query {
            Some(query) => format!("{}?{}", target.url, query),
            None => target.url.clone(),
        };

        let carries_body = match target.service.kind {
            ServiceKind::Soap => true,
            ServiceKind::Rest { method } => method.has_body(),
        };

        if carries_body {
            return Self {
                url,
                content: String::from_utf8_lossy(&request.body).into_owned(),
                body: request.body.clone(),
            };
        }

        let content = match raw_query {
            Some(query) => format!("{}?{}", target.url, decode_query(query)),
            None => target.url.clone(),
        };
        Self {
            url,
            content,
            body: Bytes::new(),
        }
    }
}

/// Form-style decoding: `+` is a space, then percent escapes.
fn decode_query(query: &str) -> String {
    let spaced = query.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Headers worth keeping for a replay. Framing is renegotiated per connection.
fn recordable_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter(|(name, _)| ![HOST, CONTENT_LENGTH, TRANSFER_ENCODING, CONNECTION].contains(*name))
        .filter_map(|(name, value)| Some((name.to_string(), value.to_str().ok()?.to_string())))
        .collect()
}

/// Headers for a replayed call. Records written before headers were kept
/// only carry the content type and SOAP action.
fn replay_headers(record: &RequestData) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in &record.request_headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => warn!("Dropping unreplayable header '{}' of request {}", name, record.id),
        }
    }
    if !record.request_headers.is_empty() {
        return headers;
    }

    if let Some(value) = record
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
    {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Some(value) = record
        .soap_action
        .as_deref()
        .and_then(|action| HeaderValue::from_str(action).ok())
    {
        headers.insert(SOAP_ACTION.clone(), value);
    }
    headers
}

pub struct ForwardingEngine {
    store: Arc<dyn PersistenceStore>,
    transport: Arc<dyn BackendTransport>,
    mocks: MockResolver,
    mock_ceiling: Duration,
}

impl ForwardingEngine {
    pub fn new(store: Arc<dyn PersistenceStore>, transport: Arc<dyn BackendTransport>) -> Self {
        Self {
            mocks: MockResolver::new(store.clone()),
            store,
            transport,
            mock_ceiling: MOCK_DELAY_CEILING,
        }
    }

    /// Lower the mock delay ceiling. It can never be raised above ten seconds.
    pub fn with_mock_ceiling(mut self, ceiling: Duration) -> Self {
        self.mock_ceiling = ceiling.min(MOCK_DELAY_CEILING);
        self
    }

    pub async fn forward(
        &self,
        target: &ResolvedTarget,
        request: InboundRequest,
        options: ForwardOptions,
    ) -> Result<ResponseEnvelope, GatewayError> {
        let service = &target.service;
        let kind = service.kind;

        if request.method != kind.method() {
            return Err(GatewayError::UnsupportedHttpMethod(
                request.method.to_string(),
            ));
        }
        let content_type = request.headers.text(&CONTENT_TYPE).map(str::to_string);
        check_content_type(kind, content_type.as_deref(), !request.body.is_empty())?;

        let outbound = Outbound::build(target, &request);
        let started_at = Utc::now();
        let start = Instant::now();

        let result = if service.use_mock_group {
            self.answer_from_mock(service, &outbound, options.deadline)
                .await
        } else {
            self.call_backend(service, &outbound, &request.headers, options.deadline)
                .await
        };
        let elapsed = start.elapsed();

        let outcome = match &result {
            Ok(_) if service.use_mock_group => "mock",
            Ok(_) => "live",
            Err(e) => e.kind(),
        };
        metrics::record_request(kind.protocol(), outcome);
        debug!(
            "{} call to {} finished as {} in {}ms",
            kind,
            outbound.url,
            outcome,
            elapsed.as_millis()
        );

        if !options.is_replay {
            self.audit(AuditEntry {
                target,
                request: &request,
                outbound: &outbound,
                content_type,
                started_at,
                elapsed,
                result: &result,
            });
        }

        let mut envelope = result?;
        if options.is_replay {
            envelope.chunked = false;
            envelope.mark(&X_MOXY_REPLAYED);
        }
        Ok(envelope)
    }

    /// Re-run a recorded call through the same decision logic, with the
    /// recorded inbound headers. No new audit record is written.
    pub async fn replay(&self, id: i64) -> Result<ResponseEnvelope, GatewayError> {
        let record = self
            .store
            .load_request_data(id)?
            .ok_or(GatewayError::RequestNotFound(id))?;
        let service = self
            .store
            .find_service_by_id(record.service_id)?
            .ok_or_else(|| GatewayError::ServiceNotFound {
                kind: "recorded".to_string(),
                local_target: record.local_target.clone(),
                environment: record.environment_id.to_string(),
            })?;

        info!(
            "Replaying request {} against {} service {}",
            id, service.kind, service.id
        );

        let method = service.kind.method();
        let url = match (&service.kind, &record.request_call) {
            (ServiceKind::Rest { .. }, Some(call)) => {
                effective_remote_url(call, &service.local_target, &service.remote_target)
            }
            _ => service.remote_target.clone(),
        };

        let headers = replay_headers(&record);
        let carries_body = matches!(service.kind, ServiceKind::Soap) || method.has_body();
        let body = if carries_body {
            Bytes::from(record.request.clone())
        } else {
            Bytes::new()
        };

        let target = ResolvedTarget {
            url,
            call: record.request_call.clone(),
            service,
        };
        let request = InboundRequest {
            sender: record.sender.clone(),
            method,
            headers,
            body,
            query: record.query.clone(),
        };

        self.forward(&target, request, ForwardOptions::replay())
            .await
    }

    async fn answer_from_mock(
        &self,
        service: &Service,
        outbound: &Outbound,
        deadline: Option<Duration>,
    ) -> Result<ResponseEnvelope, GatewayError> {
        let mock = self
            .mocks
            .find_match(service.mock_group_id, &outbound.content)?;
        let delay = mock.delay(self.mock_ceiling);
        let bound = deadline.map_or(delay, |d| d.min(delay));

        if tokio::time::timeout(bound, tokio::time::sleep(delay))
            .await
            .is_err()
        {
            warn!(
                "Mock {} delay of {}ms exceeded the caller deadline of {}ms",
                mock.id,
                delay.as_millis(),
                bound.as_millis()
            );
            return Err(GatewayError::BackendTimeout {
                url: outbound.url.clone(),
                timeout_ms: bound.as_millis() as u64,
            });
        }
        metrics::record_mock_delay(delay.as_millis() as u64);

        let status = StatusCode::from_u16(mock.http_status).unwrap_or_else(|_| {
            warn!(
                "Mock {} has invalid status {}, answering 500",
                mock.id, mock.http_status
            );
            StatusCode::INTERNAL_SERVER_ERROR
        });

        let mut envelope = ResponseEnvelope::new(status, Bytes::from(mock.response.clone()));
        envelope.headers = mock.headers();
        let content_type = match service.kind {
            ServiceKind::Soap => Some(SOAP_CONTENT_TYPE.to_string()),
            ServiceKind::Rest { .. } => envelope.header("content-type").map(str::to_string),
        };
        envelope.content_type = content_type;
        envelope.mark(&X_MOXY_PROXIED);
        envelope.mark(&X_MOXY_MOCKED);

        debug!(
            "Answered {} from mock {} after {}ms",
            service.local_target,
            mock.id,
            delay.as_millis()
        );
        Ok(envelope)
    }

    async fn call_backend(
        &self,
        service: &Service,
        outbound: &Outbound,
        inbound_headers: &HeaderMap,
        deadline: Option<Duration>,
    ) -> Result<ResponseEnvelope, GatewayError> {
        let timeout = deadline.map_or(service.timeout(), |d| d.min(service.timeout()));

        let mut headers = inbound_headers.clone();
        headers.set_marker(&X_MOXY_PROXIED);
        if service.kind == ServiceKind::Soap && !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(SOAP_CONTENT_TYPE));
        }

        let request = BackendRequest {
            url: outbound.url.clone(),
            method: service.kind.method(),
            headers,
            body: outbound.body.clone(),
            timeout,
        };

        debug!(
            "Dispatching {} {} (timeout {}ms)",
            request.method,
            request.url,
            timeout.as_millis()
        );
        let start = Instant::now();
        let result = tokio::time::timeout(timeout, self.transport.call(request)).await;
        metrics::record_backend_duration(
            service.kind.protocol(),
            start.elapsed().as_secs_f64() * 1000.0,
        );

        let response = match result {
            Ok(Ok(response)) => response,
            Err(_) | Ok(Err(TransportError::Timeout)) => {
                warn!(
                    "Backend {} did not answer within {}ms",
                    outbound.url,
                    timeout.as_millis()
                );
                return Err(GatewayError::BackendTimeout {
                    url: outbound.url.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            Ok(Err(TransportError::Network(reason))) => {
                warn!("Backend {} unavailable: {}", outbound.url, reason);
                return Err(GatewayError::BackendUnavailable {
                    url: outbound.url.clone(),
                    reason,
                });
            }
        };

        let content_type = match service.kind {
            ServiceKind::Soap => Some(SOAP_CONTENT_TYPE.to_string()),
            ServiceKind::Rest { .. } => response.content_type.clone(),
        };
        let mut envelope = ResponseEnvelope::new(response.status, response.body)
            .with_headers(&response.headers)
            .with_content_type(content_type);
        envelope.mark(&X_MOXY_PROXIED);
        Ok(envelope)
    }

    fn audit(&self, entry: AuditEntry<'_>) {
        let (status, response) = match entry.result {
            Ok(envelope) => (
                envelope.status.as_u16(),
                String::from_utf8_lossy(&envelope.body).into_owned(),
            ),
            Err(
                e @ (GatewayError::NoMockMatched(_)
                | GatewayError::BackendTimeout { .. }
                | GatewayError::BackendUnavailable { .. }),
            ) => (e.status_code().as_u16(), e.to_string()),
            Err(_) => return,
        };

        let service = &entry.target.service;
        let (soap_action, request_call) = match service.kind {
            ServiceKind::Soap => (soap_action(&entry.request.headers), None),
            ServiceKind::Rest { .. } => (None, entry.target.call.clone()),
        };

        let record = RequestData {
            id: UNASSIGNED_ID,
            sender: entry.request.sender.clone(),
            soap_action,
            request_call,
            environment_id: service.environment_id,
            local_target: service.local_target.clone(),
            remote_target: entry.outbound.url.clone(),
            request: entry.outbound.content.clone(),
            query: entry.request.query.clone(),
            content_type: entry.content_type,
            request_headers: recordable_headers(&entry.request.headers),
            start_time: entry.started_at,
            response: Some(response),
            time_in_millis: entry.elapsed.as_millis() as u64,
            status,
            service_id: service.id,
        };

        match self.store.insert_request_data(record) {
            Ok(saved) => debug!("Recorded request {} for service {}", saved.id, service.id),
            Err(e) => error!(
                "Failed to record request for service {}: {:#}",
                service.id, e
            ),
        }
    }
}

struct AuditEntry<'a> {
    target: &'a ResolvedTarget,
    request: &'a InboundRequest,
    outbound: &'a Outbound,
    content_type: Option<String>,
    started_at: chrono::DateTime<Utc>,
    elapsed: Duration,
    result: &'a Result<ResponseEnvelope, GatewayError>,
}
