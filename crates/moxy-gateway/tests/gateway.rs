//! End-to-end tests: the gateway server in front of a local hyper backend.

use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use moxy_gateway::config::{ConnectionPoolConfig, StoreConfig};
use moxy_gateway::model::{Environment, Mock, MockGroupId, Service, ServiceKind, UNASSIGNED_ID};
use moxy_gateway::mock::BodyPredicate;
use moxy_gateway::server::{GatewayServer, GatewayState};
use moxy_gateway::store::{InMemoryStore, PersistenceStore};
use moxy_gateway::transport::HyperTransport;
use reqwest::Client;
use serde_json::Value;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Backend answering with the request body and echoing method and URI in headers.
async fn start_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let service = service_fn(|req: Request<hyper::body::Incoming>| async move {
                    let method = req.method().to_string();
                    let uri = req.uri().to_string();
                    let proxied = req
                        .headers()
                        .get("x-moxy-proxied")
                        .map(|v| v.to_str().unwrap_or_default().to_string())
                        .unwrap_or_default();
                    let body = req.into_body().collect().await.unwrap().to_bytes();
                    if uri.contains("slow") {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                    let response = Response::builder()
                        .header("content-type", "application/json")
                        .header("x-echo-method", method)
                        .header("x-echo-uri", uri)
                        .header("x-echo-proxied", proxied)
                        .body(Full::new(body))
                        .unwrap();
                    Ok::<_, Infallible>(response)
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    addr
}

struct Harness {
    base: String,
    backend: SocketAddr,
    store: Arc<InMemoryStore>,
    client: Client,
}

async fn start_gateway() -> Harness {
    let backend = start_backend().await;

    let mut config = StoreConfig::default();
    config.environments.push(Environment::new(1, "teamA", "prod"));

    let mut soap = Service::auto_generated(
        ServiceKind::Soap,
        "billing/Invoice",
        &format!("http://{backend}/billing/Invoice"),
        1,
    );
    soap.description = "billing".into();
    config.services.push(soap);

    let mut slow = Service::auto_generated(
        ServiceKind::Soap,
        "slow",
        &format!("http://{backend}/slow"),
        1,
    );
    slow.timeout_ms = 300;
    config.services.push(slow);

    let store = Arc::new(InMemoryStore::from_config(&config).unwrap());

    let group = store.insert_mock_group("billing-mocks").id;
    store
        .insert_mock(
            group,
            Mock {
                id: UNASSIGNED_ID,
                mock_group_id: MockGroupId::NONE,
                predicate: BodyPredicate::XPath {
                    xpath: "//InvoiceId".into(),
                    equals: Some("42".into()),
                },
                http_status: 200,
                response: "<Invoice><Id>42</Id></Invoice>".into(),
                http_headers: "X-Mock:invoice-42".into(),
                timeout_ms: 50,
            },
        )
        .unwrap();
    let mut mocked = Service::auto_generated(
        ServiceKind::Soap,
        "billing/Mocked",
        "http://unused.invalid/billing/Mocked",
        1,
    );
    mocked.use_mock_group = true;
    mocked.mock_group_id = group;
    store.insert_service(mocked).unwrap();

    let transport = Arc::new(
        HyperTransport::new(&ConnectionPoolConfig {
            tls_skip_verify: true,
            ..Default::default()
        })
        .unwrap(),
    );
    let state = Arc::new(GatewayState::new(
        store.clone(),
        transport,
        Duration::from_secs(10),
    ));
    let server = GatewayServer::bind("127.0.0.1:0".parse().unwrap(), state)
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());

    Harness {
        base: format!("http://{addr}"),
        backend,
        store,
        client: Client::new(),
    }
}

#[tokio::test]
async fn test_soap_call_is_relayed_and_recorded() {
    let h = start_gateway().await;

    let response = h
        .client
        .post(format!("{}/soap/prod/billing/Invoice", h.base))
        .header("content-type", "text/xml")
        .header("soapaction", "\"urn:GetInvoice\"")
        .body("<GetInvoice/>")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-moxy-proxied"], "true");
    assert_eq!(response.headers()["x-echo-method"], "POST");
    assert_eq!(response.headers()["x-echo-uri"], "/billing/Invoice");
    assert_eq!(response.headers()["x-echo-proxied"], "true");
    assert_eq!(
        response.headers()["content-type"],
        "text/xml; charset=utf-8"
    );
    assert_eq!(response.text().await.unwrap(), "<GetInvoice/>");

    let record = h.store.latest_request().unwrap();
    assert_eq!(record.soap_action.as_deref(), Some("urn:GetInvoice"));
    assert_eq!(record.sender, "127.0.0.1");
    assert_eq!(record.status, 200);

    let fetched: Value = h
        .client
        .get(format!("{}/admin/requests/{}", h.base, record.id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["soapAction"], "urn:GetInvoice");
    assert_eq!(fetched["request"], "<GetInvoice/>");
}

#[tokio::test]
async fn test_unregistered_soap_service_is_not_found() {
    let h = start_gateway().await;

    let response = h
        .client
        .post(format!("{}/soap/prod/unknown/Service", h.base))
        .body("<a/>")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "serviceNotFound");
    assert_eq!(h.store.request_count(), 0);
}

#[tokio::test]
async fn test_rest_auto_creates_service_once() {
    let h = start_gateway().await;
    let remote = urlencoding::encode(&format!("http://{}/orders", h.backend)).into_owned();

    for _ in 0..2 {
        let response = h
            .client
            .get(format!(
                "{}/rest-auto/teamA/prod/{}?id=7&name=a+b",
                h.base, remote
            ))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()["x-echo-method"], "GET");
        assert_eq!(response.headers()["x-echo-uri"], "/orders?id=7&name=a+b");
        assert_eq!(response.headers()["content-type"], "application/json");
    }

    let services: Vec<Value> = h
        .client
        .get(format!("{}/admin/services", h.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let orders: Vec<&Value> = services
        .iter()
        .filter(|s| s["local_target"] == "orders")
        .collect();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["description"], "auto-generated");
    assert_eq!(orders[0]["method"], "GET");

    // The auto-created service now serves the plain REST route too.
    let response = h
        .client
        .get(format!("{}/rest/prod/orders/99", h.base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-echo-uri"], "/orders/99");

    let record = h.store.latest_request().unwrap();
    assert_eq!(record.request_call.as_deref(), Some("orders/99"));
}

#[tokio::test]
async fn test_auto_create_in_unknown_environment() {
    let h = start_gateway().await;
    let before = h.store.all_services().unwrap().len();

    let response = h
        .client
        .post(format!(
            "{}/soap-auto/teamA/staging/http://{}/billing/New",
            h.base, h.backend
        ))
        .body("<a/>")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "unknownEnvironment");
    assert_eq!(h.store.all_services().unwrap().len(), before);
}

#[tokio::test]
async fn test_mocked_service_answers_without_backend() {
    let h = start_gateway().await;

    let response = h
        .client
        .post(format!("{}/soap/prod/billing/Mocked", h.base))
        .header("content-type", "text/xml")
        .body("<GetInvoice><InvoiceId>42</InvoiceId></GetInvoice>")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-mock"], "invoice-42");
    assert_eq!(response.headers()["x-moxy-mocked"], "true");
    assert_eq!(
        response.text().await.unwrap(),
        "<Invoice><Id>42</Id></Invoice>"
    );

    let response = h
        .client
        .post(format!("{}/soap/prod/billing/Mocked", h.base))
        .header("content-type", "text/xml")
        .body("<GetInvoice><InvoiceId>7</InvoiceId></GetInvoice>")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "noMockMatched");
}

#[tokio::test]
async fn test_slow_backend_times_out() {
    let h = start_gateway().await;

    let started = std::time::Instant::now();
    let response = h
        .client
        .post(format!("{}/soap/prod/slow", h.base))
        .body("<a/>")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 504);
    assert!(started.elapsed() < Duration::from_secs(3));
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "backendTimeout");
    assert_eq!(h.store.latest_request().unwrap().status, 504);
}

#[tokio::test]
async fn test_rejected_inputs() {
    let h = start_gateway().await;

    let response = h
        .client
        .get(format!("{}/soap/prod/billing/Invoice", h.base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 405);

    let response = h
        .client
        .post(format!("{}/soap/prod/billing/Invoice", h.base))
        .header("content-type", "application/json")
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 415);
    assert_eq!(h.store.request_count(), 0);
}

#[tokio::test]
async fn test_replay_reuses_recorded_request() {
    let h = start_gateway().await;

    h.client
        .post(format!("{}/soap/prod/billing/Invoice", h.base))
        .header("content-type", "text/xml")
        .body("<Replay/>")
        .send()
        .await
        .unwrap();
    let record = h.store.latest_request().unwrap();

    let response = h
        .client
        .post(format!("{}/replay/{}", h.base, record.id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-moxy-replayed"], "true");
    assert!(response.headers().get("transfer-encoding").is_none());
    assert_eq!(response.text().await.unwrap(), "<Replay/>");
    assert_eq!(h.store.request_count(), 1);

    let response = h
        .client
        .post(format!("{}/replay/9999", h.base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let h = start_gateway().await;

    h.client
        .post(format!("{}/soap/prod/billing/Invoice", h.base))
        .body("<a/>")
        .send()
        .await
        .unwrap();

    let text = h
        .client
        .get(format!("{}/metrics", h.base))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(text.contains("moxy_requests_total"));
}
