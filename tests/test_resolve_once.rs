//! One-shot lookups and the random-pick connector.

mod harness;

use bytes::Bytes;
use harness::{MockDaemon, Reply};
use http_body_util::{BodyExt, Empty, Full};
use hyper::{server::conn::http1, service::service_fn, Request, Response};
use hyper_util::rt::TokioIo;
use meta_resolver::{http_client, resolve_once, DiscoveryError, Error};
use std::convert::Infallible;
use tokio::net::TcpListener;

#[tokio::test]
async fn returns_the_list_as_sent() {
    let daemon = MockDaemon::spawn([(
        "/v1/services/web",
        vec![Reply::ok(r#"["b:2","a:1","b:2"]"#)],
    )])
    .await;

    let addresses = resolve_once(&daemon.client(), "web").await.unwrap();
    assert_eq!(addresses, vec!["b:2", "a:1", "b:2"]);
    assert_eq!(daemon.requests(), vec!["/v1/services/web"]);
}

#[tokio::test]
async fn service_names_are_escaped() {
    let daemon = MockDaemon::spawn([(
        "/v1/services/team%2Fweb%20api",
        vec![Reply::ok(r#"["a:1"]"#)],
    )])
    .await;

    let addresses = resolve_once(&daemon.client(), "team/web api").await.unwrap();
    assert_eq!(addresses, vec!["a:1"]);
}

#[tokio::test]
async fn errors_are_not_retried() {
    let daemon = MockDaemon::spawn([(
        "/v1/services/web",
        vec![Reply::status(500, "boom"), Reply::ok(r#"["a:1"]"#)],
    )])
    .await;

    match resolve_once(&daemon.client(), "web").await {
        Err(Error::Lookup {
            service,
            source: DiscoveryError::Status { status, body },
        }) => {
            assert_eq!(service, "web");
            assert_eq!(status.as_u16(), 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected a lookup error, got {other:?}"),
    }
    assert_eq!(daemon.requests().len(), 1);
}

#[tokio::test]
async fn object_bodies_are_rejected() {
    let daemon = MockDaemon::spawn([("/v1/services/web", vec![Reply::ok(r#"{"a:1":{}}"#)])]).await;

    let err = resolve_once(&daemon.client(), "web").await.unwrap_err();
    assert!(matches!(err.discovery(), Some(DiscoveryError::Decode(_))), "{err}");
}

/// Starts an HTTP server on loopback answering every request with `body`,
/// returning its address.
async fn spawn_instance(body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let service = service_fn(move |_: Request<hyper::body::Incoming>| async move {
                    let body = Full::new(Bytes::from_static(body.as_bytes()));
                    Ok::<_, Infallible>(Response::new(body))
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });
    address
}

#[tokio::test]
async fn http_client_reaches_a_service_instance() {
    let instance = spawn_instance("hello from billing").await;
    let listing = Box::leak(format!(r#"["{instance}"]"#).into_boxed_str());
    let daemon = MockDaemon::spawn([("/v1/services/billing", vec![Reply::ok(listing)])]).await;

    let client = http_client::<Empty<Bytes>>(daemon.client());
    let response = client
        .get("http://billing/invoices".parse().unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body, "hello from billing");
}

#[tokio::test]
async fn http_client_fails_without_instances() {
    let daemon = MockDaemon::spawn([("/v1/services/billing", vec![Reply::ok("[]")])]).await;

    let client = http_client::<Empty<Bytes>>(daemon.client());
    let err = client
        .get("http://billing/invoices".parse().unwrap())
        .await
        .unwrap_err();
    assert!(err.is_connect());
}
