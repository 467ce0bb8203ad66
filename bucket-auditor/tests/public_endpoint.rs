mod common;

use bucket_auditor::probe::ProbeEngine;
use bucket_auditor::public_endpoint::{HttpPublicReader, PublicReader};
use bucket_auditor::types::{BucketName, EndpointStyle, ProbeOutcome};
use common::FakeStore;
use std::sync::Arc;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn path_reader(server: &MockServer) -> HttpPublicReader {
    HttpPublicReader::new(&server.uri(), EndpointStyle::Path, 5).unwrap()
}

#[tokio::test]
async fn test_head_returns_ok_status() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/alpha/probe.txt"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let status = path_reader(&server)
        .head(&BucketName::from("alpha"), "probe.txt")
        .await
        .unwrap();

    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_head_returns_forbidden_status() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/beta/probe.txt"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let status = path_reader(&server)
        .head(&BucketName::from("beta"), "probe.txt")
        .await
        .unwrap();

    assert_eq!(status, 403);
}

#[tokio::test]
async fn test_request_carries_no_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    path_reader(&server)
        .head(&BucketName::from("alpha"), "probe.txt")
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let headers = &requests[0].headers;
    assert!(!headers.contains_key("authorization"));
    assert!(!headers.contains_key("x-amz-security-token"));
    assert!(!headers.contains_key("x-amz-date"));
}

#[tokio::test]
async fn test_connection_refused_is_an_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let reader =
        HttpPublicReader::new(&format!("http://127.0.0.1:{}", port), EndpointStyle::Path, 2)
            .unwrap();

    let result = reader.head(&BucketName::from("alpha"), "probe.txt").await;
    assert!(result.is_err());

    let store = Arc::new(FakeStore::with_buckets(&["alpha"]));
    let verdict = ProbeEngine::new(store.clone(), Arc::new(reader))
        .probe(&BucketName::from("alpha"))
        .await;

    assert!(!verdict.publicly_readable);
    assert!(matches!(verdict.outcome, ProbeOutcome::ReadFailed(_)));
    assert_eq!(store.delete_count("alpha"), 1);
}

#[tokio::test]
async fn test_probe_against_public_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path_regex(r"^/alpha/bucket-audit-probe-[0-9a-f]{32}$"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path_regex(r"^/beta/"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let store = Arc::new(FakeStore::with_buckets(&["alpha", "beta"]));
    let engine = ProbeEngine::new(store.clone(), Arc::new(path_reader(&server)));

    let alpha = engine.probe(&BucketName::from("alpha")).await;
    let beta = engine.probe(&BucketName::from("beta")).await;

    assert!(alpha.publicly_readable);
    assert!(!beta.publicly_readable);
    assert_eq!(beta.outcome, ProbeOutcome::ReadStatus(403));
    assert_eq!(store.delete_count("alpha"), 1);
    assert_eq!(store.delete_count("beta"), 1);
}

#[tokio::test]
async fn test_redirect_is_not_public() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/moved/probe.txt"))
        .respond_with(ResponseTemplate::new(301))
        .mount(&server)
        .await;

    let store = Arc::new(FakeStore::with_buckets(&["moved"]));
    let engine = ProbeEngine::new(store, Arc::new(path_reader(&server)))
        .with_fixed_key("probe.txt".to_string());

    let verdict = engine.probe(&BucketName::from("moved")).await;

    assert!(!verdict.publicly_readable);
    assert_eq!(verdict.outcome, ProbeOutcome::ReadStatus(301));
}
