//! HTTP API tests
//!
//! Drive the router in-process with `tower::ServiceExt::oneshot`:
//! - Health and readiness endpoints
//! - Remote write of exemplars, including undecodable bodies
//! - `query_exemplars` over GET and POST, with the Prometheus envelope
//! - Parameter validation errors

use exemplars_storage::api::build_http_router;
use exemplars_storage::api::ingest::remote_write::proto;
use exemplars_storage::engine::MemoryEngine;
use exemplars_storage::store::{ColumnarExemplarStore, ExemplarStore};

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use prost::Message;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

async fn new_router() -> Router {
    let store = ColumnarExemplarStore::open(Arc::new(MemoryEngine::default()), "exemplars")
        .await
        .unwrap();
    let store: Arc<dyn ExemplarStore> = Arc::new(store);
    build_http_router(store)
}

fn label(name: &str, value: &str) -> proto::Label {
    proto::Label {
        name: name.to_string(),
        value: value.to_string(),
    }
}

fn series(labels: &[(&str, &str)], exemplars: Vec<proto::Exemplar>) -> proto::TimeSeries {
    proto::TimeSeries {
        labels: labels.iter().map(|(n, v)| label(n, v)).collect(),
        samples: vec![proto::Sample {
            value: 1.0,
            timestamp: 1000,
        }],
        exemplars,
    }
}

fn exemplar(trace_id: &str, timestamp: i64, value: f64) -> proto::Exemplar {
    proto::Exemplar {
        labels: vec![label("trace_id", trace_id)],
        value,
        timestamp,
    }
}

fn write_body(timeseries: Vec<proto::TimeSeries>) -> Vec<u8> {
    let request = proto::WriteRequest { timeseries };
    snap::raw::Encoder::new()
        .compress_vec(&request.encode_to_vec())
        .unwrap()
}

async fn remote_write(router: &Router, body: Vec<u8>) -> StatusCode {
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/write")
        .header(header::CONTENT_ENCODING, "snappy")
        .header(header::CONTENT_TYPE, "application/x-protobuf")
        .body(Body::from(body))
        .unwrap();
    router.clone().oneshot(request).await.unwrap().status()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn get_exemplars(router: &Router, query_string: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .uri(format!("/api/v1/query_exemplars?{}", query_string))
        .body(Body::empty())
        .unwrap();
    send(router, request).await
}

/// Write the two-series fixture used by the query tests
async fn seed(router: &Router) {
    let body = write_body(vec![
        series(
            &[("__name__", "http_requests_total"), ("job", "a"), ("instance", "x")],
            vec![exemplar("t1", 1000, 3.5)],
        ),
        series(
            &[("__name__", "http_requests_total"), ("job", "b")],
            vec![exemplar("t2", 2000, 1.0)],
        ),
    ]);
    assert_eq!(remote_write(router, body).await, StatusCode::NO_CONTENT);
}

// =========================================================================
// Health
// =========================================================================

#[tokio::test]
async fn test_health_and_ready() {
    let router = new_router().await;
    for (uri, expected) in [("/health", "OK"), ("/ready", "READY")] {
        let response = router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], expected.as_bytes());
    }
}

// =========================================================================
// Remote write
// =========================================================================

#[tokio::test]
async fn test_remote_write_without_exemplars_is_accepted() {
    let router = new_router().await;
    let body = write_body(vec![series(&[("job", "a")], Vec::new())]);
    assert_eq!(remote_write(&router, body).await, StatusCode::NO_CONTENT);

    let (status, json) = get_exemplars(&router, "query=%7Bjob%3D%22a%22%7D&start=0&end=10").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"], Value::Array(Vec::new()));
}

#[tokio::test]
async fn test_remote_write_garbage_is_bad_request() {
    let router = new_router().await;
    let status = remote_write(&router, b"not snappy at all".to_vec()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_remote_write_skips_unstorable_exemplars() {
    let router = new_router().await;
    let body = write_body(vec![
        series(&[("bad name", "v")], vec![exemplar("t0", 500, 1.0)]),
        series(&[("job", "a")], vec![exemplar("t1", 1000, 2.0)]),
    ]);
    assert_eq!(remote_write(&router, body).await, StatusCode::NO_CONTENT);

    let (_, json) = get_exemplars(&router, "query=%7Bjob%3D%22a%22%7D&start=0&end=10").await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
}

// =========================================================================
// query_exemplars
// =========================================================================

#[tokio::test]
async fn test_query_exemplars_get_returns_matching_series() {
    let router = new_router().await;
    seed(&router).await;

    let (status, json) = get_exemplars(
        &router,
        "query=http_requests_total%7Bjob%3D%22a%22%7D&start=0&end=1.5",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "success");
    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["seriesLabels"]["job"], "a");
    assert_eq!(data[0]["seriesLabels"]["instance"], "x");
    assert_eq!(data[0]["seriesLabels"]["__name__"], "http_requests_total");

    let exemplars = data[0]["exemplars"].as_array().unwrap();
    assert_eq!(exemplars.len(), 1);
    assert_eq!(exemplars[0]["labels"]["trace_id"], "t1");
    assert_eq!(exemplars[0]["value"], "3.5");
    assert_eq!(exemplars[0]["timestamp"], 1.0);
}

#[tokio::test]
async fn test_query_exemplars_post_form_body() {
    let router = new_router().await;
    seed(&router).await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/query_exemplars?start=0")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(
            "query=rate(http_requests_total%5B5m%5D)&end=1970-01-01T00:00:03Z",
        ))
        .unwrap();
    let (status, json) = send(&router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_query_exemplars_multiple_selectors() {
    let router = new_router().await;
    seed(&router).await;

    let (_, json) = get_exemplars(
        &router,
        "query=%7Bjob%3D%22a%22%7D%20or%20%7Bjob%3D%22b%22%7D&start=0&end=10",
    )
    .await;
    assert_eq!(json["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_query_without_selectors_omits_data() {
    let router = new_router().await;
    let (status, json) = get_exemplars(&router, "query=vector(1)").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "success");
    assert!(json.get("data").is_none());
}

#[tokio::test]
async fn test_missing_query_is_bad_data() {
    let router = new_router().await;
    let (status, json) = get_exemplars(&router, "start=0&end=10").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], "error");
    assert_eq!(json["errorType"], "bad_data");
    assert_eq!(json["error"], "no expression found in input");
}

#[tokio::test]
async fn test_end_before_start_is_bad_data() {
    let router = new_router().await;
    let (status, json) = get_exemplars(&router, "query=up&start=10&end=5").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["errorType"], "bad_data");
}

#[tokio::test]
async fn test_unparseable_time_is_bad_data() {
    let router = new_router().await;
    let (status, json) = get_exemplars(&router, "query=up&start=yesterday").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"]
        .as_str()
        .unwrap()
        .contains("invalid parameter start"));
}

#[tokio::test]
async fn test_invalid_regex_is_bad_data() {
    let router = new_router().await;
    let (status, json) = get_exemplars(&router, "query=%7Bjob%3D~%22(%22%7D").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["errorType"], "bad_data");
}

#[tokio::test]
async fn test_selector_matching_every_series_is_bad_data() {
    let router = new_router().await;
    seed(&router).await;
    let (status, json) = get_exemplars(&router, "query=%7Bjob%3D%22%22%7D&start=0&end=10").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["errorType"], "bad_data");
}
