//! Telemetry for the HTTP surface: per-request metrics from a middleware plus
//! counters the remote-write and exemplar-query handlers report into.

use axum::extract::MatchedPath;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram};
use opentelemetry::KeyValue;
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{info_span, Instrument};

struct ApiInstruments {
    http_requests: Counter<u64>,
    http_duration_seconds: Histogram<f64>,
    http_errors: Counter<u64>,
    remote_write_exemplars: Counter<u64>,
    remote_write_body_bytes: Histogram<u64>,
    query_errors: Counter<u64>,
}

fn instruments() -> &'static ApiInstruments {
    static INSTRUMENTS: OnceLock<ApiInstruments> = OnceLock::new();
    INSTRUMENTS.get_or_init(|| {
        let meter = global::meter("exemplars.api");
        ApiInstruments {
            http_requests: meter
                .u64_counter("exemplars.api.http.requests")
                .with_description("HTTP requests handled, by route and status class")
                .init(),
            http_duration_seconds: meter
                .f64_histogram("exemplars.api.http.duration")
                .with_description("HTTP request latency")
                .with_unit("s")
                .init(),
            http_errors: meter
                .u64_counter("exemplars.api.http.errors")
                .with_description("HTTP responses with a 4xx or 5xx status")
                .init(),
            remote_write_exemplars: meter
                .u64_counter("exemplars.api.remote_write.exemplars")
                .with_description("Exemplars received over remote write by append outcome")
                .init(),
            remote_write_body_bytes: meter
                .u64_histogram("exemplars.api.remote_write.body_size")
                .with_description("Compressed remote-write body size")
                .with_unit("By")
                .init(),
            query_errors: meter
                .u64_counter("exemplars.api.query.errors")
                .with_description("Failed exemplar queries by Prometheus error type")
                .init(),
        }
    })
}

/// `2xx`, `4xx`, ... for a status code
fn status_class(status: u16) -> &'static str {
    match status {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}

/// Records request count, latency and errors for every HTTP request, under
/// an `http.request` span.
pub async fn http_observability_middleware(req: Request<axum::body::Body>, next: Next) -> Response {
    let started = Instant::now();
    let method = req.method().as_str().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let span = info_span!(
        "http.request",
        otel.kind = "server",
        http.request.method = %method,
        http.route = %route
    );
    let response = next.run(req).instrument(span).await;

    let status = response.status().as_u16();
    let attrs = [
        KeyValue::new("http.request.method", method),
        KeyValue::new("http.route", route),
        KeyValue::new("http.response.status_class", status_class(status)),
    ];
    let i = instruments();
    i.http_requests.add(1, &attrs);
    i.http_duration_seconds
        .record(started.elapsed().as_secs_f64(), &attrs);
    if status >= 400 {
        i.http_errors.add(1, &attrs);
    }

    response
}

/// Count remote-write exemplars by append outcome.
pub fn record_remote_write_exemplars(outcome: &'static str, count: u64) {
    if count == 0 {
        return;
    }
    instruments()
        .remote_write_exemplars
        .add(count, &[KeyValue::new("outcome", outcome)]);
}

pub fn record_remote_write_body(bytes: usize) {
    instruments()
        .remote_write_body_bytes
        .record(bytes as u64, &[]);
}

/// Count a failed exemplar query by its response `errorType`.
pub fn record_query_error(error_type: &'static str) {
    instruments()
        .query_errors
        .add(1, &[KeyValue::new("error.type", error_type)]);
}
