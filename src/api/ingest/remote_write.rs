//! Prometheus Remote Write receiver
//!
//! Accepts snappy-compressed protobuf write requests and appends every
//! exemplar they carry. Samples are ignored.

use crate::api::telemetry::{record_remote_write_body, record_remote_write_exemplars};
use crate::api::ApiState;
use crate::model::{Exemplar, Labels};
use crate::Result;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use prost::Message;
use tracing::{debug, error};

/// Prometheus remote-write protobuf types.
///
/// Hand-written types matching `prometheus/prompb/remote.proto` and
/// `types.proto`, exemplars included.
pub mod proto {
    /// A write request containing one or more time series.
    #[derive(Clone, PartialEq, prost::Message)]
    pub struct WriteRequest {
        #[prost(message, repeated, tag = "1")]
        pub timeseries: Vec<TimeSeries>,
    }

    /// A time series with labels, samples and exemplars.
    #[derive(Clone, PartialEq, prost::Message)]
    pub struct TimeSeries {
        #[prost(message, repeated, tag = "1")]
        pub labels: Vec<Label>,
        #[prost(message, repeated, tag = "2")]
        pub samples: Vec<Sample>,
        #[prost(message, repeated, tag = "3")]
        pub exemplars: Vec<Exemplar>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Label {
        #[prost(string, tag = "1")]
        pub name: String,
        #[prost(string, tag = "2")]
        pub value: String,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Sample {
        #[prost(double, tag = "1")]
        pub value: f64,
        /// Milliseconds since epoch.
        #[prost(int64, tag = "2")]
        pub timestamp: i64,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Exemplar {
        #[prost(message, repeated, tag = "1")]
        pub labels: Vec<Label>,
        #[prost(double, tag = "2")]
        pub value: f64,
        /// Milliseconds since epoch.
        #[prost(int64, tag = "3")]
        pub timestamp: i64,
    }
}

/// Handle Prometheus Remote Write requests
///
/// POST /api/v1/write
/// Content-Encoding: snappy
/// Content-Type: application/x-protobuf
pub async fn handle_remote_write(State(state): State<ApiState>, body: Bytes) -> Response {
    record_remote_write_body(body.len());
    let request = match decode_write_request(&body) {
        Ok(request) => request,
        Err(e) => {
            error!(error = %e, "Error decoding remote write request");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let mut appended = 0u64;
    let mut failed = 0u64;
    for series in request.timeseries {
        if series.exemplars.is_empty() {
            continue;
        }
        let labels = labels_from_proto(series.labels);
        for proto_exemplar in series.exemplars {
            let exemplar = Exemplar::new(
                labels_from_proto(proto_exemplar.labels),
                proto_exemplar.timestamp,
                proto_exemplar.value,
            );
            match state.store.append(&labels, &exemplar).await {
                Ok(()) => appended += 1,
                Err(e) => {
                    failed += 1;
                    error!(
                        series = %labels,
                        exemplar = %exemplar.labels,
                        timestamp = exemplar.timestamp,
                        error = %e,
                        "Error appending exemplar"
                    );
                }
            }
        }
    }

    record_remote_write_exemplars("success", appended);
    record_remote_write_exemplars("error", failed);
    debug!(appended, failed, "Processed remote write request");

    StatusCode::NO_CONTENT.into_response()
}

/// Decompress and decode a remote-write body
pub fn decode_write_request(body: &[u8]) -> Result<proto::WriteRequest> {
    let decompressed = snap::raw::Decoder::new().decompress_vec(body)?;
    Ok(proto::WriteRequest::decode(decompressed.as_slice())?)
}

fn labels_from_proto(labels: Vec<proto::Label>) -> Labels {
    Labels::from_pairs(labels.into_iter().map(|label| (label.name, label.value)))
}
