//! Prometheus exemplar query API
//!
//! GET/POST /api/v1/query_exemplars with `query`, `start` and `end`. Answers
//! with the Prometheus response envelope.

use crate::api::telemetry::record_query_error;
use crate::api::ApiState;
use crate::model::QueryResult;
use crate::selector::extract_selectors;
use crate::{Error, Result};

use axum::extract::{Form, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Earliest representable query time in milliseconds
pub const MIN_TIME_MS: i64 = (i64::MIN / 1000 + 62_135_596_801) * 1000;
/// Latest representable query time in milliseconds
pub const MAX_TIME_MS: i64 = (i64::MAX / 1000 - 62_135_596_801) * 1000 + 999;

/// Query parameters, from the URL or a form body
#[derive(Debug, Default, Clone, Deserialize)]
pub struct QueryExemplarsParams {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

impl QueryExemplarsParams {
    /// Body values take precedence over URL values
    fn merge(self, body: QueryExemplarsParams) -> Self {
        Self {
            query: body.query.or(self.query),
            start: body.start.or(self.start),
            end: body.end.or(self.end),
        }
    }
}

/// Prometheus response envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<QueryResult>>,
    #[serde(rename = "errorType", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip)]
    pub status_code: StatusCode,
}

impl ApiResponse {
    pub fn success(data: Option<Vec<QueryResult>>) -> Self {
        Self {
            status: "success",
            data,
            error_type: None,
            error: None,
            warnings: Vec::new(),
            status_code: StatusCode::OK,
        }
    }

    pub fn error(error: &Error) -> Self {
        let (error_type, status_code) = match error {
            e if e.is_client_error() => ("bad_data", StatusCode::BAD_REQUEST),
            Error::Canceled => (
                "canceled",
                StatusCode::from_u16(499).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            ),
            _ => ("internal", StatusCode::INTERNAL_SERVER_ERROR),
        };
        Self {
            status: "error",
            data: None,
            error_type: Some(error_type),
            error: Some(error.to_string()),
            warnings: Vec::new(),
            status_code,
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (self.status_code, Json(self)).into_response()
    }
}

/// GET /api/v1/query_exemplars
pub async fn query_exemplars_get(
    State(state): State<ApiState>,
    Query(params): Query<QueryExemplarsParams>,
) -> ApiResponse {
    query_exemplars(state, params).await
}

/// POST /api/v1/query_exemplars
pub async fn query_exemplars_post(
    State(state): State<ApiState>,
    Query(params): Query<QueryExemplarsParams>,
    body: Option<Form<QueryExemplarsParams>>,
) -> ApiResponse {
    let params = match body {
        Some(Form(body)) => params.merge(body),
        None => params,
    };
    query_exemplars(state, params).await
}

async fn query_exemplars(state: ApiState, params: QueryExemplarsParams) -> ApiResponse {
    match run_query(&state, params).await {
        Ok(data) => ApiResponse::success(data),
        Err(e) => {
            if !e.is_client_error() {
                warn!(error = %e, "Exemplar query failed");
            }
            let response = ApiResponse::error(&e);
            if let Some(error_type) = response.error_type {
                record_query_error(error_type);
            }
            response
        }
    }
}

async fn run_query(
    state: &ApiState,
    params: QueryExemplarsParams,
) -> Result<Option<Vec<QueryResult>>> {
    let start = parse_time_param(params.start.as_deref(), "start", MIN_TIME_MS)?;
    let end = parse_time_param(params.end.as_deref(), "end", MAX_TIME_MS)?;
    if end < start {
        return Err(Error::BadData(
            "end timestamp must not be before start timestamp".to_string(),
        ));
    }

    let query = params.query.unwrap_or_default();
    if query.trim().is_empty() {
        return Err(Error::BadData("no expression found in input".to_string()));
    }
    let selectors = extract_selectors(&query)?;
    if selectors.is_empty() {
        return Ok(None);
    }

    let results = state.store.select(start, end, &selectors).await?;
    Ok(Some(results))
}

fn parse_time_param(value: Option<&str>, name: &str, default: i64) -> Result<i64> {
    match value {
        None | Some("") => Ok(default),
        Some(value) => parse_time(value).map_err(|e| {
            Error::BadData(format!(
                "invalid parameter {}: Invalid time value for '{}': {}",
                name, name, e
            ))
        }),
    }
}

/// Parse float epoch seconds or an RFC 3339 timestamp into milliseconds.
///
/// Fractional seconds are rounded to the millisecond.
pub fn parse_time(value: &str) -> std::result::Result<i64, String> {
    if let Ok(seconds) = value.parse::<f64>() {
        let whole = seconds.trunc();
        let millis = whole * 1000.0 + ((seconds - whole) * 1000.0).round();
        if millis.is_finite() && millis >= MIN_TIME_MS as f64 && millis <= MAX_TIME_MS as f64 {
            return Ok(millis as i64);
        }
    }
    if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        return Ok(time.timestamp_millis());
    }
    Err(format!("cannot parse {:?} to a valid timestamp", value))
}
