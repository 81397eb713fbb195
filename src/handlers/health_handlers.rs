//! Health & readiness handlers.
//!
//! - GET /healthz    -> simple liveness ("ok")
//! - GET /readiness  -> succeeds once any configured bucket answers

use crate::{
    services::readiness::{Readiness, ReadinessResult},
    state::AppState,
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

/// `GET /healthz`
///
/// Very small liveness probe: always 200 with `{"status":"ok"}`.
/// This endpoint never touches the storage backend.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readiness`
///
/// Probes the configured buckets concurrently. HTTP 200 as soon as one of
/// them answers, HTTP 503 when none do.
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    match state.prober.probe().await {
        Readiness::Ready { bucket } => (
            StatusCode::OK,
            Json(ReadyResponse {
                status: "ok".into(),
                bucket: Some(bucket),
                failures: Vec::new(),
            }),
        ),
        Readiness::Unavailable { failures } => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                status: "unavailable".into(),
                bucket: None,
                failures: failures.iter().map(CheckStatus::from).collect(),
            }),
        ),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    bucket: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failures: Vec<CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    bucket: String,
    error: Option<String>,
}

impl From<&ReadinessResult> for CheckStatus {
    fn from(result: &ReadinessResult) -> Self {
        Self {
            bucket: result.bucket.clone(),
            error: result.error.as_ref().map(ToString::to_string),
        }
    }
}
