//! Liveness and readiness probes.
//!
//! # Endpoints
//!
//! - `GET /health/live` - Always 200 while the process serves requests
//! - `GET /health/ready` - 200 if the lookup provider can serve, 503 otherwise
//!
//! Both pass through the request pipeline, so they are rate limited and
//! metered like any other route.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use tracing::{instrument, warn};

use crate::models::HealthResponse;
use crate::state::AppState;

/// Name reported in probe bodies.
pub const SERVICE_NAME: &str = "geofind";

fn probe(status: &str) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: status.to_string(),
        timestamp: Utc::now(),
        service: SERVICE_NAME.to_string(),
    })
}

/// Liveness probe.
///
/// # Response Body
///
/// ```json
/// {
///   "status": "alive",
///   "timestamp": "2024-01-15T10:30:00Z",
///   "service": "geofind"
/// }
/// ```
#[instrument]
pub async fn liveness_check() -> Json<HealthResponse> {
    probe("alive")
}

/// Readiness probe for Kubernetes.
///
/// For the Postgres backend this checks out a pooled connection and runs
/// `SELECT 1`; the flat-file backend is ready once loaded.
#[instrument(skip(state))]
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    if state.provider.is_ready().await {
        (StatusCode::OK, probe("ready"))
    } else {
        warn!(backend = %state.provider.backend_kind(), "Lookup provider not ready");
        (StatusCode::SERVICE_UNAVAILABLE, probe("not ready"))
    }
}
