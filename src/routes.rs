//! Application routing configuration with middleware stack.
//!
//! # Middleware Stack
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │     Tracing      │ ← HTTP request/response spans
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │     Metrics      │ ← in-flight, duration, status (rejections included)
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │  Rate Limiting   │ ← 429 if the global bucket is empty
//! └────────┬─────────┘
//!          │
//!          ▼
//!      Handler
//! ```
//!
//! # Routes
//!
//! - `/v1/find-country` - IP lookup
//! - `/health/live`, `/health/ready` - Probes
//! - `/metrics` - Prometheus exposition

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::RequestPipeline;
use crate::state::AppState;

/// Build the application router with all routes and middleware configured.
///
/// Every route runs through `pipeline`; request tracing wraps the whole
/// pipeline.
pub fn build_router(state: AppState, pipeline: &RequestPipeline) -> Router {
    let router = Router::new()
        .route("/v1/find-country", get(handlers::find_country))
        .route("/health/live", get(handlers::liveness_check))
        .route("/health/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::render_metrics));

    pipeline
        .apply(router)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
