//! HTTP middleware for admission control and observability.
//!
//! # Architecture
//!
//! ```text
//! Request → Metrics → Rate Limiter → Handler → Response
//!              ↓            ↓
//!        in-flight,    429 Too Many Requests
//!        duration,     (handler not called)
//!        status
//! ```
//!
//! Metrics is the outermost stage, so rejected requests are still counted,
//! timed, and recorded with status 429.

pub mod metrics;
pub mod rate_limit;

use std::sync::Arc;

use axum::Router;
use tower::ServiceBuilder;

use crate::limiter::TokenBucket;
use crate::metrics::HttpMetrics;

pub use metrics::{HttpMetricsLayer, UNMATCHED_ROUTE};
pub use rate_limit::{REJECTION_BODY, RateLimitLayer};

/// The ordered middleware chain applied to every route.
#[derive(Debug, Clone)]
pub struct RequestPipeline {
    limiter: Arc<TokenBucket>,
    metrics: Arc<HttpMetrics>,
}

impl RequestPipeline {
    pub fn new(limiter: Arc<TokenBucket>, metrics: Arc<HttpMetrics>) -> Self {
        Self { limiter, metrics }
    }

    pub fn limiter(&self) -> &Arc<TokenBucket> {
        &self.limiter
    }

    pub fn metrics(&self) -> &Arc<HttpMetrics> {
        &self.metrics
    }

    /// Wrap every route of `router` in the pipeline.
    ///
    /// `ServiceBuilder` applies layers top to bottom, outermost first.
    pub fn apply<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(
            ServiceBuilder::new()
                .layer(HttpMetricsLayer::new(self.metrics.clone()))
                .layer(RateLimitLayer::new(
                    self.limiter.clone(),
                    self.metrics.clone(),
                )),
        )
    }
}
