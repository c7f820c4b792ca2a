//! Request metrics middleware.
//!
//! Outermost stage of the pipeline: every request, including those rejected
//! by admission control, is counted in flight, timed, and recorded with its
//! final status code.

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::{Request, Response};
use tower::{Layer, Service};
use tracing::info;

use crate::metrics::{HttpMetrics, RequestSample};

/// Metrics layer for Tower middleware stack.
#[derive(Clone)]
pub struct HttpMetricsLayer {
    metrics: Arc<HttpMetrics>,
}

impl HttpMetricsLayer {
    pub fn new(metrics: Arc<HttpMetrics>) -> Self {
        Self { metrics }
    }
}

impl<S> Layer<S> for HttpMetricsLayer {
    type Service = HttpMetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        HttpMetricsService {
            inner,
            metrics: self.metrics.clone(),
        }
    }
}

/// Metrics service wrapper.
#[derive(Clone)]
pub struct HttpMetricsService<S> {
    inner: S,
    metrics: Arc<HttpMetrics>,
}

impl<S> Service<Request<Body>> for HttpMetricsService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = route_label(&req);
        let metrics = self.metrics.clone();
        let mut inner = self.inner.clone();

        let start = Instant::now();
        let in_flight = metrics.start_request();

        Box::pin(async move {
            let response = inner.call(req).await?;
            let duration = start.elapsed();
            drop(in_flight);

            let sample = RequestSample {
                method,
                path,
                status_code: response.status().as_u16(),
                duration,
            };
            metrics.record(&sample);

            info!(
                method = %sample.method,
                path = %sample.path,
                status = sample.status_code,
                duration_ms = duration.as_secs_f64() * 1000.0,
                "request completed"
            );

            Ok(response)
        })
    }
}

/// `path` label shared by all requests that matched no route.
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// Matched route template, or [`UNMATCHED_ROUTE`].
fn route_label<B>(req: &Request<B>) -> String {
    req.extensions()
        .get::<MatchedPath>()
        .map_or(UNMATCHED_ROUTE, MatchedPath::as_str)
        .to_string()
}
