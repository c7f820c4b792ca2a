//! Admission control backed by a single global token bucket.
//!
//! # Response
//!
//! On rejection the request is answered immediately with
//! `429 Too Many Requests` (plain text body) and the inner service is never
//! called. There is no queueing or retry; the client is expected to back off.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tracing::debug;

use crate::limiter::TokenBucket;
use crate::metrics::HttpMetrics;

/// Body sent with every rejection.
pub const REJECTION_BODY: &str = "Too Many Requests";

/// Rate limiting layer for Tower middleware stack.
///
/// # Example
///
/// ```rust,ignore
/// let bucket = Arc::new(TokenBucket::new(10, 20)?);
/// let app = Router::new()
///     .route("/api", get(handler))
///     .layer(RateLimitLayer::new(bucket, metrics));
/// ```
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Arc<TokenBucket>,
    metrics: Arc<HttpMetrics>,
}

impl RateLimitLayer {
    pub fn new(limiter: Arc<TokenBucket>, metrics: Arc<HttpMetrics>) -> Self {
        Self { limiter, metrics }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: self.limiter.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

/// Rate limiting service wrapper.
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: Arc<TokenBucket>,
    metrics: Arc<HttpMetrics>,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
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
        // Admission is decided here, before the returned future is polled.
        if !self.limiter.allow() {
            self.metrics.record_rate_limited();
            debug!(
                method = %req.method(),
                path = %req.uri().path(),
                "Request rejected by rate limiter"
            );
            return Box::pin(async move { Ok(rejection()) });
        }

        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(req).await })
    }
}

fn rejection() -> Response<Body> {
    (StatusCode::TOO_MANY_REQUESTS, REJECTION_BODY).into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use axum::body::to_bytes;
    use tower::ServiceExt;
    use tower::service_fn;

    use crate::limiter::ManualClock;

    fn layer(rate: u32, capacity: u32, clock: ManualClock) -> (RateLimitLayer, Arc<HttpMetrics>) {
        let bucket = Arc::new(TokenBucket::with_clock(rate, capacity, clock).unwrap());
        let metrics = Arc::new(HttpMetrics::new());
        (RateLimitLayer::new(bucket, metrics.clone()), metrics)
    }

    #[tokio::test]
    async fn test_rejection_skips_inner_service() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let inner = service_fn(move |_req: Request<Body>| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(Response::new(Body::from("ok")))
            }
        });

        let (layer, metrics) = layer(1, 1, ManualClock::new());
        let service = layer.layer(inner);

        let first = service
            .clone()
            .oneshot(Request::new(Body::empty()))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = service
            .clone()
            .oneshot(Request::new(Body::empty()))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = to_bytes(second.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], REJECTION_BODY.as_bytes());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.rate_limited(), 1);
    }

    #[tokio::test]
    async fn test_admits_again_after_refill() {
        let inner =
            service_fn(|_req: Request<Body>| async { Ok::<_, Infallible>(Response::new(Body::empty())) });
        let clock = ManualClock::new();
        let (layer, _) = layer(5, 1, clock.clone());
        let service = layer.layer(inner);

        let ok = service.clone().oneshot(Request::new(Body::empty())).await.unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
        let limited = service.clone().oneshot(Request::new(Body::empty())).await.unwrap();
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);

        clock.advance(Duration::from_millis(200));
        let ok = service.oneshot(Request::new(Body::empty())).await.unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
    }
}
