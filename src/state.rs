//! Shared application state for Axum handlers.
//!
//! Everything here is immutable after startup or internally synchronised, so
//! the state is cloned into each request without locking.

use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::Config;
use crate::lookup::LookupProvider;

/// Shared application state for Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Backend answering IP lookups
    pub provider: Arc<LookupProvider>,
    /// Application configuration
    pub config: Arc<Config>,
    /// Renders the Prometheus exposition for `/metrics`
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    pub fn new(provider: LookupProvider, config: Config, metrics_handle: PrometheusHandle) -> Self {
        Self {
            provider: Arc::new(provider),
            config: Arc::new(config),
            metrics_handle,
        }
    }

    /// Budget for a single lookup.
    pub fn lookup_timeout(&self) -> Duration {
        self.config.lookup_timeout
    }
}
