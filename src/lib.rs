//! # geofind
//!
//! An HTTP service that resolves IP addresses to a city and country through
//! a pluggable backing store, behind a global admission-control layer and
//! request metrics.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Pipeline (Trace → Metrics → Rate Limit)                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (find-country, health, metrics)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  LookupProvider (csv | postgres)                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use geofind::{AppState, Config, HttpMetrics, ProviderFactory, RequestPipeline, TokenBucket};
//! use geofind::{build_router, metrics};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let provider = ProviderFactory::from_json(&config.ip_db_config).await?;
//!     let handle = metrics::init_metrics()?;
//!
//!     let bucket = Arc::new(TokenBucket::new(config.rps_limit, config.rps_burst)?);
//!     let pipeline = RequestPipeline::new(bucket, Arc::new(HttpMetrics::new()));
//!     let app = build_router(AppState::new(provider, config, handle), &pipeline);
//!
//!     // Start the server...
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! ```bash
//! IP_DB_CONFIG='{"dbtype":"csv","extra_details":{"file_path":"ips.csv"}}' \
//! RPS_LIMIT=100 RPS_BURST=200 cargo run
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod limiter;
pub mod lookup;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
pub mod utils;
pub mod validation;

// Re-exports for convenience
pub use config::{Config, Environment};
pub use error::{AppError, AppResult};
pub use limiter::TokenBucket;
pub use lookup::{LookupProvider, ProviderFactory};
pub use metrics::HttpMetrics;
pub use middleware::RequestPipeline;
pub use routes::build_router;
pub use state::AppState;
