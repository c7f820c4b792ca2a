use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};

use geofind::{
    AppState, Config, Environment, HttpMetrics, ProviderFactory, RequestPipeline, TokenBucket,
    build_router, metrics, utils,
};

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env before logging so ENVIRONMENT and RUST_LOG apply to it
    let _ = dotenvy::dotenv();

    let environment = Environment::from_env();
    utils::init_tracing(environment);

    info!(
        environment = %environment,
        "Starting geofind v{}",
        env!("CARGO_PKG_VERSION")
    );

    match run().await {
        Ok(()) => ExitCode::from(exitcode::OK as u8),
        Err(exit_code) => ExitCode::from(exit_code as u8),
    }
}

/// Run the application, returning an exit code on error.
async fn run() -> Result<(), exitcode::ExitCode> {
    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {e}");
        exitcode::CONFIG
    })?;
    info!(
        host = %config.host,
        port = %config.port,
        rps_limit = config.rps_limit,
        rps_burst = config.rps_burst,
        lookup_timeout = ?config.lookup_timeout,
        "Configuration loaded"
    );

    // Build the lookup provider; nothing is served if this fails
    let provider = ProviderFactory::from_json(&config.ip_db_config)
        .await
        .map_err(|e| {
            error!("Failed to create lookup provider: {e}");
            if e.is_config_error() {
                exitcode::CONFIG
            } else {
                exitcode::UNAVAILABLE
            }
        })?;
    info!(backend = %provider.backend_kind(), "Lookup provider ready");

    let metrics_handle = metrics::init_metrics().map_err(|e| {
        error!("Failed to install metrics recorder: {e}");
        exitcode::SOFTWARE
    })?;

    let bucket = TokenBucket::new(config.rps_limit, config.rps_burst).map_err(|e| {
        error!("Invalid rate limit configuration: {e}");
        exitcode::CONFIG
    })?;
    let pipeline = RequestPipeline::new(Arc::new(bucket), Arc::new(HttpMetrics::new()));
    info!(
        rps = pipeline.limiter().refill_rate(),
        burst = pipeline.limiter().capacity(),
        "Rate limiting enabled"
    );

    // Build application state and router
    let addr: SocketAddr = config.server_addr().parse().map_err(|e| {
        error!("Invalid server address: {e}");
        exitcode::CONFIG
    })?;
    let state = AppState::new(provider, config, metrics_handle);
    let app = build_router(state, &pipeline);

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to {addr}: {e}");
        exitcode::UNAVAILABLE
    })?;

    info!("Server listening on http://{addr}");
    info!("API endpoints:");
    info!("  GET  /v1/find-country?ip=  - Resolve an IP");
    info!("  GET  /health/live          - Liveness probe");
    info!("  GET  /health/ready         - Readiness probe");
    info!("  GET  /metrics              - Prometheus metrics");

    // Start server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(utils::shutdown_signal())
        .await
        .map_err(|e| {
            error!("Server error: {e}");
            exitcode::SOFTWARE
        })?;

    info!(
        requests = pipeline.metrics().requests_total(),
        rate_limited = pipeline.metrics().rate_limited(),
        "Server shutdown complete"
    );
    Ok(())
}
