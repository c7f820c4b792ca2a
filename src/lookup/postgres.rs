//! PostgreSQL lookup backend.
//!
//! Each lookup checks a pooled connection out and runs one prepared query
//! against `ip_locations`. Connectivity is verified once at construction so an
//! unreachable store stops the service from starting.

use std::fmt;
use std::time::Duration;

use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::NoTls;
use tracing::{debug, error, info};

use super::{BackendKind, LookupError, LookupRecord, ProviderError};

/// Query used for every lookup.
const LOOKUP_QUERY: &str = "SELECT city, country FROM ip_locations WHERE ip = $1";

/// Upper bound on the startup connectivity check.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Pooled PostgreSQL provider.
pub struct PostgresProvider {
    pool: Pool,
}

impl fmt::Debug for PostgresProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.pool.status();
        f.debug_struct("PostgresProvider")
            .field("pool_size", &status.size)
            .field("pool_available", &status.available)
            .finish()
    }
}

impl PostgresProvider {
    /// Build the pool and verify the store answers.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidParam`] for an unparseable connection
    /// string and [`ProviderError::Connection`] if the store is unreachable.
    pub async fn connect(conn_str: &str, pool_size: usize) -> Result<Self, ProviderError> {
        info!(pool_size, "Initializing Postgres provider");

        let pg_config: tokio_postgres::Config =
            conn_str.parse().map_err(|e: tokio_postgres::Error| {
                ProviderError::InvalidParam {
                    backend: BackendKind::Postgres,
                    key: "conn_str",
                    reason: e.to_string(),
                }
            })?;

        let manager_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let manager = Manager::from_config(pg_config, NoTls, manager_config);

        let pool = Pool::builder(manager)
            .max_size(pool_size)
            .build()
            .map_err(|e| ProviderError::Connection(e.to_string()))?;

        let provider = Self { pool };
        provider.ping().await.map_err(|e| {
            error!(error = %e, "Failed to reach Postgres");
            ProviderError::Connection(e)
        })?;

        info!("Postgres provider initialized");
        Ok(provider)
    }

    /// Look up an IP literal.
    pub async fn lookup(&self, ip: &str) -> Result<LookupRecord, LookupError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| LookupError::Unavailable(e.to_string()))?;

        let statement = client
            .prepare_cached(LOOKUP_QUERY)
            .await
            .map_err(|e| LookupError::Unavailable(e.to_string()))?;

        let row = client
            .query_opt(&statement, &[&ip])
            .await
            .map_err(|e| LookupError::Unavailable(e.to_string()))?;

        let Some(row) = row else {
            debug!(ip, "IP not found in database");
            return Err(LookupError::NotFound);
        };

        let city: String = row
            .try_get(0)
            .map_err(|e| LookupError::Unavailable(e.to_string()))?;
        let country: String = row
            .try_get(1)
            .map_err(|e| LookupError::Unavailable(e.to_string()))?;

        Ok(LookupRecord { city, country })
    }

    /// Check that a connection can be obtained and answers `SELECT 1`.
    pub async fn is_healthy(&self) -> bool {
        self.ping().await.is_ok()
    }

    async fn ping(&self) -> Result<(), String> {
        let check = async {
            let client = self.pool.get().await.map_err(|e| e.to_string())?;
            client
                .simple_query("SELECT 1")
                .await
                .map_err(|e| e.to_string())?;
            Ok::<(), String>(())
        };

        match tokio::time::timeout(CONNECT_TIMEOUT, check).await {
            Ok(result) => result,
            Err(_) => Err(format!("no response within {CONNECT_TIMEOUT:?}")),
        }
    }
}
