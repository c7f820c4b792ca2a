//! IP-to-location lookup providers.
//!
//! The set of backends is closed: [`LookupProvider`] is an enum with one
//! variant per backend, selected at startup by [`ProviderFactory`] from a
//! [`LookupProviderConfig`].
//!
//! # Failure Modes
//!
//! - **Construction** ([`ProviderError`]): unreadable file, unreachable store,
//!   missing parameter. Always fatal at startup.
//! - **Per lookup** ([`LookupError`]): the IP is absent (`NotFound`), the store
//!   failed (`Unavailable`), or the request budget ran out (`Timeout`). The
//!   three are kept apart so callers and metrics can tell "no data" from
//!   "no backend".

mod error;
mod factory;
mod flat_file;
mod postgres;

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::metrics;

pub use error::{LookupError, ProviderError};
pub use factory::{BackendKind, LookupProviderConfig, ProviderFactory};
pub use flat_file::{CsvLoadStats, CsvProvider};
pub use postgres::PostgresProvider;

/// Location stored for a single IP literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRecord {
    pub city: String,
    pub country: String,
}

impl LookupRecord {
    pub fn new(city: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            country: country.into(),
        }
    }
}

/// A constructed lookup backend.
#[derive(Debug)]
pub enum LookupProvider {
    /// Flat file loaded into memory at startup.
    Csv(CsvProvider),
    /// Relational store queried per call.
    Postgres(PostgresProvider),
}

impl LookupProvider {
    /// Resolve `ip` to a location within `budget`.
    ///
    /// The IP is matched by its literal string form. If the budget elapses the
    /// backend call is dropped and [`LookupError::Timeout`] is returned; the
    /// same happens implicitly when the caller drops this future.
    pub async fn lookup(&self, ip: &str, budget: Duration) -> Result<LookupRecord, LookupError> {
        let start = Instant::now();

        let result = match self {
            LookupProvider::Csv(provider) => provider.lookup(ip),
            LookupProvider::Postgres(provider) => within_budget(budget, provider.lookup(ip)).await,
        };

        metrics::record_lookup(self.backend_kind(), start.elapsed().as_secs_f64());
        match &result {
            Ok(record) => debug!(
                ip,
                city = %record.city,
                country = %record.country,
                "IP lookup successful"
            ),
            Err(e) => {
                metrics::record_lookup_error(self.backend_kind(), e.kind());
                debug!(ip, error = %e, "IP lookup failed");
            }
        }

        result
    }

    /// Whether the backend can currently serve lookups.
    pub async fn is_ready(&self) -> bool {
        match self {
            LookupProvider::Csv(_) => true,
            LookupProvider::Postgres(provider) => provider.is_healthy().await,
        }
    }

    /// The kind of backend behind this provider.
    pub fn backend_kind(&self) -> BackendKind {
        match self {
            LookupProvider::Csv(_) => BackendKind::Csv,
            LookupProvider::Postgres(_) => BackendKind::Postgres,
        }
    }
}

/// Run a backend lookup, dropping it once `budget` has elapsed.
async fn within_budget<F>(budget: Duration, lookup: F) -> Result<LookupRecord, LookupError>
where
    F: Future<Output = Result<LookupRecord, LookupError>>,
{
    tokio::time::timeout(budget, lookup)
        .await
        .unwrap_or(Err(LookupError::Timeout(budget)))
}

impl From<CsvProvider> for LookupProvider {
    fn from(provider: CsvProvider) -> Self {
        LookupProvider::Csv(provider)
    }
}

impl From<PostgresProvider> for LookupProvider {
    fn from(provider: PostgresProvider) -> Self {
        LookupProvider::Postgres(provider)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    const BUDGET: Duration = Duration::from_secs(1);

    fn provider(data: &str) -> LookupProvider {
        CsvProvider::from_reader(data.as_bytes()).unwrap().into()
    }

    #[tokio::test]
    async fn test_lookup_found() {
        let provider = provider("203.0.113.5,Paris,France\n");
        let record = provider.lookup("203.0.113.5", BUDGET).await.unwrap();
        assert_eq!(record, LookupRecord::new("Paris", "France"));
    }

    #[tokio::test]
    async fn test_lookup_not_found() {
        let provider = provider("203.0.113.5,Paris,France\n");
        let err = provider.lookup("198.51.100.1", BUDGET).await.unwrap_err();
        assert!(matches!(err, LookupError::NotFound));
    }

    #[tokio::test]
    async fn test_repeated_lookups_are_identical() {
        let provider = provider("2001:db8::1,Berlin,Germany\n");
        let first = provider.lookup("2001:db8::1", BUDGET).await.unwrap();
        for _ in 0..10 {
            assert_eq!(provider.lookup("2001:db8::1", BUDGET).await.unwrap(), first);
        }
    }

    /// Sets its flag when dropped.
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_stalled_lookup_times_out_and_is_dropped() {
        let dropped = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(dropped.clone());
        let budget = Duration::from_millis(20);

        let stalled = async move {
            let _flag = flag;
            std::future::pending::<Result<LookupRecord, LookupError>>().await
        };

        let err = within_budget(budget, stalled).await.unwrap_err();
        assert!(matches!(err, LookupError::Timeout(b) if b == budget));
        assert_eq!(err.kind(), "timeout");
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_lookup_within_budget_passes_result_through() {
        let found = within_budget(BUDGET, async { Ok(LookupRecord::new("Lima", "Peru")) }).await;
        assert_eq!(found.unwrap(), LookupRecord::new("Lima", "Peru"));

        let missing = within_budget(BUDGET, async { Err(LookupError::NotFound) }).await;
        assert!(matches!(missing, Err(LookupError::NotFound)));
    }

    #[tokio::test]
    async fn test_csv_provider_is_ready() {
        let provider = provider("");
        assert!(provider.is_ready().await);
        assert_eq!(provider.backend_kind(), BackendKind::Csv);
    }
}
