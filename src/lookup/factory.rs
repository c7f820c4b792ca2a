//! Provider selection from a configuration descriptor.
//!
//! The descriptor is JSON:
//!
//! ```json
//! {"dbtype": "csv", "extra_details": {"file_path": "/data/ips.csv"}}
//! {"dbtype": "postgres", "extra_details": {"conn_str": "host=db user=geo", "pool_size": 16}}
//! ```

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::info;

use super::{CsvProvider, LookupProvider, PostgresProvider, ProviderError};

/// Default connection pool size for the Postgres backend.
const DEFAULT_POOL_SIZE: usize = 8;

/// Registered backend kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Csv,
    Postgres,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Csv => "csv",
            BackendKind::Postgres => "postgres",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "csv" => Ok(BackendKind::Csv),
            "postgres" => Ok(BackendKind::Postgres),
            other => Err(ProviderError::UnknownBackend(other.to_string())),
        }
    }
}

/// Raw provider descriptor: a backend tag plus backend-specific parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LookupProviderConfig {
    #[serde(rename = "dbtype")]
    pub backend_kind: String,
    #[serde(rename = "extra_details", default)]
    pub backend_params: Map<String, Value>,
}

impl LookupProviderConfig {
    /// Parse a JSON descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidConfig`] for malformed JSON.
    pub fn from_json(json: &str) -> Result<Self, ProviderError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Resolve the backend tag.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::UnknownBackend`] naming the offending value.
    pub fn kind(&self) -> Result<BackendKind, ProviderError> {
        self.backend_kind.parse()
    }

    fn required_str(&self, backend: BackendKind, key: &'static str) -> Result<&str, ProviderError> {
        match self.backend_params.get(key) {
            Some(Value::String(s)) if !s.is_empty() => Ok(s.as_str()),
            Some(Value::String(_)) | None | Some(Value::Null) => {
                Err(ProviderError::MissingParam { backend, key })
            }
            Some(other) => Err(ProviderError::InvalidParam {
                backend,
                key,
                reason: format!("expected a string, got {other}"),
            }),
        }
    }

    fn optional_positive(
        &self,
        backend: BackendKind,
        key: &'static str,
        default: usize,
    ) -> Result<usize, ProviderError> {
        match self.backend_params.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(value) => value
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .filter(|n| *n > 0)
                .ok_or_else(|| ProviderError::InvalidParam {
                    backend,
                    key,
                    reason: format!("expected a positive integer, got {value}"),
                }),
        }
    }
}

/// Builds the provider named by a descriptor.
///
/// New backends are added as a [`BackendKind`] variant plus a match arm in
/// [`ProviderFactory::create`]; callers never change.
pub struct ProviderFactory;

impl ProviderFactory {
    /// Parse a JSON descriptor and build its provider.
    ///
    /// # Errors
    ///
    /// See [`ProviderFactory::create`]; malformed JSON additionally yields
    /// [`ProviderError::InvalidConfig`].
    pub async fn from_json(json: &str) -> Result<LookupProvider, ProviderError> {
        let config = LookupProviderConfig::from_json(json)?;
        Self::create(&config).await
    }

    /// Build the provider for `config`.
    ///
    /// # Errors
    ///
    /// Unknown backend kinds and missing parameters are rejected before any
    /// I/O. Backend construction failures (unreadable file, unreachable store)
    /// are returned as-is.
    pub async fn create(config: &LookupProviderConfig) -> Result<LookupProvider, ProviderError> {
        let kind = config.kind()?;
        info!(
            backend = %kind,
            params = ?config.backend_params.keys().collect::<Vec<_>>(),
            "Creating lookup provider"
        );

        match kind {
            BackendKind::Csv => {
                let path = config.required_str(kind, "file_path")?;
                Ok(CsvProvider::from_path(path)?.into())
            }
            BackendKind::Postgres => {
                let conn_str = config.required_str(kind, "conn_str")?;
                let pool_size = config.optional_positive(kind, "pool_size", DEFAULT_POOL_SIZE)?;
                Ok(PostgresProvider::connect(conn_str, pool_size).await?.into())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("csv".parse::<BackendKind>().unwrap(), BackendKind::Csv);
        assert_eq!(
            "postgres".parse::<BackendKind>().unwrap(),
            BackendKind::Postgres
        );
        assert_eq!(BackendKind::Postgres.to_string(), "postgres");
    }

    #[test]
    fn test_config_defaults_params_to_empty() {
        let config = LookupProviderConfig::from_json(r#"{"dbtype":"csv"}"#).unwrap();
        assert_eq!(config.backend_kind, "csv");
        assert!(config.backend_params.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let err = ProviderFactory::from_json("{not json").await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidConfig(_)));
        assert!(err.is_config_error());
    }

    #[tokio::test]
    async fn test_unknown_backend_names_value() {
        let err = ProviderFactory::from_json(r#"{"dbtype":"redis","extra_details":{}}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownBackend(ref v) if v == "redis"));
        assert!(err.to_string().contains("redis"));
    }

    #[tokio::test]
    async fn test_csv_missing_file_path() {
        let err = ProviderFactory::from_json(r#"{"dbtype":"csv","extra_details":{}}"#)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProviderError::MissingParam {
                backend: BackendKind::Csv,
                key: "file_path"
            }
        ));
        assert_eq!(err.to_string(), "file_path is required for csv provider");
    }

    #[tokio::test]
    async fn test_csv_file_path_wrong_type() {
        let err = ProviderFactory::from_json(r#"{"dbtype":"csv","extra_details":{"file_path":42}}"#)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProviderError::InvalidParam {
                key: "file_path",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_postgres_missing_conn_str() {
        let err = ProviderFactory::from_json(r#"{"dbtype":"postgres","extra_details":{}}"#)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProviderError::MissingParam {
                backend: BackendKind::Postgres,
                key: "conn_str"
            }
        ));
    }

    #[tokio::test]
    async fn test_postgres_invalid_pool_size() {
        let err = ProviderFactory::from_json(
            r#"{"dbtype":"postgres","extra_details":{"conn_str":"host=localhost","pool_size":0}}"#,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            ProviderError::InvalidParam {
                key: "pool_size",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_csv_unreadable_file() {
        let err = ProviderFactory::from_json(
            r#"{"dbtype":"csv","extra_details":{"file_path":"/no/such/file.csv"}}"#,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProviderError::Io { .. }));
        assert!(!err.is_config_error());
    }

    #[tokio::test]
    async fn test_csv_provider_created() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "1.2.3.4,New York,USA").unwrap();

        let config = LookupProviderConfig {
            backend_kind: "csv".to_string(),
            backend_params: Map::from_iter([(
                "file_path".to_string(),
                Value::String(file.path().display().to_string()),
            )]),
        };

        let provider = ProviderFactory::create(&config).await.unwrap();
        assert_eq!(provider.backend_kind(), BackendKind::Csv);
    }
}
