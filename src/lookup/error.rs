use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use super::BackendKind;

/// Failure to build a lookup provider. Always fatal at startup.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("failed to parse lookup provider configuration: {0}")]
    InvalidConfig(#[from] serde_json::Error),

    #[error("unsupported backend kind: {0:?}")]
    UnknownBackend(String),

    #[error("{key} is required for {backend} provider")]
    MissingParam {
        backend: BackendKind,
        key: &'static str,
    },

    #[error("invalid {key} for {backend} provider: {reason}")]
    InvalidParam {
        backend: BackendKind,
        key: &'static str,
        reason: String,
    },

    #[error("failed to open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to connect to lookup store: {0}")]
    Connection(String),
}

impl ProviderError {
    /// Whether the failure comes from the configuration itself rather than
    /// from the backing store being unreadable or unreachable.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ProviderError::InvalidConfig(_)
                | ProviderError::UnknownBackend(_)
                | ProviderError::MissingParam { .. }
                | ProviderError::InvalidParam { .. }
        )
    }
}

/// Failure of a single lookup.
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("IP not found")]
    NotFound,

    #[error("lookup store unavailable: {0}")]
    Unavailable(String),

    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),
}

impl LookupError {
    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            LookupError::NotFound => "not_found",
            LookupError::Unavailable(_) => "unavailable",
            LookupError::Timeout(_) => "timeout",
        }
    }
}
