use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lookup::LookupRecord;

/// Query string of `GET /v1/find-country`.
#[derive(Debug, Default, Deserialize)]
pub struct FindCountryParams {
    /// IP literal to resolve. Absent is treated as empty.
    #[serde(default)]
    pub ip: String,
}

impl FindCountryParams {
    /// Build from decoded query pairs. The first `ip` wins; later ones and
    /// unknown keys are ignored.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let ip = pairs
            .into_iter()
            .find_map(|(key, value)| (key == "ip").then_some(value))
            .unwrap_or_default();
        Self { ip }
    }
}

/// Successful lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupResponse {
    pub city: String,
    pub country: String,
    /// The IP exactly as supplied by the client.
    pub ip: String,
}

impl LookupResponse {
    pub fn new(record: LookupRecord, ip: String) -> Self {
        Self {
            city: record.city,
            country: record.country,
            ip,
        }
    }
}

/// Liveness and readiness probe body.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `alive`, `ready`, or `not ready`
    pub status: String,
    /// Time the probe was answered
    pub timestamp: DateTime<Utc>,
    /// Service name
    pub service: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_response_field_order() {
        let response = LookupResponse::new(
            LookupRecord::new("Paris", "France"),
            "203.0.113.5".to_string(),
        );
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(
            json,
            r#"{"city":"Paris","country":"France","ip":"203.0.113.5"}"#
        );
    }

    #[test]
    fn test_missing_ip_param_defaults_to_empty() {
        let params: FindCountryParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.ip, "");

        let params = FindCountryParams::from_pairs(vec![("q".to_string(), "x".to_string())]);
        assert_eq!(params.ip, "");
    }

    #[test]
    fn test_first_ip_param_wins() {
        let params = FindCountryParams::from_pairs(vec![
            ("format".to_string(), "json".to_string()),
            ("ip".to_string(), "203.0.113.5".to_string()),
            ("ip".to_string(), "1.1.1.1".to_string()),
        ]);
        assert_eq!(params.ip, "203.0.113.5");
    }
}
