//! IP lookup endpoint.
//!
//! # Endpoint
//!
//! `GET /v1/find-country?ip=<addr>`
//!
//! | Outcome | Status | Body |
//! |---|---|---|
//! | found | 200 | `{"city","country","ip"}` |
//! | `ip` missing or empty | 400 | `{"error":"IP address is required"}` |
//! | `ip` not an IP literal | 400 | `{"error":"invalid IP address format: <ip>"}` |
//! | no record, store error, timeout | 404 | `{"error":"IP not found"}` |
//!
//! When `ip` is repeated, the first value is used.

use axum::Json;
use axum::extract::{Query, State};
use tracing::{Span, instrument};

use crate::error::AppResult;
use crate::models::{FindCountryParams, LookupResponse};
use crate::state::AppState;
use crate::validation::validate_ip;

/// Resolve a client-supplied IP to its city and country.
#[instrument(skip_all, fields(ip = tracing::field::Empty))]
pub async fn find_country(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> AppResult<Json<LookupResponse>> {
    let params = FindCountryParams::from_pairs(pairs);
    Span::current().record("ip", params.ip.as_str());
    validate_ip(&params.ip)?;

    let record = state
        .provider
        .lookup(&params.ip, state.lookup_timeout())
        .await?;

    Ok(Json(LookupResponse::new(record, params.ip)))
}
