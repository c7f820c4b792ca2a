use std::net::IpAddr;

use crate::error::{AppError, AppResult};

/// Message returned when the `ip` parameter is absent or empty.
pub const IP_REQUIRED_MESSAGE: &str = "IP address is required";

/// Validate a client-supplied IP address.
///
/// Rules:
/// - Must not be empty
/// - Must parse as an IPv4 or IPv6 literal (no ports, zones, or CIDR suffixes)
///
/// The value is not normalised: lookups use the literal as given. Rejected
/// values are echoed with control characters escaped.
pub fn validate_ip(ip: &str) -> AppResult<()> {
    if ip.is_empty() {
        return Err(AppError::BadRequest(IP_REQUIRED_MESSAGE.to_string()));
    }

    if ip.parse::<IpAddr>().is_err() {
        return Err(AppError::BadRequest(format!(
            "invalid IP address format: {}",
            ip.escape_debug()
        )));
    }

    Ok(())
}
