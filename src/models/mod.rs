mod api;

pub use api::{FindCountryParams, HealthResponse, LookupResponse};
