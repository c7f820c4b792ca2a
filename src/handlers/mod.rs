mod health;
mod lookup;
mod metrics;

pub use health::{liveness_check, readiness_check};
pub use lookup::find_country;
pub use metrics::render_metrics;
