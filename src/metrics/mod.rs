//! Metrics and observability
//!
//! Prometheus export of tracker telemetry plus a JSON snapshot API.

mod api;
mod exporter;
mod series;

pub use api::start_api_server;
pub use exporter::init_metrics;
pub use series::{
    UPSTREAM_BLOCK_HEAD_LAG, UPSTREAM_BLOCK_HEAD_LARGE_ROLLBACK, UPSTREAM_CORDONED,
    UPSTREAM_FINALIZATION_LAG, UPSTREAM_FINALIZED_BLOCK_NUMBER, UPSTREAM_LATEST_BLOCK_NUMBER,
    UPSTREAM_REMOTE_RATE_LIMITED_TOTAL, UPSTREAM_REQUEST_DURATION_SECONDS,
    UPSTREAM_SELF_RATE_LIMITED_TOTAL,
};

pub(crate) use series::{inc_method_counter, observe_duration, set_method_gauge, set_upstream_gauge};

#[cfg(test)]
pub(crate) use series::capture;
