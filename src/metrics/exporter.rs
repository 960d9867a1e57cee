//! Prometheus metrics exporter
//!
//! HTTP endpoint for Prometheus scraping.

use anyhow::Result;
use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;

use super::series::*;
use crate::config::MetricsConfig;

/// Initialize the Prometheus metrics exporter
pub fn init_metrics(config: &MetricsConfig) -> Result<()> {
    describe_metrics();

    PrometheusBuilder::new()
        .with_http_listener(config.bind_addr)
        .install()?;

    Ok(())
}

/// Register metric descriptions
fn describe_metrics() {
    describe_gauge!(
        UPSTREAM_CORDONED,
        "Whether an upstream is excluded from routing for a network and method (1 = cordoned)"
    );
    describe_histogram!(
        UPSTREAM_REQUEST_DURATION_SECONDS,
        Unit::Seconds,
        "Upstream request duration"
    );
    describe_counter!(
        UPSTREAM_SELF_RATE_LIMITED_TOTAL,
        "Requests rejected by the gateway's own rate limiter"
    );
    describe_counter!(
        UPSTREAM_REMOTE_RATE_LIMITED_TOTAL,
        "Requests rate limited by the upstream"
    );
    describe_gauge!(
        UPSTREAM_LATEST_BLOCK_NUMBER,
        "Highest latest block seen per upstream (upstream=\"*\" for the network)"
    );
    describe_gauge!(
        UPSTREAM_FINALIZED_BLOCK_NUMBER,
        "Highest finalized block seen per upstream (upstream=\"*\" for the network)"
    );
    describe_gauge!(
        UPSTREAM_BLOCK_HEAD_LAG,
        "Blocks behind the highest latest block seen on the network"
    );
    describe_gauge!(
        UPSTREAM_FINALIZATION_LAG,
        "Blocks behind the highest finalized block seen on the network"
    );
    describe_gauge!(
        UPSTREAM_BLOCK_HEAD_LARGE_ROLLBACK,
        "Size of the last large block head rollback"
    );
}
