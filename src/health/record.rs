//! Per-key metric record
//!
//! Every field is independently atomic. Readers may observe a request counter
//! that is ahead of the matching latency sample; there is no record-wide lock.

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use crate::quantile::{QuantileAccumulator, QuantileSnapshot};

/// Counters, gauges and cordon state for one aggregation key
pub struct MetricRecord {
    response_quantiles: Box<dyn QuantileAccumulator>,

    // Window counters
    errors_total: AtomicI64,
    self_rate_limited_total: AtomicI64,
    remote_rate_limited_total: AtomicI64,
    requests_total: AtomicI64,

    // Chain head gauges
    block_head_lag: AtomicI64,
    finalization_lag: AtomicI64,
    block_head_large_rollback: AtomicI64,

    // Cordon state
    cordoned: AtomicBool,
    cordoned_reason: RwLock<String>,
}

impl MetricRecord {
    /// Create a zeroed record around a fresh accumulator
    pub fn new(response_quantiles: Box<dyn QuantileAccumulator>) -> Self {
        Self {
            response_quantiles,
            errors_total: AtomicI64::new(0),
            self_rate_limited_total: AtomicI64::new(0),
            remote_rate_limited_total: AtomicI64::new(0),
            requests_total: AtomicI64::new(0),
            block_head_lag: AtomicI64::new(0),
            finalization_lag: AtomicI64::new(0),
            block_head_large_rollback: AtomicI64::new(0),
            cordoned: AtomicBool::new(false),
            cordoned_reason: RwLock::new(String::new()),
        }
    }

    // Counter updates
    #[inline]
    pub(crate) fn inc_requests(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_errors(&self) {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_self_rate_limited(&self) {
        self.self_rate_limited_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_remote_rate_limited(&self) {
        self.remote_rate_limited_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_duration(&self, seconds: f64) {
        self.response_quantiles.add(seconds);
    }

    // Gauge updates
    #[inline]
    pub(crate) fn set_block_head_lag(&self, lag: i64) {
        self.block_head_lag.store(lag, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn set_finalization_lag(&self, lag: i64) {
        self.finalization_lag.store(lag, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn set_block_head_large_rollback(&self, rollback: i64) {
        self.block_head_large_rollback
            .store(rollback, Ordering::Relaxed);
    }

    pub(crate) fn set_cordoned(&self, reason: &str) {
        self.cordoned.store(true, Ordering::Relaxed);
        *self.cordoned_reason.write() = reason.to_string();
    }

    pub(crate) fn clear_cordon(&self) {
        self.cordoned.store(false, Ordering::Relaxed);
        self.cordoned_reason.write().clear();
    }

    pub fn requests_total(&self) -> i64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn errors_total(&self) -> i64 {
        self.errors_total.load(Ordering::Relaxed)
    }

    pub fn self_rate_limited_total(&self) -> i64 {
        self.self_rate_limited_total.load(Ordering::Relaxed)
    }

    pub fn remote_rate_limited_total(&self) -> i64 {
        self.remote_rate_limited_total.load(Ordering::Relaxed)
    }

    pub fn block_head_lag(&self) -> i64 {
        self.block_head_lag.load(Ordering::Relaxed)
    }

    pub fn finalization_lag(&self) -> i64 {
        self.finalization_lag.load(Ordering::Relaxed)
    }

    pub fn block_head_large_rollback(&self) -> i64 {
        self.block_head_large_rollback.load(Ordering::Relaxed)
    }

    pub fn is_cordoned(&self) -> bool {
        self.cordoned.load(Ordering::Relaxed)
    }

    pub fn cordoned_reason(&self) -> String {
        self.cordoned_reason.read().clone()
    }

    /// Latency accumulator for this key
    pub fn response_quantiles(&self) -> &dyn QuantileAccumulator {
        self.response_quantiles.as_ref()
    }

    /// errors / requests, 0 when no requests were seen this window
    pub fn error_rate(&self) -> f64 {
        let reqs = self.requests_total();
        if reqs == 0 {
            return 0.0;
        }
        self.errors_total() as f64 / reqs as f64
    }

    /// (self + remote rate limited) / requests, 0 when no requests were seen
    pub fn throttled_rate(&self) -> f64 {
        let reqs = self.requests_total();
        if reqs == 0 {
            return 0.0;
        }
        let throttled =
            self.self_rate_limited_total() as f64 + self.remote_rate_limited_total() as f64;
        throttled / reqs as f64
    }

    /// Zero everything for the next window.
    ///
    /// Cordon state is cleared as well: a cordon lasts at most until the next
    /// window boundary unless the caller re-applies it.
    pub fn reset(&self) {
        self.errors_total.store(0, Ordering::Relaxed);
        self.requests_total.store(0, Ordering::Relaxed);
        self.self_rate_limited_total.store(0, Ordering::Relaxed);
        self.remote_rate_limited_total.store(0, Ordering::Relaxed);
        self.block_head_lag.store(0, Ordering::Relaxed);
        self.finalization_lag.store(0, Ordering::Relaxed);
        self.block_head_large_rollback.store(0, Ordering::Relaxed);
        self.response_quantiles.reset();

        self.clear_cordon();
    }

    /// Get snapshot for reporting
    pub fn snapshot(&self) -> MetricSnapshot {
        MetricSnapshot {
            response_quantiles: self.response_quantiles.snapshot(),
            errors_total: self.errors_total(),
            self_rate_limited_total: self.self_rate_limited_total(),
            remote_rate_limited_total: self.remote_rate_limited_total(),
            requests_total: self.requests_total(),
            block_head_lag: self.block_head_lag(),
            finalization_lag: self.finalization_lag(),
            cordoned: self.is_cordoned(),
            cordoned_reason: self.cordoned_reason(),
            error_rate: self.error_rate(),
            throttled_rate: self.throttled_rate(),
        }
    }
}

impl std::fmt::Debug for MetricRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricRecord")
            .field("requests_total", &self.requests_total())
            .field("errors_total", &self.errors_total())
            .field("block_head_lag", &self.block_head_lag())
            .field("finalization_lag", &self.finalization_lag())
            .field("cordoned", &self.is_cordoned())
            .finish_non_exhaustive()
    }
}

/// Snapshot of a record for reporting
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSnapshot {
    pub response_quantiles: QuantileSnapshot,
    pub errors_total: i64,
    pub self_rate_limited_total: i64,
    pub remote_rate_limited_total: i64,
    pub requests_total: i64,
    pub block_head_lag: i64,
    pub finalization_lag: i64,
    pub cordoned: bool,
    pub cordoned_reason: String,
    pub error_rate: f64,
    pub throttled_rate: f64,
}
