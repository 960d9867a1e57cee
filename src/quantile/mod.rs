//! Latency quantile estimation
//!
//! The tracker only depends on the [`QuantileAccumulator`] contract; the
//! default implementation is an HDR histogram.

mod hdr;

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

pub use hdr::HdrQuantiles;

/// Streaming latency accumulator owned by a single metric record
pub trait QuantileAccumulator: Send + Sync {
    /// Add one sample, in seconds
    fn add(&self, seconds: f64);

    /// Drop all samples
    fn reset(&self);

    /// Estimated value at quantile `q` (0.0..=1.0), in seconds. 0 when empty.
    fn quantile(&self, q: f64) -> f64;

    /// Number of samples since the last reset
    fn count(&self) -> u64;

    /// Serializable summary
    fn snapshot(&self) -> QuantileSnapshot {
        QuantileSnapshot {
            count: self.count(),
            p50: self.quantile(0.50),
            p90: self.quantile(0.90),
            p95: self.quantile(0.95),
            p99: self.quantile(0.99),
        }
    }
}

/// Builds a fresh accumulator for every new metric record
pub type QuantileFactory = Arc<dyn Fn() -> Box<dyn QuantileAccumulator> + Send + Sync>;

/// Quantile summary, values in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuantileSnapshot {
    pub count: u64,
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Accumulator construction errors
#[derive(Debug, Error)]
pub enum QuantileError {
    #[error("quantile precision must be between 0 and 5 significant figures, got {0}")]
    InvalidPrecision(u8),

    #[error("failed to create histogram: {0}")]
    Histogram(#[from] hdrhistogram::CreationError),
}
