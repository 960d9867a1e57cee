//! Chain head watermarks
//!
//! Highest latest and finalized block numbers seen per (upstream, network).
//! Both marks only ever move forward; 0 means nothing observed yet.

use std::sync::atomic::{AtomicI64, Ordering};

use super::record::MetricRecord;

/// Which head a watermark update refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadKind {
    /// Latest (unsafe) block, drives block head lag
    Latest,
    /// Finalized block, drives finalization lag
    Finalized,
}

impl HeadKind {
    /// Telemetry series holding the block number
    pub(crate) fn block_number_metric(self) -> &'static str {
        match self {
            HeadKind::Latest => crate::metrics::UPSTREAM_LATEST_BLOCK_NUMBER,
            HeadKind::Finalized => crate::metrics::UPSTREAM_FINALIZED_BLOCK_NUMBER,
        }
    }

    /// Telemetry series holding the lag
    pub(crate) fn lag_metric(self) -> &'static str {
        match self {
            HeadKind::Latest => crate::metrics::UPSTREAM_BLOCK_HEAD_LAG,
            HeadKind::Finalized => crate::metrics::UPSTREAM_FINALIZATION_LAG,
        }
    }

    /// Store a freshly computed lag on the matching record gauge
    pub(crate) fn store_lag(self, record: &MetricRecord, lag: i64) {
        match self {
            HeadKind::Latest => record.set_block_head_lag(lag),
            HeadKind::Finalized => record.set_finalization_lag(lag),
        }
    }
}

impl std::fmt::Display for HeadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeadKind::Latest => f.write_str("latest"),
            HeadKind::Finalized => f.write_str("finalized"),
        }
    }
}

/// Watermarks for one (upstream, network) pair
#[derive(Debug, Default)]
pub struct HeadMetadata {
    latest_block: AtomicI64,
    finalized_block: AtomicI64,
}

impl HeadMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    fn mark(&self, kind: HeadKind) -> &AtomicI64 {
        match kind {
            HeadKind::Latest => &self.latest_block,
            HeadKind::Finalized => &self.finalized_block,
        }
    }

    /// Current watermark
    pub fn get(&self, kind: HeadKind) -> i64 {
        self.mark(kind).load(Ordering::Acquire)
    }

    /// Raise the watermark to `block_number` if it is higher.
    ///
    /// Returns true when this call moved the mark forward.
    pub fn advance(&self, kind: HeadKind, block_number: i64) -> bool {
        self.mark(kind).fetch_max(block_number, Ordering::AcqRel) < block_number
    }

    pub fn latest_block(&self) -> i64 {
        self.get(HeadKind::Latest)
    }

    pub fn finalized_block(&self) -> i64 {
        self.get(HeadKind::Finalized)
    }
}
