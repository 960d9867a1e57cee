//! Upstream health tracker
//!
//! Aggregates request outcomes, latency and chain head signals per
//! (upstream, network, method) and rolls every observation up into four
//! wildcard keys so any granularity can be read without recomputation.

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::head::HeadMetadata;
use super::key::{DuoKey, TripletKey};
use super::record::MetricRecord;
use super::timer::Timer;
use crate::config::TrackerConfig;
use crate::metrics::{self, UPSTREAM_CORDONED};
use crate::quantile::{HdrQuantiles, QuantileError, QuantileFactory};

/// Composite type reported when the caller does not classify a request
pub const DEFAULT_COMPOSITE_TYPE: &str = "none";

/// Smallest reset window the background loop accepts
const MIN_WINDOW: Duration = Duration::from_millis(1);

/// Largest reset window the background loop accepts
pub const MAX_WINDOW: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Concurrent store of metric records and chain head watermarks
pub struct Tracker {
    /// Project label attached to every telemetry series
    project_id: String,
    /// Interval between counter resets
    window: Duration,
    /// Builds the latency accumulator for new records
    quantiles: QuantileFactory,
    /// Records by triplet key, including wildcard rollups
    metrics: DashMap<TripletKey, Arc<MetricRecord>>,
    /// Head watermarks by (upstream, network)
    metadata: DashMap<DuoKey, Arc<HeadMetadata>>,
}

impl Tracker {
    /// Create a new tracker
    pub fn new(
        project_id: impl Into<String>,
        window: Duration,
        quantiles: QuantileFactory,
    ) -> Arc<Self> {
        Arc::new(Self {
            project_id: project_id.into(),
            window,
            quantiles,
            metrics: DashMap::new(),
            metadata: DashMap::new(),
        })
    }

    /// Create a tracker using HDR histogram quantiles
    pub fn from_config(config: &TrackerConfig) -> Result<Arc<Self>, QuantileError> {
        let quantiles = HdrQuantiles::factory(config.quantile_precision)?;
        Ok(Self::new(config.project_id.clone(), config.window(), quantiles))
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Start the windowed reset loop.
    ///
    /// The loop exits once `shutdown` flips to true or its sender is dropped.
    pub fn bootstrap(self: &Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let tracker = Arc::clone(self);
        tokio::spawn(async move { tracker.reset_metrics_loop(shutdown).await })
    }

    async fn reset_metrics_loop(&self, mut shutdown: watch::Receiver<bool>) {
        let period = self.window.clamp(MIN_WINDOW, MAX_WINDOW);
        if period != self.window {
            warn!(
                project = %self.project_id,
                requested_secs = self.window.as_secs_f64(),
                window_secs = period.as_secs_f64(),
                "Tracker window out of range, clamped"
            );
        }
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            project = %self.project_id,
            window_secs = period.as_secs_f64(),
            "Tracker reset loop started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.reset_all();
                }
            }
        }

        info!(project = %self.project_id, "Tracker reset loop stopped");
    }

    /// Reset every known record for a new window
    pub fn reset_all(&self) {
        let mut reset = 0usize;
        for entry in self.metrics.iter() {
            entry.value().reset();
            reset += 1;
        }
        debug!(records = reset, "Reset tracked metrics for new window");
    }

    /// Get or create the record for `key`
    pub(super) fn get_metrics(&self, key: TripletKey) -> Arc<MetricRecord> {
        if let Some(existing) = self.metrics.get(&key) {
            return Arc::clone(existing.value());
        }
        // Racing creators all end up with the entry that won the insert
        let record = self
            .metrics
            .entry(key)
            .or_insert_with(|| Arc::new(MetricRecord::new((self.quantiles)())));
        Arc::clone(record.value())
    }

    /// Get or create the watermarks for `key`
    pub(super) fn get_metadata(&self, key: DuoKey) -> Arc<HeadMetadata> {
        if let Some(existing) = self.metadata.get(&key) {
            return Arc::clone(existing.value());
        }
        let head = self
            .metadata
            .entry(key)
            .or_insert_with(|| Arc::new(HeadMetadata::new()));
        Arc::clone(head.value())
    }

    /// Apply `update` to all five rollup records of a concrete observation
    fn update_expanded(
        &self,
        ups: &str,
        network: &str,
        method: &str,
        update: impl Fn(&MetricRecord),
    ) {
        for key in TripletKey::expand(ups, network, method) {
            update(&*self.get_metrics(key));
        }
    }

    /// Records are visited without a snapshot; entries inserted concurrently
    /// may or may not be seen.
    pub(super) fn for_each_record(&self, mut visit: impl FnMut(&TripletKey, &MetricRecord)) {
        for entry in self.metrics.iter() {
            visit(entry.key(), &**entry.value());
        }
    }

    // --------------------
    // Cordon / Uncordon
    // --------------------

    /// Exclude an upstream from routing for a network and method
    pub fn cordon(&self, ups: &str, network: &str, method: &str, reason: &str) {
        debug!(
            upstream = ups,
            network = network,
            method = method,
            reason = reason,
            "Cordoning upstream to disable routing"
        );

        self.get_metrics(TripletKey::new(ups, network, method))
            .set_cordoned(reason);

        metrics::set_method_gauge(UPSTREAM_CORDONED, &self.project_id, network, ups, method, 1.0);
    }

    /// Re-enable an upstream for a network and method
    pub fn uncordon(&self, ups: &str, network: &str, method: &str) {
        debug!(
            upstream = ups,
            network = network,
            method = method,
            "Uncordoning upstream"
        );

        self.get_metrics(TripletKey::new(ups, network, method))
            .clear_cordon();

        metrics::set_method_gauge(UPSTREAM_CORDONED, &self.project_id, network, ups, method, 0.0);
    }

    /// Check whether (ups, network, method) is cordoned.
    ///
    /// A cordon on (ups, network, `*`) covers every method of that network.
    /// Keys that were never recorded are not cordoned.
    pub fn is_cordoned(&self, ups: &str, network: &str, method: &str) -> bool {
        if let Some(all_methods) = self.metrics.get(&TripletKey::new(ups, network, "*")) {
            if all_methods.is_cordoned() {
                return true;
            }
        }
        self.metrics
            .get(&TripletKey::new(ups, network, method))
            .map(|exact| exact.is_cordoned())
            .unwrap_or(false)
    }

    // --------------------
    // Request tracking
    // --------------------

    pub fn record_request(&self, ups: &str, network: &str, method: &str) {
        self.update_expanded(ups, network, method, MetricRecord::inc_requests);
    }

    pub fn record_failure(&self, ups: &str, network: &str, method: &str) {
        self.update_expanded(ups, network, method, MetricRecord::inc_errors);
    }

    /// Request rejected by the gateway's own limiter before reaching the upstream
    pub fn record_self_rate_limited(&self, ups: &str, network: &str, method: &str) {
        self.update_expanded(ups, network, method, MetricRecord::inc_self_rate_limited);
        metrics::inc_method_counter(
            metrics::UPSTREAM_SELF_RATE_LIMITED_TOTAL,
            &self.project_id,
            network,
            ups,
            method,
        );
    }

    /// Request rate limited by the upstream itself
    pub fn record_remote_rate_limited(&self, ups: &str, network: &str, method: &str) {
        self.update_expanded(ups, network, method, MetricRecord::inc_remote_rate_limited);
        metrics::inc_method_counter(
            metrics::UPSTREAM_REMOTE_RATE_LIMITED_TOTAL,
            &self.project_id,
            network,
            ups,
            method,
        );
    }

    /// Start timing a request. Call [`Timer::observe`] when it completes.
    pub fn start_timer(
        self: &Arc<Self>,
        ups: &str,
        network: &str,
        method: &str,
        composite_type: &str,
    ) -> Timer {
        Timer::start(Arc::clone(self), ups, network, method, composite_type)
    }

    /// Feed a latency sample into all rollups and the duration histogram
    pub fn record_duration(
        &self,
        ups: &str,
        network: &str,
        method: &str,
        duration: Duration,
        composite_type: &str,
    ) {
        let seconds = duration.as_secs_f64();
        self.update_expanded(ups, network, method, |m| m.add_duration(seconds));

        let composite_type = if composite_type.is_empty() {
            DEFAULT_COMPOSITE_TYPE
        } else {
            composite_type
        };
        metrics::observe_duration(&self.project_id, network, ups, method, composite_type, seconds);
    }

    // --------------------
    // Accessors
    // --------------------

    /// Record for an exact key, if one exists
    pub fn upstream_method_metrics(
        &self,
        ups: &str,
        network: &str,
        method: &str,
    ) -> Option<Arc<MetricRecord>> {
        self.metrics
            .get(&TripletKey::new(ups, network, method))
            .map(|entry| Arc::clone(entry.value()))
    }

    /// All records of an upstream, keyed by `network|method`
    pub fn upstream_metrics(&self, ups: &str) -> HashMap<String, Arc<MetricRecord>> {
        self.metrics
            .iter()
            .filter(|entry| entry.key().upstream.matches(ups))
            .map(|entry| (entry.key().suffix(), Arc::clone(entry.value())))
            .collect()
    }

    /// Network-wide rollup for a method (`*` for all methods)
    pub fn network_method_metrics(&self, network: &str, method: &str) -> Option<Arc<MetricRecord>> {
        self.upstream_method_metrics("*", network, method)
    }

    /// Watermarks for (ups, network), if any block number was observed
    pub fn head_metadata(&self, ups: &str, network: &str) -> Option<Arc<HeadMetadata>> {
        self.head_for(&DuoKey::new(ups, network))
    }

    pub(super) fn head_for(&self, key: &DuoKey) -> Option<Arc<HeadMetadata>> {
        self.metadata.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Number of metric records
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("project_id", &self.project_id)
            .field("window", &self.window)
            .field("records", &self.metrics.len())
            .field("heads", &self.metadata.len())
            .finish()
    }
}
