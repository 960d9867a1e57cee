//! Block height watermarks and lag cascade
//!
//! Each network keeps a high-water mark of the best head any upstream has
//! reported. Lag is the distance between that mark and an upstream's own mark.
//! When the network mark moves, every record on the network is recomputed;
//! otherwise only the reporting upstream's records change.

use tracing::{debug, trace, warn};

use super::head::HeadKind;
use super::key::{DuoKey, TripletKey};
use super::tracker::Tracker;
use crate::metrics::{self, UPSTREAM_BLOCK_HEAD_LARGE_ROLLBACK};

impl Tracker {
    /// Report the latest block an upstream has seen
    pub fn set_latest_block_number(&self, ups: &str, network: &str, block_number: i64) {
        self.observe_head(HeadKind::Latest, ups, network, block_number);
    }

    /// Report the finalized block an upstream has seen
    pub fn set_finalized_block_number(&self, ups: &str, network: &str, block_number: i64) {
        self.observe_head(HeadKind::Finalized, ups, network, block_number);
    }

    fn observe_head(&self, kind: HeadKind, ups: &str, network: &str, block_number: i64) {
        trace!(
            upstream = ups,
            network = network,
            head = %kind,
            value = block_number,
            "Updating block number in tracker"
        );

        if block_number <= 0 {
            warn!(
                upstream = ups,
                network = network,
                head = %kind,
                value = block_number,
                "Ignoring non-positive block number in tracker"
            );
            return;
        }

        // Network-wide mark first, so a global advance is known before the upstream moves
        let network_mark = self.get_metadata(DuoKey::network_wide(network));
        let global_advance = network_mark.advance(kind, block_number);
        if global_advance {
            metrics::set_upstream_gauge(
                kind.block_number_metric(),
                self.project_id(),
                network,
                "*",
                block_number as f64,
            );
        }

        let upstream_mark = self.get_metadata(DuoKey::new(ups, network));
        if upstream_mark.advance(kind, block_number) {
            metrics::set_upstream_gauge(
                kind.block_number_metric(),
                self.project_id(),
                network,
                ups,
                block_number as f64,
            );
        }

        let network_head = network_mark.get(kind);
        if network_head <= 0 {
            warn!(
                upstream = ups,
                network = network,
                head = %kind,
                value = network_head,
                "Ignoring lag tracking for non-positive network block number"
            );
            return;
        }

        let lag = network_head - upstream_mark.get(kind);
        metrics::set_upstream_gauge(kind.lag_metric(), self.project_id(), network, ups, lag as f64);

        if global_advance {
            self.cascade_lag(kind, network, network_head);
        } else {
            self.for_each_record(|key, record| {
                if key.upstream.matches(ups) && key.network.matches(network) {
                    kind.store_lag(record, lag);
                }
            });
        }
    }

    /// Recompute lag for every record on `network` against a new network head
    fn cascade_lag(&self, kind: HeadKind, network: &str, network_head: i64) {
        self.for_each_record(|key, record| {
            if !key.network.matches(network) {
                return;
            }

            let upstream_head = self.upstream_head(kind, key);
            if upstream_head <= 0 {
                debug!(
                    upstream = %key.upstream,
                    network = network,
                    head = %kind,
                    value = upstream_head,
                    "Skipping lag for upstream without a block number yet"
                );
                return;
            }

            let lag = network_head - upstream_head;
            kind.store_lag(record, lag);
            metrics::set_upstream_gauge(
                kind.lag_metric(),
                self.project_id(),
                network,
                &key.upstream.to_string(),
                lag as f64,
            );
        });
    }

    /// Watermark of the record's upstream, 0 when it never reported
    fn upstream_head(&self, kind: HeadKind, key: &TripletKey) -> i64 {
        self.head_for(&key.duo())
            .map(|head| head.get(kind))
            .unwrap_or(0)
    }

    /// Record the size of a large head rollback reported by a chain watcher.
    ///
    /// Detection is up to the caller; only `current - new` is stored.
    pub fn record_block_head_large_rollback(
        &self,
        ups: &str,
        network: &str,
        finality: &str,
        current_value: i64,
        new_value: i64,
    ) {
        let rollback = current_value - new_value;

        self.get_metrics(TripletKey::new(ups, network, ""))
            .set_block_head_large_rollback(rollback);

        debug!(
            upstream = ups,
            network = network,
            finality = finality,
            current_value,
            new_value,
            rollback,
            "Recording block head rollback in tracker"
        );

        metrics::set_upstream_gauge(
            UPSTREAM_BLOCK_HEAD_LARGE_ROLLBACK,
            self.project_id(),
            network,
            ups,
            rollback as f64,
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::health::Tracker;
    use crate::metrics::capture::{capture, find, gauge};
    use crate::metrics::{
        UPSTREAM_BLOCK_HEAD_LAG, UPSTREAM_BLOCK_HEAD_LARGE_ROLLBACK, UPSTREAM_LATEST_BLOCK_NUMBER,
    };
    use crate::quantile::HdrQuantiles;

    fn tracker() -> Arc<Tracker> {
        Tracker::new("test", Duration::from_secs(60), HdrQuantiles::factory(3).unwrap())
    }

    fn lag(t: &Tracker, ups: &str, network: &str, method: &str) -> i64 {
        t.upstream_method_metrics(ups, network, method)
            .unwrap()
            .block_head_lag()
    }

    #[test]
    fn test_non_positive_blocks_are_dropped() {
        let t = tracker();
        t.set_latest_block_number("alchemy", "evm:1", 0);
        t.set_latest_block_number("alchemy", "evm:1", -5);
        t.set_finalized_block_number("alchemy", "evm:1", 0);

        assert!(t.head_metadata("alchemy", "evm:1").is_none());
        assert!(t.head_metadata("*", "evm:1").is_none());
    }

    #[test]
    fn test_upstream_mark_is_monotonic() {
        let t = tracker();
        for block in [10, 30, 20, -1, 25, 0] {
            t.set_latest_block_number("alchemy", "evm:1", block);
        }
        let head = t.head_metadata("alchemy", "evm:1").unwrap();
        assert_eq!(head.latest_block(), 30);
        assert_eq!(head.finalized_block(), 0);
    }

    #[test]
    fn test_global_advance_cascades_to_other_upstreams() {
        let t = tracker();
        t.record_request("a", "evm:1", "eth_call");
        t.record_request("b", "evm:1", "eth_call");

        t.set_latest_block_number("a", "evm:1", 100);
        t.set_latest_block_number("b", "evm:1", 150);

        assert_eq!(lag(&t, "a", "evm:1", "eth_call"), 50);
        assert_eq!(lag(&t, "a", "evm:1", "*"), 50);
        assert_eq!(lag(&t, "b", "evm:1", "eth_call"), 0);
        assert_eq!(t.head_metadata("*", "evm:1").unwrap().latest_block(), 150);
    }

    #[test]
    fn test_lagging_report_only_touches_reporter() {
        let t = tracker();
        t.record_request("a", "evm:1", "eth_call");
        t.record_request("b", "evm:1", "eth_call");
        t.set_latest_block_number("b", "evm:1", 150);
        t.set_latest_block_number("a", "evm:1", 100);

        assert_eq!(lag(&t, "a", "evm:1", "eth_call"), 50);
        assert_eq!(lag(&t, "b", "evm:1", "eth_call"), 0);

        // a catches up partially without moving the network head
        t.set_latest_block_number("a", "evm:1", 140);
        assert_eq!(lag(&t, "a", "evm:1", "eth_call"), 10);
        assert_eq!(lag(&t, "b", "evm:1", "eth_call"), 0);
    }

    #[test]
    fn test_regressed_report_is_ignored() {
        let t = tracker();
        t.record_request("a", "evm:1", "eth_call");
        t.set_latest_block_number("a", "evm:1", 200);
        t.set_latest_block_number("a", "evm:1", 180);

        assert_eq!(t.head_metadata("a", "evm:1").unwrap().latest_block(), 200);
        assert_eq!(lag(&t, "a", "evm:1", "eth_call"), 0);
    }

    #[test]
    fn test_other_networks_untouched() {
        let t = tracker();
        t.record_request("a", "evm:1", "eth_call");
        t.record_request("a", "evm:10", "eth_call");
        t.set_latest_block_number("a", "evm:10", 5);
        t.set_latest_block_number("b", "evm:1", 100);
        t.set_latest_block_number("a", "evm:1", 60);

        assert_eq!(lag(&t, "a", "evm:1", "eth_call"), 40);
        assert_eq!(lag(&t, "a", "evm:10", "eth_call"), 0);
    }

    #[test]
    fn test_finalization_lag_is_independent() {
        let t = tracker();
        t.record_request("a", "evm:1", "eth_call");
        t.record_request("b", "evm:1", "eth_call");
        t.set_finalized_block_number("a", "evm:1", 90);
        t.set_finalized_block_number("b", "evm:1", 96);

        let a = t.upstream_method_metrics("a", "evm:1", "eth_call").unwrap();
        assert_eq!(a.finalization_lag(), 6);
        assert_eq!(a.block_head_lag(), 0);
        assert_eq!(t.head_metadata("*", "evm:1").unwrap().finalized_block(), 96);
        assert_eq!(t.head_metadata("*", "evm:1").unwrap().latest_block(), 0);
    }

    #[test]
    fn test_large_rollback_recorded_on_upstream_network_record() {
        let t = tracker();
        t.record_block_head_large_rollback("a", "evm:1", "latest", 1_000, 940);

        let m = t.upstream_method_metrics("a", "evm:1", "").unwrap();
        assert_eq!(m.block_head_large_rollback(), 60);
        assert!(t.upstream_method_metrics("a", "evm:1", "*").is_none());
    }

    #[test]
    fn test_global_advance_publishes_network_mark() {
        let t = tracker();
        t.set_latest_block_number("a", "evm:1", 100);

        let emitted = capture(|| {
            t.set_latest_block_number("b", "evm:1", 120);
            t.set_latest_block_number("a", "evm:1", 110);
        });

        let network_mark = find(
            &emitted,
            UPSTREAM_LATEST_BLOCK_NUMBER,
            &[("project", "test"), ("network", "evm:1"), ("upstream", "*")],
        );
        assert_eq!(gauge(network_mark), Some(120.0));
        assert_eq!(
            gauge(find(&emitted, UPSTREAM_LATEST_BLOCK_NUMBER, &[("upstream", "a")])),
            Some(110.0)
        );
        assert_eq!(
            gauge(find(&emitted, UPSTREAM_BLOCK_HEAD_LAG, &[("upstream", "a")])),
            Some(10.0)
        );
    }

    #[test]
    fn test_large_rollback_published() {
        let t = tracker();
        let emitted =
            capture(|| t.record_block_head_large_rollback("a", "evm:1", "latest", 1_000, 940));

        let rollback = find(
            &emitted,
            UPSTREAM_BLOCK_HEAD_LARGE_ROLLBACK,
            &[("project", "test"), ("network", "evm:1"), ("upstream", "a")],
        );
        assert_eq!(gauge(rollback), Some(60.0));
    }
}
