//! Request duration timer

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::tracker::{Tracker, DEFAULT_COMPOSITE_TYPE};

/// Measures one upstream request from [`Tracker::start_timer`] to [`Timer::observe`]
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    upstream: String,
    network: String,
    method: String,
    composite_type: String,
    tracker: Arc<Tracker>,
}

impl Timer {
    pub(super) fn start(
        tracker: Arc<Tracker>,
        upstream: &str,
        network: &str,
        method: &str,
        composite_type: &str,
    ) -> Self {
        let composite_type = if composite_type.is_empty() {
            DEFAULT_COMPOSITE_TYPE
        } else {
            composite_type
        };
        Self {
            start: Instant::now(),
            upstream: upstream.to_string(),
            network: network.to_string(),
            method: method.to_string(),
            composite_type: composite_type.to_string(),
            tracker,
        }
    }

    /// Composite type label ("none" when the caller gave none)
    pub fn composite_type(&self) -> &str {
        &self.composite_type
    }

    /// Stop the timer and record the elapsed time
    pub fn observe(self) -> Duration {
        let elapsed = self.start.elapsed();
        self.tracker.record_duration(
            &self.upstream,
            &self.network,
            &self.method,
            elapsed,
            &self.composite_type,
        );
        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantile::HdrQuantiles;

    #[test]
    fn test_timer_records_duration() {
        let tracker = Tracker::new(
            "test",
            Duration::from_secs(60),
            HdrQuantiles::factory(3).unwrap(),
        );
        let timer = tracker.start_timer("alchemy", "evm:1", "eth_call", "");
        assert_eq!(timer.composite_type(), "none");

        std::thread::sleep(Duration::from_millis(5));
        let elapsed = timer.observe();
        assert!(elapsed >= Duration::from_millis(5));

        let m = tracker
            .upstream_method_metrics("alchemy", "evm:1", "eth_call")
            .unwrap();
        assert_eq!(m.response_quantiles().count(), 1);
        assert!(m.response_quantiles().quantile(0.5) >= 0.004);

        let network = tracker.network_method_metrics("evm:1", "*").unwrap();
        assert_eq!(network.response_quantiles().count(), 1);
    }
}
