//! Telemetry series emitted by the tracker
//!
//! All emissions go through the `metrics` facade and are no-ops until a
//! recorder is installed.

use metrics::{counter, gauge, histogram};

pub const UPSTREAM_CORDONED: &str = "upstream_cordoned";
pub const UPSTREAM_REQUEST_DURATION_SECONDS: &str = "upstream_request_duration_seconds";
pub const UPSTREAM_SELF_RATE_LIMITED_TOTAL: &str = "upstream_self_rate_limited_total";
pub const UPSTREAM_REMOTE_RATE_LIMITED_TOTAL: &str = "upstream_remote_rate_limited_total";
pub const UPSTREAM_LATEST_BLOCK_NUMBER: &str = "upstream_latest_block_number";
pub const UPSTREAM_FINALIZED_BLOCK_NUMBER: &str = "upstream_finalized_block_number";
pub const UPSTREAM_BLOCK_HEAD_LAG: &str = "upstream_block_head_lag";
pub const UPSTREAM_FINALIZATION_LAG: &str = "upstream_finalization_lag";
pub const UPSTREAM_BLOCK_HEAD_LARGE_ROLLBACK: &str = "upstream_block_head_large_rollback";

/// Gauge keyed by (project, network, upstream, method)
pub(crate) fn set_method_gauge(
    name: &'static str,
    project: &str,
    network: &str,
    upstream: &str,
    method: &str,
    value: f64,
) {
    gauge!(
        name,
        "project" => project.to_string(),
        "network" => network.to_string(),
        "upstream" => upstream.to_string(),
        "method" => method.to_string()
    )
    .set(value);
}

/// Counter keyed by (project, network, upstream, method)
pub(crate) fn inc_method_counter(
    name: &'static str,
    project: &str,
    network: &str,
    upstream: &str,
    method: &str,
) {
    counter!(
        name,
        "project" => project.to_string(),
        "network" => network.to_string(),
        "upstream" => upstream.to_string(),
        "method" => method.to_string()
    )
    .increment(1);
}

/// Gauge keyed by (project, network, upstream)
pub(crate) fn set_upstream_gauge(
    name: &'static str,
    project: &str,
    network: &str,
    upstream: &str,
    value: f64,
) {
    gauge!(
        name,
        "project" => project.to_string(),
        "network" => network.to_string(),
        "upstream" => upstream.to_string()
    )
    .set(value);
}

/// Raw request latency sample
pub(crate) fn observe_duration(
    project: &str,
    network: &str,
    upstream: &str,
    method: &str,
    composite_type: &str,
    seconds: f64,
) {
    histogram!(
        UPSTREAM_REQUEST_DURATION_SECONDS,
        "project" => project.to_string(),
        "network" => network.to_string(),
        "upstream" => upstream.to_string(),
        "method" => method.to_string(),
        "composite_type" => composite_type.to_string()
    )
    .record(seconds);
}

/// Captures emissions made through the facade on the current thread
#[cfg(test)]
pub(crate) mod capture {
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    /// One series as seen by the recorder
    pub(crate) struct Emitted {
        pub name: String,
        pub labels: Vec<(String, String)>,
        pub value: DebugValue,
    }

    pub(crate) fn capture(f: impl FnOnce()) -> Vec<Emitted> {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        metrics::with_local_recorder(&recorder, f);

        snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .map(|(composite, _, _, value)| {
                let key = composite.key();
                Emitted {
                    name: key.name().to_string(),
                    labels: key
                        .labels()
                        .map(|l| (l.key().to_string(), l.value().to_string()))
                        .collect(),
                    value,
                }
            })
            .collect()
    }

    /// Series named `name` carrying at least the given labels
    pub(crate) fn find<'a>(
        emitted: &'a [Emitted],
        name: &str,
        labels: &[(&str, &str)],
    ) -> Option<&'a DebugValue> {
        emitted
            .iter()
            .find(|e| {
                e.name == name
                    && labels
                        .iter()
                        .all(|(k, v)| e.labels.iter().any(|(ek, ev)| ek == k && ev == v))
            })
            .map(|e| &e.value)
    }

    pub(crate) fn gauge(value: Option<&DebugValue>) -> Option<f64> {
        match value {
            Some(DebugValue::Gauge(v)) => Some(v.into_inner()),
            _ => None,
        }
    }

    pub(crate) fn counter(value: Option<&DebugValue>) -> Option<u64> {
        match value {
            Some(DebugValue::Counter(v)) => Some(*v),
            _ => None,
        }
    }

    pub(crate) fn histogram(value: Option<&DebugValue>) -> Option<Vec<f64>> {
        match value {
            Some(DebugValue::Histogram(v)) => Some(v.iter().map(|x| x.into_inner()).collect()),
            _ => None,
        }
    }
}
