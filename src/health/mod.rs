//! Upstream health tracking
//!
//! Request volume, errors, rate limiting, latency, chain head lag and
//! cordon state per (upstream, network, method).

mod head;
mod key;
mod record;
mod timer;
mod tracker;
mod watermark;

pub use head::{HeadKind, HeadMetadata};
pub use key::{DuoKey, Segment, TripletKey, WILDCARD};
pub use record::{MetricRecord, MetricSnapshot};
pub use timer::Timer;
pub use tracker::{Tracker, DEFAULT_COMPOSITE_TYPE, MAX_WINDOW};
