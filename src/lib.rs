//! Upstream Health - per-upstream health and performance tracking
//!
//! This library provides the signal store behind RPC gateway routing:
//! request and error counts, rate limiting pressure, latency quantiles,
//! chain head lag and cordon state per (upstream, network, method).

pub mod config;
pub mod health;
pub mod metrics;
pub mod quantile;
pub mod util;

pub use config::Config;
pub use health::Tracker;

/// Crate version for display
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
