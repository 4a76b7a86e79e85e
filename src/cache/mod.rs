//! Cache instrumentation.
//!
//! Durable counters and timestamps describing cache health, surfaced to
//! diagnostics. State is persisted so it survives restarts.

pub mod tracker;

pub use tracker::{BucketInfo, CacheKind, CacheTracker, TrackingInfo};
