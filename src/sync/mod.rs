//! Remote-to-local synchronization.
//!
//! The engine makes the local report store a superset of the remote
//! folder without re-fetching anything already present, under a
//! voluntary rate limit. A smaller routine merges remote-only users
//! into the local user store.

pub mod engine;

pub use engine::{SyncConfig, SyncEngine, SyncMarker, SyncSummary, UserSyncSummary};
