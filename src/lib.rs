//! matchvault - persistence, sync, and stats core for FRC match
//! scouting data.
//!
//! The crate owns the parts of a scouting system with real concurrency
//! and partial-failure concerns:
//!
//! - a local, authoritative, file-backed record store with atomic
//!   publication ([`store`])
//! - a best-effort remote backup behind the narrow [`remote::RemoteStore`]
//!   trait, with a Google Drive adapter
//! - a paginated, rate-limited sync engine reconciling remote into
//!   local ([`sync`])
//! - a single-flight background task orchestrator ([`tasks`])
//! - a value-keyed, explicitly invalidated stats cache ([`stats`]) with
//!   durable instrumentation ([`cache`])
//!
//! [`service::ScoutingCore`] is the composition root that wires these
//! together; route handlers and UIs live elsewhere and stay thin.

pub mod activity;
pub mod cache;
pub mod config;
pub mod models;
pub mod remote;
pub mod scoring;
pub mod service;
pub mod settings;
pub mod stats;
pub mod store;
pub mod sync;
pub mod tasks;

pub use cache::CacheKind;
pub use config::Config;
pub use models::{Report, ReportKey, SiteSettings, TeamStats, User, UserSettings};
pub use remote::{DriveClient, RemoteError, RemoteStore};
pub use service::ScoutingCore;
pub use store::{ReportStore, StoreError, UserStore};
pub use sync::{SyncConfig, SyncSummary, UserSyncSummary};
pub use tasks::{StartOutcome, TaskManager, TaskSnapshot, TaskState};
