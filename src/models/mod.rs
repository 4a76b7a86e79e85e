//! Data models for scouting entities.
//!
//! This module contains the persisted record types:
//!
//! - `Report` and its structured `ReportKey`
//! - `User` and the singleton `UserFile`
//! - `SiteSettings`
//! - `TeamStats`, the fixed aggregation output shape

pub mod report;
pub mod settings;
pub mod stats;
pub mod user;

pub use report::{
    AutoPhase, CountPair, EndgamePhase, EndgamePosition, Report, ReportKey, ScoringBreakdown,
    TeleopPhase,
};
pub use settings::SiteSettings;
pub use stats::{AutoStats, EndgameStats, TeamStats, TeleopStats};
pub use user::{User, UserFile, UserSettings};
