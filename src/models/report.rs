//! Match scouting report model and its structured primary key.
//!
//! A report is immutable once written. Its identity is the pair of
//! team number and creation time at second granularity, which also
//! determines the on-disk file name.

use std::fmt;

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Primary key for a report: team number plus creation time.
///
/// Creation time is truncated to whole seconds so the key round-trips
/// through the `{team}_{YYYYMMDD_HHMMSS}.json` file name without loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReportKey {
    pub team_number: u32,
    pub created_at: DateTime<Utc>,
}

impl ReportKey {
    pub fn new(team_number: u32, created_at: DateTime<Utc>) -> Self {
        Self {
            team_number,
            created_at: truncate_to_second(created_at),
        }
    }

    /// File name this key maps to in the report store.
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}.json",
            self.team_number,
            self.created_at.format("%Y%m%d_%H%M%S")
        )
    }

    /// Next candidate key when this one collides: same team, one second later.
    pub fn bumped(&self) -> Self {
        Self {
            team_number: self.team_number,
            created_at: self.created_at + Duration::seconds(1),
        }
    }
}

impl fmt::Display for ReportKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}",
            self.team_number,
            self.created_at.format("%Y%m%d_%H%M%S")
        )
    }
}

/// Truncate a timestamp to second granularity.
pub fn truncate_to_second(t: DateTime<Utc>) -> DateTime<Utc> {
    t.with_nanosecond(0).unwrap_or(t)
}

/// Attempted/successful counters for one scoring location.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CountPair {
    #[serde(default)]
    pub attempted: u32,
    #[serde(default)]
    pub successful: u32,
}

/// Per-level scoring breakdown shared by the autonomous and teleop phases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScoringBreakdown {
    #[serde(default)]
    pub l4: CountPair,
    #[serde(default)]
    pub l3: CountPair,
    #[serde(default)]
    pub l2: CountPair,
    #[serde(default)]
    pub l1: CountPair,
    #[serde(default)]
    pub net: CountPair,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AutoPhase {
    /// Whether the robot left its starting position.
    #[serde(default)]
    pub moved: bool,
    #[serde(default)]
    pub coral_count: u32,
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub scoring: ScoringBreakdown,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeleopPhase {
    #[serde(default)]
    pub coral_count: u32,
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub cycles: u32,
    #[serde(default)]
    pub successful_cycles: u32,
    #[serde(default)]
    pub processor: bool,
    #[serde(default)]
    pub scoring: ScoringBreakdown,
    #[serde(default)]
    pub notes: String,
}

/// Where the robot ended the match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndgamePosition {
    #[default]
    None,
    Park,
    ShallowClimb,
    DeepClimb,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndgamePhase {
    #[serde(default)]
    pub position: EndgamePosition,
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub notes: String,
}

/// One match scouting report. Immutable once persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Report {
    pub team_number: u32,
    #[serde(default)]
    pub team_name: String,
    pub event: String,
    pub scout_name: String,
    pub match_number: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub autonomous: AutoPhase,
    #[serde(default)]
    pub teleop: TeleopPhase,
    #[serde(default)]
    pub endgame: EndgamePhase,
    #[serde(default)]
    pub additional_notes: String,
}

impl Report {
    /// The key this report persists under.
    pub fn key(&self) -> ReportKey {
        ReportKey::new(self.team_number, self.timestamp)
    }
}
