//! Aggregated team statistics.
//!
//! The shape is fixed: every consumer sees the same leaves whether a
//! team has fifty reports or none. Percentages and averages are rounded
//! to two decimals, half-up.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutoStats {
    pub percent_moved: f64,
    pub avg_coral: f64,
    pub avg_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeleopStats {
    pub avg_coral: f64,
    pub avg_score: f64,
    pub avg_cycles: f64,
    pub percent_successful_cycles: f64,
    pub avg_l4: f64,
    pub avg_net: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndgameStats {
    pub percent_park: f64,
    pub percent_shallow_climb: f64,
    pub percent_deep_climb: f64,
    pub avg_score: f64,
}

/// Statistics aggregated over one team's report set.
///
/// `Default` is the fully zeroed shape returned for an empty input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamStats {
    pub games_played: u32,
    pub percent_moved: f64,
    pub auto: AutoStats,
    pub teleop: TeleopStats,
    pub endgame: EndgameStats,
}
