//! Point values for the 2025 game.
//!
//! Pure functions mapping a scoring breakdown to points and coral
//! counts. The core persists whatever these return; it never validates
//! or recomputes them elsewhere.

use crate::models::{EndgamePosition, ScoringBreakdown};

/// Computed totals for one match phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseScore {
    pub coral_count: u32,
    pub score: u32,
}

/// Autonomous point values per scoring location.
const AUTO_POINTS: LevelPoints = LevelPoints {
    l4: 7,
    l3: 6,
    l2: 4,
    l1: 3,
    net: 4,
};

/// Teleop point values per scoring location.
const TELEOP_POINTS: LevelPoints = LevelPoints {
    l4: 5,
    l3: 4,
    l2: 3,
    l1: 2,
    net: 4,
};

struct LevelPoints {
    l4: u32,
    l3: u32,
    l2: u32,
    l1: u32,
    net: u32,
}

fn score_phase(scoring: &ScoringBreakdown, points: &LevelPoints) -> PhaseScore {
    let coral_count = scoring.l4.successful
        + scoring.l3.successful
        + scoring.l2.successful
        + scoring.l1.successful
        + scoring.net.successful;
    let score = scoring.l4.successful * points.l4
        + scoring.l3.successful * points.l3
        + scoring.l2.successful * points.l2
        + scoring.l1.successful * points.l1
        + scoring.net.successful * points.net;
    PhaseScore { coral_count, score }
}

pub fn score_auto(scoring: &ScoringBreakdown) -> PhaseScore {
    score_phase(scoring, &AUTO_POINTS)
}

pub fn score_teleop(scoring: &ScoringBreakdown) -> PhaseScore {
    score_phase(scoring, &TELEOP_POINTS)
}

pub fn score_endgame(position: EndgamePosition) -> u32 {
    match position {
        EndgamePosition::None => 0,
        EndgamePosition::Park => 2,
        EndgamePosition::ShallowClimb => 6,
        EndgamePosition::DeepClimb => 12,
    }
}
