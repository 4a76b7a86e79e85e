//! Statistics aggregation and its memoization cache.
//!
//! [`compute_team_stats`] is pure and deterministic: equal report sets
//! produce identical output, an empty set produces the zeroed shape,
//! and a zero denominator anywhere yields zero rather than dividing.
//!
//! The cache memoizes on the *value* of the input set, not its
//! identity, so adding one report forces recomputation. Invalidation is
//! whole-cache: a report write clears everything, trading recomputation
//! cost for stats that are never stale by more than one write.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::models::{EndgamePosition, Report, TeamStats};

/// Round to two decimals, half-up.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Aggregate one team's reports into the fixed stats shape.
pub fn compute_team_stats(reports: &[Report]) -> TeamStats {
    let mut stats = TeamStats::default();
    if reports.is_empty() {
        return stats;
    }

    let games = reports.len() as f64;
    stats.games_played = reports.len() as u32;

    let mut moved = 0u32;
    let mut park = 0u32;
    let mut shallow = 0u32;
    let mut deep = 0u32;

    let mut auto_coral = 0u64;
    let mut auto_score = 0u64;
    let mut teleop_coral = 0u64;
    let mut teleop_score = 0u64;
    let mut cycles = 0u64;
    let mut successful_cycles = 0u64;
    let mut l4 = 0u64;
    let mut net = 0u64;
    let mut endgame_score = 0u64;

    for report in reports {
        if report.autonomous.moved {
            moved += 1;
        }
        auto_coral += u64::from(report.autonomous.coral_count);
        auto_score += u64::from(report.autonomous.score);

        teleop_coral += u64::from(report.teleop.coral_count);
        teleop_score += u64::from(report.teleop.score);
        cycles += u64::from(report.teleop.cycles);
        successful_cycles += u64::from(report.teleop.successful_cycles);
        l4 += u64::from(report.teleop.scoring.l4.successful);
        net += u64::from(report.teleop.scoring.net.successful);

        endgame_score += u64::from(report.endgame.score);
        match report.endgame.position {
            EndgamePosition::Park => park += 1,
            EndgamePosition::ShallowClimb => shallow += 1,
            EndgamePosition::DeepClimb => deep += 1,
            EndgamePosition::None => {}
        }
    }

    stats.percent_moved = round2(f64::from(moved) / games * 100.0);

    stats.auto.percent_moved = stats.percent_moved;
    stats.auto.avg_coral = round2(auto_coral as f64 / games);
    stats.auto.avg_score = round2(auto_score as f64 / games);

    stats.teleop.avg_coral = round2(teleop_coral as f64 / games);
    stats.teleop.avg_score = round2(teleop_score as f64 / games);
    stats.teleop.avg_cycles = round2(cycles as f64 / games);
    if cycles > 0 {
        stats.teleop.percent_successful_cycles =
            round2(successful_cycles as f64 / cycles as f64 * 100.0);
    }
    stats.teleop.avg_l4 = round2(l4 as f64 / games);
    stats.teleop.avg_net = round2(net as f64 / games);

    stats.endgame.percent_park = round2(f64::from(park) / games * 100.0);
    stats.endgame.percent_shallow_climb = round2(f64::from(shallow) / games * 100.0);
    stats.endgame.percent_deep_climb = round2(f64::from(deep) / games * 100.0);
    stats.endgame.avg_score = round2(endgame_score as f64 / games);

    stats
}

/// Memoized wrapper around [`compute_team_stats`].
#[derive(Default)]
pub struct StatsCache {
    entries: Mutex<HashMap<u64, TeamStats>>,
}

impl StatsCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<u64, TeamStats>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Value fingerprint of a report set, independent of iteration order.
    ///
    /// 64 bits, so two distinct sets can collide in principle. The table
    /// is cleared on every report write, so it only ever holds entries
    /// for the current report corpus; the residual collision odds are
    /// accepted.
    fn fingerprint(reports: &[Report]) -> u64 {
        let mut hashes: Vec<u64> = reports
            .iter()
            .map(|r| {
                let mut h = DefaultHasher::new();
                r.hash(&mut h);
                h.finish()
            })
            .collect();
        hashes.sort_unstable();

        let mut h = DefaultHasher::new();
        hashes.hash(&mut h);
        h.finish()
    }

    /// Return cached stats for this exact report set, computing on miss.
    /// The bool reports whether this was a cache hit.
    pub fn get_or_compute(&self, reports: &[Report]) -> (TeamStats, bool) {
        let key = Self::fingerprint(reports);
        let mut entries = self.guard();
        if let Some(stats) = entries.get(&key) {
            return (stats.clone(), true);
        }
        let stats = compute_team_stats(reports);
        entries.insert(key, stats.clone());
        (stats, false)
    }

    /// Drop every memoized aggregate. Called after any report write.
    pub fn invalidate_all(&self) -> usize {
        let mut entries = self.guard();
        let dropped = entries.len();
        entries.clear();
        if dropped > 0 {
            debug!(dropped, "Invalidated stats cache");
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AutoPhase, CountPair, EndgamePhase, TeleopPhase};
    use chrono::{TimeZone, Utc};

    fn report(second: u32) -> Report {
        Report {
            team_number: 4682,
            team_name: String::new(),
            event: "2025wabon".to_string(),
            scout_name: "casey".to_string(),
            match_number: second,
            timestamp: Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, second).unwrap(),
            autonomous: AutoPhase::default(),
            teleop: TeleopPhase::default(),
            endgame: EndgamePhase::default(),
            additional_notes: String::new(),
        }
    }

    fn cycle_report(second: u32, cycles: u32, successful: u32) -> Report {
        let mut r = report(second);
        r.teleop.cycles = cycles;
        r.teleop.successful_cycles = successful;
        r
    }

    #[test]
    fn test_empty_input_returns_zeroed_shape() {
        let stats = compute_team_stats(&[]);
        assert_eq!(stats, TeamStats::default());
        assert_eq!(stats.games_played, 0);
        assert_eq!(stats.teleop.percent_successful_cycles, 0.0);
    }

    #[test]
    fn test_cycle_success_percentage() {
        let reports = vec![
            cycle_report(1, 10, 5),
            cycle_report(2, 8, 4),
            cycle_report(3, 0, 0),
        ];
        let stats = compute_team_stats(&reports);
        // 9 successful of 18 total cycles.
        assert_eq!(stats.teleop.percent_successful_cycles, 50.0);
        assert_eq!(stats.teleop.avg_cycles, 6.0);
    }

    #[test]
    fn test_zero_total_cycles_yields_zero_not_error() {
        let reports = vec![cycle_report(1, 0, 0), cycle_report(2, 0, 0)];
        let stats = compute_team_stats(&reports);
        assert_eq!(stats.teleop.percent_successful_cycles, 0.0);
    }

    #[test]
    fn test_movement_and_endgame_percentages() {
        let mut a = report(1);
        a.autonomous.moved = true;
        a.endgame.position = EndgamePosition::DeepClimb;
        a.endgame.score = 12;
        let mut b = report(2);
        b.endgame.position = EndgamePosition::Park;
        b.endgame.score = 2;
        let c = report(3);

        let stats = compute_team_stats(&[a, b, c]);
        assert_eq!(stats.games_played, 3);
        assert_eq!(stats.percent_moved, 33.33);
        assert_eq!(stats.auto.percent_moved, 33.33);
        assert_eq!(stats.endgame.percent_deep_climb, 33.33);
        assert_eq!(stats.endgame.percent_park, 33.33);
        assert_eq!(stats.endgame.percent_shallow_climb, 0.0);
        assert_eq!(stats.endgame.avg_score, 4.67);
    }

    #[test]
    fn test_teleop_averages() {
        let mut a = report(1);
        a.teleop.coral_count = 4;
        a.teleop.score = 17;
        a.teleop.scoring.l4 = CountPair {
            attempted: 3,
            successful: 2,
        };
        a.teleop.scoring.net = CountPair {
            attempted: 1,
            successful: 1,
        };
        let b = report(2);

        let stats = compute_team_stats(&[a, b]);
        assert_eq!(stats.teleop.avg_coral, 2.0);
        assert_eq!(stats.teleop.avg_score, 8.5);
        assert_eq!(stats.teleop.avg_l4, 1.0);
        assert_eq!(stats.teleop.avg_net, 0.5);
    }

    #[test]
    fn test_determinism_equal_inputs_equal_output() {
        let reports = vec![cycle_report(1, 7, 3), cycle_report(2, 5, 5)];
        assert_eq!(compute_team_stats(&reports), compute_team_stats(&reports));
    }

    #[test]
    fn test_cache_hit_on_equal_set_regardless_of_order() {
        let cache = StatsCache::new();
        let a = cycle_report(1, 7, 3);
        let b = cycle_report(2, 5, 5);

        let (first, hit) = cache.get_or_compute(&[a.clone(), b.clone()]);
        assert!(!hit);
        let (second, hit) = cache.get_or_compute(&[b, a]);
        assert!(hit);
        assert_eq!(first, second);
    }

    #[test]
    fn test_adding_a_report_changes_the_key() {
        let cache = StatsCache::new();
        let a = cycle_report(1, 7, 3);
        cache.get_or_compute(&[a.clone()]);

        let (_, hit) = cache.get_or_compute(&[a, cycle_report(2, 5, 5)]);
        assert!(!hit);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_invalidate_all_empties_cache() {
        let cache = StatsCache::new();
        cache.get_or_compute(&[cycle_report(1, 7, 3)]);
        assert_eq!(cache.invalidate_all(), 1);
        assert!(cache.is_empty());

        // The next read recomputes.
        let (_, hit) = cache.get_or_compute(&[cycle_report(1, 7, 3)]);
        assert!(!hit);
    }
}
