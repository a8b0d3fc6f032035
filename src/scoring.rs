//! Tracks violations, handoff timing penalties, and clean-handoff bonuses;
//! derives the overall score and letter grade every tick (spec §4.8).
//! Grounded on the teacher's `config.rs`-style memoised counters, expressed
//! here as an explicit penalty ledger rather than the teacher's raw tally.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::aircraft::{Aircraft, AircraftId, FlightPhase};
use crate::airport::AirportData;
use crate::conflict::{Alert, AlertKind};
use crate::utils::navigation;

const LATE_TOWER_OFFER_AGE_TICKS: u64 = 90;
const LATE_TOWER_THRESHOLD_NM: f64 = 2.0;
const MISSED_TOWER_THRESHOLD_NM: f64 = 0.5;
const LATE_CENTER_AGE_TICKS: u64 = 300;
const LATE_CENTER_ALTITUDE_FT: f64 = 18_000.0;
const MISSED_CENTER_DISTANCE_NM: f64 = 40.0;
const CLEAN_HANDOFF_DELAY_SECONDS: f64 = 300.0;
const DELAY_GRACE_SECONDS: f64 = 300.0;
const DELAY_PENALTY_PER_SECONDS: f64 = 120.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Grade::A
        } else if score >= 80.0 {
            Grade::B
        } else if score >= 70.0 {
            Grade::C
        } else if score >= 60.0 {
            Grade::D
        } else {
            Grade::F
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreMetrics {
    pub overall_score: f64,
    pub grade: Option<Grade>,
    pub separation_violations: u32,
    pub conflict_alerts: u32,
    pub aircraft_handled: u32,
    pub missed_handoffs: u32,
    pub commands_issued: u32,
    pub violation_duration_ticks: u64,
    pub total_delay_seconds: f64,
}

#[derive(Debug, Default)]
pub struct ScoringEngine {
    metrics: ScoreMetrics,
    active_violations: HashSet<String>,
    seen_pairs: HashSet<String>,
    bad_command_points: f64,
    clean_handoff_bonus_points: f64,
    late_tower_penalized: HashSet<AircraftId>,
    missed_tower_penalized: HashSet<AircraftId>,
    late_center_penalized: HashSet<AircraftId>,
    missed_center_penalized: HashSet<AircraftId>,
}

impl ScoringEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metrics(&self) -> &ScoreMetrics {
        &self.metrics
    }

    /// Clears all counters and penalty memoisation so the engine can rescore
    /// a fresh scenario (spec §4.8, "`reset()` clears all memoisation").
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// `recordAlert(alert)`: increments `conflictAlerts` and, for
    /// separation/MSAW alerts, adds the implicated pair/id to active
    /// violations, counting unique pairs exactly once (spec §4.8).
    pub fn record_alert(&mut self, alert: &Alert) {
        self.metrics.conflict_alerts += 1;
        if matches!(alert.kind, AlertKind::Conflict | AlertKind::Msaw) {
            if self.seen_pairs.insert(alert.id.clone()) {
                self.metrics.separation_violations += 1;
            }
            self.active_violations.insert(alert.id.clone());
        }
    }

    /// `clearViolation(pair)`: a single violation key has resolved.
    pub fn clear_violation(&mut self, key: &str) {
        self.active_violations.remove(key);
    }

    /// `syncActiveViolations(activePairs)`: reconcile against the detector's
    /// current key set so resolved conflicts stop accruing duration.
    pub fn sync_active_violations(&mut self, active_keys: &HashSet<String>) {
        self.active_violations.retain(|key| active_keys.contains(key));
    }

    pub fn record_missed_handoff(&mut self) {
        self.metrics.missed_handoffs += 1;
    }

    /// `recordAircraftHandled(delaySeconds)`: tallies a handoff completion
    /// and, if the delay was under 300 s, a clean-handoff bonus point
    /// (spec §4.8, S2).
    pub fn record_aircraft_handled(&mut self, delay_seconds: f64) {
        self.metrics.aircraft_handled += 1;
        self.metrics.total_delay_seconds += delay_seconds;
        if delay_seconds < CLEAN_HANDOFF_DELAY_SECONDS {
            self.clean_handoff_bonus_points += 1.0;
        }
    }

    pub fn record_command(&mut self) {
        self.metrics.commands_issued += 1;
    }

    pub fn record_bad_command(&mut self, points: f64) {
        self.bad_command_points += points;
    }

    /// One tick of violation-duration accrual: called once per tick with the
    /// count of currently active violation keys.
    pub fn accrue_violation_duration(&mut self) {
        self.metrics.violation_duration_ticks += self.active_violations.len() as u64;
    }

    /// Handoff timing penalties (spec §4.8, "Handoff penalty check"):
    /// late/missed tower for arrivals approaching the runway, late/missed
    /// center for departures climbing away. Idempotent via per-id
    /// penalized sets so repeated checks never double-count (S4, invariant 5).
    pub fn check_handoff_penalties(&mut self, aircraft: &[&Aircraft], airport: &AirportData, current_tick: u64) {
        for ac in aircraft {
            if ac.handoff.inbound_handoff == crate::aircraft::InboundHandoffState::Accepted {
                let Some(offered_at) = ac.handoff.inbound_handoff_offered_at else { continue };
                let Some(runway_id) = ac.flight_plan.assigned_runway.as_deref().or(ac.clearances.approach.as_ref().map(|a| a.runway.as_str())) else { continue };
                let Some(runway) = airport.runway(runway_id) else { continue };
                let distance_nm = navigation::haversine_nm(ac.latitude, ac.longitude, runway.threshold.0, runway.threshold.1);
                let age = current_tick.saturating_sub(offered_at);

                if ac.phase == FlightPhase::Final && distance_nm <= LATE_TOWER_THRESHOLD_NM && !ac.handoff.handing_off && age >= LATE_TOWER_OFFER_AGE_TICKS {
                    if self.late_tower_penalized.insert(ac.id) {
                        self.bad_command_points += 5.0;
                    }
                }

                if ac.phase == FlightPhase::Landed && distance_nm <= MISSED_TOWER_THRESHOLD_NM && !ac.handoff.handing_off && !self.late_tower_penalized.contains(&ac.id) {
                    if self.missed_tower_penalized.insert(ac.id) {
                        self.bad_command_points += 10.0;
                    }
                }
            }

            if ac.phase == FlightPhase::Departure || ac.phase == FlightPhase::Climb {
                let Some(first_airborne) = ac.handoff.first_airborne_tick else { continue };
                let age = current_tick.saturating_sub(first_airborne);
                let distance_nm = navigation::haversine_nm(ac.latitude, ac.longitude, airport.position.0, airport.position.1);

                if ac.altitude_ft > LATE_CENTER_ALTITUDE_FT && !ac.handoff.handing_off && age >= LATE_CENTER_AGE_TICKS {
                    if self.late_center_penalized.insert(ac.id) {
                        self.bad_command_points += 5.0;
                    }
                }

                if distance_nm > MISSED_CENTER_DISTANCE_NM && !ac.handoff.handing_off {
                    if self.missed_center_penalized.insert(ac.id) {
                        self.bad_command_points += 10.0;
                    }
                }
            }
        }
    }

    /// Recomputes `overallScore` and `grade` from current counters (spec
    /// §4.8's additive model). Call once per tick after the alert/handoff
    /// hooks above have run.
    pub fn update(&mut self) {
        let mut score = 100.0;
        score -= 5.0 * self.metrics.separation_violations as f64;
        score -= (self.metrics.violation_duration_ticks / 30) as f64;
        score -= 3.0 * self.msaw_count() as f64;
        score -= 2.0 * self.metrics.missed_handoffs as f64;
        score -= self.bad_command_points;

        if self.metrics.aircraft_handled > 0 {
            let average_delay = self.metrics.total_delay_seconds / self.metrics.aircraft_handled as f64;
            if average_delay > DELAY_GRACE_SECONDS {
                let excess = average_delay - DELAY_GRACE_SECONDS;
                score -= (excess / DELAY_PENALTY_PER_SECONDS).floor();
            }
        }

        score += self.clean_handoff_bonus_points;

        let clamped = score.clamp(0.0, 100.0);
        self.metrics.overall_score = clamped;
        self.metrics.grade = Some(Grade::from_score(clamped));
    }

    fn msaw_count(&self) -> usize {
        self.active_violations.iter().filter(|key| key.starts_with("MSAW:")).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::Severity;

    fn conflict_alert(id: &str) -> Alert {
        Alert { id: id.to_string(), kind: AlertKind::Conflict, severity: Severity::Warning, aircraft_ids: vec![1, 2], message: String::new(), timestamp_tick: 0 }
    }

    #[test]
    fn separation_alert_counted_once_across_repeated_ticks() {
        let mut scoring = ScoringEngine::new();
        let alert = conflict_alert("CA:1:2");
        for _ in 0..10 {
            scoring.record_alert(&alert);
            scoring.accrue_violation_duration();
        }
        scoring.update();
        assert_eq!(scoring.metrics().separation_violations, 1);
        assert_eq!(scoring.metrics().overall_score, 95.0);
    }

    #[test]
    fn clean_handoff_bonus_clamps_at_100() {
        let mut scoring = ScoringEngine::new();
        for _ in 0..120 {
            scoring.record_aircraft_handled(0.0);
        }
        scoring.update();
        assert_eq!(scoring.metrics().aircraft_handled, 120);
        assert_eq!(scoring.metrics().overall_score, 100.0);
    }

    #[test]
    fn grade_thresholds_match_spec_boundaries() {
        assert_eq!(Grade::from_score(90.0), Grade::A);
        assert_eq!(Grade::from_score(89.0), Grade::B);
        assert_eq!(Grade::from_score(80.0), Grade::B);
        assert_eq!(Grade::from_score(79.0), Grade::C);
        assert_eq!(Grade::from_score(69.0), Grade::D);
        assert_eq!(Grade::from_score(59.0), Grade::F);
    }

    #[test]
    fn bad_command_penalty_applies_immediately() {
        let mut scoring = ScoringEngine::new();
        scoring.record_bad_command(5.0);
        scoring.update();
        assert_eq!(scoring.metrics().overall_score, 95.0);
    }
}
