//! Current and predicted separation, MSAW, runway incursion, wake-turbulence,
//! and airspace-exit warnings; emits automatic go-around triggers (spec
//! §4.7). The ICAO wake-category matrix (SUPER/HEAVY/LARGE/SMALL) sets
//! required in-trail spacing by how much rotor-wash turbulence a heavier
//! leader leaves behind it for a lighter follower to fly through. Alerts are
//! recomputed and reconciled against a keyed map each tick so a condition
//! that keeps holding refreshes one record instead of piling up duplicates.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::aircraft::{Aircraft, AircraftId, FlightPhase, WakeCategory};
use crate::airport::AirportData;
use crate::utils::navigation;

const SEPARATION_DISTANCE_NM: f64 = 3.0;
const SEPARATION_ALTITUDE_FT: f64 = 1000.0;
const PREDICTED_LOOKAHEAD_SECONDS: [f64; 2] = [30.0, 60.0];
const MSAW_DEFAULT_MVA_FT: f64 = 2000.0;
const AIRSPACE_EXIT_MARGIN_NM: f64 = 5.0;
const RUNWAY_OCCUPYING_RADIUS_NM: f64 = 0.5;
const RUNWAY_OCCUPYING_ALTITUDE_AGL_FT: f64 = 200.0;
const SHORT_FINAL_GATE_NM: f64 = 2.0;
const WAKE_CRITICAL_NM: f64 = 3.0;
const WAKE_GO_AROUND_DEFICIT_NM: f64 = 1.0;
const WAKE_GO_AROUND_RANGE_NM: f64 = 5.0;
const SHORT_FINAL_AGL_EXCLUSION_FT: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertKind {
    Conflict,
    PredictedConflict,
    Msaw,
    Wake,
    RunwayConflict,
    Airspace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Caution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub kind: AlertKind,
    pub severity: Severity,
    pub aircraft_ids: Vec<AircraftId>,
    pub message: String,
    pub timestamp_tick: u64,
}

/// Required in-trail separation by (leader, follower) wake category, nm
/// (ICAO-style wake matrix; SUPER/HEAVY/LARGE/SMALL per spec glossary).
/// `pub(crate)` so the visual-approach fall-in-behind vectoring in
/// `pilot::flight_plan_executor` can apply the same minima.
pub(crate) fn required_wake_separation_nm(leader: WakeCategory, follower: WakeCategory) -> f64 {
    use WakeCategory::*;
    match (leader, follower) {
        (Super, Heavy) => 6.0,
        (Super, Large) | (Super, Small) => 7.0,
        (Heavy, Heavy) => 4.0,
        (Heavy, Large) | (Heavy, Small) => 5.0,
        (Large, Small) => 4.0,
        _ => 3.0,
    }
}

#[derive(Debug, Default)]
pub struct ConflictDetector {
    alerts: HashMap<String, Alert>,
}

impl ConflictDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_alerts(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.values()
    }

    /// `altitude_ft` is MSL (spec §3); "short final < 500 ft AGL" needs the
    /// elevation of the runway the aircraft is actually headed for (falling
    /// back to field elevation when it has no approach clearance yet) to
    /// convert that to AGL before comparing.
    fn excluded(ac: &Aircraft, airport: &AirportData) -> bool {
        let reference_elevation_ft = ac
            .clearances
            .approach
            .as_ref()
            .and_then(|a| airport.runway(&a.runway))
            .map(|r| r.elevation_ft)
            .unwrap_or(airport.elevation_ft);
        let agl_ft = ac.altitude_ft - reference_elevation_ft;

        ac.on_ground
            || matches!(ac.phase, FlightPhase::Landed | FlightPhase::Ground)
            || (ac.handoff.handing_off && matches!(ac.phase, FlightPhase::Approach | FlightPhase::Final))
            || agl_ft < SHORT_FINAL_AGL_EXCLUSION_FT
            || ac.handoff.inbound_handoff == crate::aircraft::InboundHandoffState::Offered
            || ac.phase == FlightPhase::Departure
    }

    /// Runs the full detector for one tick; returns the ids of aircraft a
    /// go-around trigger was appended for (runway conflict / wake
    /// turbulence; spec §4.7).
    pub fn update(&mut self, aircraft: &[&Aircraft], airport: &AirportData, current_tick: u64) -> Vec<AircraftId> {
        let mut seen_keys = std::collections::HashSet::new();
        let mut go_around_ids = Vec::new();

        let separation_set: Vec<&Aircraft> = aircraft.iter().copied().filter(|ac| !Self::excluded(ac, airport)).collect();

        self.check_separation(&separation_set, airport, current_tick, &mut seen_keys);
        self.check_predicted(&separation_set, current_tick, &mut seen_keys);
        self.check_msaw(aircraft, current_tick, &mut seen_keys);
        self.check_airspace_exit(aircraft, airport, current_tick, &mut seen_keys);
        self.check_runway_conflict(aircraft, airport, current_tick, &mut seen_keys, &mut go_around_ids);
        self.check_wake_turbulence(aircraft, airport, current_tick, &mut seen_keys, &mut go_around_ids);

        self.alerts.retain(|key, _| seen_keys.contains(key));
        go_around_ids
    }

    fn check_separation(&mut self, aircraft: &[&Aircraft], airport: &AirportData, current_tick: u64, seen: &mut std::collections::HashSet<String>) {
        for i in 0..aircraft.len() {
            for j in (i + 1)..aircraft.len() {
                let (a, b) = (aircraft[i], aircraft[j]);
                if same_runway_localizer(a, b, airport) {
                    continue;
                }
                let distance_nm = navigation::haversine_nm(a.latitude, a.longitude, b.latitude, b.longitude);
                let altitude_diff = (a.altitude_ft - b.altitude_ft).abs();
                if distance_nm < SEPARATION_DISTANCE_NM && altitude_diff < SEPARATION_ALTITUDE_FT {
                    let key = pair_key("CA", a.id, b.id);
                    let message = format!("{} and {}: {:.1} nm, {:.0} ft vertical", a.callsign, b.callsign, distance_nm, altitude_diff);
                    self.upsert(key.clone(), AlertKind::Conflict, Severity::Warning, vec![a.id, b.id], message, current_tick);
                    seen.insert(key);
                }
            }
        }
    }

    fn check_predicted(&mut self, aircraft: &[&Aircraft], current_tick: u64, seen: &mut std::collections::HashSet<String>) {
        for i in 0..aircraft.len() {
            for j in (i + 1)..aircraft.len() {
                let (a, b) = (aircraft[i], aircraft[j]);
                let key_ca = pair_key("CA", a.id, b.id);
                if seen.contains(&key_ca) {
                    continue;
                }

                let mut earliest_conflict_at: Option<f64> = None;
                for &t in &PREDICTED_LOOKAHEAD_SECONDS {
                    let pa = extrapolate(a, t);
                    let pb = extrapolate(b, t);
                    let distance_nm = navigation::haversine_nm(pa.0, pa.1, pb.0, pb.1);
                    let altitude_diff = (pa.2 - pb.2).abs();
                    if distance_nm < SEPARATION_DISTANCE_NM && altitude_diff < SEPARATION_ALTITUDE_FT {
                        earliest_conflict_at = Some(earliest_conflict_at.map_or(t, |e: f64| e.min(t)));
                    }
                }

                if let Some(t) = earliest_conflict_at {
                    let key = pair_key("PCA", a.id, b.id);
                    let message = format!("{} and {}: predicted conflict in {:.0}s", a.callsign, b.callsign, t);
                    self.upsert(key.clone(), AlertKind::PredictedConflict, Severity::Caution, vec![a.id, b.id], message, current_tick);
                    seen.insert(key);
                }
            }
        }
    }

    fn check_msaw(&mut self, aircraft: &[&Aircraft], current_tick: u64, seen: &mut std::collections::HashSet<String>) {
        for ac in aircraft {
            if matches!(ac.phase, FlightPhase::Final | FlightPhase::Missed | FlightPhase::Departure | FlightPhase::Landed | FlightPhase::Ground) {
                continue;
            }
            if ac.altitude_ft < MSAW_DEFAULT_MVA_FT && ac.vertical_speed_fpm <= 0.0 {
                let key = format!("MSAW:{}", ac.id);
                let message = format!("{} below MVA, altitude {:.0} ft", ac.callsign, ac.altitude_ft);
                self.upsert(key.clone(), AlertKind::Msaw, Severity::Warning, vec![ac.id], message, current_tick);
                seen.insert(key);
            }
        }
    }

    fn check_airspace_exit(&mut self, aircraft: &[&Aircraft], airport: &AirportData, current_tick: u64, seen: &mut std::collections::HashSet<String>) {
        let exit_radius = airport.limits.lateral_radius_nm - AIRSPACE_EXIT_MARGIN_NM;
        for ac in aircraft {
            if ac.handoff.handing_off || ac.handoff.inbound_handoff == crate::aircraft::InboundHandoffState::Offered {
                continue;
            }
            let distance_nm = navigation::haversine_nm(ac.latitude, ac.longitude, airport.position.0, airport.position.1);
            if distance_nm > exit_radius {
                let key = format!("AIRSPACE:{}", ac.id);
                let nm_to_exit = airport.limits.lateral_radius_nm - distance_nm;
                let message = format!("{} approaching airspace boundary, {:.1} nm to exit", ac.callsign, nm_to_exit);
                self.upsert(key.clone(), AlertKind::Airspace, Severity::Caution, vec![ac.id], message, current_tick);
                seen.insert(key);
            }
        }
    }

    fn check_runway_conflict(
        &mut self,
        aircraft: &[&Aircraft],
        airport: &AirportData,
        current_tick: u64,
        seen: &mut std::collections::HashSet<String>,
        go_around_ids: &mut Vec<AircraftId>,
    ) {
        for runway in &airport.runways {
            let occupying: Vec<&Aircraft> = aircraft
                .iter()
                .copied()
                .filter(|ac| {
                    ac.runway_occupying.as_deref() == Some(runway.id.as_str())
                        || (!matches!(ac.phase, FlightPhase::Final)
                            && navigation::haversine_nm(ac.latitude, ac.longitude, runway.threshold.0, runway.threshold.1) <= RUNWAY_OCCUPYING_RADIUS_NM
                            && ac.altitude_ft - runway.elevation_ft <= RUNWAY_OCCUPYING_ALTITUDE_AGL_FT)
                })
                .collect();

            let on_final: Vec<&Aircraft> = aircraft
                .iter()
                .copied()
                .filter(|ac| {
                    matches!(ac.phase, FlightPhase::Approach | FlightPhase::Final)
                        && ac.clearances.approach.as_ref().map(|a| a.runway == runway.id).unwrap_or(false)
                        && {
                            let d = navigation::haversine_nm(ac.latitude, ac.longitude, runway.threshold.0, runway.threshold.1);
                            d <= SHORT_FINAL_GATE_NM && d > RUNWAY_OCCUPYING_RADIUS_NM
                        }
                })
                .collect();

            for occ in &occupying {
                for fin in &on_final {
                    if occ.id == fin.id {
                        continue;
                    }
                    let key = pair_key("RWY", occ.id, fin.id);
                    let message = format!("{} on runway {} while {} on short final", occ.callsign, runway.id, fin.callsign);
                    self.upsert(key.clone(), AlertKind::RunwayConflict, Severity::Warning, vec![occ.id, fin.id], message, current_tick);
                    seen.insert(key);
                    go_around_ids.push(fin.id);
                }
            }
        }
    }

    fn check_wake_turbulence(
        &mut self,
        aircraft: &[&Aircraft],
        airport: &AirportData,
        current_tick: u64,
        seen: &mut std::collections::HashSet<String>,
        go_around_ids: &mut Vec<AircraftId>,
    ) {
        for runway in &airport.runways {
            let mut group: Vec<&Aircraft> = aircraft
                .iter()
                .copied()
                .filter(|ac| {
                    matches!(ac.phase, FlightPhase::Approach | FlightPhase::Final)
                        && ac.clearances.approach.as_ref().map(|a| a.runway == runway.id).unwrap_or(false)
                })
                .collect();
            group.sort_by(|a, b| {
                let da = navigation::haversine_nm(a.latitude, a.longitude, runway.threshold.0, runway.threshold.1);
                let db = navigation::haversine_nm(b.latitude, b.longitude, runway.threshold.0, runway.threshold.1);
                da.partial_cmp(&db).unwrap()
            });

            for pair in group.windows(2) {
                let (leader, follower) = (pair[0], pair[1]);
                let required = required_wake_separation_nm(leader.wake_category, follower.wake_category);
                let actual = navigation::haversine_nm(leader.latitude, leader.longitude, follower.latitude, follower.longitude);
                if actual < required {
                    let key = pair_key("WAKE", leader.id, follower.id);
                    let severity = if actual < WAKE_CRITICAL_NM { Severity::Warning } else { Severity::Caution };
                    let message = format!("{} behind {}: {:.1} nm, requires {:.1} nm", follower.callsign, leader.callsign, actual, required);
                    self.upsert(key.clone(), AlertKind::Wake, severity, vec![leader.id, follower.id], message, current_tick);
                    seen.insert(key);

                    let follower_distance = navigation::haversine_nm(follower.latitude, follower.longitude, runway.threshold.0, runway.threshold.1);
                    if actual < required - WAKE_GO_AROUND_DEFICIT_NM && follower_distance <= WAKE_GO_AROUND_RANGE_NM {
                        go_around_ids.push(follower.id);
                    }
                }
            }
        }
    }

    fn upsert(&mut self, key: String, kind: AlertKind, severity: Severity, aircraft_ids: Vec<AircraftId>, message: String, timestamp_tick: u64) {
        self.alerts.insert(key.clone(), Alert { id: key, kind, severity, aircraft_ids, message, timestamp_tick });
    }
}

fn pair_key(prefix: &str, a: AircraftId, b: AircraftId) -> String {
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    format!("{prefix}:{lo}:{hi}")
}

fn same_runway_localizer(a: &Aircraft, b: &Aircraft, _airport: &AirportData) -> bool {
    match (&a.clearances.approach, &b.clearances.approach) {
        (Some(x), Some(y)) => a.approach_state.on_localizer && b.approach_state.on_localizer && x.runway == y.runway,
        _ => false,
    }
}

/// Linear extrapolation at `t` seconds ahead from the most-recent trail
/// point (fallback to heading) and current groundspeed/vertical speed
/// (spec §4.7, "Predicted conflict").
fn extrapolate(ac: &Aircraft, t_seconds: f64) -> (f64, f64, f64) {
    let track_deg = ac
        .last_trail_point()
        .map(|(lat, lon)| navigation::heading_from_to(lat, lon, ac.latitude, ac.longitude))
        .unwrap_or(ac.heading_deg);
    let distance_nm = ac.ground_speed_kt.abs() * (t_seconds / 3600.0);
    let (lat, lon) = navigation::position_bearing_distance(ac.latitude, ac.longitude, track_deg, distance_nm);
    let altitude = ac.altitude_ft + ac.vertical_speed_fpm * (t_seconds / 60.0);
    (lat, lon, altitude)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aircraft::{FlightPlan, WakeCategory};
    use crate::test_support::sample_airport;

    fn make_ac(id: AircraftId, callsign: &str, lat: f64, lon: f64, altitude_ft: f64, heading_deg: f64) -> Aircraft {
        let plan = FlightPlan { origin: "EGLL".to_string(), destination: "EGPF".to_string(), route: vec![], sid: None, star: None, assigned_runway: None, squawk: 1200 };
        Aircraft::new(id, callsign.to_string(), "B738".to_string(), WakeCategory::Large, lat, lon, altitude_ft, heading_deg, 250.0, FlightPhase::Cruise, plan, id)
    }

    #[test]
    fn separation_alert_fires_once_per_pair_and_persists_across_ticks() {
        let airport = sample_airport();
        let mut detector = ConflictDetector::new();
        let a = make_ac(1, "BAW1", 51.0, 0.0, 5000.0, 90.0);
        let b = make_ac(2, "BAW2", 51.0, 0.02, 5000.0, 270.0);

        for tick in 0..10 {
            let go_arounds = detector.update(&[&a, &b], &airport, tick);
            assert!(go_arounds.is_empty());
        }

        let alerts: Vec<&Alert> = detector.active_alerts().collect();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Conflict);
        assert_eq!(alerts[0].severity, Severity::Warning);
    }

    #[test]
    fn alert_clears_when_separation_restored() {
        let airport = sample_airport();
        let mut detector = ConflictDetector::new();
        let a = make_ac(1, "BAW1", 51.0, 0.0, 5000.0, 90.0);
        let mut b = make_ac(2, "BAW2", 51.0, 0.02, 5000.0, 270.0);
        detector.update(&[&a, &b], &airport, 0);
        assert_eq!(detector.active_alerts().count(), 1);

        b.latitude = 55.0;
        detector.update(&[&a, &b], &airport, 1);
        assert_eq!(detector.active_alerts().count(), 0);
    }

    #[test]
    fn msaw_fires_below_mva_with_non_positive_vs() {
        let airport = sample_airport();
        let mut detector = ConflictDetector::new();
        let mut a = make_ac(1, "BAW1", 51.0, 0.0, 1500.0, 90.0);
        a.vertical_speed_fpm = -500.0;
        detector.update(&[&a], &airport, 0);
        let alerts: Vec<&Alert> = detector.active_alerts().collect();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Msaw);
    }
}
