//! Navigates SID/STAR/approach legs, captures localizer/glideslope, and
//! derives target heading/altitude/speed from the aircraft's active
//! clearances, in strict priority order (spec §4.4). Lives inside
//! [`crate::pilot::PilotAI`]'s per-aircraft update.

use std::collections::HashMap;

use crate::aircraft::{Aircraft, ApproachType, FlightPhase, HoldPhase, HoldingState, WakeCategory};
use crate::airport::performance::AircraftPerformance;
use crate::airport::{AirportData, ApproachProcedure, Procedure, ProcedureLeg};
use crate::conflict::required_wake_separation_nm;
use crate::config::WeatherConfig;
use crate::utils::navigation;

const FT_PER_NM: f64 = 6076.12;
const HOLD_LEG_TICKS: u64 = 60;
const DIRECT_TO_CAPTURE_NM: f64 = 0.5;
const ROUTE_FIX_CAPTURE_NM: f64 = 0.5;
const VISUAL_TRAFFIC_FOLLOW_HEADING_GAIN: f64 = 20.0;
const LOCALIZER_HEADING_TOLERANCE_DEG: f64 = 30.0;
const LOCALIZER_XTK_TOLERANCE_NM: f64 = 2.0;
const LOCALIZER_LONGITUDINAL_GATE_NM: f64 = 25.0;
const GLIDESLOPE_CAPTURE_RANGE_NM: f64 = 10.0;
const GLIDESLOPE_CAPTURE_TOLERANCE_FT: f64 = 100.0;
const LANDING_DISTANCE_NM: f64 = 0.5;
const LANDING_ALTITUDE_TOLERANCE_FT: f64 = 50.0;
const DA_CAPTURE_TOLERANCE_FT: f64 = 50.0;
const DA_ABOVE_RUNWAY_ILS_FT: f64 = 200.0;
const DA_ABOVE_RUNWAY_RNAV_FT: f64 = 400.0;
const MISSED_APPROACH_ELEVATION_FALLBACK_FT: f64 = 2000.0;

/// Result of the weather visibility rule (spec §4.4, "Weather visibility
/// rule"), shared with [`crate::command_executor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Yes,
    NotYet,
    No,
}

/// Required ceiling/visibility minima for a visual flight rules judgment.
#[derive(Debug, Clone, Copy)]
struct Minima {
    ceiling_agl_ft: f64,
    visibility_sm: f64,
}

const VFR_MINIMA: Minima = Minima { ceiling_agl_ft: 1000.0, visibility_sm: 3.0 };
const ILS_MINIMA: Minima = Minima { ceiling_agl_ft: 200.0, visibility_sm: 0.5 };
const RNAV_MINIMA: Minima = Minima { ceiling_agl_ft: 400.0, visibility_sm: 1.0 };

/// Evaluates whether the airport is visible to an aircraft at `distance_nm`,
/// given the airport's field elevation and the reported weather
/// (spec §4.4). Used both for the DA/MDA protocol and for visual-sight /
/// visual-approach gating.
pub fn visibility_rule(weather: &WeatherConfig, distance_nm: f64, elevation_ft: f64, minima: Minima) -> Visibility {
    let ceiling_agl = weather.ceiling_ft.map(|c| c - elevation_ft).unwrap_or(f64::INFINITY);
    let sufficient = ceiling_agl >= minima.ceiling_agl_ft && weather.visibility_sm >= minima.visibility_sm;
    if !sufficient {
        return Visibility::No;
    }
    if distance_nm <= weather.visibility_sm * 0.85 {
        Visibility::Yes
    } else {
        Visibility::NotYet
    }
}

pub fn vfr_visibility(weather: &WeatherConfig, distance_nm: f64, elevation_ft: f64) -> Visibility {
    visibility_rule(weather, distance_nm, elevation_ft, VFR_MINIMA)
}

/// Side effects the executor cannot apply itself (they require `PilotAI`'s
/// radio queue / go-around machinery).
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutorEvent {
    GoAround(String),
    ReportFieldInSight,
}

/// A snapshot of another aircraft's track, looked up by callsign, for the
/// visual-approach fall-in-behind vectoring of spec §4.4 priority 2. Built
/// by the caller (the session pipeline) before the per-aircraft pilot
/// update, since `FlightPlanExecutor` only ever sees one `Aircraft` at a
/// time and can't borrow the rest of the registry itself.
#[derive(Debug, Clone, Copy)]
pub struct TrafficSnapshot {
    pub latitude: f64,
    pub longitude: f64,
    pub heading_deg: f64,
    pub wake_category: WakeCategory,
}

pub type TrafficSnapshots = HashMap<String, TrafficSnapshot>;

#[derive(Debug, Default)]
pub struct FlightPlanExecutor;

impl FlightPlanExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Recompute `ac`'s target heading/altitude/speed and approach-capture
    /// flags for this tick. Returns side effects for `PilotAI` to apply.
    pub fn update(
        &self,
        ac: &mut Aircraft,
        airport: &AirportData,
        weather: &WeatherConfig,
        perf: &AircraftPerformance,
        traffic: &TrafficSnapshots,
        current_tick: u64,
    ) -> Vec<ExecutorEvent> {
        if !ac.phase.is_airborne() {
            return Vec::new();
        }

        if ac.clearances.hold_fix.is_some() {
            self.run_holding(ac, airport, current_tick);
            return Vec::new();
        }
        ac.holding = None;

        if let Some(approach) = ac.clearances.approach.clone() {
            return self.run_approach(ac, airport, weather, perf, &approach, traffic, current_tick);
        }

        if let Some(maintain) = ac.clearances.maintain_until_established {
            if !ac.approach_state.on_localizer {
                ac.target_altitude_ft = maintain;
            }
        }

        if ac.clearances.descend_via_star || ac.clearances.climb_via_sid {
            self.run_procedure_vnav(ac, airport);
        } else if let Some(alt) = ac.clearances.altitude {
            ac.target_altitude_ft = alt;
        }

        if let Some(fix) = ac.clearances.direct_to.clone() {
            self.run_direct_to(ac, airport, &fix);
        } else if ac.clearances.heading.is_some() {
            ac.target_heading_deg = ac.clearances.heading.unwrap();
        } else if !ac.flight_plan.route.is_empty() && ac.current_fix_index < ac.flight_plan.route.len() {
            self.run_route(ac, airport);
        }

        if let Some(speed) = ac.clearances.speed {
            ac.target_speed_kt = speed;
        } else {
            ac.target_speed_kt = default_cruise_or_below_10k_speed(ac, perf);
        }

        Vec::new()
    }

    fn run_holding(&self, ac: &mut Aircraft, airport: &AirportData, current_tick: u64) {
        let fix_name = ac.clearances.hold_fix.clone().unwrap();
        let Some(fix_pos) = airport.fix_position(&fix_name) else {
            return;
        };

        if ac.holding.is_none() {
            let inbound_course = navigation::heading_from_to(ac.latitude, ac.longitude, fix_pos.0, fix_pos.1);
            ac.holding = Some(HoldingState { phase: HoldPhase::Inbound, inbound_course_deg: inbound_course, phase_entered_tick: current_tick });
        }

        let state = ac.holding.unwrap();
        let elapsed = current_tick.saturating_sub(state.phase_entered_tick);

        let (next_phase, target_heading) = match state.phase {
            HoldPhase::Inbound => {
                let dist = navigation::haversine_nm(ac.latitude, ac.longitude, fix_pos.0, fix_pos.1);
                if dist <= DIRECT_TO_CAPTURE_NM {
                    (HoldPhase::TurningOutbound, reciprocal(state.inbound_course_deg))
                } else {
                    (HoldPhase::Inbound, state.inbound_course_deg)
                }
            }
            HoldPhase::TurningOutbound => {
                let outbound = reciprocal(state.inbound_course_deg);
                if (ac.heading_deg - outbound).abs() < 5.0 {
                    (HoldPhase::Outbound, outbound)
                } else {
                    (HoldPhase::TurningOutbound, outbound)
                }
            }
            HoldPhase::Outbound => {
                if elapsed >= HOLD_LEG_TICKS {
                    (HoldPhase::TurningInbound, state.inbound_course_deg)
                } else {
                    (HoldPhase::Outbound, reciprocal(state.inbound_course_deg))
                }
            }
            HoldPhase::TurningInbound => {
                if (ac.heading_deg - state.inbound_course_deg).abs() < 5.0 {
                    (HoldPhase::Inbound, state.inbound_course_deg)
                } else {
                    (HoldPhase::TurningInbound, state.inbound_course_deg)
                }
            }
        };

        ac.target_heading_deg = target_heading;
        if next_phase != state.phase {
            ac.holding = Some(HoldingState { phase: next_phase, inbound_course_deg: state.inbound_course_deg, phase_entered_tick: current_tick });
        }
    }

    fn run_approach(
        &self,
        ac: &mut Aircraft,
        airport: &AirportData,
        weather: &WeatherConfig,
        perf: &AircraftPerformance,
        approach: &crate::aircraft::ApproachClearance,
        traffic: &TrafficSnapshots,
        current_tick: u64,
    ) -> Vec<ExecutorEvent> {
        let Some(runway) = airport.runway(&approach.runway) else {
            return Vec::new();
        };
        let inbound_course = (runway.heading_deg + 180.0) % 360.0;

        if approach.approach_type == ApproachType::Visual {
            match ac.visual_sight.traffic_callsign.as_deref().and_then(|cs| traffic.get(&cs.to_uppercase())) {
                Some(lead) => self.vector_behind_traffic(ac, lead, runway, inbound_course),
                None => ac.target_heading_deg = inbound_course,
            }

            // Visual approaches have no electronic glideslope to key a capture
            // event off of, but still descend a nominal 3° path toward the
            // runway; drive the target altitude down that path continuously
            // so the landing check below (distance/altitude alone, since
            // `on_glideslope` is structurally unreachable for this branch)
            // has something real to converge on.
            let along = navigation::along_track_distance_nm(runway.threshold, inbound_course, (ac.latitude, ac.longitude));
            let visual_glidepath_altitude_ft = runway.elevation_ft + (3f64.to_radians()).tan() * along.max(0.0) * FT_PER_NM;
            ac.target_altitude_ft = visual_glidepath_altitude_ft.max(runway.elevation_ft);

            return self.check_landing_and_da(ac, airport, weather, approach, runway, current_tick);
        }

        let xtk = navigation::cross_track_distance_nm(runway.threshold, inbound_course, (ac.latitude, ac.longitude));
        let along = navigation::along_track_distance_nm(runway.threshold, inbound_course, (ac.latitude, ac.longitude));
        let heading_diff = navigation::shortest_turn_delta(ac.heading_deg, inbound_course).abs();

        if !ac.approach_state.on_localizer {
            if heading_diff <= LOCALIZER_HEADING_TOLERANCE_DEG && xtk.abs() <= LOCALIZER_XTK_TOLERANCE_NM && along <= LOCALIZER_LONGITUDINAL_GATE_NM
            {
                ac.approach_state.on_localizer = true;
                ac.clearances.heading = None;
            } else {
                ac.target_heading_deg = inbound_course - xtk.clamp(-1.0, 1.0) * 20.0;
                return Vec::new();
            }
        }

        ac.target_heading_deg = inbound_course;

        if !ac.approach_state.on_glideslope && along <= GLIDESLOPE_CAPTURE_RANGE_NM {
            let glideslope_altitude_ft = runway.elevation_ft + (3f64.to_radians()).tan() * along * FT_PER_NM;
            if (ac.altitude_ft - glideslope_altitude_ft).abs() <= GLIDESLOPE_CAPTURE_TOLERANCE_FT {
                ac.approach_state.on_glideslope = true;
                ac.target_altitude_ft = runway.elevation_ft;
            }
        }

        self.check_landing_and_da(ac, airport, weather, approach, runway, current_tick)
    }

    /// Visual approach behind named traffic (spec §4.4 priority 2): hold the
    /// inbound course when in-trail spacing already meets wake minima,
    /// otherwise widen off the centerline to bleed track miles until it
    /// does, the same cross-track-proportional offset the pre-localizer-
    /// capture leg above uses.
    fn vector_behind_traffic(&self, ac: &mut Aircraft, lead: &TrafficSnapshot, runway: &crate::airport::Runway, inbound_course: f64) {
        let required_nm = required_wake_separation_nm(lead.wake_category, ac.wake_category);
        let ac_along = navigation::along_track_distance_nm(runway.threshold, inbound_course, (ac.latitude, ac.longitude));
        let lead_along = navigation::along_track_distance_nm(runway.threshold, inbound_course, (lead.latitude, lead.longitude));
        let actual_spacing_nm = ac_along - lead_along;

        if actual_spacing_nm < required_nm {
            let xtk = navigation::cross_track_distance_nm(runway.threshold, inbound_course, (ac.latitude, ac.longitude));
            ac.target_heading_deg = inbound_course - (xtk.clamp(-1.0, 1.0) * VISUAL_TRAFFIC_FOLLOW_HEADING_GAIN + VISUAL_TRAFFIC_FOLLOW_HEADING_GAIN);
        } else {
            ac.target_heading_deg = inbound_course;
        }
    }

    fn check_landing_and_da(
        &self,
        ac: &mut Aircraft,
        airport: &AirportData,
        weather: &WeatherConfig,
        approach: &crate::aircraft::ApproachClearance,
        runway: &crate::airport::Runway,
        current_tick: u64,
    ) -> Vec<ExecutorEvent> {
        let _ = current_tick;
        let distance_to_threshold = navigation::haversine_nm(ac.latitude, ac.longitude, runway.threshold.0, runway.threshold.1);

        // Visual approaches never set `on_glideslope` (no electronic beam to
        // capture), so their landing gate is distance/altitude alone; ILS
        // and RNAV additionally require the glideslope capture event.
        let on_final_path = approach.approach_type == ApproachType::Visual || ac.approach_state.on_glideslope;

        if on_final_path
            && distance_to_threshold <= LANDING_DISTANCE_NM
            && (ac.altitude_ft - runway.elevation_ft).abs() <= LANDING_ALTITUDE_TOLERANCE_FT
        {
            ac.phase = FlightPhase::Landed;
            ac.on_ground = true;
            ac.runway_occupying = Some(runway.id.clone());
            ac.target_speed_kt = 15.0;
            return Vec::new();
        }

        if approach.approach_type == ApproachType::Visual {
            return Vec::new();
        }

        if ac.approach_state.on_glideslope {
            let minima = if approach.approach_type == ApproachType::Ils { ILS_MINIMA } else { RNAV_MINIMA };
            let above_runway_ft = if approach.approach_type == ApproachType::Ils { DA_ABOVE_RUNWAY_ILS_FT } else { DA_ABOVE_RUNWAY_RNAV_FT };
            let da_altitude = runway.elevation_ft + above_runway_ft;

            if (ac.altitude_ft - da_altitude).abs() <= DA_CAPTURE_TOLERANCE_FT {
                match visibility_rule(weather, distance_to_threshold, airport.elevation_ft, minima) {
                    Visibility::Yes => return vec![ExecutorEvent::ReportFieldInSight],
                    Visibility::NotYet | Visibility::No => {
                        let reason = "missed approach: airport not in sight at decision altitude".to_string();
                        return vec![ExecutorEvent::GoAround(reason)];
                    }
                }
            }
        }

        Vec::new()
    }

    fn run_procedure_vnav(&self, ac: &mut Aircraft, airport: &AirportData) {
        let procedure: Option<&Procedure> = if ac.clearances.descend_via_star {
            ac.flight_plan.star.as_deref().and_then(|name| airport.star(name))
        } else {
            ac.flight_plan.sid.as_deref().and_then(|name| airport.sid(name))
        };

        let Some(procedure) = procedure else {
            return;
        };

        if let Some(next) = next_applicable_constraint(procedure, ac.altitude_ft, ac.clearances.descend_via_star) {
            ac.target_altitude_ft = next;
        }
    }

    fn run_direct_to(&self, ac: &mut Aircraft, airport: &AirportData, fix: &str) {
        let Some(fix_pos) = airport.fix_position(fix) else {
            return;
        };
        let dist = navigation::haversine_nm(ac.latitude, ac.longitude, fix_pos.0, fix_pos.1);
        if dist <= DIRECT_TO_CAPTURE_NM {
            ac.clearances.direct_to = None;
            return;
        }
        ac.target_heading_deg = navigation::heading_from_to(ac.latitude, ac.longitude, fix_pos.0, fix_pos.1);
    }

    fn run_route(&self, ac: &mut Aircraft, airport: &AirportData) {
        let fix_name = ac.flight_plan.route[ac.current_fix_index].clone();
        let Some(fix_pos) = airport.fix_position(&fix_name) else {
            return;
        };
        let dist = navigation::haversine_nm(ac.latitude, ac.longitude, fix_pos.0, fix_pos.1);
        if dist <= ROUTE_FIX_CAPTURE_NM && ac.current_fix_index + 1 < ac.flight_plan.route.len() {
            ac.current_fix_index += 1;
        }
        ac.target_heading_deg = navigation::heading_from_to(ac.latitude, ac.longitude, fix_pos.0, fix_pos.1);
    }
}

fn reciprocal(course_deg: f64) -> f64 {
    navigation::normalize_heading(course_deg + 180.0)
}

/// Lowest at-or-above constraint not yet reached (descend case) or highest
/// at-or-below not yet reached (climb case); `at` constraints are exact
/// (spec §4.4 priority 4).
fn next_applicable_constraint(procedure: &Procedure, current_altitude_ft: f64, descending: bool) -> Option<f64> {
    let legs: &[ProcedureLeg] = &procedure.legs;
    legs.iter().find_map(|leg| {
        let constraint = leg.altitude?;
        use crate::airport::AltitudeConstraintKind::*;
        match constraint.kind {
            At => Some(constraint.altitude_ft),
            AtOrAbove if descending && current_altitude_ft > constraint.altitude_ft => Some(constraint.altitude_ft),
            AtOrBelow if !descending && current_altitude_ft < constraint.altitude_ft => Some(constraint.altitude_ft),
            _ => None,
        }
    })
}

fn default_cruise_or_below_10k_speed(ac: &Aircraft, perf: &AircraftPerformance) -> f64 {
    if ac.altitude_ft < 10_000.0 {
        perf.vmax_below_10k.min(perf.vmo)
    } else {
        perf.cruise_speed_kt
    }
}

/// Missed-approach target altitude: the procedure's published value, or
/// field elevation + 2000 ft fallback (spec §4.4, "Go-around effect").
pub fn missed_approach_altitude(approach: Option<&ApproachProcedure>, field_elevation_ft: f64) -> f64 {
    approach.map(|a| a.missed_approach_altitude_ft).unwrap_or(field_elevation_ft + MISSED_APPROACH_ELEVATION_FALLBACK_FT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aircraft::{ApproachClearance, FlightPhase, WakeCategory};
    use crate::airport::performance::default_performance_database;
    use crate::test_support::sample_airport;

    fn make_aircraft() -> Aircraft {
        let plan = crate::aircraft::FlightPlan {
            origin: "EGLL".to_string(),
            destination: "EGLL".to_string(),
            route: vec![],
            sid: None,
            star: None,
            assigned_runway: None,
            squawk: 1200,
        };
        Aircraft::new(1, "BAW1".to_string(), "B738".to_string(), WakeCategory::Large, 51.4, -0.43, 2550.0 + 83.0, 157.0, 180.0, FlightPhase::Approach, plan, 5)
    }

    #[test]
    fn localizer_capture_and_glideslope_within_tolerance() {
        let airport = sample_airport();
        let db = default_performance_database();
        let perf = db.get("B738").unwrap();
        let weather = WeatherConfig::default();
        let executor = FlightPlanExecutor::new();

        let mut ac = make_aircraft();
        ac.latitude = 51.4775 - (8.0 / 60.0) * (157f64.to_radians().cos());
        ac.longitude = -0.4614 - (8.0 / 60.0) * (157f64.to_radians().sin());
        ac.heading_deg = 157.0;
        ac.altitude_ft = 83.0 + (3f64.to_radians()).tan() * 8.0 * FT_PER_NM;
        ac.clearances.approach = Some(ApproachClearance { approach_type: ApproachType::Ils, runway: "16".to_string() });

        let traffic = TrafficSnapshots::new();
        for tick in 0..10 {
            executor.update(&mut ac, &airport, &weather, perf, &traffic, tick);
        }

        assert!(ac.approach_state.on_localizer);
        assert!(ac.approach_state.on_glideslope);
    }

    #[test]
    fn visual_approach_reaches_landed_without_glideslope_flag() {
        let airport = sample_airport();
        let db = default_performance_database();
        let perf = db.get("B738").unwrap();
        let weather = WeatherConfig { ceiling_ft: Some(5000.0), visibility_sm: 10.0, ..WeatherConfig::default() };
        let executor = FlightPlanExecutor::new();

        // Short final, already aligned, at field elevation: this is the
        // landing gate's job to recognize for a VISUAL clearance even
        // though `on_glideslope` is never set on that branch.
        let mut ac = make_aircraft();
        ac.latitude = 51.4775 - (0.2 / 60.0) * (160f64.to_radians().cos());
        ac.longitude = -0.4614 - (0.2 / 60.0) * (160f64.to_radians().sin());
        ac.heading_deg = 340.0;
        ac.altitude_ft = 83.0 + 10.0;
        ac.clearances.approach = Some(ApproachClearance { approach_type: ApproachType::Visual, runway: "16".to_string() });

        let traffic = TrafficSnapshots::new();
        executor.update(&mut ac, &airport, &weather, perf, &traffic, 0);

        assert_eq!(ac.phase, FlightPhase::Landed);
        assert!(!ac.approach_state.on_glideslope);
    }

    #[test]
    fn visual_approach_widens_when_closer_than_wake_minima() {
        let airport = sample_airport();
        let db = default_performance_database();
        let perf = db.get("B738").unwrap();
        let weather = WeatherConfig { ceiling_ft: Some(5000.0), visibility_sm: 10.0, ..WeatherConfig::default() };
        let executor = FlightPlanExecutor::new();

        let mut ac = make_aircraft();
        ac.latitude = 51.4775 - (8.0 / 60.0) * (157f64.to_radians().cos());
        ac.longitude = -0.4614 - (8.0 / 60.0) * (157f64.to_radians().sin());
        ac.heading_deg = 157.0;
        ac.altitude_ft = 83.0 + (3f64.to_radians()).tan() * 8.0 * FT_PER_NM;
        ac.clearances.approach = Some(ApproachClearance { approach_type: ApproachType::Visual, runway: "16".to_string() });
        ac.wake_category = WakeCategory::Large;
        ac.visual_sight.traffic_callsign = Some("BAW2".to_string());

        // Lead aircraft 1 nm ahead on the same inbound course: too close
        // for the Large-behind-Large 3 nm minimum.
        let lead_lat = 51.4775 - (7.0 / 60.0) * (157f64.to_radians().cos());
        let lead_lon = -0.4614 - (7.0 / 60.0) * (157f64.to_radians().sin());
        let mut traffic = TrafficSnapshots::new();
        traffic.insert("BAW2".to_string(), TrafficSnapshot { latitude: lead_lat, longitude: lead_lon, heading_deg: 157.0, wake_category: WakeCategory::Large });

        executor.update(&mut ac, &airport, &weather, perf, &traffic, 0);

        let inbound_course = (160.0 + 180.0f64) % 360.0;
        assert_ne!(ac.target_heading_deg, inbound_course);
    }

    #[test]
    fn visibility_rule_reports_not_yet_when_far_but_clear() {
        let weather = WeatherConfig { ceiling_ft: Some(5000.0), visibility_sm: 10.0, ..WeatherConfig::default() };
        let result = visibility_rule(&weather, 20.0, 83.0, ILS_MINIMA);
        assert_eq!(result, Visibility::NotYet);
    }

    #[test]
    fn visibility_rule_reports_no_below_minima() {
        let weather = WeatherConfig { ceiling_ft: Some(150.0), visibility_sm: 0.25, ..WeatherConfig::default() };
        let result = visibility_rule(&weather, 1.0, 83.0, ILS_MINIMA);
        assert_eq!(result, Visibility::No);
    }
}
