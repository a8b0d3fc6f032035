//! Per-tick kinematic integrator (spec §4.3). Adapted from the teacher's
//! `simulator::plane` update loop, generalized from a fixed EuroScope-style
//! turn/climb model to the altitude-banded performance envelope of
//! [`crate::airport::performance`].

use crate::aircraft::{Aircraft, ApproachType, FlightPhase};
use crate::airport::performance::AircraftPerformance;
use crate::airport::Runway;
use crate::utils::navigation::{self, WindLayer};

const STANDARD_RATE_DEG_PER_S: f64 = 3.0;
const MAX_BANK_DEG: f64 = 25.0;
const ROLL_RATE_DEG_PER_S: f64 = 5.0;
const ALTITUDE_SLEW_FPM_PER_S: f64 = 500.0;
const SPEED_ACCEL_KT_PER_S: f64 = 2.0;
const SPEED_DECEL_KT_PER_S: f64 = 1.5;
const CENTERLINE_SNAP_NM_PER_TICK: f64 = 0.04;
const VMAX_BELOW_10K: f64 = 250.0;
const TAKEOFF_ACCEL_KT_PER_S: f64 = 4.0;
const ROTATION_SPEED_CAP_KT: f64 = 155.0;
const ROLLOUT_DECEL_ABOVE_60_KT_PER_S: f64 = 4.0;
const ROLLOUT_DECEL_BELOW_60_KT_PER_S: f64 = 2.0;
const TAXI_TARGET_SPEED_KT: f64 = 15.0;
const FT_PER_NM: f64 = 6076.12;

/// Drives every airborne, non-landed aircraft's kinematics forward by one
/// simulated second (spec §4.3).
#[derive(Debug, Default)]
pub struct PhysicsEngine;

impl PhysicsEngine {
    pub fn new() -> Self {
        Self
    }

    /// Advance one aircraft by `dt` seconds (always 1.0 at the engine's
    /// fixed tick rate, spec §4.1). Ground-roll aircraft are routed to the
    /// dedicated takeoff/rollout paths; everything else follows the
    /// seven-step airborne model.
    pub fn step(&self, ac: &mut Aircraft, perf: &AircraftPerformance, wind_layers: &[WindLayer], dt: f64, runway: Option<&Runway>) {
        if ac.phase == FlightPhase::Landed {
            return;
        }

        if ac.on_ground {
            if let Some(rw) = runway {
                if ac.phase == FlightPhase::Ground && ac.vertical_speed_fpm >= 0.0 && ac.target_altitude_ft > ac.altitude_ft {
                    self.update_takeoff_roll(ac, perf, rw, dt);
                } else {
                    self.update_ground_rollout(ac, rw, dt);
                }
            }
            return;
        }

        self.update_heading(ac, dt);
        self.update_altitude(ac, perf, dt);
        self.update_speed(ac, perf, dt);

        let tas = indicated_to_true_airspeed(ac.indicated_airspeed_kt, ac.altitude_ft);
        let (wind_dir_from, wind_speed_kt) = navigation::interpolate_wind(wind_layers, ac.altitude_ft);

        let (gs, track_deg) = compose_ground_track(ac.heading_deg, tas, wind_dir_from, wind_speed_kt);
        ac.ground_speed_kt = gs;

        let distance_nm = gs.abs() * (dt / 3600.0);
        let (new_lat, new_lon) = navigation::position_bearing_distance(ac.latitude, ac.longitude, track_deg, distance_nm);
        ac.latitude = new_lat;
        ac.longitude = new_lon;

        // Only an ILS localizer beam justifies snapping onto the physical
        // centerline (spec §4.3 step 8, §8 property 8); RNAV approaches can
        // set `on_localizer` too but fly it off GPS guidance, not a beam.
        if ac.approach_state.on_localizer && ac.clearances.approach.as_ref().map(|a| a.approach_type) == Some(ApproachType::Ils) {
            if let Some(rw) = runway {
                self.snap_to_centerline(ac, rw);
            }
        }

        ac.push_trail();
    }

    fn update_heading(&self, ac: &mut Aircraft, dt: f64) {
        let remaining = navigation::shortest_turn_delta(ac.heading_deg, ac.target_heading_deg);
        if remaining.abs() < 1e-6 {
            ac.bank_angle_deg = 0.0;
            return;
        }

        let turn_sign = if let Some(dir) = ac.clearances.turn_direction {
            match dir {
                crate::aircraft::TurnDirection::Left => -1.0,
                crate::aircraft::TurnDirection::Right => 1.0,
            }
        } else {
            remaining.signum()
        };

        let target_bank = if remaining.abs() < 10.0 {
            turn_sign * MAX_BANK_DEG * (remaining.abs() / 10.0)
        } else {
            turn_sign * MAX_BANK_DEG
        };

        let bank_delta = (target_bank - ac.bank_angle_deg).clamp(-ROLL_RATE_DEG_PER_S * dt, ROLL_RATE_DEG_PER_S * dt);
        ac.bank_angle_deg += bank_delta;

        let turn_rate = (ac.bank_angle_deg.abs() / MAX_BANK_DEG) * STANDARD_RATE_DEG_PER_S;
        let heading_delta = turn_sign * turn_rate * dt;

        if heading_delta.abs() >= remaining.abs() || heading_delta.signum() != remaining.signum() {
            ac.heading_deg = navigation::normalize_heading(ac.target_heading_deg);
            ac.bank_angle_deg = 0.0;
        } else {
            ac.heading_deg = navigation::normalize_heading(ac.heading_deg + heading_delta);
        }
    }

    fn update_altitude(&self, ac: &mut Aircraft, perf: &AircraftPerformance, dt: f64) {
        let target_vs = if ac.approach_state.on_glideslope {
            let nominal_vs = -(ac.ground_speed_kt.abs() / 60.0) * FT_PER_NM * (3f64.to_radians()).tan();
            let deviation = ac.target_altitude_ft - ac.altitude_ft;
            nominal_vs + deviation * 5.0
        } else if (ac.target_altitude_ft - ac.altitude_ft).abs() <= 10.0 {
            0.0
        } else if ac.target_altitude_ft > ac.altitude_ft {
            perf.climb_rate.interpolate(ac.altitude_ft)
        } else {
            -perf.descent_rate_fpm
        };

        let vs_delta = (target_vs - ac.vertical_speed_fpm).clamp(-ALTITUDE_SLEW_FPM_PER_S * dt, ALTITUDE_SLEW_FPM_PER_S * dt);
        ac.vertical_speed_fpm += vs_delta;

        let new_altitude = ac.altitude_ft + ac.vertical_speed_fpm * (dt / 60.0);

        if ac.approach_state.on_glideslope && new_altitude < ac.target_altitude_ft {
            ac.altitude_ft = ac.target_altitude_ft;
            ac.vertical_speed_fpm = ac.vertical_speed_fpm.min(0.0);
        } else if !ac.approach_state.on_glideslope
            && ((ac.target_altitude_ft > ac.altitude_ft && new_altitude >= ac.target_altitude_ft)
                || (ac.target_altitude_ft < ac.altitude_ft && new_altitude <= ac.target_altitude_ft))
        {
            ac.altitude_ft = ac.target_altitude_ft;
            ac.vertical_speed_fpm = 0.0;
        } else {
            ac.altitude_ft = new_altitude;
        }
    }

    fn update_speed(&self, ac: &mut Aircraft, perf: &AircraftPerformance, dt: f64) {
        let effective_target = if ac.altitude_ft < 10_000.0 {
            ac.target_speed_kt.min(VMAX_BELOW_10K)
        } else {
            ac.target_speed_kt
        };
        let effective_target = perf.clamp_speed(effective_target, ac.altitude_ft);

        let delta = effective_target - ac.indicated_airspeed_kt;
        let max_step = if delta >= 0.0 { SPEED_ACCEL_KT_PER_S * dt } else { SPEED_DECEL_KT_PER_S * dt };
        let step = delta.clamp(-max_step, max_step);
        ac.indicated_airspeed_kt = perf.clamp_speed(ac.indicated_airspeed_kt + step, ac.altitude_ft);
    }

    /// Snap position laterally toward the extended centerline by at most
    /// [`CENTERLINE_SNAP_NM_PER_TICK`] (spec §4.3 step 8, §8 property 8).
    fn snap_to_centerline(&self, ac: &mut Aircraft, runway: &Runway) {
        let inbound_course = (runway.heading_deg + 180.0) % 360.0;
        let xtk = navigation::cross_track_distance_nm(runway.threshold, inbound_course, (ac.latitude, ac.longitude));
        if xtk.abs() < 1e-6 {
            return;
        }
        let correction = xtk.abs().min(CENTERLINE_SNAP_NM_PER_TICK) * -xtk.signum();
        let perpendicular_bearing = (inbound_course + 90.0) % 360.0;
        let (lat, lon) = navigation::position_bearing_distance(ac.latitude, ac.longitude, perpendicular_bearing, correction);
        ac.latitude = lat;
        ac.longitude = lon;
    }

    fn update_takeoff_roll(&self, ac: &mut Aircraft, perf: &AircraftPerformance, runway: &Runway, dt: f64) {
        ac.indicated_airspeed_kt += TAKEOFF_ACCEL_KT_PER_S * dt;
        ac.ground_speed_kt = ac.indicated_airspeed_kt;
        let rotation_speed = (perf.vapp + 20.0).min(ROTATION_SPEED_CAP_KT);

        ac.rollout_distance_nm += ac.ground_speed_kt.abs() * (dt / 3600.0);
        project_onto_runway(ac, runway);

        if ac.indicated_airspeed_kt >= rotation_speed {
            ac.on_ground = false;
        }
    }

    fn update_ground_rollout(&self, ac: &mut Aircraft, runway: &Runway, dt: f64) {
        let decel = if ac.indicated_airspeed_kt > 60.0 {
            ROLLOUT_DECEL_ABOVE_60_KT_PER_S
        } else {
            ROLLOUT_DECEL_BELOW_60_KT_PER_S
        };
        ac.indicated_airspeed_kt = (ac.indicated_airspeed_kt - decel * dt).max(TAXI_TARGET_SPEED_KT);
        ac.ground_speed_kt = ac.indicated_airspeed_kt;

        ac.rollout_distance_nm += ac.ground_speed_kt.abs() * (dt / 3600.0);
        project_onto_runway(ac, runway);
    }
}

fn project_onto_runway(ac: &mut Aircraft, runway: &Runway) {
    let along = navigation::along_track_distance_nm(runway.threshold, runway.heading_deg, (ac.latitude, ac.longitude));
    let (lat, lon) = navigation::position_bearing_distance(runway.threshold.0, runway.threshold.1, runway.heading_deg, along);
    ac.latitude = lat;
    ac.longitude = lon;
}

fn indicated_to_true_airspeed(ias_kt: f64, altitude_ft: f64) -> f64 {
    // ~2% TAS increase per 1000 ft, the standard rule-of-thumb approximation.
    ias_kt * (1.0 + 0.02 * (altitude_ft / 1000.0))
}

/// Composes ground speed/track from a true-airspeed vector along heading and
/// a wind vector (reported direction-from, so negated) (spec §4.3 step 6).
fn compose_ground_track(heading_deg: f64, tas_kt: f64, wind_dir_from_deg: f64, wind_speed_kt: f64) -> (f64, f64) {
    let hdg_rad = heading_deg.to_radians();
    let wind_to_rad = (wind_dir_from_deg + 180.0).to_radians();

    let vx = tas_kt * hdg_rad.sin() + wind_speed_kt * wind_to_rad.sin();
    let vy = tas_kt * hdg_rad.cos() + wind_speed_kt * wind_to_rad.cos();

    let ground_speed = (vx * vx + vy * vy).sqrt();
    let track = vx.atan2(vy).to_degrees();
    (ground_speed, navigation::normalize_heading(track))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aircraft::{ApproachState, FlightPlan, WakeCategory};
    use crate::airport::performance::default_performance_database;

    fn test_aircraft() -> Aircraft {
        let plan = FlightPlan {
            origin: "EGLL".to_string(),
            destination: "EGPF".to_string(),
            route: vec![],
            sid: None,
            star: None,
            assigned_runway: None,
            squawk: 1200,
        };
        let mut ac = Aircraft::new(
            1,
            "BAW1".to_string(),
            "B738".to_string(),
            WakeCategory::Large,
            51.0,
            0.0,
            5000.0,
            90.0,
            250.0,
            FlightPhase::Cruise,
            plan,
            1,
        );
        ac.target_heading_deg = 90.0;
        ac.target_altitude_ft = 5000.0;
        ac.target_speed_kt = 250.0;
        ac
    }

    #[test]
    fn heading_turns_toward_target_and_stops() {
        let engine = PhysicsEngine::new();
        let db = default_performance_database();
        let perf = db.get("B738").unwrap();
        let mut ac = test_aircraft();
        ac.target_heading_deg = 180.0;

        for _ in 0..40 {
            engine.step(&mut ac, perf, &[], 1.0, None);
        }

        assert!((ac.heading_deg - 180.0).abs() < 1.0);
        assert!((ac.bank_angle_deg).abs() < 1.0);
    }

    #[test]
    fn speed_never_exceeds_250_below_10000ft() {
        let engine = PhysicsEngine::new();
        let db = default_performance_database();
        let perf = db.get("B738").unwrap();
        let mut ac = test_aircraft();
        ac.altitude_ft = 5000.0;
        ac.target_altitude_ft = 5000.0;
        ac.indicated_airspeed_kt = 240.0;
        ac.target_speed_kt = 320.0;

        for _ in 0..60 {
            engine.step(&mut ac, perf, &[], 1.0, None);
        }

        assert!(ac.indicated_airspeed_kt <= 250.0 + 1e-6);
    }

    #[test]
    fn altitude_climbs_toward_target_and_clamps() {
        let engine = PhysicsEngine::new();
        let db = default_performance_database();
        let perf = db.get("B738").unwrap();
        let mut ac = test_aircraft();
        ac.altitude_ft = 4000.0;
        ac.target_altitude_ft = 5000.0;

        for _ in 0..200 {
            engine.step(&mut ac, perf, &[], 1.0, None);
        }

        assert!((ac.altitude_ft - 5000.0).abs() < 1.0);
        assert!(ac.vertical_speed_fpm.abs() < 1.0);
    }

    #[test]
    fn glideslope_altitude_does_not_fall_below_target_floor() {
        let engine = PhysicsEngine::new();
        let db = default_performance_database();
        let perf = db.get("B738").unwrap();
        let mut ac = test_aircraft();
        ac.altitude_ft = 3000.0;
        ac.target_altitude_ft = 2000.0;
        ac.approach_state = ApproachState { on_localizer: true, on_glideslope: true };
        ac.ground_speed_kt = 140.0;

        for _ in 0..500 {
            engine.step(&mut ac, perf, &[], 1.0, None);
            assert!(ac.altitude_ft >= ac.target_altitude_ft - 1e-6);
        }
    }
}
