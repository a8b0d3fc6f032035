//! Per-tick state snapshot: everything a client needs to render one frame
//! of a session (spec §6, "state snapshot"). Assembled by
//! [`crate::session::Session::snapshot`] after the pipeline has run;
//! mirrors the publicly-visible half of [`crate::aircraft::Aircraft`] and
//! leaves `PilotAI`'s private bookkeeping (pending commands, unreleased
//! radio queue) out, same split the teacher draws between wire state and
//! its `simulation::ai_pilot` internals.

use serde::{Deserialize, Serialize};

use crate::aircraft::{
    Aircraft, ApproachState, Clearances, FlightPhase, FlightPlan, HandoffState, HoldingState, VisualSight,
    WakeCategory,
};
use crate::airport::TraconLimits;
use crate::clock::TimeScale;
use crate::conflict::Alert;
use crate::config::{RunwayConfig, WeatherConfig};
use crate::radio::RadioTransmission;
use crate::scoring::ScoreMetrics;

/// One aircraft's publicly-visible state (spec §3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AircraftSnapshot {
    pub id: u64,
    pub callsign: String,
    pub type_designator: String,
    pub wake_category: WakeCategory,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_ft: f64,
    pub heading_deg: f64,
    pub indicated_airspeed_kt: f64,
    pub ground_speed_kt: f64,
    pub vertical_speed_fpm: f64,
    pub target_altitude_ft: f64,
    pub target_heading_deg: f64,
    pub target_speed_kt: f64,
    pub phase: FlightPhase,
    pub flight_plan: FlightPlan,
    pub clearances: Clearances,
    pub approach_state: ApproachState,
    pub handoff: HandoffState,
    pub visual_sight: VisualSight,
    pub holding: Option<HoldingState>,
    pub on_ground: bool,
    pub runway_occupying: Option<String>,
    pub trail: Vec<(f64, f64)>,
}

impl From<&Aircraft> for AircraftSnapshot {
    fn from(ac: &Aircraft) -> Self {
        Self {
            id: ac.id,
            callsign: ac.callsign.clone(),
            type_designator: ac.type_designator.clone(),
            wake_category: ac.wake_category,
            latitude: ac.latitude,
            longitude: ac.longitude,
            altitude_ft: ac.altitude_ft,
            heading_deg: ac.heading_deg,
            indicated_airspeed_kt: ac.indicated_airspeed_kt,
            ground_speed_kt: ac.ground_speed_kt,
            vertical_speed_fpm: ac.vertical_speed_fpm,
            target_altitude_ft: ac.target_altitude_ft,
            target_heading_deg: ac.target_heading_deg,
            target_speed_kt: ac.target_speed_kt,
            phase: ac.phase,
            flight_plan: ac.flight_plan.clone(),
            clearances: ac.clearances.clone(),
            approach_state: ac.approach_state,
            handoff: ac.handoff.clone(),
            visual_sight: ac.visual_sight.clone(),
            holding: ac.holding,
            on_ground: ac.on_ground,
            runway_occupying: ac.runway_occupying.clone(),
            trail: ac.trail.iter().copied().collect(),
        }
    }
}

/// Everything a client needs to render one tick (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub session_id: String,
    pub tick: u64,
    pub sim_time_ms: u64,
    pub time_scale: TimeScale,
    pub running: bool,
    pub paused: bool,
    pub aircraft: Vec<AircraftSnapshot>,
    pub weather: WeatherConfig,
    pub runway_config: RunwayConfig,
    pub alerts: Vec<Alert>,
    pub score: ScoreMetrics,
    pub atis_text: String,
    pub limits: TraconLimits,
    pub radio: Vec<RadioTransmission>,
}
