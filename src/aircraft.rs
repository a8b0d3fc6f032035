//! The `Aircraft` entity: identity, kinematics, clearances, and the
//! handoff/visual-sight sub-state machines that ride alongside it.
//!
//! Aircraft are owned exclusively by [`crate::aircraft_manager::AircraftManager`]
//! for their lifetime; [`crate::pilot::PilotAI`] and [`crate::physics::PhysicsEngine`]
//! mutate them during their respective pipeline steps (spec §3, "Lifecycle / ownership").

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Opaque, stable aircraft identifier. Assigned once at spawn by
/// [`crate::aircraft_manager::AircraftManager`] and never reused within a session.
pub type AircraftId = u64;

/// Trail capacity: bounded ordered sequence of recent positions (spec §3).
pub const TRAIL_CAPACITY: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WakeCategory {
    Super,
    Heavy,
    Large,
    Small,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlightPhase {
    Ground,
    Departure,
    Climb,
    Cruise,
    Descent,
    Approach,
    Final,
    Missed,
    Landed,
}

impl FlightPhase {
    pub fn is_airborne(&self) -> bool {
        !matches!(self, FlightPhase::Ground | FlightPhase::Landed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnDirection {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApproachType {
    Ils,
    Rnav,
    Visual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApproachClearance {
    pub approach_type: ApproachType,
    pub runway: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RadarHandoffState {
    None,
    Offered,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InboundHandoffState {
    None,
    Offered,
    Accepted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisualSightState {
    None,
    Queried,
    FieldSighted,
    TrafficSighted,
    Negative,
    WillReport,
}

/// The controller's mutable instructions to an aircraft (spec §3, "Clearances").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Clearances {
    pub altitude: Option<f64>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub turn_direction: Option<TurnDirection>,
    pub approach: Option<ApproachClearance>,
    pub hold_fix: Option<String>,
    pub direct_to: Option<String>,
    pub procedure_name: Option<String>,
    pub climb_via_sid: bool,
    pub descend_via_star: bool,
    pub expected_approach: Option<ApproachType>,
    pub expected_runway: Option<String>,
    pub maintain_until_established: Option<f64>,
    pub handoff_frequency: Option<f64>,
    pub handoff_facility: Option<String>,
}

/// Filed flight plan (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightPlan {
    pub origin: String,
    pub destination: String,
    pub route: Vec<String>,
    pub sid: Option<String>,
    pub star: Option<String>,
    pub assigned_runway: Option<String>,
    pub squawk: u16,
}

/// Lateral/vertical approach-capture flags (spec §3, "Approach state").
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ApproachState {
    pub on_localizer: bool,
    pub on_glideslope: bool,
}

/// Holding-pattern sub-state (spec §4.4, priority 1). Entered when
/// `clearances.hold_fix` is set and cleared when it is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HoldPhase {
    Inbound,
    TurningOutbound,
    Outbound,
    TurningInbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoldingState {
    pub phase: HoldPhase,
    pub inbound_course_deg: f64,
    pub phase_entered_tick: u64,
}

/// Outbound/inbound handoff bookkeeping (spec §3, "Handoff state").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HandoffState {
    pub handing_off: bool,
    pub handoff_started_at: Option<u64>,
    pub radar_handoff_state: Option<RadarHandoffState>,
    pub radar_handoff_offered_at: Option<u64>,
    pub radar_handoff_resolves_at: Option<u64>,
    pub inbound_handoff: InboundHandoffState,
    pub inbound_handoff_offered_at: Option<u64>,
    pub inbound_handoff_accepted_at: Option<u64>,
    pub check_in_countdown: Option<u32>,
    /// Tick on which this aircraft was first observed airborne (post-takeoff
    /// or at spawn for arrivals); used by scoring's departure handoff checks.
    pub first_airborne_tick: Option<u64>,
}

impl Default for RadarHandoffState {
    fn default() -> Self {
        RadarHandoffState::None
    }
}

impl Default for InboundHandoffState {
    fn default() -> Self {
        InboundHandoffState::None
    }
}

/// Visual-sight request/response bookkeeping (spec §3, §4.5).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisualSight {
    pub state: VisualSightState,
    pub query_tick: Option<u64>,
    pub response_tick: Option<u64>,
    pub traffic_callsign: Option<String>,
}

impl Default for VisualSightState {
    fn default() -> Self {
        VisualSightState::None
    }
}

#[derive(Debug, Clone)]
pub struct Aircraft {
    pub id: AircraftId,
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
    pub bank_angle_deg: f64,

    pub target_altitude_ft: f64,
    pub target_heading_deg: f64,
    pub target_speed_kt: f64,

    pub phase: FlightPhase,
    pub flight_plan: FlightPlan,
    pub current_fix_index: usize,

    pub clearances: Clearances,
    pub approach_state: ApproachState,
    pub handoff: HandoffState,
    pub visual_sight: VisualSight,
    pub holding: Option<HoldingState>,

    pub on_ground: bool,
    pub runway_occupying: Option<String>,
    /// Distance rolled so far during a takeoff/landing roll, nm.
    pub rollout_distance_nm: f64,
    /// Ticks spent in phase `Ground` after landing (for cleanup grace).
    pub ground_linger_ticks: u32,

    pub trail: VecDeque<(f64, f64)>,

    /// Deterministic per-aircraft seed used for radar-handoff response delay
    /// draws, so replaying the same spawn sequence reproduces the same delays.
    pub delay_seed: u64,
}

impl Aircraft {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: AircraftId,
        callsign: String,
        type_designator: String,
        wake_category: WakeCategory,
        latitude: f64,
        longitude: f64,
        altitude_ft: f64,
        heading_deg: f64,
        speed_kt: f64,
        phase: FlightPhase,
        flight_plan: FlightPlan,
        delay_seed: u64,
    ) -> Self {
        Self {
            id,
            callsign,
            type_designator,
            wake_category,
            latitude,
            longitude,
            altitude_ft,
            heading_deg,
            indicated_airspeed_kt: speed_kt,
            ground_speed_kt: speed_kt,
            vertical_speed_fpm: 0.0,
            bank_angle_deg: 0.0,
            target_altitude_ft: altitude_ft,
            target_heading_deg: heading_deg,
            target_speed_kt: speed_kt,
            phase,
            flight_plan,
            current_fix_index: 0,
            clearances: Clearances::default(),
            approach_state: ApproachState::default(),
            handoff: HandoffState::default(),
            visual_sight: VisualSight::default(),
            holding: None,
            on_ground: phase == FlightPhase::Ground,
            runway_occupying: None,
            rollout_distance_nm: 0.0,
            ground_linger_ticks: 0,
            trail: VecDeque::with_capacity(TRAIL_CAPACITY),
            delay_seed,
        }
    }

    /// Push the current position onto the trail, evicting the oldest entry
    /// once at capacity (spec §3, "Trail").
    pub fn push_trail(&mut self) {
        if self.trail.len() >= TRAIL_CAPACITY {
            self.trail.pop_back();
        }
        self.trail.push_front((self.latitude, self.longitude));
    }

    /// Most recent prior position, used by the conflict detector's track
    /// extrapolation when the trail is non-empty (spec §4.7).
    pub fn last_trail_point(&self) -> Option<(f64, f64)> {
        self.trail.front().copied()
    }

    pub fn is_controllable(&self) -> bool {
        !matches!(self.handoff.inbound_handoff, InboundHandoffState::Offered)
    }

    pub fn is_landed_or_ground(&self) -> bool {
        matches!(self.phase, FlightPhase::Landed | FlightPhase::Ground)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_flight_plan() -> FlightPlan {
        FlightPlan {
            origin: "EGLL".to_string(),
            destination: "EGPF".to_string(),
            route: vec!["TIMBA".to_string(), "LAM".to_string()],
            sid: None,
            star: None,
            assigned_runway: None,
            squawk: 1200,
        }
    }

    #[test]
    fn trail_is_capped_and_most_recent_first() {
        let mut ac = Aircraft::new(
            1,
            "BAW123".to_string(),
            "B738".to_string(),
            WakeCategory::Large,
            51.0,
            0.0,
            5000.0,
            90.0,
            250.0,
            FlightPhase::Cruise,
            test_flight_plan(),
            42,
        );

        for i in 0..(TRAIL_CAPACITY + 10) {
            ac.longitude = i as f64;
            ac.push_trail();
        }

        assert_eq!(ac.trail.len(), TRAIL_CAPACITY);
        assert_eq!(ac.last_trail_point().unwrap().1, (TRAIL_CAPACITY + 9) as f64);
    }

    #[test]
    fn inbound_offered_aircraft_is_not_controllable() {
        let mut ac = Aircraft::new(
            1,
            "BAW123".to_string(),
            "B738".to_string(),
            WakeCategory::Large,
            51.0,
            0.0,
            5000.0,
            90.0,
            250.0,
            FlightPhase::Cruise,
            test_flight_plan(),
            1,
        );
        ac.handoff.inbound_handoff = InboundHandoffState::Offered;
        assert!(!ac.is_controllable());
        ac.handoff.inbound_handoff = InboundHandoffState::Accepted;
        assert!(ac.is_controllable());
    }
}
