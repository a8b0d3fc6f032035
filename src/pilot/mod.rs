//! Per-aircraft behavioral layer: queued command execution with pilot
//! delay, the radio queue, handoff lifecycle (outbound + radar + inbound),
//! visual-sight state, and go-around trigger ingestion (spec §4.5).
//! Adapted from the teacher's `simulation::ai_pilot` per-aircraft command
//! loop, generalized from its fixed FSD-command set to the structured
//! [`crate::command::SubCommand`] union and given an injectable RNG so a
//! test harness can reproduce a run (spec §5).

pub mod flight_plan_executor;

use std::collections::{HashMap, HashSet, VecDeque};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::aircraft::{
    Aircraft, AircraftId, ApproachType, FlightPhase, InboundHandoffState, RadarHandoffState, VisualSightState,
};
use crate::airport::performance::AircraftPerformance;
use crate::airport::AirportData;
use crate::command::{CommandResult, PendingCommand, SubCommand};
use crate::config::WeatherConfig;
use crate::radio::{RadioFormatter, RadioQueue, RadioSender, RadioTransmission};

use flight_plan_executor::{vfr_visibility, ExecutorEvent, FlightPlanExecutor, TrafficSnapshots, Visibility};

const PILOT_RESPONSE_MIN_TICKS: u64 = 2;
const PILOT_RESPONSE_MAX_TICKS: u64 = 5;
const RADAR_HANDOFF_MIN_TICKS: u64 = 3;
const RADAR_HANDOFF_MAX_TICKS: u64 = 5;
const RADAR_HANDOFF_REJECT_CLEAR_TICKS: u64 = 5;
const INBOUND_CHECKIN_MIN_TICKS: u32 = 3;
const INBOUND_CHECKIN_MAX_TICKS: u32 = 5;
const SIGHT_RESPONSE_MIN_TICKS: u64 = 3;
const SIGHT_RESPONSE_MAX_TICKS: u64 = 6;
const DEPARTURE_INITIAL_CONTACT_AGL_FT: f64 = 800.0;
const RADAR_HANDOFF_MIN_DISTANCE_NM: f64 = 10.0;
const RADAR_HANDOFF_MIN_INTENDED_ALTITUDE_FT: f64 = 8000.0;

/// Per-aircraft state `PilotAI` owns on top of the entity itself: pending
/// commands, the radio queue, and handoff bookkeeping that isn't part of the
/// publicly-visible `Aircraft` record (spec §5, "PilotAI owns its pending
/// command list, radio queue, and handoff sets").
#[derive(Debug, Default)]
struct PilotState {
    pending_commands: VecDeque<PendingCommand>,
    radio: RadioQueue,
    initial_contact_done: bool,
    handoff_coast_deadline_tick: Option<u64>,
}

#[derive(Debug)]
pub struct PilotAI {
    states: HashMap<AircraftId, PilotState>,
    rng: StdRng,
    executor: FlightPlanExecutor,
    /// Aircraft ids whose outbound handoff resolved this tick, for scoring's
    /// `recordAircraftHandled` (spec §4.5, §4.8).
    pub newly_handed_off: Vec<(AircraftId, f64)>,
}

impl PilotAI {
    pub fn new(seed: u64) -> Self {
        Self { states: HashMap::new(), rng: StdRng::seed_from_u64(seed), executor: FlightPlanExecutor::new(), newly_handed_off: Vec::new() }
    }

    fn state_mut(&mut self, id: AircraftId) -> &mut PilotState {
        self.states.entry(id).or_default()
    }

    /// Forget an aircraft's pilot-side bookkeeping (called by
    /// `AircraftManager::remove`).
    pub fn forget(&mut self, id: AircraftId) {
        self.states.remove(&id);
    }

    pub fn clear_queue(&mut self, id: AircraftId) {
        if let Some(state) = self.states.get_mut(&id) {
            state.radio.clear();
            state.pending_commands.clear();
        }
    }

    /// Enqueue a validated command at `current_tick + uniform[2, 5)` ticks,
    /// plus a readback transmission (spec §4.5).
    pub fn issue_command(&mut self, ac: &Aircraft, sub_commands: Vec<SubCommand>, raw_text: String, current_tick: u64, frequency_mhz: f64) {
        let delay = self.rng.gen_range(PILOT_RESPONSE_MIN_TICKS..PILOT_RESPONSE_MAX_TICKS);
        let execute_at = current_tick + delay;
        let state = self.state_mut(ac.id);
        state.pending_commands.push_back(PendingCommand { sub_commands, execute_at_ms: execute_at, raw_text: raw_text.clone() });
        state.radio.enqueue(RadioSender::Aircraft(ac.callsign.clone()), raw_text, execute_at, frequency_mhz);
    }

    /// Radar handoff and sight queries execute inline with no pilot readback
    /// (spec §4.6, "fast paths").
    pub fn offer_radar_handoff(&mut self, ac: &mut Aircraft, current_tick: u64) {
        ac.handoff.radar_handoff_state = Some(RadarHandoffState::Offered);
        ac.handoff.radar_handoff_offered_at = Some(current_tick);
        info!(aircraft = %ac.callsign, "radar handoff offered");
    }

    pub fn query_sight(&mut self, ac: &mut Aircraft, traffic_callsign: Option<String>, current_tick: u64) {
        ac.visual_sight.state = VisualSightState::Queried;
        ac.visual_sight.query_tick = Some(current_tick);
        ac.visual_sight.traffic_callsign = traffic_callsign;
        let delay = self.rng.gen_range(SIGHT_RESPONSE_MIN_TICKS..SIGHT_RESPONSE_MAX_TICKS);
        ac.visual_sight.response_tick = Some(current_tick + delay);
    }

    /// Idempotent per aircraft; departures wait until airborne and ≥
    /// field elevation + 800 ft (spec §4.5).
    pub fn request_initial_contact(&mut self, ac: &Aircraft, airport_elevation_ft: f64, current_tick: u64) {
        let state = self.state_mut(ac.id);
        if state.initial_contact_done {
            return;
        }
        if ac.phase == FlightPhase::Departure && ac.altitude_ft < airport_elevation_ft + DEPARTURE_INITIAL_CONTACT_AGL_FT {
            return;
        }
        let delay = self.rng.gen_range(INBOUND_CHECKIN_MIN_TICKS..INBOUND_CHECKIN_MAX_TICKS) as u64;
        let frequency = ac.clearances.handoff_frequency.unwrap_or(0.0);
        state.radio.enqueue(RadioSender::Aircraft(ac.callsign.clone()), "initial contact".to_string(), current_tick + delay, frequency);
        state.initial_contact_done = true;
    }

    /// The go-around effect (spec §4.4, "Go-around effect").
    pub fn execute_go_around(&mut self, ac: &mut Aircraft, reason: &str, missed_altitude_ft: f64, runway_heading_deg: f64, vapp_kt: f64, current_tick: u64, frequency_mhz: f64) {
        ac.clearances.approach = None;
        ac.approach_state.on_localizer = false;
        ac.approach_state.on_glideslope = false;
        ac.phase = FlightPhase::Missed;
        ac.target_altitude_ft = missed_altitude_ft;
        ac.target_heading_deg = runway_heading_deg;
        ac.target_speed_kt = vapp_kt + 20.0;
        ac.handoff.handing_off = false;
        ac.visual_sight.state = VisualSightState::None;

        let state = self.state_mut(ac.id);
        state.radio.enqueue(RadioSender::Aircraft(ac.callsign.clone()), format!("going around, {reason}"), current_tick, frequency_mhz);
        info!(aircraft = %ac.callsign, reason, "go-around executed");
    }

    /// Record an outbound handoff command resolving (spec §4.5). Also
    /// records the aircraft into `newly_handed_off` with its elapsed
    /// handling delay, for `ScoringEngine::record_aircraft_handled`
    /// (spec §4.8, "+1 per clean handoff").
    pub fn begin_handoff(&mut self, ac: &mut Aircraft, current_tick: u64) {
        ac.handoff.handing_off = true;
        ac.handoff.handoff_started_at = Some(current_tick);
        let deadline = handoff_coast_deadline(ac, current_tick);
        self.state_mut(ac.id).handoff_coast_deadline_tick = deadline;

        let start_tick = ac.handoff.first_airborne_tick.unwrap_or(current_tick);
        let delay_seconds = current_tick.saturating_sub(start_tick) as f64;
        self.newly_handed_off.push((ac.id, delay_seconds));
    }

    pub fn handoff_coast_expired(&self, id: AircraftId, current_tick: u64) -> bool {
        self.states.get(&id).and_then(|s| s.handoff_coast_deadline_tick).map(|deadline| current_tick >= deadline).unwrap_or(false)
    }

    /// Apply a matured pending command's sub-commands to `ac.clearances`
    /// (spec §4.5, field-by-field mapping with a few cross-field rules).
    /// Returns go-around reasons for any `GoAround` sub-command, since
    /// applying the full go-around effect needs airport/performance data
    /// this function doesn't carry — the caller applies it via
    /// `execute_go_around`.
    fn apply_sub_commands(&mut self, ac: &mut Aircraft, sub_commands: &[SubCommand], perf: &AircraftPerformance, current_tick: u64) -> Vec<String> {
        let mut go_around_reasons = Vec::new();
        for cmd in sub_commands {
            match cmd {
                SubCommand::Altitude(alt) => ac.clearances.altitude = Some(*alt),
                SubCommand::Heading { degrees, turn } => {
                    ac.clearances.heading = Some(*degrees);
                    ac.clearances.turn_direction = *turn;
                    ac.clearances.descend_via_star = false;
                    ac.clearances.climb_via_sid = false;
                    ac.clearances.direct_to = None;
                }
                SubCommand::Speed(speed) => {
                    ac.clearances.speed = match speed {
                        Some(s) => Some(*s),
                        None => Some(default_resume_speed(ac, perf)),
                    };
                }
                SubCommand::Approach { approach_type, runway } => {
                    ac.clearances.approach = Some(crate::aircraft::ApproachClearance { approach_type: *approach_type, runway: runway.clone() });
                    if ac.clearances.maintain_until_established.is_none() {
                        ac.clearances.maintain_until_established = ac.clearances.altitude.or(Some(ac.altitude_ft));
                    }
                }
                SubCommand::Direct(fix) => {
                    ac.clearances.direct_to = Some(fix.clone());
                    ac.clearances.heading = None;
                    ac.clearances.descend_via_star = false;
                    ac.clearances.climb_via_sid = false;
                }
                SubCommand::Hold { fix } => {
                    ac.clearances.hold_fix = Some(fix.clone());
                }
                SubCommand::Sid(name) => ac.flight_plan.sid = Some(name.clone()),
                SubCommand::Star(name) => ac.flight_plan.star = Some(name.clone()),
                SubCommand::ClimbViaSid => ac.clearances.climb_via_sid = true,
                SubCommand::DescendViaStar => ac.clearances.descend_via_star = true,
                SubCommand::Handoff { facility, frequency } => {
                    ac.clearances.handoff_facility = facility.clone();
                    ac.clearances.handoff_frequency = *frequency;
                    self.begin_handoff(ac, current_tick);
                }
                SubCommand::RadarHandoff => self.offer_radar_handoff(ac, current_tick),
                SubCommand::GoAround => go_around_reasons.push("controller-directed go-around".to_string()),
                SubCommand::ExpectApproach(t) => ac.clearances.expected_approach = Some(*t),
                SubCommand::ExpectRunway(rwy) => ac.clearances.expected_runway = Some(rwy.clone()),
                SubCommand::CancelApproach => {
                    ac.clearances.approach = None;
                    ac.approach_state.on_localizer = false;
                    ac.approach_state.on_glideslope = false;
                }
                SubCommand::ResumeOwnNavigation => {
                    ac.clearances.heading = None;
                    ac.clearances.direct_to = None;
                }
                SubCommand::RequestFieldSight => self.query_sight(ac, None, current_tick),
                SubCommand::RequestTrafficSight { traffic_callsign } => self.query_sight(ac, traffic_callsign.clone(), current_tick),
            }
        }
        go_around_reasons
    }

    /// Drain matured pending commands and apply them (spec §4.5, `update`).
    /// Returns any go-around reasons raised by a matured `GoAround`
    /// sub-command.
    fn drain_pending_commands(&mut self, ac: &mut Aircraft, perf: &AircraftPerformance, current_tick: u64) -> Vec<String> {
        let matured: Vec<PendingCommand> = {
            let state = self.state_mut(ac.id);
            let mut matured = Vec::new();
            let mut remaining = VecDeque::with_capacity(state.pending_commands.len());
            for cmd in state.pending_commands.drain(..) {
                if cmd.execute_at_ms <= current_tick {
                    matured.push(cmd);
                } else {
                    remaining.push_back(cmd);
                }
            }
            state.pending_commands = remaining;
            matured
        };
        let mut go_around_reasons = Vec::new();
        for cmd in matured {
            go_around_reasons.extend(self.apply_sub_commands(ac, &cmd.sub_commands, perf, current_tick));
        }
        go_around_reasons
    }

    /// Resolve an offered radar handoff after its deterministic per-aircraft
    /// delay (spec §4.5).
    fn resolve_radar_handoff(&mut self, ac: &mut Aircraft, airport_distance_nm: f64, current_tick: u64) {
        let Some(offered_at) = ac.handoff.radar_handoff_offered_at else { return };
        match ac.handoff.radar_handoff_state {
            Some(RadarHandoffState::Offered) => {
                let mut delay_rng = StdRng::seed_from_u64(ac.delay_seed ^ offered_at);
                let delay = delay_rng.gen_range(RADAR_HANDOFF_MIN_TICKS..RADAR_HANDOFF_MAX_TICKS);
                if current_tick < offered_at + delay {
                    return;
                }
                let criteria_met = ac.flight_plan.squawk != 1200
                    && ac.target_altitude_ft >= RADAR_HANDOFF_MIN_INTENDED_ALTITUDE_FT
                    && ac.phase != FlightPhase::Approach
                    && ac.phase != FlightPhase::Final
                    && airport_distance_nm > RADAR_HANDOFF_MIN_DISTANCE_NM;
                ac.handoff.radar_handoff_state = Some(if criteria_met { RadarHandoffState::Accepted } else { RadarHandoffState::Rejected });
                ac.handoff.radar_handoff_resolves_at = Some(current_tick);
                debug!(aircraft = %ac.callsign, accepted = criteria_met, "radar handoff resolved");
            }
            Some(RadarHandoffState::Rejected) => {
                if let Some(resolved_at) = ac.handoff.radar_handoff_resolves_at {
                    if current_tick >= resolved_at + RADAR_HANDOFF_REJECT_CLEAR_TICKS {
                        ac.handoff.radar_handoff_state = Some(RadarHandoffState::None);
                    }
                }
            }
            _ => {}
        }
    }

    /// Inbound-handoff accept starts a 3–5 tick check-in countdown; on
    /// expiry the aircraft enqueues its initial contact (spec §4.5).
    fn tick_inbound_handoff(&mut self, ac: &mut Aircraft, airport_elevation_ft: f64, current_tick: u64) {
        if ac.handoff.inbound_handoff == InboundHandoffState::Accepted {
            if let Some(countdown) = ac.handoff.check_in_countdown {
                if countdown == 0 {
                    self.request_initial_contact(ac, airport_elevation_ft, current_tick);
                    ac.handoff.inbound_handoff = InboundHandoffState::None;
                    ac.handoff.check_in_countdown = None;
                } else {
                    ac.handoff.check_in_countdown = Some(countdown - 1);
                }
            }
        }
    }

    /// Accept an inbound handoff offer (controller action), starting the
    /// check-in countdown.
    pub fn accept_inbound_handoff(&mut self, ac: &mut Aircraft, current_tick: u64) {
        ac.handoff.inbound_handoff = InboundHandoffState::Accepted;
        ac.handoff.inbound_handoff_accepted_at = Some(current_tick);
        let delay = self.rng.gen_range(INBOUND_CHECKIN_MIN_TICKS..INBOUND_CHECKIN_MAX_TICKS);
        ac.handoff.check_in_countdown = Some(delay);
    }

    /// Evaluate the visual-sight FSM on its response tick (spec §4.5).
    fn tick_visual_sight(&mut self, ac: &mut Aircraft, airport: &AirportData, weather: &WeatherConfig, current_tick: u64) {
        if ac.visual_sight.state != VisualSightState::Queried && ac.visual_sight.state != VisualSightState::WillReport {
            return;
        }
        let Some(response_tick) = ac.visual_sight.response_tick else { return };
        if ac.visual_sight.state == VisualSightState::Queried && current_tick < response_tick {
            return;
        }

        let distance_nm = navigation_distance_to_airport(ac, airport);
        match vfr_visibility(weather, distance_nm, airport.elevation_ft) {
            Visibility::Yes => {
                ac.visual_sight.state = if ac.visual_sight.traffic_callsign.is_some() { VisualSightState::TrafficSighted } else { VisualSightState::FieldSighted };
                ac.visual_sight.response_tick = Some(current_tick);
                self.state_mut(ac.id).radio.enqueue(
                    RadioSender::Aircraft(ac.callsign.clone()),
                    "field in sight".to_string(),
                    current_tick,
                    ac.clearances.handoff_frequency.unwrap_or(0.0),
                );
            }
            Visibility::NotYet => ac.visual_sight.state = VisualSightState::WillReport,
            Visibility::No => ac.visual_sight.state = VisualSightState::Negative,
        }
    }

    /// Full per-aircraft per-tick update: drains pending commands, advances
    /// handoff/sight sub-state machines, and runs the flight plan executor
    /// (spec §4.5, §4.4). Returns go-around reasons the caller (the session
    /// pipeline) should apply via `execute_go_around` using airport data
    /// this method doesn't carry (runway heading, missed-approach altitude).
    pub fn update(
        &mut self,
        ac: &mut Aircraft,
        airport: &AirportData,
        weather: &WeatherConfig,
        perf: &AircraftPerformance,
        traffic: &TrafficSnapshots,
        current_tick: u64,
    ) -> Vec<String> {
        let mut go_around_reasons = self.drain_pending_commands(ac, perf, current_tick);

        let distance_nm = navigation_distance_to_airport(ac, airport);
        self.resolve_radar_handoff(ac, distance_nm, current_tick);
        self.tick_inbound_handoff(ac, airport.elevation_ft, current_tick);
        self.tick_visual_sight(ac, airport, weather, current_tick);

        if ac.phase == FlightPhase::Departure {
            self.request_initial_contact(ac, airport.elevation_ft, current_tick);
        }

        let events = self.executor.update(ac, airport, weather, perf, traffic, current_tick);
        for event in events {
            match event {
                ExecutorEvent::GoAround(reason) => go_around_reasons.push(reason),
                ExecutorEvent::ReportFieldInSight => {
                    self.state_mut(ac.id).radio.enqueue(
                        RadioSender::Aircraft(ac.callsign.clone()),
                        "runway in sight".to_string(),
                        current_tick,
                        ac.clearances.handoff_frequency.unwrap_or(0.0),
                    );
                }
            }
        }
        go_around_reasons
    }

    /// Release matured radio messages for one aircraft.
    pub fn drain_radio(&mut self, id: AircraftId, current_tick: u64) -> Vec<RadioTransmission> {
        self.states.get_mut(&id).map(|s| s.radio.drain_matured(current_tick)).unwrap_or_default()
    }

    /// Format and enqueue a pilot-unable transmission (spec §7).
    pub fn enqueue_unable(&mut self, ac: &Aircraft, formatter: &dyn RadioFormatter, reason: &str, current_tick: u64) {
        let text = formatter.format_unable(&ac.callsign, reason);
        self.state_mut(ac.id).radio.enqueue(RadioSender::Aircraft(ac.callsign.clone()), text, current_tick, ac.clearances.handoff_frequency.unwrap_or(0.0));
    }

    pub fn to_command_result(ac: &Aircraft, raw_text: &str) -> CommandResult {
        CommandResult::ok(ac.callsign.clone(), raw_text.to_string())
    }
}

fn navigation_distance_to_airport(ac: &Aircraft, airport: &AirportData) -> f64 {
    crate::utils::navigation::haversine_nm(ac.latitude, ac.longitude, airport.position.0, airport.position.1)
}

fn default_resume_speed(ac: &Aircraft, perf: &AircraftPerformance) -> f64 {
    if ac.altitude_ft < 10_000.0 {
        perf.vmax_below_10k.min(perf.vmo)
    } else {
        perf.cruise_speed_kt
    }
}

/// Outbound-handoff coast deadline (spec §4.5, "Coast policy"): landed
/// aircraft are retained for `AircraftManager::cleanup` instead; approach/
/// final aircraft get 120 s; everyone else coasts 180 s.
fn handoff_coast_deadline(ac: &Aircraft, current_tick: u64) -> Option<u64> {
    match ac.phase {
        FlightPhase::Landed => None,
        FlightPhase::Approach | FlightPhase::Final => Some(current_tick + 120),
        _ => Some(current_tick + 180),
    }
}

pub fn approach_type_requires_field_sight(approach_type: ApproachType) -> bool {
    approach_type == ApproachType::Visual
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aircraft::{FlightPlan, WakeCategory};
    use crate::airport::performance::default_performance_database;
    use crate::test_support::sample_airport;

    fn test_aircraft() -> Aircraft {
        let plan = FlightPlan { origin: "EGLL".to_string(), destination: "EGLL".to_string(), route: vec![], sid: None, star: None, assigned_runway: None, squawk: 1200 };
        Aircraft::new(1, "BAW1".to_string(), "B738".to_string(), WakeCategory::Large, 51.2, -0.3, 5000.0, 90.0, 250.0, FlightPhase::Cruise, plan, 9)
    }

    #[test]
    fn issued_command_matures_after_delay_and_applies() {
        let mut pilot = PilotAI::new(1);
        let db = default_performance_database();
        let perf = db.get("B738").unwrap();
        let mut ac = test_aircraft();

        pilot.issue_command(&ac, vec![SubCommand::Altitude(7000.0)], "climb and maintain seven thousand".to_string(), 0, 118.5);

        for tick in 0..10 {
            pilot.drain_pending_commands(&mut ac, perf, tick);
        }

        assert_eq!(ac.clearances.altitude, Some(7000.0));
    }

    #[test]
    fn readback_enqueued_for_every_issued_command() {
        let mut pilot = PilotAI::new(2);
        let ac = test_aircraft();
        pilot.issue_command(&ac, vec![SubCommand::Altitude(7000.0)], "climb and maintain seven thousand".to_string(), 0, 118.5);

        let released = pilot.drain_radio(ac.id, 10);
        assert_eq!(released.len(), 1);
    }

    #[test]
    fn go_around_clears_approach_and_sets_missed_phase() {
        let mut pilot = PilotAI::new(3);
        let mut ac = test_aircraft();
        ac.clearances.approach = Some(crate::aircraft::ApproachClearance { approach_type: ApproachType::Ils, runway: "16".to_string() });
        ac.approach_state.on_localizer = true;
        ac.approach_state.on_glideslope = true;

        pilot.execute_go_around(&mut ac, "traffic on runway", 3000.0, 160.0, 140.0, 5, 118.5);

        assert!(ac.clearances.approach.is_none());
        assert!(!ac.approach_state.on_glideslope);
        assert_eq!(ac.phase, FlightPhase::Missed);
    }

    #[test]
    fn radar_handoff_rejects_vfr_squawk() {
        let mut pilot = PilotAI::new(4);
        let airport = sample_airport();
        let mut ac = test_aircraft();
        ac.flight_plan.squawk = 1200;
        ac.target_altitude_ft = 9000.0;
        pilot.offer_radar_handoff(&mut ac, 0);

        let distance = navigation_distance_to_airport(&ac, &airport);
        for tick in 0..10 {
            pilot.resolve_radar_handoff(&mut ac, distance, tick);
        }

        assert_eq!(ac.handoff.radar_handoff_state, Some(RadarHandoffState::Rejected));
    }
}
