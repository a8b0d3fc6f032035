//! Validates a parsed controller command against the current world and the
//! target aircraft, then queues it into [`crate::pilot::PilotAI`] with pilot
//! delay (spec §4.6). Adapted from the teacher's `server::controller_handler`
//! command-to-FSD-action validation pipeline, generalized from its fixed
//! EuroScope command grammar to the structured [`crate::command::SubCommand`]
//! union.

use crate::aircraft::{AircraftId, ApproachType, FlightPhase, InboundHandoffState};
use crate::aircraft_manager::AircraftManager;
use crate::airport::performance::PerformanceDatabase;
use crate::airport::AirportData;
use crate::command::{CommandResult, ControllerCommand, SubCommand};
use crate::config::WeatherConfig;
use crate::error::{SimError, SimResult};
use crate::pilot::flight_plan_executor::{vfr_visibility, Visibility};
use crate::pilot::PilotAI;
use crate::utils::navigation;

const APPROACH_GATE_NM: f64 = 5.0;
const LOCALIZER_REJECT_HEADING_DEG: f64 = 90.0;
const GLIDESLOPE_EXCESS_REJECT_FT: f64 = 500.0;
const HANDOFF_FREQUENCY_TOLERANCE_MHZ: f64 = 0.05;
const FT_PER_NM: f64 = 6076.12;

pub struct CommandExecutor;

impl CommandExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Validate and apply a controller command (spec §4.6). Validation runs
    /// in full before any mutation, so a rejected command leaves no partial
    /// state change (spec §7, "Propagation policy").
    pub fn execute(
        &self,
        command: &ControllerCommand,
        aircraft_manager: &mut AircraftManager,
        pilot: &mut PilotAI,
        airport: &AirportData,
        weather: &WeatherConfig,
        perf_db: &PerformanceDatabase,
        current_tick: u64,
    ) -> CommandResult {
        let Some(id) = aircraft_manager.find_id_by_callsign(&command.callsign) else {
            return CommandResult::rejected(&command.callsign, &command.raw_text, "no aircraft on frequency with that callsign");
        };

        if let Err(err) = self.validate(id, command, aircraft_manager, airport, weather, perf_db) {
            return match err {
                SimError::PilotUnable(msg) => CommandResult::pilot_unable(&command.callsign, &command.raw_text, msg),
                other => CommandResult::rejected(&command.callsign, &command.raw_text, other.to_string()),
            };
        }

        let has_radar_handoff = command.sub_commands.iter().any(|c| matches!(c, SubCommand::RadarHandoff));
        let sight_queries: Vec<&SubCommand> = command
            .sub_commands
            .iter()
            .filter(|c| matches!(c, SubCommand::RequestFieldSight | SubCommand::RequestTrafficSight { .. }))
            .collect();

        let ac = aircraft_manager.get_mut(id).expect("validated above");

        if has_radar_handoff && command.sub_commands.len() == 1 {
            pilot.offer_radar_handoff(ac, current_tick);
            return CommandResult::ok(&command.callsign, &command.raw_text);
        }
        if !sight_queries.is_empty() && command.sub_commands.len() == sight_queries.len() {
            for sq in sight_queries {
                match sq {
                    SubCommand::RequestFieldSight => pilot.query_sight(ac, None, current_tick),
                    SubCommand::RequestTrafficSight { traffic_callsign } => pilot.query_sight(ac, traffic_callsign.clone(), current_tick),
                    _ => unreachable!(),
                }
            }
            return CommandResult::ok(&command.callsign, &command.raw_text);
        }

        let frequency = resolve_handoff_frequency(&command.sub_commands, airport);
        pilot.issue_command(ac, command.sub_commands.clone(), command.raw_text.clone(), current_tick, frequency);
        CommandResult::ok(&command.callsign, &command.raw_text)
    }

    fn validate(
        &self,
        id: AircraftId,
        command: &ControllerCommand,
        aircraft_manager: &AircraftManager,
        airport: &AirportData,
        weather: &WeatherConfig,
        perf_db: &PerformanceDatabase,
    ) -> SimResult<()> {
        let ac = aircraft_manager.get(id).ok_or_else(|| SimError::MissingEntity(command.callsign.clone()))?;

        if ac.is_landed_or_ground() && !command.sub_commands.iter().any(|c| matches!(c, SubCommand::Handoff { .. })) {
            return Err(SimError::Validation("aircraft is already on the ground".to_string()));
        }
        if ac.handoff.handing_off && !command.sub_commands.iter().any(|c| matches!(c, SubCommand::Handoff { .. })) {
            return Err(SimError::Validation("aircraft has already been handed off".to_string()));
        }

        let perf = perf_db.get(&ac.type_designator).ok_or_else(|| SimError::MissingEntity(ac.type_designator.clone()))?;

        let sibling_altitude = command.sub_commands.iter().find_map(|c| if let SubCommand::Altitude(a) = c { Some(*a) } else { None });
        let sibling_heading = command.sub_commands.iter().find_map(|c| if let SubCommand::Heading { degrees, .. } = c { Some(*degrees) } else { None });

        for sub in &command.sub_commands {
            match sub {
                SubCommand::Altitude(alt) => {
                    if *alt < 0.0 || *alt > perf.ceiling_ft || *alt > airport.limits.ceiling_ft {
                        return Err(SimError::Validation(format!("altitude {alt} exceeds performance or TRACON ceiling")));
                    }
                }
                SubCommand::Heading { degrees, .. } => {
                    if *degrees <= 0.0 || *degrees > 360.0 {
                        return Err(SimError::Validation(format!("heading {degrees} out of range (0, 360]")));
                    }
                }
                SubCommand::Speed(Some(speed)) => {
                    if *speed < perf.vmin_flaps || *speed > perf.vmo {
                        return Err(SimError::Validation(format!("speed {speed} outside [{}, {}]", perf.vmin_flaps, perf.vmo)));
                    }
                }
                SubCommand::Speed(None) => {}
                SubCommand::Approach { approach_type, runway } => {
                    self.validate_approach(ac, *approach_type, runway, airport, weather, sibling_altitude, sibling_heading)?;
                }
                SubCommand::DescendViaStar => {
                    if ac.phase == FlightPhase::Departure || ac.flight_plan.star.is_none() {
                        return Err(SimError::Validation("aircraft has no assigned STAR".to_string()));
                    }
                }
                SubCommand::ClimbViaSid => {
                    if ac.flight_plan.sid.is_none() {
                        return Err(SimError::Validation("aircraft has no assigned SID".to_string()));
                    }
                }
                SubCommand::Handoff { facility, frequency } => {
                    self.validate_handoff(ac, facility.as_deref(), *frequency, airport)?;
                }
                _ => {}
            }
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn validate_approach(
        &self,
        ac: &crate::aircraft::Aircraft,
        approach_type: ApproachType,
        runway_id: &str,
        airport: &AirportData,
        weather: &WeatherConfig,
        sibling_altitude: Option<f64>,
        sibling_heading: Option<f64>,
    ) -> SimResult<()> {
        let runway = airport.runway(runway_id).ok_or_else(|| SimError::MissingEntity(format!("runway {runway_id}")))?;

        if approach_type == ApproachType::Ils && runway.ils.is_none() {
            return Err(SimError::Validation(format!("runway {runway_id} has no ILS")));
        }

        let distance_to_threshold = navigation::haversine_nm(ac.latitude, ac.longitude, runway.threshold.0, runway.threshold.1);
        if approach_type != ApproachType::Visual && distance_to_threshold < APPROACH_GATE_NM {
            return Err(SimError::Validation(format!("aircraft must be at least {APPROACH_GATE_NM} nm from the threshold")));
        }

        if approach_type != ApproachType::Visual {
            let inbound_course = (runway.heading_deg + 180.0) % 360.0;
            let effective_heading = sibling_heading.unwrap_or(ac.heading_deg);
            let heading_diff = navigation::shortest_turn_delta(effective_heading, inbound_course).abs();
            if heading_diff > LOCALIZER_REJECT_HEADING_DEG {
                return Err(SimError::Validation("heading too far from the localizer course".to_string()));
            }
        }

        if approach_type == ApproachType::Ils {
            let along = navigation::along_track_distance_nm(runway.threshold, (runway.heading_deg + 180.0) % 360.0, (ac.latitude, ac.longitude));
            let glideslope_altitude = runway.elevation_ft + (3f64.to_radians()).tan() * along.max(0.0) * FT_PER_NM;
            let excess = ac.altitude_ft - glideslope_altitude;
            if excess > GLIDESLOPE_EXCESS_REJECT_FT && sibling_altitude.is_none() && ac.clearances.maintain_until_established.is_none() {
                return Err(SimError::Validation(
                    "unable ILS approach clearance, aircraft is high; see FAA 7110.65 5-9-2 (descend aircraft or cancel approach clearance)".to_string(),
                ));
            }
        }

        if approach_type == ApproachType::Visual {
            let distance_nm = navigation::haversine_nm(ac.latitude, ac.longitude, airport.position.0, airport.position.1);
            let vfr = vfr_visibility(weather, distance_nm, airport.elevation_ft) == Visibility::Yes;
            let reported_sighted = matches!(
                ac.visual_sight.state,
                crate::aircraft::VisualSightState::FieldSighted | crate::aircraft::VisualSightState::TrafficSighted
            );
            if !vfr || !reported_sighted {
                return Err(SimError::Validation(
                    "unable visual approach clearance; request field sight (rfs) or traffic sight (rts) first".to_string(),
                ));
            }
        }

        Ok(())
    }

    fn validate_handoff(&self, ac: &crate::aircraft::Aircraft, facility: Option<&str>, frequency: Option<f64>, airport: &AirportData) -> SimResult<()> {
        if ac.handoff.handing_off {
            return Err(SimError::Validation("already handing off".to_string()));
        }

        let resolved_facility = facility.map(str::to_string).or_else(|| frequency.and_then(|f| airport.frequencies.facility_for(f)).map(str::to_string));

        let Some(resolved_facility) = resolved_facility else {
            return Err(SimError::PilotUnable("frequency not recognized".to_string()));
        };

        if matches!(resolved_facility.as_str(), "center" | "departure") && ac.handoff.radar_handoff_state != Some(crate::aircraft::RadarHandoffState::Accepted) {
            return Err(SimError::Validation(format!("{resolved_facility} handoff requires an accepted radar handoff first")));
        }

        Ok(())
    }

    /// Accept an offered inbound handoff (controller action outside the
    /// normal command grammar, spec §4.5).
    pub fn accept_inbound_handoff(&self, id: AircraftId, aircraft_manager: &mut AircraftManager, pilot: &mut PilotAI, current_tick: u64) -> SimResult<()> {
        let ac = aircraft_manager.get_mut(id).ok_or_else(|| SimError::MissingEntity(id.to_string()))?;
        if ac.handoff.inbound_handoff != InboundHandoffState::Offered {
            return Err(SimError::Validation("no inbound handoff offered".to_string()));
        }
        pilot.accept_inbound_handoff(ac, current_tick);
        Ok(())
    }
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve_handoff_frequency(sub_commands: &[SubCommand], airport: &AirportData) -> f64 {
    sub_commands
        .iter()
        .find_map(|c| match c {
            SubCommand::Handoff { frequency: Some(f), .. } => Some(*f),
            _ => None,
        })
        .unwrap_or(airport.frequencies.approach)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aircraft::{FlightPlan, WakeCategory};
    use crate::airport::performance::default_performance_database;
    use crate::test_support::sample_airport;

    fn make_manager() -> (AircraftManager, AircraftId) {
        let mut mgr = AircraftManager::new();
        let plan = FlightPlan { origin: "EGLL".to_string(), destination: "EGLL".to_string(), route: vec![], sid: None, star: None, assigned_runway: None, squawk: 1200 };
        let id = mgr.spawn_with_plan("BAW1", "B738", WakeCategory::Large, 51.2, -0.3, 5000.0, 90.0, 250.0, FlightPhase::Cruise, plan, 1);
        (mgr, id)
    }

    #[test]
    fn heading_out_of_range_is_rejected() {
        let (mut mgr, _id) = make_manager();
        let mut pilot = PilotAI::new(1);
        let airport = sample_airport();
        let weather = WeatherConfig::default();
        let perf_db = default_performance_database();
        let executor = CommandExecutor::new();

        let cmd = ControllerCommand { callsign: "BAW1".to_string(), sub_commands: vec![SubCommand::Heading { degrees: 400.0, turn: None }], raw_text: "turn heading 400".to_string() };
        let result = executor.execute(&cmd, &mut mgr, &mut pilot, &airport, &weather, &perf_db, 0);
        assert!(!result.success);
    }

    #[test]
    fn ils_too_high_is_rejected_without_sibling_altitude() {
        let (mut mgr, id) = make_manager();
        {
            let ac = mgr.get_mut(id).unwrap();
            ac.latitude = 51.4775 - (8.0 / 60.0);
            ac.longitude = -0.4614;
            ac.heading_deg = 157.0;
            ac.altitude_ft = 10000.0;
        }
        let mut pilot = PilotAI::new(1);
        let airport = sample_airport();
        let weather = WeatherConfig::default();
        let perf_db = default_performance_database();
        let executor = CommandExecutor::new();

        let cmd = ControllerCommand {
            callsign: "BAW1".to_string(),
            sub_commands: vec![SubCommand::Approach { approach_type: ApproachType::Ils, runway: "16".to_string() }],
            raw_text: "cleared ILS approach runway 16".to_string(),
        };
        let result = executor.execute(&cmd, &mut mgr, &mut pilot, &airport, &weather, &perf_db, 0);
        assert!(!result.success);
    }
}
