//! Owns one sandbox's full engine state and drives the fixed-rate tick
//! pipeline (spec §2, §4.1, §6). Grounded on the teacher's
//! `simulation/simulator.rs` `Simulator::run` `tokio::select!` loop,
//! generalized from its single hardcoded airport and FSD pilot-client loop
//! to the engine's fixed nine-step pipeline over a configurable session.

use std::collections::{HashSet, VecDeque};

use tokio::sync::{broadcast, mpsc};
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::{info, warn};

use crate::aircraft::{Aircraft, AircraftId, FlightPhase, InboundHandoffState};
use crate::aircraft_manager::AircraftManager;
use crate::airport::performance::{self, PerformanceDatabase};
use crate::airport::AirportData;
use crate::clock::{Clock, TimeScale};
use crate::command::{CommandResult, ControllerCommand};
use crate::command_executor::CommandExecutor;
use crate::conflict::ConflictDetector;
use crate::config::{FleetConfig, RunwayConfig, SessionConfig, WeatherConfig};
use crate::error::{SimError, SimResult};
use crate::physics::PhysicsEngine;
use crate::pilot::flight_plan_executor;
use crate::pilot::flight_plan_executor::TrafficSnapshot;
use crate::pilot::PilotAI;
use crate::radio::{PlaintextRadioFormatter, RadioFormatter, RadioTransmission};
use crate::scenario::ScenarioGenerator;
use crate::scoring::ScoringEngine;
use crate::snapshot::{AircraftSnapshot, StateSnapshot};

/// Flat penalty for a rejected command that isn't a pilot-unable response
/// (spec §4.8's handoff/violation penalties are specific dollar amounts;
/// this is the generic "bad instruction" deduction).
const BAD_COMMAND_PENALTY_POINTS: f64 = 2.0;

/// A command submitted to a running session (spec §6): either a parsed
/// controller instruction or the out-of-band inbound-handoff accept action,
/// which doesn't fit the `SubCommand` grammar since it targets an aircraft
/// not yet on frequency.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    Controller(ControllerCommand),
    AcceptInboundHandoff(AircraftId),
}

/// One sandbox's engine state: the clock, the aircraft registry, every
/// per-tick subsystem, and the static airport/config it was created with
/// (spec §6, `createSession`).
pub struct Session {
    id: String,
    clock: Clock,
    aircraft_manager: AircraftManager,
    pilot: PilotAI,
    physics: PhysicsEngine,
    conflict: ConflictDetector,
    executor: CommandExecutor,
    scenario: ScenarioGenerator,
    scoring: ScoringEngine,
    airport: AirportData,
    weather: WeatherConfig,
    runway_config: RunwayConfig,
    perf_db: PerformanceDatabase,
    formatter: Box<dyn RadioFormatter + Send + Sync>,
    command_queue: VecDeque<SessionCommand>,
    last_command_results: Vec<CommandResult>,
    last_radio: Vec<RadioTransmission>,
}

impl Session {
    pub fn new(id: impl Into<String>, config: SessionConfig, airport: AirportData) -> Self {
        Self::with_formatter(id, config, airport, Box::new(PlaintextRadioFormatter))
    }

    pub fn with_formatter(
        id: impl Into<String>,
        config: SessionConfig,
        airport: AirportData,
        formatter: Box<dyn RadioFormatter + Send + Sync>,
    ) -> Self {
        let seed = config.rng_seed.unwrap_or(0);
        let scenario = ScenarioGenerator::new(config.density, config.scenario_type, config.runway_config.clone(), FleetConfig::default(), seed);

        Self {
            id: id.into(),
            clock: Clock::new(),
            aircraft_manager: AircraftManager::new(),
            pilot: PilotAI::new(seed),
            physics: PhysicsEngine::new(),
            conflict: ConflictDetector::new(),
            executor: CommandExecutor::new(),
            scenario,
            scoring: ScoringEngine::new(),
            airport,
            weather: config.weather,
            runway_config: config.runway_config,
            perf_db: performance::default_performance_database(),
            formatter,
            command_queue: VecDeque::new(),
            last_command_results: Vec::new(),
            last_radio: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn start(&mut self) {
        self.clock.start();
        info!(session = %self.id, "session started");
    }

    pub fn pause(&mut self) {
        self.clock.pause();
    }

    pub fn resume(&mut self) {
        self.clock.resume();
    }

    pub fn end(&mut self) {
        self.clock.stop();
        info!(session = %self.id, "session ended");
    }

    pub fn set_time_scale(&mut self, multiplier: u32) -> SimResult<()> {
        let scale = TimeScale::from_multiplier(multiplier)
            .ok_or_else(|| SimError::Validation(format!("unsupported time scale multiplier {multiplier}")))?;
        self.clock.set_time_scale(scale);
        Ok(())
    }

    pub fn submit(&mut self, command: SessionCommand) {
        self.command_queue.push_back(command);
    }

    pub fn last_command_results(&self) -> &[CommandResult] {
        &self.last_command_results
    }

    /// One full pipeline tick (spec §2): apply queued commands, spawn
    /// traffic, run pilot AI, step physics, detect conflicts, clean up,
    /// score, advance the clock, and release matured radio transmissions.
    /// Queued commands still apply while paused or stopped; everything else
    /// is skipped.
    pub fn tick(&mut self) -> Vec<RadioTransmission> {
        self.apply_queued_commands();

        if !self.clock.should_tick() {
            return Vec::new();
        }

        let current_tick = self.clock.tick_count;

        self.scenario.update(current_tick, &self.airport, &self.perf_db, &mut self.aircraft_manager);
        self.update_pilots(current_tick);
        self.step_physics(current_tick);
        self.detect_conflicts(current_tick);
        self.cleanup();
        self.update_scoring(current_tick);

        self.clock.advance();

        let transmissions = self.drain_radio(current_tick);
        self.last_radio = transmissions.clone();
        transmissions
    }

    fn apply_queued_commands(&mut self) {
        self.last_command_results.clear();
        let current_tick = self.clock.tick_count;

        while let Some(command) = self.command_queue.pop_front() {
            match command {
                SessionCommand::Controller(cmd) => {
                    let result = self.executor.execute(
                        &cmd,
                        &mut self.aircraft_manager,
                        &mut self.pilot,
                        &self.airport,
                        &self.weather,
                        &self.perf_db,
                        current_tick,
                    );

                    if result.success {
                        self.scoring.record_command();
                    } else if result.pilot_unable {
                        let reason = result.error.clone().unwrap_or_default();
                        if let Some(id) = self.aircraft_manager.find_id_by_callsign(&cmd.callsign) {
                            if let Some(ac) = self.aircraft_manager.get(id) {
                                self.pilot.enqueue_unable(ac, self.formatter.as_ref(), &reason, current_tick);
                            }
                        }
                    } else {
                        self.scoring.record_bad_command(BAD_COMMAND_PENALTY_POINTS);
                    }

                    self.last_command_results.push(result);
                }
                SessionCommand::AcceptInboundHandoff(id) => {
                    if let Err(err) = self.executor.accept_inbound_handoff(id, &mut self.aircraft_manager, &mut self.pilot, current_tick) {
                        warn!(session = %self.id, %err, "inbound handoff accept rejected");
                    }
                }
            }
        }
    }

    /// Per-aircraft behavioral update: drains pending commands, advances the
    /// handoff/sight state machines, runs the flight plan executor, and
    /// applies any go-around it raises (spec §4.5, §4.4).
    fn update_pilots(&mut self, current_tick: u64) {
        // Snapshot every aircraft's track by callsign before the mutable
        // per-aircraft loop below, since the flight plan executor needs to
        // read another aircraft's position (visual-approach fall-in-behind
        // vectoring, spec §4.4) while this aircraft is mutably borrowed.
        let traffic: std::collections::HashMap<String, TrafficSnapshot> = self
            .aircraft_manager
            .ids()
            .into_iter()
            .filter_map(|id| self.aircraft_manager.get(id))
            .map(|ac| {
                (
                    ac.callsign.to_uppercase(),
                    TrafficSnapshot { latitude: ac.latitude, longitude: ac.longitude, heading_deg: ac.heading_deg, wake_category: ac.wake_category },
                )
            })
            .collect();

        for id in self.aircraft_manager.ids() {
            let Some(type_designator) = self.aircraft_manager.get(id).map(|ac| ac.type_designator.clone()) else { continue };
            let perf = performance::lookup(&self.perf_db, &type_designator).cloned().unwrap_or_else(|| performance::fallback_performance(&type_designator));

            let go_around_reasons = {
                let Some(ac) = self.aircraft_manager.get_mut(id) else { continue };
                self.pilot.update(ac, &self.airport, &self.weather, &perf, &traffic, current_tick)
            };

            for reason in go_around_reasons {
                self.apply_go_around(id, &reason, current_tick);
            }
        }

        for (id, delay_seconds) in std::mem::take(&mut self.pilot.newly_handed_off) {
            let _ = id;
            self.scoring.record_aircraft_handled(delay_seconds);
        }
    }

    /// The go-around effect (spec §4.4): resolve the runway/missed-approach
    /// altitude/pattern-speed the pilot layer can't reach on its own, then
    /// apply it. Silently drops the trigger if the aircraft no longer has a
    /// resolvable runway (already cleaned up this tick, or never assigned
    /// one) rather than panicking mid-pipeline.
    fn apply_go_around(&mut self, id: AircraftId, reason: &str, current_tick: u64) {
        let Some(ac) = self.aircraft_manager.get(id) else { return };
        let runway_id = ac.clearances.approach.as_ref().map(|a| a.runway.clone()).or_else(|| ac.flight_plan.assigned_runway.clone());
        let approach_type = ac.clearances.approach.as_ref().map(|a| a.approach_type);
        let frequency = ac.clearances.handoff_frequency.unwrap_or(self.airport.frequencies.approach);
        let type_designator = ac.type_designator.clone();
        let callsign = ac.callsign.clone();

        let Some(runway_id) = runway_id else {
            warn!(session = %self.id, aircraft = %callsign, "go-around triggered with no resolvable runway");
            return;
        };
        let Some(runway_heading_deg) = self.airport.runway(&runway_id).map(|r| r.heading_deg) else { return };

        let approach_procedure = approach_type.and_then(|t| self.airport.approach(&runway_id, t));
        let missed_altitude = flight_plan_executor::missed_approach_altitude(approach_procedure, self.airport.elevation_ft);
        let perf = performance::lookup(&self.perf_db, &type_designator).cloned().unwrap_or_else(|| performance::fallback_performance(&type_designator));

        let Some(ac) = self.aircraft_manager.get_mut(id) else { return };
        self.pilot.execute_go_around(ac, reason, missed_altitude, runway_heading_deg, perf.vapp, current_tick, frequency);
    }

    /// Advances every aircraft's kinematics by one simulated second
    /// (spec §4.3), resolving the runway each aircraft is rolling on or
    /// established toward for the centerline-snap and ground-roll paths.
    fn step_physics(&mut self, _current_tick: u64) {
        for id in self.aircraft_manager.ids() {
            let Some((type_designator, runway_id)) = self.aircraft_manager.get(id).map(|ac| {
                let runway_id = if ac.on_ground {
                    ac.flight_plan.assigned_runway.clone()
                } else if ac.approach_state.on_localizer {
                    ac.clearances.approach.as_ref().map(|a| a.runway.clone())
                } else {
                    None
                };
                (ac.type_designator.clone(), runway_id)
            }) else {
                continue;
            };

            let perf = performance::lookup(&self.perf_db, &type_designator).cloned().unwrap_or_else(|| performance::fallback_performance(&type_designator));
            let runway = runway_id.as_deref().and_then(|r| self.airport.runway(r)).cloned();

            let Some(ac) = self.aircraft_manager.get_mut(id) else { continue };
            self.physics.step(ac, &perf, &self.weather.wind_layers, 1.0, runway.as_ref());
        }
    }

    /// Runs separation/MSAW/wake/runway/airspace checks and applies any
    /// go-around trigger they raise (spec §4.7).
    fn detect_conflicts(&mut self, current_tick: u64) {
        let go_around_ids = {
            let aircraft_refs: Vec<&Aircraft> = self.aircraft_manager.all().collect();
            self.conflict.update(&aircraft_refs, &self.airport, current_tick)
        };
        for id in go_around_ids {
            self.apply_go_around(id, "conflict avoidance", current_tick);
        }
    }

    /// Removes landed-and-taxied, ground-lingered, and airspace-exceeded
    /// aircraft (spec §4.2), crediting a missed handoff to any aircraft
    /// removed while it still owed one.
    fn cleanup(&mut self) {
        let pending_handoff: HashSet<AircraftId> = self
            .aircraft_manager
            .all()
            .filter(|ac| !ac.handoff.handing_off && ac.handoff.inbound_handoff != InboundHandoffState::Accepted && ac.phase != FlightPhase::Ground)
            .map(|ac| ac.id)
            .collect();

        for id in self.aircraft_manager.cleanup(&self.airport) {
            self.pilot.forget(id);
            if pending_handoff.contains(&id) {
                self.scoring.record_missed_handoff();
            }
        }
    }

    /// Feeds this tick's alerts and handoff timing into the scoring engine
    /// and recomputes the overall score (spec §4.8).
    fn update_scoring(&mut self, current_tick: u64) {
        let active_keys: HashSet<String> = self.conflict.active_alerts().map(|alert| alert.id.clone()).collect();
        for alert in self.conflict.active_alerts() {
            self.scoring.record_alert(alert);
        }
        self.scoring.sync_active_violations(&active_keys);
        self.scoring.accrue_violation_duration();

        let aircraft_refs: Vec<&Aircraft> = self.aircraft_manager.all().collect();
        self.scoring.check_handoff_penalties(&aircraft_refs, &self.airport, current_tick);
        drop(aircraft_refs);

        self.scoring.update();
    }

    fn drain_radio(&mut self, current_tick: u64) -> Vec<RadioTransmission> {
        let mut transmissions = Vec::new();
        for id in self.aircraft_manager.ids() {
            transmissions.extend(self.pilot.drain_radio(id, current_tick));
        }
        transmissions
    }

    /// A point-in-time view of every field a client needs to render one
    /// frame (spec §6).
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            session_id: self.id.clone(),
            tick: self.clock.tick_count,
            sim_time_ms: self.clock.sim_time_ms,
            time_scale: self.clock.time_scale,
            running: self.clock.running,
            paused: self.clock.paused,
            aircraft: self.aircraft_manager.all().map(AircraftSnapshot::from).collect(),
            weather: self.weather.clone(),
            runway_config: self.runway_config.clone(),
            alerts: self.conflict.active_alerts().cloned().collect(),
            score: self.scoring.metrics().clone(),
            atis_text: format_atis(&self.weather),
            limits: self.airport.limits,
            radio: self.last_radio.clone(),
        }
    }

    /// Drives the session on its own wall-clock timer (spec §4.1),
    /// forwarding submitted commands and publishing a snapshot after every
    /// tick. Re-creates the interval whenever the time scale changes
    /// mid-loop, since `tokio::time::interval`'s period is fixed at
    /// construction.
    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
        snapshots: mpsc::UnboundedSender<StateSnapshot>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let mut current_scale = self.clock.time_scale;
        let mut interval = time::interval(Duration::from_millis(current_scale.fire_interval_ms()));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!(session = %self.id, "session shutting down");
                    break;
                }
                Some(command) = commands.recv() => {
                    self.submit(command);
                }
                _ = interval.tick() => {
                    self.tick();
                    if snapshots.send(self.snapshot()).is_err() {
                        break;
                    }
                    if self.clock.time_scale != current_scale {
                        current_scale = self.clock.time_scale;
                        interval = time::interval(Duration::from_millis(current_scale.fire_interval_ms()));
                        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    }
                }
            }
        }

        Ok(())
    }
}

/// Synthesizes a minimal ATIS string from the weather config (spec §6).
/// Full phraseology generation is out of scope; this mirrors the same
/// "format a protocol string from state" shape [`RadioFormatter`] uses.
fn format_atis(weather: &WeatherConfig) -> String {
    let (direction, speed) = weather.wind_layers.first().map(|w| (w.direction_deg, w.speed_kt)).unwrap_or((0.0, 0.0));
    format!(
        "information {}, wind {:03.0} at {:.0}, visibility {:.0}, altimeter {:.2}",
        weather.atis_letter, direction, speed, weather.visibility_sm, weather.altimeter_inhg
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aircraft::ApproachType;
    use crate::command::SubCommand;
    use crate::config::{Density, RunwayConfig, ScenarioType};
    use crate::test_support::sample_airport;

    fn session_config() -> SessionConfig {
        SessionConfig {
            airport_icao: "EGLL".to_string(),
            density: Density::Light,
            scenario_type: ScenarioType::Arrivals,
            runway_config: RunwayConfig { arrival_runways: vec!["16".to_string()], departure_runways: vec!["34".to_string()] },
            weather: WeatherConfig::default(),
            rng_seed: Some(7),
        }
    }

    #[test]
    fn tick_does_nothing_until_started() {
        let mut session = Session::new("s1", session_config(), sample_airport());
        let transmissions = session.tick();
        assert!(transmissions.is_empty());
        assert_eq!(session.clock.tick_count, 0);
    }

    #[test]
    fn started_session_spawns_traffic_and_advances_clock() {
        let mut session = Session::new("s1", session_config(), sample_airport());
        session.start();
        for _ in 0..5 {
            session.tick();
        }
        assert_eq!(session.clock.tick_count, 5);
        assert!(!session.aircraft_manager.is_empty());
    }

    #[test]
    fn set_time_scale_rejects_unsupported_multiplier() {
        let mut session = Session::new("s1", session_config(), sample_airport());
        assert!(session.set_time_scale(3).is_err());
        assert!(session.set_time_scale(2).is_ok());
    }

    #[test]
    fn unknown_callsign_command_is_rejected_without_panicking() {
        let mut session = Session::new("s1", session_config(), sample_airport());
        session.start();
        session.submit(SessionCommand::Controller(ControllerCommand {
            callsign: "GHOST1".to_string(),
            sub_commands: vec![SubCommand::Altitude(5000.0)],
            raw_text: "climb and maintain five thousand".to_string(),
        }));
        session.tick();
        assert_eq!(session.last_command_results().len(), 1);
        assert!(!session.last_command_results()[0].success);
    }

    #[test]
    fn accept_inbound_handoff_on_missing_aircraft_does_not_panic() {
        let mut session = Session::new("s1", session_config(), sample_airport());
        session.start();
        session.submit(SessionCommand::AcceptInboundHandoff(9999));
        session.tick();
    }

    #[test]
    fn snapshot_reflects_current_tick_and_score() {
        let mut session = Session::new("s1", session_config(), sample_airport());
        session.start();
        session.tick();
        let snap = session.snapshot();
        assert_eq!(snap.tick, 1);
        assert_eq!(snap.score.overall_score, 100.0);
    }

    #[test]
    fn go_around_applies_even_with_no_active_approach_clearance() {
        let mut session = Session::new("s1", session_config(), sample_airport());
        session.start();
        session.tick();
        let id = session.aircraft_manager.ids()[0];
        if let Some(ac) = session.aircraft_manager.get_mut(id) {
            ac.flight_plan.assigned_runway = Some("16".to_string());
        }
        session.apply_go_around(id, "test trigger", session.clock.tick_count);
        let ac = session.aircraft_manager.get(id).unwrap();
        assert_eq!(ac.phase, FlightPhase::Missed);
        let _ = ApproachType::Ils;
    }
}
