//! End-to-end session tests: drives a `Session` through its public API the
//! way a client would, rather than poking at individual modules.

use std::collections::{HashMap, HashSet};

use tracon_sim::aircraft::ApproachType;
use tracon_sim::airport::{AirportData, ApproachProcedure, Frequencies, IlsData, Procedure, ProcedureLeg, Runway, TraconLimits};
use tracon_sim::command::{ControllerCommand, SubCommand};
use tracon_sim::config::{Density, RunwayConfig, ScenarioType, SessionConfig, WeatherConfig};
use tracon_sim::session::{Session, SessionCommand};

fn test_airport() -> AirportData {
    let mut fixes = HashMap::new();
    fixes.insert("LAM".to_string(), (51.2, -0.5));
    fixes.insert("TIMBA".to_string(), (51.3, -0.2));
    fixes.insert("BOGNA".to_string(), (50.9, -0.3));

    AirportData {
        icao: "EGLL".to_string(),
        position: (51.4706, -0.4619),
        elevation_ft: 83.0,
        magnetic_variation_deg: -1.0,
        runways: vec![
            Runway {
                id: "16".to_string(),
                heading_deg: 160.0,
                threshold: (51.4775, -0.4614),
                end: (51.4619, -0.4595),
                length_ft: 12_802.0,
                width_ft: 164.0,
                elevation_ft: 83.0,
                ils: Some(IlsData { course_deg: 160.0, glideslope_deg: 3.0 }),
            },
            Runway {
                id: "34".to_string(),
                heading_deg: 340.0,
                threshold: (51.4619, -0.4595),
                end: (51.4775, -0.4614),
                length_ft: 12_802.0,
                width_ft: 164.0,
                elevation_ft: 83.0,
                ils: Some(IlsData { course_deg: 340.0, glideslope_deg: 3.0 }),
            },
        ],
        fixes,
        sids: vec![Procedure { name: "BOGNA1A".to_string(), runway: Some("34".to_string()), legs: vec![ProcedureLeg { fix: "BOGNA".to_string(), altitude: None }] }],
        stars: vec![Procedure {
            name: "LAM1A".to_string(),
            runway: None,
            legs: vec![ProcedureLeg { fix: "TIMBA".to_string(), altitude: None }, ProcedureLeg { fix: "LAM".to_string(), altitude: None }],
        }],
        approaches: vec![ApproachProcedure {
            runway: "16".to_string(),
            approach_type: ApproachType::Ils,
            missed_approach_altitude_ft: 3000.0,
            missed_approach_legs: vec![ProcedureLeg { fix: "LAM".to_string(), altitude: None }],
        }],
        frequencies: Frequencies { tower: 118.5, ground: 118.525, center: 132.7, approach: 119.725, departure: 120.4 },
        limits: TraconLimits::default(),
    }
}

fn session_config(scenario_type: ScenarioType, seed: u64) -> SessionConfig {
    SessionConfig {
        airport_icao: "EGLL".to_string(),
        density: Density::Heavy,
        scenario_type,
        runway_config: RunwayConfig { arrival_runways: vec!["16".to_string()], departure_runways: vec!["34".to_string()] },
        weather: WeatherConfig::default(),
        rng_seed: Some(seed),
    }
}

/// Property 3: within any snapshot no id appears twice, and ids already
/// retired (no longer present) never reappear in a later snapshot.
#[test]
fn aircraft_ids_never_reused_across_a_long_run() {
    let mut session = Session::new("p3", session_config(ScenarioType::Mixed, 42), test_airport());
    session.start();

    let mut ever_seen: HashSet<u64> = HashSet::new();
    let mut retired: HashSet<u64> = HashSet::new();
    let mut any_spawned = false;

    for _ in 0..400 {
        session.tick();
        let snapshot = session.snapshot();
        let ids: Vec<u64> = snapshot.aircraft.iter().map(|ac| ac.id).collect();
        let current: HashSet<u64> = ids.iter().copied().collect();
        assert_eq!(ids.len(), current.len(), "duplicate id within one snapshot");
        assert!(retired.is_disjoint(&current), "a retired id reappeared");

        for id in ever_seen.difference(&current).copied().collect::<Vec<_>>() {
            retired.insert(id);
        }
        if !current.is_empty() {
            any_spawned = true;
        }
        ever_seen.extend(current);
    }
    assert!(any_spawned);
}

/// Property 1 (partial — heading bound): every snapshot heading stays in
/// `[0, 360)` across a long mixed-traffic run.
#[test]
fn aircraft_headings_stay_in_range_across_a_long_run() {
    let mut session = Session::new("p1", session_config(ScenarioType::Mixed, 7), test_airport());
    session.start();

    for _ in 0..300 {
        session.tick();
        for ac in &session.snapshot().aircraft {
            assert!(ac.heading_deg >= 0.0 && ac.heading_deg < 360.0, "heading {} out of range for {}", ac.heading_deg, ac.callsign);
        }
    }
}

/// Property 9: a successfully executed, non-fast-path command enqueues
/// exactly one pilot readback transmission within the pilot response window.
#[test]
fn successful_command_produces_a_readback_transmission() {
    let mut session = Session::new("p9", session_config(ScenarioType::Arrivals, 1), test_airport());
    session.start();
    session.tick();

    let callsign = session.snapshot().aircraft.first().expect("scenario should have spawned an arrival").callsign.clone();

    session.submit(SessionCommand::Controller(ControllerCommand {
        callsign: callsign.clone(),
        sub_commands: vec![SubCommand::Heading { degrees: 270.0, turn: None }],
        raw_text: "turn left heading two seven zero".to_string(),
    }));

    let mut transmissions = Vec::new();
    for _ in 0..8 {
        transmissions.extend(session.tick());
    }

    assert!(session.last_command_results().iter().any(|r| r.callsign == callsign && r.success));
    assert!(transmissions.iter().any(|t| t.message.contains("turn left heading two seven zero")));
}

/// An unknown callsign is rejected without touching the pipeline's other
/// invariants (no panic, score untouched by a missing-entity rejection other
/// than the flat bad-command penalty).
#[test]
fn command_for_unknown_callsign_is_rejected_cleanly() {
    let mut session = Session::new("unknown", session_config(ScenarioType::Arrivals, 2), test_airport());
    session.start();
    session.tick();

    session.submit(SessionCommand::Controller(ControllerCommand {
        callsign: "GHOST99".to_string(),
        sub_commands: vec![SubCommand::Altitude(6000.0)],
        raw_text: "descend and maintain six thousand".to_string(),
    }));
    session.tick();

    assert_eq!(session.last_command_results().len(), 1);
    let result = &session.last_command_results()[0];
    assert!(!result.success);
    assert!(!result.pilot_unable);
}

/// Pausing freezes the clock but queued commands still apply.
#[test]
fn paused_session_still_applies_queued_commands_but_does_not_advance() {
    let mut session = Session::new("pause", session_config(ScenarioType::Arrivals, 3), test_airport());
    session.start();
    session.tick();
    let tick_before = session.snapshot().tick;

    session.pause();
    session.submit(SessionCommand::Controller(ControllerCommand {
        callsign: "GHOST".to_string(),
        sub_commands: vec![SubCommand::Altitude(5000.0)],
        raw_text: "climb and maintain five thousand".to_string(),
    }));
    let transmissions = session.tick();

    assert!(transmissions.is_empty());
    assert_eq!(session.snapshot().tick, tick_before);
    assert_eq!(session.last_command_results().len(), 1);
}

/// `setTimeScale` rejects anything outside {1, 2, 4} (spec §6).
#[test]
fn set_time_scale_only_accepts_supported_multipliers() {
    let mut session = Session::new("scale", session_config(ScenarioType::Mixed, 4), test_airport());
    assert!(session.set_time_scale(1).is_ok());
    assert!(session.set_time_scale(2).is_ok());
    assert!(session.set_time_scale(4).is_ok());
    assert!(session.set_time_scale(3).is_err());
    assert!(session.set_time_scale(0).is_err());
}
