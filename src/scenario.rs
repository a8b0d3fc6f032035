//! Spawns new traffic according to the density schedule and scenario type,
//! deconflicting spawn points against existing aircraft (spec §2, step 1;
//! §6 `createSession` config). Grounded on the teacher's
//! `simulation/simulator.rs` spawn logic (`generate_callsign`,
//! `select_aircraft_type`, `assign_squawk`, `get_cruise_altitude`) and the
//! old `scenario.rs`'s departure/transit schedule shape, now driving
//! [`crate::aircraft_manager::AircraftManager`] directly instead of an FSD
//! pilot-client login.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::aircraft::{AircraftId, FlightPhase, InboundHandoffState, WakeCategory};
use crate::aircraft_manager::AircraftManager;
use crate::airport::performance::{self, PerformanceDatabase};
use crate::airport::AirportData;
use crate::config::{Density, FleetConfig, RunwayConfig, ScenarioType};
use crate::utils::navigation;

/// Minimum separation enforced between a freshly spawned aircraft and any
/// existing traffic, so the generator never hands the controller an
/// instant conflict (spec §2, "deconfliction rules").
const DECONFLICTION_MIN_SPAWN_SEPARATION_NM: f64 = 8.0;

/// Arrivals enter the TRACON boundary this far inside the lateral radius,
/// descending toward a mid-altitude the controller can vector down from.
const ARRIVAL_ENTRY_MARGIN_NM: f64 = 3.0;
const ARRIVAL_ENTRY_ALTITUDE_FT: f64 = 12_000.0;
const ARRIVAL_ENTRY_SPEED_KT: f64 = 250.0;

const DEPARTURE_INITIAL_ALTITUDE_FT: f64 = 0.0;
const DEPARTURE_CRUISE_ALTITUDE_MIN_FT: f64 = 28_000.0;
const DEPARTURE_CRUISE_ALTITUDE_MAX_FT: f64 = 38_000.0;

const SPAWN_INTERVAL_JITTER_FRACTION: f64 = 0.3;

#[derive(Debug)]
pub struct ScenarioGenerator {
    density: Density,
    scenario_type: ScenarioType,
    runway_config: RunwayConfig,
    fleet: FleetConfig,
    rng: StdRng,
    next_spawn_tick: u64,
    spawn_counter: u64,
}

impl ScenarioGenerator {
    pub fn new(density: Density, scenario_type: ScenarioType, runway_config: RunwayConfig, fleet: FleetConfig, seed: u64) -> Self {
        Self {
            density,
            scenario_type,
            runway_config,
            fleet,
            rng: StdRng::seed_from_u64(seed),
            next_spawn_tick: 0,
            spawn_counter: 0,
        }
    }

    /// One tick of the spawn schedule: if due, attempts a single spawn and
    /// reschedules regardless of whether deconfliction vetoed it, so a
    /// crowded airspace doesn't cause spawn attempts to pile up.
    pub fn update(&mut self, current_tick: u64, airport: &AirportData, perf_db: &PerformanceDatabase, aircraft_manager: &mut AircraftManager) {
        if current_tick < self.next_spawn_tick {
            return;
        }
        self.schedule_next(current_tick);

        let spawn_arrival = match self.scenario_type {
            ScenarioType::Arrivals => true,
            ScenarioType::Departures => false,
            ScenarioType::Mixed => self.rng.gen_bool(0.5),
        };

        let spawned = if spawn_arrival {
            self.spawn_arrival(airport, perf_db, aircraft_manager)
        } else {
            self.spawn_departure(airport, perf_db, aircraft_manager)
        };

        if spawned.is_some() {
            self.spawn_counter += 1;
        }
    }

    fn schedule_next(&mut self, current_tick: u64) {
        let base = self.density.spawn_interval_secs();
        let jitter = base * SPAWN_INTERVAL_JITTER_FRACTION;
        let interval_secs = self.rng.gen_range((base - jitter)..=(base + jitter)).max(1.0);
        self.next_spawn_tick = current_tick + interval_secs.round() as u64;
    }

    fn spawn_arrival(&mut self, airport: &AirportData, perf_db: &PerformanceDatabase, aircraft_manager: &mut AircraftManager) -> Option<AircraftId> {
        let runway_id = self.runway_config.arrival_runways.get(self.rng.gen_range(0..self.runway_config.arrival_runways.len().max(1)))?.clone();

        let entry_radius = (airport.limits.lateral_radius_nm - ARRIVAL_ENTRY_MARGIN_NM).max(1.0);
        let bearing_deg = self.rng.gen_range(0.0..360.0);
        let (latitude, longitude) = navigation::position_bearing_distance(airport.position.0, airport.position.1, bearing_deg, entry_radius);

        if self.too_close_to_existing_traffic(latitude, longitude, aircraft_manager) {
            return None;
        }

        let heading_deg = navigation::heading_from_to(latitude, longitude, airport.position.0, airport.position.1);
        let (_, type_designator) = self.pick_airline_and_type(&airport.icao);
        let wake_category = self.wake_category_for(perf_db, &type_designator);
        let callsign = self.generate_callsign(&airport.icao, aircraft_manager);

        let star = airport.stars.first().map(|p| p.name.clone());
        let delay_seed = self.rng.gen();

        let id = aircraft_manager.spawn(
            &callsign,
            &type_designator,
            wake_category,
            latitude,
            longitude,
            ARRIVAL_ENTRY_ALTITUDE_FT,
            heading_deg,
            ARRIVAL_ENTRY_SPEED_KT,
            FlightPhase::Cruise,
            "????",
            &airport.icao,
            Vec::new(),
            None,
            star,
            Some(runway_id),
            delay_seed,
        );

        if let Some(ac) = aircraft_manager.get_mut(id) {
            ac.target_altitude_ft = ARRIVAL_ENTRY_ALTITUDE_FT;
            ac.target_heading_deg = heading_deg;
            ac.target_speed_kt = ARRIVAL_ENTRY_SPEED_KT;
            ac.handoff.inbound_handoff = InboundHandoffState::Offered;
            ac.handoff.inbound_handoff_offered_at = Some(0);
        }

        Some(id)
    }

    fn spawn_departure(&mut self, airport: &AirportData, perf_db: &PerformanceDatabase, aircraft_manager: &mut AircraftManager) -> Option<AircraftId> {
        let runway_id = self.runway_config.departure_runways.get(self.rng.gen_range(0..self.runway_config.departure_runways.len().max(1)))?.clone();
        let runway = airport.runway(&runway_id)?;
        let (latitude, longitude) = runway.threshold;

        if self.too_close_to_existing_traffic(latitude, longitude, aircraft_manager) {
            return None;
        }

        let (_, type_designator) = self.pick_airline_and_type(&airport.icao);
        let wake_category = self.wake_category_for(perf_db, &type_designator);
        let callsign = self.generate_callsign(&airport.icao, aircraft_manager);

        let sid = airport.sids.iter().find(|s| s.runway.as_deref() == Some(runway_id.as_str())).or_else(|| airport.sids.first()).map(|s| s.name.clone());
        let cruise_altitude_ft = self.rng.gen_range(DEPARTURE_CRUISE_ALTITUDE_MIN_FT..=DEPARTURE_CRUISE_ALTITUDE_MAX_FT).round();
        let delay_seed = self.rng.gen();

        let id = aircraft_manager.spawn(
            &callsign,
            &type_designator,
            wake_category,
            latitude,
            longitude,
            DEPARTURE_INITIAL_ALTITUDE_FT,
            runway.heading_deg,
            0.0,
            FlightPhase::Ground,
            &airport.icao,
            "????",
            Vec::new(),
            sid,
            None,
            Some(runway_id),
            delay_seed,
        );

        if let Some(ac) = aircraft_manager.get_mut(id) {
            ac.target_altitude_ft = cruise_altitude_ft;
            ac.target_heading_deg = runway.heading_deg;
            ac.target_speed_kt = performance::lookup(perf_db, &type_designator).map(|p| p.cruise_speed_kt).unwrap_or(280.0);
        }

        Some(id)
    }

    fn too_close_to_existing_traffic(&self, latitude: f64, longitude: f64, aircraft_manager: &AircraftManager) -> bool {
        aircraft_manager
            .all()
            .any(|ac| navigation::haversine_nm(latitude, longitude, ac.latitude, ac.longitude) < DECONFLICTION_MIN_SPAWN_SEPARATION_NM)
    }

    fn pick_airline_and_type(&mut self, icao: &str) -> (String, String) {
        let default_airlines = vec!["BAW".to_string()];
        let airlines = self.fleet.airports.get(icao).filter(|v| !v.is_empty()).unwrap_or(&default_airlines);
        let airline = airlines[self.rng.gen_range(0..airlines.len())].clone();

        let default_types = vec!["A320".to_string()];
        let types = self.fleet.airlines.get(&airline).filter(|v| !v.is_empty()).unwrap_or(&default_types);
        let type_designator = types[self.rng.gen_range(0..types.len())].clone();

        (airline, type_designator)
    }

    fn wake_category_for(&self, perf_db: &PerformanceDatabase, type_designator: &str) -> WakeCategory {
        performance::lookup(perf_db, type_designator)
            .map(|p| p.wake_category)
            .unwrap_or_else(|| performance::fallback_performance(type_designator).wake_category)
    }

    /// Generates a unique callsign from the airport's operating airlines,
    /// retrying up to 100 times against the live registry (teacher's
    /// `generate_callsign`, adapted from a locally tracked set to a direct
    /// registry query since aircraft removal must free the callsign too).
    fn generate_callsign(&mut self, icao: &str, aircraft_manager: &AircraftManager) -> String {
        let default_airlines = vec!["BAW".to_string()];
        let airlines = self.fleet.airports.get(icao).filter(|v| !v.is_empty()).unwrap_or(&default_airlines);

        for _ in 0..100 {
            let airline = &airlines[self.rng.gen_range(0..airlines.len())];
            let flight_num = self.rng.gen_range(1..9999);
            let callsign = format!("{airline}{flight_num:04}");
            if aircraft_manager.find_id_by_callsign(&callsign).is_none() {
                return callsign;
            }
        }

        format!("{}{:04}", airlines[0], self.rng.gen_range(1..9999))
    }

    pub fn spawn_count(&self) -> u64 {
        self.spawn_counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_airport;

    fn generator(scenario_type: ScenarioType) -> ScenarioGenerator {
        let runway_config = RunwayConfig { arrival_runways: vec!["16".to_string()], departure_runways: vec!["34".to_string()] };
        ScenarioGenerator::new(Density::Heavy, scenario_type, runway_config, FleetConfig::default(), 42)
    }

    #[test]
    fn spawns_arrival_with_inbound_handoff_offered() {
        let airport = sample_airport();
        let perf_db = performance::default_performance_database();
        let mut mgr = AircraftManager::new();
        let mut generator = generator(ScenarioType::Arrivals);

        generator.update(0, &airport, &perf_db, &mut mgr);
        assert_eq!(mgr.len(), 1);
        let ac = mgr.all().next().unwrap();
        assert_eq!(ac.handoff.inbound_handoff, InboundHandoffState::Offered);
        assert_eq!(ac.phase, FlightPhase::Cruise);
    }

    #[test]
    fn spawns_departure_on_ground_at_runway_threshold() {
        let airport = sample_airport();
        let perf_db = performance::default_performance_database();
        let mut mgr = AircraftManager::new();
        let mut generator = generator(ScenarioType::Departures);

        generator.update(0, &airport, &perf_db, &mut mgr);
        assert_eq!(mgr.len(), 1);
        let ac = mgr.all().next().unwrap();
        assert_eq!(ac.phase, FlightPhase::Ground);
        assert!(ac.on_ground);
    }

    #[test]
    fn deconfliction_blocks_spawn_on_top_of_existing_traffic() {
        let airport = sample_airport();
        let perf_db = performance::default_performance_database();
        let mut mgr = AircraftManager::new();
        mgr.spawn("BAW1", "B738", WakeCategory::Large, airport.runway("34").unwrap().threshold.0, airport.runway("34").unwrap().threshold.1, 0.0, 340.0, 0.0, FlightPhase::Ground, "EGLL", "????", vec![], None, None, Some("34".to_string()), 1);

        let mut generator = generator(ScenarioType::Departures);
        generator.update(0, &airport, &perf_db, &mut mgr);
        assert_eq!(mgr.len(), 1);
    }
}
