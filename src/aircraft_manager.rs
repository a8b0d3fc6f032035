//! Owns aircraft lifecycle: spawn ids, the registry, callsign lookup, and
//! cleanup on airspace exit or ground-roll completion (spec §4.2). Adapted
//! from the teacher's `server::controller` aircraft registry, generalized
//! from a fixed CCAMS squawk-range draw to the monotonic allocator of
//! [`crate::config::SquawkAllocator`].

use std::collections::HashMap;

use tracing::info;

use crate::aircraft::{Aircraft, AircraftId, FlightPhase, FlightPlan, WakeCategory};
use crate::airport::AirportData;
use crate::config::SquawkAllocator;
use crate::utils::navigation;

const RUNWAY_ROLLOUT_FRACTION_FOR_GROUND_PHASE: f64 = 2.0 / 3.0;
const TAXI_SPEED_KT: f64 = 16.0;
const GROUND_LINGER_TICKS: u32 = 20;

#[derive(Debug)]
pub struct AircraftManager {
    registry: HashMap<AircraftId, Aircraft>,
    /// Insertion order, used to break callsign substring-match ties
    /// deterministically in favor of the earliest-spawned aircraft
    /// (spec §9, "prefer exact match; otherwise first-insertion-order match").
    insertion_order: Vec<AircraftId>,
    next_id: AircraftId,
    squawks: SquawkAllocator,
    pub airspace_radius_nm: f64,
}

impl AircraftManager {
    pub fn new() -> Self {
        Self { registry: HashMap::new(), insertion_order: Vec::new(), next_id: 1, squawks: SquawkAllocator::default(), airspace_radius_nm: 100.0 }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        &mut self,
        callsign: &str,
        type_designator: &str,
        wake_category: WakeCategory,
        latitude: f64,
        longitude: f64,
        altitude_ft: f64,
        heading_deg: f64,
        speed_kt: f64,
        phase: FlightPhase,
        origin: &str,
        destination: &str,
        route: Vec<String>,
        sid: Option<String>,
        star: Option<String>,
        assigned_runway: Option<String>,
        delay_seed: u64,
    ) -> AircraftId {
        let squawk = self.squawks.next();
        let plan = FlightPlan { origin: origin.to_string(), destination: destination.to_string(), route, sid, star, assigned_runway, squawk };
        self.spawn_with_plan(callsign, type_designator, wake_category, latitude, longitude, altitude_ft, heading_deg, speed_kt, phase, plan, delay_seed)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn spawn_with_plan(
        &mut self,
        callsign: &str,
        type_designator: &str,
        wake_category: WakeCategory,
        latitude: f64,
        longitude: f64,
        altitude_ft: f64,
        heading_deg: f64,
        speed_kt: f64,
        phase: FlightPhase,
        flight_plan: FlightPlan,
        delay_seed: u64,
    ) -> AircraftId {
        let id = self.next_id;
        self.next_id += 1;

        let mut ac = Aircraft::new(id, callsign.to_string(), type_designator.to_string(), wake_category, latitude, longitude, altitude_ft, heading_deg, speed_kt, phase, flight_plan, delay_seed);
        if phase.is_airborne() {
            ac.handoff.first_airborne_tick = Some(0);
        }

        self.registry.insert(id, ac);
        self.insertion_order.push(id);
        info!(callsign, id, "aircraft spawned");
        id
    }

    pub fn get(&self, id: AircraftId) -> Option<&Aircraft> {
        self.registry.get(&id)
    }

    pub fn get_mut(&mut self, id: AircraftId) -> Option<&mut Aircraft> {
        self.registry.get_mut(&id)
    }

    pub fn remove(&mut self, id: AircraftId) -> Option<Aircraft> {
        self.insertion_order.retain(|&existing| existing != id);
        let removed = self.registry.remove(&id);
        if removed.is_some() {
            info!(id, "aircraft removed");
        }
        removed
    }

    pub fn all(&self) -> impl Iterator<Item = &Aircraft> {
        self.registry.values()
    }

    pub fn all_mut(&mut self) -> impl Iterator<Item = &mut Aircraft> {
        self.registry.values_mut()
    }

    pub fn ids(&self) -> Vec<AircraftId> {
        self.insertion_order.clone()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Exact match first; otherwise the first-insertion-order aircraft whose
    /// callsign contains `query` case-insensitively (spec §4.2, §9).
    pub fn find_id_by_callsign(&self, query: &str) -> Option<AircraftId> {
        if let Some(ac) = self.registry.values().find(|ac| ac.callsign == query) {
            return Some(ac.id);
        }
        let query_lower = query.to_lowercase();
        self.insertion_order.iter().copied().find(|id| {
            self.registry.get(id).map(|ac| ac.callsign.to_lowercase().contains(&query_lower)).unwrap_or(false)
        })
    }

    /// Walk the registry and remove aircraft per the landed/airspace rules
    /// (spec §4.2, "Cleanup policy").
    pub fn cleanup(&mut self, airport: &AirportData) -> Vec<AircraftId> {
        let mut to_remove = Vec::new();

        for ac in self.registry.values_mut() {
            if ac.phase == FlightPhase::Landed {
                if let Some(runway_id) = ac.runway_occupying.clone() {
                    if let Some(runway) = airport.runway(&runway_id) {
                        let rollout_fraction = ac.rollout_distance_nm / (runway.length_ft / FT_PER_NM);
                        if rollout_fraction >= RUNWAY_ROLLOUT_FRACTION_FOR_GROUND_PHASE || ac.ground_speed_kt <= TAXI_SPEED_KT {
                            ac.phase = FlightPhase::Ground;
                        }
                    }
                } else {
                    ac.phase = FlightPhase::Ground;
                }
                continue;
            }

            if ac.phase == FlightPhase::Ground {
                ac.ground_linger_ticks += 1;
                if ac.ground_linger_ticks >= GROUND_LINGER_TICKS {
                    to_remove.push(ac.id);
                }
                continue;
            }

            let distance_nm = navigation::haversine_nm(ac.latitude, ac.longitude, airport.position.0, airport.position.1);
            if distance_nm > self.airspace_radius_nm {
                to_remove.push(ac.id);
            }
        }

        for id in &to_remove {
            self.remove(*id);
        }
        to_remove
    }
}

impl Default for AircraftManager {
    fn default() -> Self {
        Self::new()
    }
}

const FT_PER_NM: f64 = 6076.12;

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_test(mgr: &mut AircraftManager, callsign: &str) -> AircraftId {
        mgr.spawn(callsign, "B738", WakeCategory::Large, 51.2, -0.3, 5000.0, 90.0, 250.0, FlightPhase::Cruise, "EGLL", "EGPF", vec![], None, None, None, 1)
    }

    #[test]
    fn callsign_lookup_prefers_exact_match() {
        let mut mgr = AircraftManager::new();
        spawn_test(&mut mgr, "BAW123");
        let second = spawn_test(&mut mgr, "BAW1");
        assert_eq!(mgr.find_id_by_callsign("BAW1"), Some(second));
    }

    #[test]
    fn callsign_lookup_substring_is_case_insensitive() {
        let mut mgr = AircraftManager::new();
        let id = spawn_test(&mut mgr, "BAW123");
        assert_eq!(mgr.find_id_by_callsign("baw"), Some(id));
    }

    #[test]
    fn squawks_are_unique_and_monotonic_across_spawns() {
        let mut mgr = AircraftManager::new();
        let id1 = spawn_test(&mut mgr, "BAW1");
        let id2 = spawn_test(&mut mgr, "BAW2");
        let sq1 = mgr.get(id1).unwrap().flight_plan.squawk;
        let sq2 = mgr.get(id2).unwrap().flight_plan.squawk;
        assert_ne!(sq1, sq2);
    }

    #[test]
    fn aircraft_beyond_airspace_radius_is_removed() {
        let mut mgr = AircraftManager::new();
        mgr.airspace_radius_nm = 50.0;
        let id = spawn_test(&mut mgr, "BAW1");
        mgr.get_mut(id).unwrap().latitude = 55.0;

        let airport = crate::test_support::sample_airport();
        let removed = mgr.cleanup(&airport);
        assert_eq!(removed, vec![id]);
        assert!(mgr.get(id).is_none());
    }

    #[test]
    fn ground_aircraft_lingers_then_is_removed() {
        let mut mgr = AircraftManager::new();
        let id = spawn_test(&mut mgr, "BAW1");
        mgr.get_mut(id).unwrap().phase = FlightPhase::Ground;

        let airport = crate::test_support::sample_airport();
        for _ in 0..(GROUND_LINGER_TICKS - 1) {
            let removed = mgr.cleanup(&airport);
            assert!(removed.is_empty());
        }
        let removed = mgr.cleanup(&airport);
        assert_eq!(removed, vec![id]);
    }
}
