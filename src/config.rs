use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::utils::navigation::WindLayer;

/// Traffic density, consumed by `ScenarioGenerator` to scale spawn interval
/// (spec §6, `createSession` config).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Density {
    Light,
    Moderate,
    Heavy,
}

impl Density {
    /// Mean seconds between spawn attempts at this density.
    pub fn spawn_interval_secs(&self) -> f64 {
        match self {
            Density::Light => 180.0,
            Density::Moderate => 90.0,
            Density::Heavy => 45.0,
        }
    }
}

/// Which population the scenario generator spawns (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioType {
    Arrivals,
    Departures,
    Mixed,
}

/// Active runway assignment for the session (spec §6, `runwayConfig`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunwayConfig {
    pub arrival_runways: Vec<String>,
    pub departure_runways: Vec<String>,
}

/// Weather, consumed by `FlightPlanExecutor`'s visibility rule (spec §4.4)
/// and `PhysicsEngine`'s wind interpolation (spec §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherConfig {
    pub wind_layers: Vec<WindLayer>,
    pub altimeter_inhg: f64,
    pub temperature_c: f64,
    pub visibility_sm: f64,
    pub ceiling_ft: Option<f64>,
    pub atis_letter: char,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            wind_layers: vec![WindLayer { altitude_ft: 0.0, direction_deg: 270.0, speed_kt: 10.0 }],
            altimeter_inhg: 29.92,
            temperature_c: 15.0,
            visibility_sm: 10.0,
            ceiling_ft: None,
            atis_letter: 'A',
        }
    }
}

/// The parameters of `createSession` (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub airport_icao: String,
    pub density: Density,
    pub scenario_type: ScenarioType,
    pub runway_config: RunwayConfig,
    pub weather: WeatherConfig,
    /// Seeds the scenario generator and the pilot/radio delay draws, so a
    /// test harness gets a reproducible run (spec §5, determinism).
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

/// Fleet configuration (which airlines fly which aircraft)
#[derive(Debug, Clone)]
pub struct FleetConfig {
    pub airlines: HashMap<String, Vec<String>>,
    pub airports: HashMap<String, Vec<String>>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        let mut airlines = HashMap::new();
        airlines.insert("RYR".to_string(), vec!["B738".to_string(), "B38M".to_string(), "A320".to_string()]);
        airlines.insert("BAW".to_string(), vec![
            "A319".to_string(), "A320".to_string(), "A321".to_string(), 
            "A20N".to_string(), "A21N".to_string(), "A35K".to_string(), 
            "A388".to_string(), "B772".to_string(), "B788".to_string(), 
            "B789".to_string(), "B78X".to_string()
        ]);
        airlines.insert("EZY".to_string(), vec![
            "A319".to_string(), "A320".to_string(), "A321".to_string(),
            "A20N".to_string(), "A21N".to_string()
        ]);
        airlines.insert("WZZ".to_string(), vec![
            "A320".to_string(), "A321".to_string(), 
            "A20N".to_string(), "A21N".to_string()
        ]);

        let mut airports = HashMap::new();
        airports.insert("EGLL".to_string(), vec![
            "BAW".to_string(), "DLH".to_string(), "EIN".to_string(), 
            "AFR".to_string(), "KLM".to_string(), "UAE".to_string()
        ]);
        airports.insert("EGKK".to_string(), vec![
            "RYR".to_string(), "BAW".to_string(), "EZY".to_string(), 
            "WZZ".to_string(), "DLH".to_string()
        ]);
        airports.insert("EGSS".to_string(), vec![
            "RYR".to_string(), "EZY".to_string(), "WZZ".to_string()
        ]);
        airports.insert("EGGW".to_string(), vec![
            "RYR".to_string(), "EZY".to_string(), "WZZ".to_string()
        ]);
        airports.insert("EGLC".to_string(), vec![
            "BAW".to_string(), "KLM".to_string()
        ]);
        // Add foreign origin airports for transits
        airports.insert("EHAM".to_string(), vec![
            "KLM".to_string(), "BAW".to_string(), "EZY".to_string()
        ]);
        airports.insert("EBBR".to_string(), vec![
            "BAW".to_string(), "DLH".to_string()
        ]);
        airports.insert("EKYT".to_string(), vec![
            "BAW".to_string(), "EZY".to_string()
        ]);
        airports.insert("EGCC".to_string(), vec![
            "BAW".to_string(), "RYR".to_string(), "EZY".to_string()
        ]);
        airports.insert("ESSA".to_string(), vec![
            "BAW".to_string(), "KLM".to_string()
        ]);
        airports.insert("EDDF".to_string(), vec![
            "DLH".to_string(), "BAW".to_string()
        ]);

        Self {
            airlines,
            airports,
        }
    }
}

/// A squawk is valid (spec §4.2) when every digit is an octal digit (≤ 7).
fn is_valid_octal_squawk(code: u16) -> bool {
    let mut n = code;
    while n > 0 {
        if n % 10 > 7 {
            return false;
        }
        n /= 10;
    }
    true
}

/// Monotonic squawk allocator: hands out codes in `[1201, 7777]`, skipping
/// any value with a non-octal digit, wrapping back to 1201 on overflow
/// (spec §4.2). Replaces the teacher's `get_ccams_squawks` fixed-range-list
/// draw, which picked uniformly from a precomputed list; this keeps the same
/// "precomputed valid-octal range" shape but advances a cursor instead of
/// sampling, since the allocation policy here must be monotonic rather than
/// random.
#[derive(Debug, Clone)]
pub struct SquawkAllocator {
    next: u16,
}

const SQUAWK_MIN: u16 = 1201;
const SQUAWK_MAX: u16 = 7777;

impl Default for SquawkAllocator {
    fn default() -> Self {
        Self { next: SQUAWK_MIN }
    }
}

impl SquawkAllocator {
    pub fn next(&mut self) -> u16 {
        loop {
            let candidate = self.next;
            self.next = if self.next >= SQUAWK_MAX { SQUAWK_MIN } else { self.next + 1 };
            if is_valid_octal_squawk(candidate) {
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn squawk_allocator_skips_non_octal_digits() {
        let mut alloc = SquawkAllocator::default();
        for _ in 0..50 {
            let code = alloc.next();
            assert!(is_valid_octal_squawk(code));
            assert!((SQUAWK_MIN..=SQUAWK_MAX).contains(&code));
        }
    }

    #[test]
    fn squawk_allocator_is_monotonic_until_wrap() {
        let mut alloc = SquawkAllocator::default();
        let first = alloc.next();
        let second = alloc.next();
        assert!(second > first);
    }

    #[test]
    fn squawk_allocator_wraps_on_overflow() {
        let mut alloc = SquawkAllocator { next: SQUAWK_MAX };
        let last = alloc.next();
        assert_eq!(last, SQUAWK_MAX);
        let wrapped = alloc.next();
        assert_eq!(wrapped, SQUAWK_MIN);
    }

    #[test]
    fn density_spawn_interval_scales_with_traffic() {
        assert!(Density::Heavy.spawn_interval_secs() < Density::Moderate.spawn_interval_secs());
        assert!(Density::Moderate.spawn_interval_secs() < Density::Light.spawn_interval_secs());
    }
}
