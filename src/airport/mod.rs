//! Static, read-only airport data: runways, fixes, published procedures,
//! frequencies, and TRACON limits (spec §3, "Airport"). This is external
//! collaborator data per spec §1 — the engine only reads it.
//!
//! Loading is adapted from the teacher's `utils/procedures.rs`
//! (`SID:ICAO:RUNWAY:SIDNAME:FIXES` sector-file format) into a structured
//! JSON document, since the underlying sector-file format is EuroScope- and
//! display-layer-specific and out of scope per spec §1.

pub mod performance;

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::aircraft::ApproachType;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IlsData {
    pub course_deg: f64,
    pub glideslope_deg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Runway {
    pub id: String,
    pub heading_deg: f64,
    pub threshold: (f64, f64),
    pub end: (f64, f64),
    pub length_ft: f64,
    pub width_ft: f64,
    pub elevation_ft: f64,
    pub ils: Option<IlsData>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AltitudeConstraintKind {
    AtOrAbove,
    At,
    AtOrBelow,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AltitudeConstraint {
    pub kind: AltitudeConstraintKind,
    pub altitude_ft: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureLeg {
    pub fix: String,
    pub altitude: Option<AltitudeConstraint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    pub name: String,
    pub runway: Option<String>,
    pub legs: Vec<ProcedureLeg>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApproachProcedure {
    pub runway: String,
    pub approach_type: ApproachType,
    pub missed_approach_altitude_ft: f64,
    pub missed_approach_legs: Vec<ProcedureLeg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frequencies {
    pub tower: f64,
    pub ground: f64,
    pub center: f64,
    pub approach: f64,
    pub departure: f64,
}

impl Frequencies {
    /// Resolve a facility name from an observed frequency, within ±0.05 MHz
    /// (spec §4.6, "if facility is unspecified, resolve it by matching the
    /// frequency against the airport's published frequency lists").
    pub fn facility_for(&self, freq_mhz: f64) -> Option<&'static str> {
        let candidates: [(&'static str, f64); 5] = [
            ("tower", self.tower),
            ("ground", self.ground),
            ("center", self.center),
            ("approach", self.approach),
            ("departure", self.departure),
        ];
        candidates
            .iter()
            .find(|(_, f)| (f - freq_mhz).abs() <= 0.05)
            .map(|(name, _)| *name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraconLimits {
    pub lateral_radius_nm: f64,
    pub ceiling_ft: f64,
    pub floor_ft: f64,
    pub mva_ft: f64,
}

impl Default for TraconLimits {
    fn default() -> Self {
        // spec §4.2 (100 nm airspace radius default) and §4.7 (2000 ft MVA default).
        Self { lateral_radius_nm: 100.0, ceiling_ft: 17_000.0, floor_ft: 0.0, mva_ft: 2000.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirportData {
    pub icao: String,
    pub position: (f64, f64),
    pub elevation_ft: f64,
    pub magnetic_variation_deg: f64,
    pub runways: Vec<Runway>,
    pub fixes: HashMap<String, (f64, f64)>,
    pub sids: Vec<Procedure>,
    pub stars: Vec<Procedure>,
    pub approaches: Vec<ApproachProcedure>,
    pub frequencies: Frequencies,
    pub limits: TraconLimits,
}

impl AirportData {
    pub fn runway(&self, id: &str) -> Option<&Runway> {
        self.runways.iter().find(|r| r.id == id)
    }

    pub fn fix_position(&self, name: &str) -> Option<(f64, f64)> {
        self.fixes.get(name).copied()
    }

    pub fn sid(&self, name: &str) -> Option<&Procedure> {
        self.sids.iter().find(|p| p.name == name)
    }

    pub fn star(&self, name: &str) -> Option<&Procedure> {
        self.stars.iter().find(|p| p.name == name)
    }

    pub fn approach(&self, runway: &str, approach_type: ApproachType) -> Option<&ApproachProcedure> {
        self.approaches
            .iter()
            .find(|a| a.runway == runway && a.approach_type == approach_type)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("failed to read airport data: {:?}", path.as_ref()))?;
        let data: AirportData = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse airport data: {:?}", path.as_ref()))?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_airport;

    #[test]
    fn facility_resolves_within_tolerance() {
        let airport = sample_airport();
        assert_eq!(airport.frequencies.facility_for(118.525), Some("ground"));
        assert_eq!(airport.frequencies.facility_for(118.524), Some("ground"));
        assert_eq!(airport.frequencies.facility_for(130.000), None);
    }

    #[test]
    fn runway_lookup_by_id() {
        let airport = sample_airport();
        assert!(airport.runway("16").is_some());
        assert!(airport.runway("99").is_none());
    }
}
