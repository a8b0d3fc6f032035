//! Shared fixtures for unit tests across modules. Not compiled into release
//! builds; gated behind `#[cfg(test)]` in `lib.rs`.

use std::collections::HashMap;

use crate::aircraft::ApproachType;
use crate::airport::{
    AirportData, ApproachProcedure, Frequencies, IlsData, Procedure, ProcedureLeg, Runway, TraconLimits,
};

/// A small single-runway airport used by unit tests across modules.
pub fn sample_airport() -> AirportData {
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
        sids: vec![Procedure {
            name: "BOGNA1A".to_string(),
            runway: Some("34".to_string()),
            legs: vec![ProcedureLeg { fix: "BOGNA".to_string(), altitude: None }],
        }],
        stars: vec![Procedure {
            name: "LAM1A".to_string(),
            runway: None,
            legs: vec![
                ProcedureLeg { fix: "TIMBA".to_string(), altitude: None },
                ProcedureLeg { fix: "LAM".to_string(), altitude: None },
            ],
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
