//! Aircraft performance envelopes: speed limits and climb/descent rate
//! tables keyed by type designator. Adapted from the teacher's
//! `utils/performance.rs` altitude-banded lookup (`PERFLINE`/`PERFAC`
//! sector-file format) into a fixed four-anchor climb-rate curve and an
//! explicit speed envelope, per spec §3 invariant 5 and §4.3.

use std::collections::HashMap;

/// Climb rate (ft/min) anchors at 0 / 10,000 / 24,000 / 35,000 ft, per
/// spec §4.3 ("piecewise linear between 0/10k/24k/35k anchor rates").
#[derive(Debug, Clone, Copy)]
pub struct ClimbRateAnchors {
    pub at_0ft: f64,
    pub at_10000ft: f64,
    pub at_24000ft: f64,
    pub at_35000ft: f64,
}

impl ClimbRateAnchors {
    pub fn interpolate(&self, altitude_ft: f64) -> f64 {
        let anchors = [
            (0.0, self.at_0ft),
            (10_000.0, self.at_10000ft),
            (24_000.0, self.at_24000ft),
            (35_000.0, self.at_35000ft),
        ];
        if altitude_ft <= anchors[0].0 {
            return anchors[0].1;
        }
        if altitude_ft >= anchors[3].0 {
            return anchors[3].1;
        }
        for pair in anchors.windows(2) {
            let (lo, hi) = (pair[0], pair[1]);
            if altitude_ft >= lo.0 && altitude_ft <= hi.0 {
                let t = (altitude_ft - lo.0) / (hi.0 - lo.0);
                return lo.1 + t * (hi.1 - lo.1);
            }
        }
        anchors[3].1
    }
}

/// Full performance profile for one type designator.
#[derive(Debug, Clone)]
pub struct AircraftPerformance {
    pub type_designator: String,
    pub wake_category: crate::aircraft::WakeCategory,
    /// Minimum speed with flaps/slats extended, kt.
    pub vmin_flaps: f64,
    /// Maximum operating speed, kt.
    pub vmo: f64,
    /// Reference approach speed, kt.
    pub vapp: f64,
    /// Maximum permitted speed below 10,000 ft MSL, kt (spec §3 invariant 5).
    pub vmax_below_10k: f64,
    pub cruise_speed_kt: f64,
    pub climb_rate: ClimbRateAnchors,
    pub descent_rate_fpm: f64,
    pub ceiling_ft: f64,
}

impl AircraftPerformance {
    pub fn clamp_speed(&self, speed_kt: f64, altitude_ft: f64) -> f64 {
        let ceiling = if altitude_ft < 10_000.0 {
            self.vmax_below_10k.min(self.vmo)
        } else {
            self.vmo
        };
        speed_kt.clamp(self.vmin_flaps, ceiling)
    }
}

pub type PerformanceDatabase = HashMap<String, AircraftPerformance>;

fn line(
    type_designator: &str,
    wake: crate::aircraft::WakeCategory,
    vmin_flaps: f64,
    vmo: f64,
    vapp: f64,
    cruise: f64,
    climb: ClimbRateAnchors,
    descent_fpm: f64,
    ceiling_ft: f64,
) -> AircraftPerformance {
    AircraftPerformance {
        type_designator: type_designator.to_string(),
        wake_category: wake,
        vmin_flaps,
        vmo,
        vapp,
        vmax_below_10k: 250.0,
        cruise_speed_kt: cruise,
        climb_rate: climb,
        descent_rate_fpm: descent_fpm,
        ceiling_ft,
    }
}

/// Baseline performance database covering the type designators the teacher's
/// fleet configuration references (`config.rs`'s `FleetConfig`).
pub fn default_performance_database() -> PerformanceDatabase {
    use crate::aircraft::WakeCategory::*;

    let mut db = HashMap::new();
    db.insert(
        "B738".to_string(),
        line(
            "B738",
            Large,
            130.0,
            340.0,
            140.0,
            450.0,
            ClimbRateAnchors { at_0ft: 2800.0, at_10000ft: 2200.0, at_24000ft: 1400.0, at_35000ft: 700.0 },
            1800.0,
            41000.0,
        ),
    );
    db.insert(
        "A320".to_string(),
        line(
            "A320",
            Large,
            128.0,
            350.0,
            138.0,
            450.0,
            ClimbRateAnchors { at_0ft: 2700.0, at_10000ft: 2100.0, at_24000ft: 1350.0, at_35000ft: 650.0 },
            1800.0,
            39000.0,
        ),
    );
    db.insert(
        "A321".to_string(),
        line(
            "A321",
            Large,
            132.0,
            350.0,
            141.0,
            450.0,
            ClimbRateAnchors { at_0ft: 2500.0, at_10000ft: 1900.0, at_24000ft: 1200.0, at_35000ft: 600.0 },
            1800.0,
            39000.0,
        ),
    );
    db.insert(
        "B772".to_string(),
        line(
            "B772",
            Heavy,
            140.0,
            330.0,
            148.0,
            490.0,
            ClimbRateAnchors { at_0ft: 2400.0, at_10000ft: 1900.0, at_24000ft: 1200.0, at_35000ft: 500.0 },
            1600.0,
            43100.0,
        ),
    );
    db.insert(
        "A388".to_string(),
        line(
            "A388",
            Super,
            145.0,
            340.0,
            150.0,
            490.0,
            ClimbRateAnchors { at_0ft: 2200.0, at_10000ft: 1700.0, at_24000ft: 1100.0, at_35000ft: 450.0 },
            1500.0,
            43000.0,
        ),
    );
    db
}

/// Fallback performance used for unknown type designators so the engine
/// never panics on an unrecognized aircraft type.
pub fn fallback_performance(type_designator: &str) -> AircraftPerformance {
    line(
        type_designator,
        crate::aircraft::WakeCategory::Large,
        130.0,
        340.0,
        140.0,
        450.0,
        ClimbRateAnchors { at_0ft: 2500.0, at_10000ft: 2000.0, at_24000ft: 1300.0, at_35000ft: 600.0 },
        1800.0,
        39000.0,
    )
}

pub fn lookup<'a>(db: &'a PerformanceDatabase, type_designator: &str) -> Option<&'a AircraftPerformance> {
    db.get(type_designator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn climb_rate_interpolates_between_anchors() {
        let anchors = ClimbRateAnchors { at_0ft: 2800.0, at_10000ft: 2200.0, at_24000ft: 1400.0, at_35000ft: 700.0 };
        assert!((anchors.interpolate(0.0) - 2800.0).abs() < 1e-6);
        assert!((anchors.interpolate(5000.0) - 2500.0).abs() < 1e-6);
        assert!((anchors.interpolate(35000.0) - 700.0).abs() < 1e-6);
        assert!((anchors.interpolate(50000.0) - 700.0).abs() < 1e-6);
    }

    #[test]
    fn speed_clamped_below_10k() {
        let db = default_performance_database();
        let perf = db.get("B738").unwrap();
        let clamped = perf.clamp_speed(320.0, 5000.0);
        assert!(clamped <= 250.0);
    }
}
