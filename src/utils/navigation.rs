//! Great-circle and bearing math shared by the physics engine, the flight
//! plan executor, and the conflict detector. Adapted from the teacher's
//! sector-file-era navigation utilities, generalized to `f64` headings and
//! stripped of EuroScope-sector-file parsing (airport data is now a
//! structured entity, loaded via [`crate::airport`]).

const EARTH_RADIUS_NM: f64 = 3440.065;

/// Great-circle distance in nautical miles (WGS84 spherical model, spec §3).
pub fn haversine_nm(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_NM * c
}

/// Initial great-circle bearing from one point to another, in [0, 360).
pub fn heading_from_to(from_lat: f64, from_lon: f64, to_lat: f64, to_lon: f64) -> f64 {
    let dlon = (to_lon - from_lon).to_radians();
    let y = dlon.sin() * to_lat.to_radians().cos();
    let x = from_lat.to_radians().cos() * to_lat.to_radians().sin()
        - from_lat.to_radians().sin() * to_lat.to_radians().cos() * dlon.cos();

    let bearing = y.atan2(x).to_degrees();
    (bearing + 360.0) % 360.0
}

/// Destination point given a start point, bearing, and distance (nm).
pub fn position_bearing_distance(lat: f64, lon: f64, bearing_deg: f64, distance_nm: f64) -> (f64, f64) {
    let lat_rad = lat.to_radians();
    let lon_rad = lon.to_radians();
    let bearing_rad = bearing_deg.to_radians();
    let angular_distance = distance_nm / EARTH_RADIUS_NM;

    let dest_lat_rad = (lat_rad.sin() * angular_distance.cos()
        + lat_rad.cos() * angular_distance.sin() * bearing_rad.cos())
    .asin();

    let dest_lon_rad = lon_rad
        + (bearing_rad.sin() * angular_distance.sin() * lat_rad.cos())
            .atan2(angular_distance.cos() - lat_rad.sin() * dest_lat_rad.sin());

    (dest_lat_rad.to_degrees(), dest_lon_rad.to_degrees())
}

/// Shortest signed turn (degrees, positive = right/clockwise) from `current`
/// to `target`, in (-180, 180].
pub fn shortest_turn_delta(current: f64, target: f64) -> f64 {
    let diff = (target - current).rem_euclid(360.0);
    if diff > 180.0 {
        diff - 360.0
    } else {
        diff
    }
}

pub fn normalize_heading(heading: f64) -> f64 {
    heading.rem_euclid(360.0)
}

/// Cross-track distance (nm) of `point` from the great-circle course defined
/// by `course_from` flying outbound on `course_deg`. Positive = right of
/// course. Used by the flight plan executor's localizer-capture logic
/// (spec §4.4) and the physics engine's centerline snap (spec §4.3).
pub fn cross_track_distance_nm(course_from: (f64, f64), course_deg: f64, point: (f64, f64)) -> f64 {
    let dist_to_point = haversine_nm(course_from.0, course_from.1, point.0, point.1);
    if dist_to_point < 1e-9 {
        return 0.0;
    }
    let bearing_to_point = heading_from_to(course_from.0, course_from.1, point.0, point.1);
    let angular_dist = dist_to_point / EARTH_RADIUS_NM;
    let bearing_diff = (bearing_to_point - course_deg).to_radians();
    (angular_dist.sin() * bearing_diff.sin()).asin() * EARTH_RADIUS_NM
}

/// Along-course distance (nm) of `point`'s projection from `course_from`,
/// along `course_deg`. Used to determine how far along the localizer (or
/// runway centerline) a projected point sits.
pub fn along_track_distance_nm(course_from: (f64, f64), course_deg: f64, point: (f64, f64)) -> f64 {
    let dist_to_point = haversine_nm(course_from.0, course_from.1, point.0, point.1);
    let xtk = cross_track_distance_nm(course_from, course_deg, point);
    let angular_dist = dist_to_point / EARTH_RADIUS_NM;
    let angular_xtk = xtk / EARTH_RADIUS_NM;
    let angular_along = angular_dist.cos() / angular_xtk.cos();
    let angular_along = angular_along.clamp(-1.0, 1.0).acos();
    angular_along * EARTH_RADIUS_NM
}

/// One configured wind observation at a given altitude band (spec §3, §4.3).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WindLayer {
    pub altitude_ft: f64,
    pub direction_deg: f64,
    pub speed_kt: f64,
}

/// Linearly interpolate wind speed/direction across the configured layers by
/// altitude, taking the shortest angular path for direction (spec §4.3).
/// Layers need not be pre-sorted. Returns the nearest layer's value when
/// `altitude_ft` is outside the configured range.
pub fn interpolate_wind(layers: &[WindLayer], altitude_ft: f64) -> (f64, f64) {
    if layers.is_empty() {
        return (0.0, 0.0);
    }
    let mut sorted: Vec<&WindLayer> = layers.iter().collect();
    sorted.sort_by(|a, b| a.altitude_ft.partial_cmp(&b.altitude_ft).unwrap());

    if altitude_ft <= sorted[0].altitude_ft {
        return (sorted[0].direction_deg, sorted[0].speed_kt);
    }
    if altitude_ft >= sorted[sorted.len() - 1].altitude_ft {
        let top = sorted[sorted.len() - 1];
        return (top.direction_deg, top.speed_kt);
    }

    for pair in sorted.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if altitude_ft >= lo.altitude_ft && altitude_ft <= hi.altitude_ft {
            let span = hi.altitude_ft - lo.altitude_ft;
            let t = if span.abs() < 1e-9 { 0.0 } else { (altitude_ft - lo.altitude_ft) / span };
            let speed = lo.speed_kt + t * (hi.speed_kt - lo.speed_kt);
            let delta = shortest_turn_delta(lo.direction_deg, hi.direction_deg);
            let direction = normalize_heading(lo.direction_deg + t * delta);
            return (direction, speed);
        }
    }
    (sorted[0].direction_deg, sorted[0].speed_kt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_known_distance() {
        let dist = haversine_nm(51.5074, -0.1278, 48.8566, 2.3522);
        // London to Paris is ~184 nm great-circle.
        assert!((dist - 184.0).abs() < 10.0);
    }

    #[test]
    fn heading_north_and_east() {
        let hdg = heading_from_to(50.0, 0.0, 51.0, 0.0);
        assert!((hdg - 0.0).abs() < 1.0);

        let hdg = heading_from_to(50.0, 0.0, 50.0, 1.0);
        assert!((hdg - 90.0).abs() < 5.0);
    }

    #[test]
    fn shortest_turn_picks_minimal_signed_delta() {
        assert!((shortest_turn_delta(10.0, 20.0) - 10.0).abs() < 1e-9);
        assert!((shortest_turn_delta(350.0, 10.0) - 20.0).abs() < 1e-9);
        assert!((shortest_turn_delta(20.0, 350.0) - (-30.0)).abs() < 1e-9);
    }

    #[test]
    fn wind_interpolates_linearly_between_layers() {
        let layers = vec![
            WindLayer { altitude_ft: 0.0, direction_deg: 270.0, speed_kt: 10.0 },
            WindLayer { altitude_ft: 10000.0, direction_deg: 270.0, speed_kt: 30.0 },
        ];
        let (dir, spd) = interpolate_wind(&layers, 5000.0);
        assert!((dir - 270.0).abs() < 1e-9);
        assert!((spd - 20.0).abs() < 1e-9);
    }

    #[test]
    fn wind_clamps_outside_range() {
        let layers = vec![
            WindLayer { altitude_ft: 2000.0, direction_deg: 180.0, speed_kt: 5.0 },
            WindLayer { altitude_ft: 8000.0, direction_deg: 200.0, speed_kt: 15.0 },
        ];
        let (dir, spd) = interpolate_wind(&layers, 20000.0);
        assert!((dir - 200.0).abs() < 1e-9);
        assert!((spd - 15.0).abs() < 1e-9);
    }

    #[test]
    fn cross_track_zero_on_course() {
        let from = (51.0, 0.0);
        let to = position_bearing_distance(from.0, from.1, 90.0, 10.0);
        let xtk = cross_track_distance_nm(from, 90.0, to);
        assert!(xtk.abs() < 0.01);
    }
}
