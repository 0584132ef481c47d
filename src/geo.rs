/// Mean Earth radius in meters, spherical model.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two coordinates in meters (haversine).
///
/// Accurate to well under a meter at office-geofence scales, which is all the
/// punch flow needs. Invalid inputs (NaN) propagate naturally.
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;

    // Dhaka office test fixture; ~111.32 km per degree of latitude.
    const OFFICE_LAT: f64 = 23.7808875;
    const OFFICE_LNG: f64 = 90.2792371;

    /// Offset north of the office by roughly `meters`.
    fn point_north(meters: f64) -> (f64, f64) {
        (OFFICE_LAT + meters / 111_320.0, OFFICE_LNG)
    }

    #[test]
    fn zero_distance_for_same_point() {
        assert_eq!(
            distance_meters(OFFICE_LAT, OFFICE_LNG, OFFICE_LAT, OFFICE_LNG),
            0.0
        );
    }

    #[test]
    fn one_latitude_degree_is_about_111_km() {
        let d = distance_meters(23.0, 90.0, 24.0, 90.0);
        assert!((d - 111_195.0).abs() < 200.0, "got {d}");
    }

    #[test]
    fn distance_is_symmetric() {
        let (lat, lng) = point_north(250.0);
        let ab = distance_meters(OFFICE_LAT, OFFICE_LNG, lat, lng);
        let ba = distance_meters(lat, lng, OFFICE_LAT, OFFICE_LNG);
        assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn small_offsets_resolve_to_meters() {
        // Geofence radii are on this order; sub-meter accuracy is plenty.
        let (lat, lng) = point_north(99.0);
        let d = distance_meters(OFFICE_LAT, OFFICE_LNG, lat, lng);
        assert!((d - 99.0).abs() < 0.5, "got {d}");
    }
}
