//! Polar-to-geographic projection of radar gates.

/// Mean earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Standard refraction factor applied to the earth radius.
pub const REFRACTION_FACTOR: f64 = 4.0 / 3.0;

/// Effective earth radius used for beam propagation.
pub const EFFECTIVE_RADIUS_KM: f64 = EARTH_RADIUS_KM * REFRACTION_FACTOR;

/// Project a gate at `range_km` along `azimuth_deg` (clockwise from north)
/// from the station to `(latitude, longitude)` in degrees.
///
/// Great-circle destination on a sphere of [`EFFECTIVE_RADIUS_KM`]. Beam
/// height and elevation angle are ignored.
pub fn project(station_lat: f64, station_lon: f64, range_km: f64, azimuth_deg: f64) -> (f64, f64) {
    let lat1 = station_lat.to_radians();
    let lon1 = station_lon.to_radians();
    let bearing = azimuth_deg.to_radians();
    let angular = range_km / EFFECTIVE_RADIUS_KM;

    let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing.cos()).asin();
    let lon2 = lon1
        + (bearing.sin() * angular.sin() * lat1.cos())
            .atan2(angular.cos() - lat1.sin() * lat2.sin());

    (lat2.to_degrees(), lon2.to_degrees())
}
