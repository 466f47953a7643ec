//! Great-circle distance and coordinate stepping.
//!
//! Both functions treat the Earth as a sphere of radius
//! [`EARTH_RADIUS_M`]. [`offset`] is an equirectangular approximation: it is
//! accurate for displacements that are small relative to the Earth's radius
//! and degrades toward the poles. Neither is corrected for that.

use std::f64::consts::PI;

use plume_types::Coordinate;

/// Equatorial Earth radius in meters (WGS 84 semi-major axis).
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Degrees of arc spanned by one meter along a great circle.
pub const DEGREES_PER_METER: f64 = 180.0 / (PI * EARTH_RADIUS_M);

/// Haversine distance between two coordinates, in meters.
///
/// Symmetric in its arguments and exactly zero for identical inputs.
pub fn distance(a: Coordinate, b: Coordinate) -> f64 {
    let lat_delta = (b.lat - a.lat).to_radians();
    let lng_delta = (b.lng - a.lng).to_radians();

    let half_chord = (a.lat.to_radians().cos() * b.lat.to_radians().cos())
        .mul_add((lng_delta / 2.0).sin().powi(2), (lat_delta / 2.0).sin().powi(2));
    let angle = 2.0 * half_chord.sqrt().atan2((1.0 - half_chord).sqrt());

    EARTH_RADIUS_M * angle
}

/// Move `east_m` meters east and `north_m` meters along the latitude axis.
///
/// Positive `north_m` increases latitude; this is the direction grid rows
/// advance in. The longitude step is scaled by `1 / cos(lat)` of the origin.
pub fn offset(origin: Coordinate, east_m: f64, north_m: f64) -> Coordinate {
    let lng_degrees_per_meter = DEGREES_PER_METER / origin.lat.to_radians().cos();
    let lat = north_m.mul_add(DEGREES_PER_METER, origin.lat);
    let lng = east_m.mul_add(lng_degrees_per_meter, origin.lng);
    Coordinate::new(lat, lng)
}
