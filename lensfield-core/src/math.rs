//! Numerical kernels behind the position types.

/// Great-circle angle in radians between two points on the unit sphere,
/// given the sine and cosine of each latitude and the longitude difference.
///
/// Vincenty's form: `atan2` of the cross and dot products stays well
/// conditioned for coincident and antipodal points alike.
#[inline]
pub fn vincenty_angular_separation(
    sin_lat1: f64,
    cos_lat1: f64,
    sin_lat2: f64,
    cos_lat2: f64,
    delta_lon: f64,
) -> f64 {
    let (sin_dl, cos_dl) = libm::sincos(delta_lon);
    let cross = cos_lat2 * sin_dl;
    let along = cos_lat1 * sin_lat2 - sin_lat1 * cos_lat2 * cos_dl;
    let dot = sin_lat1 * sin_lat2 + cos_lat1 * cos_lat2 * cos_dl;
    libm::atan2(libm::hypot(cross, along), dot)
}
