//! Numeric constants for angle conversion.

pub const PI: f64 = std::f64::consts::PI;

pub const HALF_PI: f64 = std::f64::consts::FRAC_PI_2;

pub const DEG_TO_RAD: f64 = PI / 180.0;

pub const ARCMIN_PER_DEG: f64 = 60.0;

/// One full turn of right ascension, in degrees.
pub const FULL_CIRCLE_DEG: f64 = 360.0;
