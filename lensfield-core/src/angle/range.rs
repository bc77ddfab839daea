//! Range checks and wrapping for equatorial coordinates, in degrees.

use crate::constants::FULL_CIRCLE_DEG;
use crate::{AstroError, AstroResult, MathErrorKind};

/// Wraps a right ascension into [0, 360).
///
/// `libm::fmod` keeps the dividend's sign, so negative remainders are
/// shifted up one turn. The last guard catches inputs like `-1e-17`, where
/// the shift rounds to exactly 360.
#[inline]
pub fn wrap_degrees(deg: f64) -> f64 {
    let w = libm::fmod(deg, FULL_CIRCLE_DEG);
    let w = if w < 0.0 { w + FULL_CIRCLE_DEG } else { w };
    if w >= FULL_CIRCLE_DEG {
        0.0
    } else {
        w
    }
}

/// Any finite right ascension is accepted; wrapping happens separately.
pub fn check_right_ascension(ra_deg: f64) -> AstroResult<f64> {
    if ra_deg.is_finite() {
        Ok(ra_deg)
    } else {
        Err(AstroError::math("right ascension", ra_deg, MathErrorKind::NotFinite))
    }
}

/// Declination must lie in [-90, 90], poles included.
pub fn check_declination(dec_deg: f64) -> AstroResult<f64> {
    if !dec_deg.is_finite() {
        return Err(AstroError::math("declination", dec_deg, MathErrorKind::NotFinite));
    }
    if !(-90.0..=90.0).contains(&dec_deg) {
        return Err(AstroError::math("declination", dec_deg, MathErrorKind::OutOfRange));
    }
    Ok(dec_deg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_degrees() {
        assert_eq!(wrap_degrees(370.0), 10.0);
        assert_eq!(wrap_degrees(-10.0), 350.0);
        assert_eq!(wrap_degrees(360.0), 0.0);
        assert_eq!(wrap_degrees(-720.0), 0.0);
    }

    #[test]
    fn test_wrap_degrees_tiny_negative() {
        let w = wrap_degrees(-1e-17);
        assert!((0.0..360.0).contains(&w));
    }

    #[test]
    fn test_check_declination() {
        assert_eq!(check_declination(-90.0).unwrap(), -90.0);
        assert_eq!(check_declination(90.0).unwrap(), 90.0);

        match check_declination(95.0) {
            Err(AstroError::MathError { kind, value, .. }) => {
                assert_eq!(kind, MathErrorKind::OutOfRange);
                assert_eq!(value, 95.0);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(
            check_declination(f64::INFINITY),
            Err(AstroError::MathError {
                kind: MathErrorKind::NotFinite,
                ..
            })
        ));
    }

    #[test]
    fn test_check_right_ascension() {
        assert_eq!(check_right_ascension(725.0).unwrap(), 725.0);
        assert!(check_right_ascension(f64::NAN).is_err());
    }
}
