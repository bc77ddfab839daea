//! Positions on the celestial sphere.
//!
//! A [`SkyPoint`] is an ICRS right ascension / declination pair in
//! degrees. Construction validates the pair once, so everything
//! downstream (samplers, query clients, separation tests) can rely on
//! RA in [0, 360) and Dec in [-90, 90].

use std::fmt;

use crate::angle::{check_declination, check_right_ascension, wrap_degrees, Angle};
use crate::constants::DEG_TO_RAD;
use crate::math::vincenty_angular_separation;
use crate::{AstroError, AstroResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyPoint {
    ra_deg: f64,
    dec_deg: f64,
}

impl SkyPoint {
    /// Builds a position from degrees, wrapping RA into [0, 360).
    ///
    /// # Errors
    /// Returns [`AstroError::InvalidCoordinate`] if either value is not
    /// finite or the declination lies outside [-90°, +90°].
    pub fn new(ra_deg: f64, dec_deg: f64) -> AstroResult<Self> {
        let invalid = |e: AstroError| AstroError::invalid_coordinate(ra_deg, dec_deg, e.to_string());
        let ra_deg = check_right_ascension(ra_deg).map_err(invalid)?;
        let dec_deg = check_declination(dec_deg).map_err(invalid)?;
        Ok(Self {
            ra_deg: wrap_degrees(ra_deg),
            dec_deg,
        })
    }

    /// Builds a position from generated coordinates without validation:
    /// RA is wrapped into [0, 360) and Dec clamped into [-90, 90].
    ///
    /// Meant for values produced by samplers, where rounding can push a
    /// declination a few ulps past a pole. Inputs must be finite.
    pub fn clamped(ra_deg: f64, dec_deg: f64) -> Self {
        debug_assert!(ra_deg.is_finite() && dec_deg.is_finite());
        Self {
            ra_deg: wrap_degrees(ra_deg),
            dec_deg: dec_deg.clamp(-90.0, 90.0),
        }
    }

    #[inline]
    pub fn ra_deg(&self) -> f64 {
        self.ra_deg
    }

    #[inline]
    pub fn dec_deg(&self) -> f64 {
        self.dec_deg
    }

    #[inline]
    pub fn ra(&self) -> Angle {
        Angle::from_degrees(self.ra_deg)
    }

    #[inline]
    pub fn dec(&self) -> Angle {
        Angle::from_degrees(self.dec_deg)
    }

    /// Great-circle distance to `other`.
    ///
    /// Handles the RA wrap-around and the poles correctly; antipodal points
    /// come out at exactly 180°.
    pub fn separation(&self, other: &SkyPoint) -> Angle {
        Angle::from_radians(PreparedPoint::new(*self).separation_rad(&PreparedPoint::new(*other)))
    }
}

/// A [`SkyPoint`] with its declination sine and cosine computed once, for
/// code that measures one position against many.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreparedPoint {
    point: SkyPoint,
    sin_dec: f64,
    cos_dec: f64,
    ra_rad: f64,
}

impl PreparedPoint {
    pub fn new(point: SkyPoint) -> Self {
        let (sin_dec, cos_dec) = point.dec().sin_cos();
        Self {
            point,
            sin_dec,
            cos_dec,
            ra_rad: point.ra_deg * DEG_TO_RAD,
        }
    }

    pub fn point(&self) -> SkyPoint {
        self.point
    }

    /// Great-circle distance in radians.
    #[inline]
    pub fn separation_rad(&self, other: &PreparedPoint) -> f64 {
        vincenty_angular_separation(
            self.sin_dec,
            self.cos_dec,
            other.sin_dec,
            other.cos_dec,
            other.ra_rad - self.ra_rad,
        )
    }
}

impl From<SkyPoint> for PreparedPoint {
    fn from(point: SkyPoint) -> Self {
        Self::new(point)
    }
}

impl fmt::Display for SkyPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RA {:.6}° Dec {:+.6}°", self.ra_deg, self.dec_deg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(ra: f64, dec: f64) -> SkyPoint {
        SkyPoint::new(ra, dec).unwrap()
    }

    #[test]
    fn test_new_wraps_ra() {
        assert_eq!(p(370.0, 0.0).ra_deg(), 10.0);
        assert_eq!(p(-90.0, 0.0).ra_deg(), 270.0);
        assert_eq!(p(360.0, 0.0).ra_deg(), 0.0);
    }

    #[test]
    fn test_new_rejects_bad_declination() {
        assert!(SkyPoint::new(0.0, 90.5).is_err());
        assert!(SkyPoint::new(0.0, -91.0).is_err());
        assert!(SkyPoint::new(0.0, f64::NAN).is_err());
        assert!(SkyPoint::new(f64::INFINITY, 0.0).is_err());
    }

    #[test]
    fn test_new_accepts_poles() {
        assert!(SkyPoint::new(123.0, 90.0).is_ok());
        assert!(SkyPoint::new(123.0, -90.0).is_ok());
    }

    #[test]
    fn test_clamped_saturates_at_poles() {
        let q = SkyPoint::clamped(-0.0, 90.000000000001);
        assert_eq!(q.dec_deg(), 90.0);
        assert_eq!(q.ra_deg(), 0.0);
        assert_eq!(SkyPoint::clamped(725.0, -95.0).dec_deg(), -90.0);
        assert_eq!(SkyPoint::clamped(725.0, -95.0).ra_deg(), 5.0);
    }

    #[test]
    fn test_separation_same_point() {
        assert_eq!(p(83.633, -5.375).separation(&p(83.633, -5.375)).radians(), 0.0);
    }

    #[test]
    fn test_separation_antipodal_is_exactly_180() {
        let a = p(0.0, 0.0);
        let b = p(180.0, 0.0);
        assert!((a.separation(&b).degrees() - 180.0).abs() < 1e-10);

        let c = p(45.0, 30.0);
        assert!((c.separation(&p(225.0, -30.0)).degrees() - 180.0).abs() < 1e-10);
    }

    #[test]
    fn test_separation_pole_to_equator() {
        assert!((p(0.0, 90.0).separation(&p(0.0, 0.0)).degrees() - 90.0).abs() < 1e-10);
    }

    #[test]
    fn test_separation_across_ra_wrap() {
        // 0.5° either side of RA 0 on the equator is 1°, not 359°.
        let sep = p(359.5, 0.0).separation(&p(0.5, 0.0));
        assert!((sep.degrees() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_separation_near_pole_is_not_euclidean() {
        // A naive sqrt(dRA² + dDec²) would give 180°.
        let sep = p(0.0, 89.0).separation(&p(180.0, 89.0));
        assert!((sep.degrees() - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_separation_arcminute_scale() {
        let lens = p(10.0, 0.0);
        assert!((lens.separation(&p(10.1, 0.0)).arcminutes() - 6.0).abs() < 1e-9);
        assert!((lens.separation(&p(10.0, 1.0)).arcminutes() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_prepared_matches_direct() {
        let a = p(150.1, 2.2);
        let b = p(149.9, 2.4);
        let prepared = PreparedPoint::from(a).separation_rad(&PreparedPoint::from(b));
        assert_eq!(prepared, a.separation(&b).radians());
        assert_eq!(PreparedPoint::new(a).point(), a);
    }

    #[test]
    fn test_new_error_names_the_pair() {
        let err = SkyPoint::new(12.0, 91.0).unwrap_err();
        assert!(err.to_string().contains("declination 91 is out of range"));
    }

    #[test]
    fn test_display() {
        assert_eq!(p(10.0, -5.5).to_string(), "RA 10.000000° Dec -5.500000°");
    }
}
