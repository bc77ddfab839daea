//! Core angle type.
//!
//! [`Angle`] stores radians and converts to the units survey code actually
//! talks in: degrees for catalog positions, arcminutes for search radii and
//! exclusion distances.
//!
//! ```
//! use lensfield_core::Angle;
//!
//! let radius = Angle::from_arcminutes(15.0);
//! assert!((radius.degrees() - 0.25).abs() < 1e-12);
//!
//! let (sin, cos) = Angle::from_degrees(30.0).sin_cos();
//! assert!((sin - 0.5).abs() < 1e-12);
//! assert!((cos - 0.75_f64.sqrt()).abs() < 1e-12);
//! ```

use std::fmt;

use crate::constants::{ARCMIN_PER_DEG, HALF_PI, PI};

/// An angular measurement stored as radians.
///
/// Comparisons act on the radian value. There is no `Eq`/`Ord` since the
/// value may be NaN.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct Angle {
    rad: f64,
}

impl Angle {
    pub const ZERO: Self = Self { rad: 0.0 };

    /// Half a turn; the largest separation two sky positions can have.
    pub const PI: Self = Self { rad: PI };

    pub const HALF_PI: Self = Self { rad: HALF_PI };

    #[inline]
    pub const fn from_radians(rad: f64) -> Self {
        Self { rad }
    }

    #[inline]
    pub fn from_degrees(deg: f64) -> Self {
        Self::from_radians(deg.to_radians())
    }

    #[inline]
    pub fn from_arcminutes(arcmin: f64) -> Self {
        Self::from_degrees(arcmin / ARCMIN_PER_DEG)
    }

    #[inline]
    pub fn radians(self) -> f64 {
        self.rad
    }

    #[inline]
    pub fn degrees(self) -> f64 {
        self.rad.to_degrees()
    }

    #[inline]
    pub fn arcminutes(self) -> f64 {
        self.degrees() * ARCMIN_PER_DEG
    }

    #[inline]
    pub fn sin_cos(self) -> (f64, f64) {
        libm::sincos(self.rad)
    }

    /// `true` for angles strictly above zero. NaN is not positive.
    ///
    /// The control-point sampler treats a non-positive minimum separation
    /// as "no exclusion".
    #[inline]
    pub fn is_positive(self) -> bool {
        self.rad > 0.0
    }
}

/// Formats in arcminutes, the unit radii are configured in.
impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match f.precision() {
            Some(p) => write!(f, "{:.*}'", p, self.arcminutes()),
            None => write!(f, "{}'", self.arcminutes()),
        }
    }
}
