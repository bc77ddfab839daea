//! Error types for angle and sky-position handling.
//!
//! | Variant | Raised when |
//! |---------|-------------|
//! | [`MathError`](AstroError::MathError) | A single coordinate is not finite or out of range |
//! | [`InvalidCoordinate`](AstroError::InvalidCoordinate) | An RA/Dec pair cannot form a [`SkyPoint`](crate::SkyPoint) |
//!
//! ```
//! use lensfield_core::{AstroError, SkyPoint};
//!
//! let err = SkyPoint::new(10.0, 95.0).unwrap_err();
//! assert!(matches!(err, AstroError::InvalidCoordinate { .. }));
//! ```

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathErrorKind {
    /// NaN or infinite.
    NotFinite,
    /// Outside the coordinate's domain, e.g. a declination past a pole.
    OutOfRange,
}

impl fmt::Display for MathErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFinite => write!(f, "not finite"),
            Self::OutOfRange => write!(f, "out of range"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AstroError {
    #[error("{quantity} {value} is {kind}")]
    MathError {
        quantity: &'static str,
        value: f64,
        kind: MathErrorKind,
    },

    #[error("invalid sky position (RA {ra_deg}, Dec {dec_deg}): {message}")]
    InvalidCoordinate {
        ra_deg: f64,
        dec_deg: f64,
        message: String,
    },
}

pub type AstroResult<T> = Result<T, AstroError>;

impl AstroError {
    pub fn math(quantity: &'static str, value: f64, kind: MathErrorKind) -> Self {
        Self::MathError {
            quantity,
            value,
            kind,
        }
    }

    pub fn invalid_coordinate(ra_deg: f64, dec_deg: f64, reason: impl Into<String>) -> Self {
        Self::InvalidCoordinate {
            ra_deg,
            dec_deg,
            message: reason.into(),
        }
    }
}
