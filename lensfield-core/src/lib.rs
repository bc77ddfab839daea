//! Angular primitives for lens-field surveys.
//!
//! A small crate: a radian-backed [`Angle`], validated
//! [`SkyPoint`] positions on the celestial sphere, and the Vincenty
//! great-circle separation that every proximity test in the survey tools
//! goes through.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`angle`] | [`Angle`] type, RA wrapping and coordinate range checks |
//! | [`sky`] | [`SkyPoint`], [`PreparedPoint`] and angular separation |
//! | [`math`] | Vincenty separation kernel |
//! | [`errors`] | [`AstroError`] and [`AstroResult`] |
//!
//! # Quick Start
//!
//! ```
//! use lensfield_core::{Angle, SkyPoint};
//!
//! let a = SkyPoint::new(10.0, 0.0).unwrap();
//! let b = SkyPoint::new(10.0, 1.0).unwrap();
//! assert!((a.separation(&b).arcminutes() - 60.0).abs() < 1e-9);
//! assert!(a.separation(&b) > Angle::from_arcminutes(30.0));
//! ```

pub mod angle;
pub mod constants;
pub mod errors;
pub mod math;
pub mod sky;

pub use angle::Angle;
pub use errors::{AstroError, AstroResult, MathErrorKind};
pub use sky::{PreparedPoint, SkyPoint};
