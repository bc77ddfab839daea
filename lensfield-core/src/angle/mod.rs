mod core;
mod range;
#[cfg(feature = "serde")]
mod serde_;

pub use core::Angle;
pub use range::{check_declination, check_right_ascension, wrap_degrees};
