//! Counts of compact-object catalog entries around strong gravitational
//! lenses, compared against random control fields.
//!
//! A survey run loads a lens catalog, draws control positions that keep
//! clear of every known lens, runs one cone query per position against
//! SIMBAD, and compares the two sets of counts.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`sampler`] | [`ControlPointSampler`](sampler::ControlPointSampler): area-uniform rejection sampling with a minimum separation from an [`ExclusionSet`](sampler::ExclusionSet) |
//! | [`query`] | [`RateLimitedQueryRunner`](query::RateLimitedQueryRunner), [`SimbadClient`](query::SimbadClient), [`TargetTypes`](query::TargetTypes), cancellation and rate gating |
//! | [`pipeline`] | Lens/control [`FieldPair`](pipeline::FieldPair) queries and control draws |
//! | [`catalog`] | [`LensCatalog`](catalog::LensCatalog) CSV loading, grade and redshift filtering |
//! | [`stats`] | Chi-squared, Poisson tail, two-sample KS, pairwise separations |
//! | [`plot`] | SVG histograms |
//! | [`config`] | [`SurveyConfig`](config::SurveyConfig) from defaults, TOML and `LENSFIELD_*` variables |
//!
//! # Quick Start
//!
//! ```ignore
//! use lensfield_core::Angle;
//! use lensfield_survey::query::{RateLimitedQueryRunner, SimbadClient, SimbadConfig, TargetTypes};
//!
//! let client = SimbadClient::new(SimbadConfig::default())?;
//! let runner = RateLimitedQueryRunner::new(TargetTypes::default());
//! let outcome = runner.run(&points, Angle::from_arcminutes(15.0), &client).await;
//! for record in outcome.records() {
//!     println!("{} {:?}", record.point, record.count());
//! }
//! ```
//!
//! # Features
//!
//! - **`cli`** (default): builds the `lensfield` binary.

pub mod catalog;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod plot;
pub mod query;
pub mod sampler;
pub mod stats;

pub use error::{Result, SurveyError};
