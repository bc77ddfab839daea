//! Random control fields that stay clear of known lenses.
//!
//! [`ControlPointSampler`] draws positions uniformly over the celestial
//! sphere and keeps only those farther than a minimum great-circle
//! separation from every member of an [`ExclusionSet`]. Sampling is
//! bounded: after the attempt budget is spent the sampler returns what it
//! has, and the [`ControlSample`] says so.
//!
//! ```
//! use lensfield_core::{Angle, SkyPoint};
//! use lensfield_survey::sampler::{ControlPointSampler, ExclusionSet};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let lenses = ExclusionSet::new(vec![SkyPoint::new(10.0, 0.0).unwrap()]);
//! let mut rng = StdRng::seed_from_u64(7);
//!
//! let sample = ControlPointSampler::new().sample(
//!     25,
//!     &lenses,
//!     Angle::from_arcminutes(30.0),
//!     &mut rng,
//! );
//! assert!(!sample.is_partial());
//! assert_eq!(sample.points().len(), 25);
//! ```

use lensfield_core::{Angle, PreparedPoint, SkyPoint};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, SurveyError};

/// Attempts granted per requested point when no explicit budget is given.
pub const DEFAULT_ATTEMPTS_PER_POINT: usize = 100;

/// How candidate declinations are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeclinationSampling {
    /// `dec = asin(U[-1, 1])`: equal probability per unit solid angle.
    #[default]
    AreaUniform,
    /// `dec = U[-90, 90]` in degrees. Over-samples the polar caps; kept to
    /// reproduce results produced with the old sampling.
    UniformDegrees,
}

impl DeclinationSampling {
    fn draw<R: Rng + ?Sized>(self, rng: &mut R) -> f64 {
        match self {
            Self::AreaUniform => {
                let z: f64 = rng.gen_range(-1.0..1.0);
                libm::asin(z).to_degrees()
            }
            Self::UniformDegrees => rng.gen_range(-90.0..90.0),
        }
    }
}

/// Read-only set of forbidden neighborhoods, typically every known lens.
///
/// Declination sines and cosines are cached on construction, since each
/// candidate is tested against every entry.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    entries: Vec<PreparedPoint>,
}

impl ExclusionSet {
    pub fn new(points: Vec<SkyPoint>) -> Self {
        points.into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = SkyPoint> + '_ {
        self.entries.iter().map(PreparedPoint::point)
    }

    /// Returns `true` if `candidate` is strictly farther than
    /// `min_separation` from every member.
    ///
    /// A non-positive `min_separation` always passes.
    pub fn is_clear(&self, candidate: &SkyPoint, min_separation: Angle) -> bool {
        self.check(candidate, min_separation).0
    }

    /// Clearance test plus the number of distances actually computed.
    fn check(&self, candidate: &SkyPoint, min_separation: Angle) -> (bool, usize) {
        if !min_separation.is_positive() {
            return (true, 0);
        }
        let prepared = PreparedPoint::new(*candidate);
        let limit = min_separation.radians();
        let mut evaluations = 0;
        for entry in &self.entries {
            evaluations += 1;
            if prepared.separation_rad(entry) <= limit {
                return (false, evaluations);
            }
        }
        (true, evaluations)
    }
}

impl FromIterator<SkyPoint> for ExclusionSet {
    fn from_iter<I: IntoIterator<Item = SkyPoint>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(PreparedPoint::new).collect(),
        }
    }
}

/// Result of one sampling run.
#[derive(Debug, Clone)]
pub struct ControlSample {
    points: Vec<SkyPoint>,
    requested: usize,
    attempts: usize,
    distance_evaluations: usize,
}

impl ControlSample {
    pub fn points(&self) -> &[SkyPoint] {
        &self.points
    }

    pub fn requested(&self) -> usize {
        self.requested
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }

    pub fn distance_evaluations(&self) -> usize {
        self.distance_evaluations
    }

    /// `true` when the attempt budget ran out before `requested` points
    /// were accepted.
    pub fn is_partial(&self) -> bool {
        self.points.len() < self.requested
    }

    pub fn shortfall(&self) -> usize {
        self.requested - self.points.len()
    }

    /// Returns the points, or [`SurveyError::PartialSample`] on shortfall.
    pub fn into_points(self) -> Result<Vec<SkyPoint>> {
        if self.is_partial() {
            return Err(SurveyError::PartialSample {
                requested: self.requested,
                produced: self.points.len(),
                attempts: self.attempts,
            });
        }
        Ok(self.points)
    }

    /// Returns whatever was accepted, shortfall or not.
    pub fn accept_partial(self) -> Vec<SkyPoint> {
        self.points
    }
}

/// Bounded-attempt rejection sampler for control fields.
#[derive(Debug, Clone)]
pub struct ControlPointSampler {
    declination: DeclinationSampling,
    attempts_per_point: usize,
}

impl Default for ControlPointSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlPointSampler {
    pub fn new() -> Self {
        Self {
            declination: DeclinationSampling::AreaUniform,
            attempts_per_point: DEFAULT_ATTEMPTS_PER_POINT,
        }
    }

    pub fn with_declination(mut self, declination: DeclinationSampling) -> Self {
        self.declination = declination;
        self
    }

    pub fn with_attempts_per_point(mut self, attempts: usize) -> Self {
        self.attempts_per_point = attempts;
        self
    }

    /// `count × attempts_per_point`.
    pub fn default_budget(&self, count: usize) -> usize {
        count.saturating_mul(self.attempts_per_point)
    }

    /// Draws one unconstrained candidate.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> SkyPoint {
        let ra = rng.gen_range(0.0..360.0);
        let dec = self.declination.draw(rng);
        SkyPoint::clamped(ra, dec)
    }

    /// Samples `count` points with the default attempt budget.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        count: usize,
        exclusion: &ExclusionSet,
        min_separation: Angle,
        rng: &mut R,
    ) -> ControlSample {
        let budget = self.default_budget(count);
        self.sample_with_budget(count, exclusion, min_separation, budget, rng)
    }

    /// Samples until `count` points are accepted or `attempt_budget`
    /// candidates have been drawn, whichever comes first.
    pub fn sample_with_budget<R: Rng + ?Sized>(
        &self,
        count: usize,
        exclusion: &ExclusionSet,
        min_separation: Angle,
        attempt_budget: usize,
        rng: &mut R,
    ) -> ControlSample {
        let mut points = Vec::with_capacity(count);
        let mut attempts = 0;
        let mut distance_evaluations = 0;

        while points.len() < count && attempts < attempt_budget {
            attempts += 1;
            let candidate = self.draw(rng);
            let (clear, evaluations) = exclusion.check(&candidate, min_separation);
            distance_evaluations += evaluations;
            if clear {
                points.push(candidate);
            }
        }

        let sample = ControlSample {
            points,
            requested: count,
            attempts,
            distance_evaluations,
        };

        if sample.is_partial() {
            warn!(
                requested = count,
                produced = sample.points.len(),
                attempts,
                "control sampling ran out of attempts"
            );
        } else {
            debug!(count, attempts, "control sample complete");
        }

        sample
    }
}
