//! Lens-versus-control field comparison.
//!
//! One [`FieldPair`] holds the outcome of querying a set of lens positions
//! and a matching set of control positions at one radius. The two batches
//! run one after the other, or side by side when the runner has a shared
//! [`RateGate`](crate::query::RateGate) to keep their combined request rate
//! in check.

use lensfield_core::{Angle, SkyPoint};
use rand::Rng;
use tracing::{info, warn};

use crate::error::{Result, SurveyError};
use crate::query::{
    BatchOutcome, QueryRecord, RateLimitedQueryRunner, RegionQuery, TruncationReason,
};
use crate::sampler::{ControlPointSampler, ExclusionSet};
use crate::stats::{pairwise_separations, FieldComparison};

/// Lens and control outcomes at one search radius.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPair {
    pub radius: Angle,
    pub lens: BatchOutcome,
    pub control: BatchOutcome,
}

impl FieldPair {
    pub fn is_complete(&self) -> bool {
        self.lens.is_complete() && self.control.is_complete()
    }

    /// True when either side stopped because the run was cancelled.
    pub fn was_cancelled(&self) -> bool {
        [&self.lens, &self.control]
            .iter()
            .any(|o| o.truncation() == Some(TruncationReason::Cancelled))
    }

    /// Fails with [`SurveyError::BatchTruncated`] if either side stopped
    /// early.
    pub fn ensure_complete(&self) -> Result<()> {
        for outcome in [&self.lens, &self.control] {
            if let Some(reason) = outcome.truncation() {
                return Err(SurveyError::BatchTruncated {
                    requested: outcome.requested(),
                    completed: outcome.len(),
                    reason,
                });
            }
        }
        Ok(())
    }

    /// Statistics over the fields whose query succeeded.
    pub fn comparison(&self) -> FieldComparison {
        FieldComparison::from_counts(&self.lens.known_counts(), &self.control.known_counts())
    }

    /// Per-field counts side by side; `None` where a field failed or was
    /// never queried.
    pub fn aligned_counts(&self) -> Vec<(Option<usize>, Option<usize>)> {
        let n = self.lens.requested().max(self.control.requested());
        let lookup = |records: &[QueryRecord], i: usize| records.get(i).and_then(QueryRecord::count);
        (0..n)
            .map(|i| {
                (
                    lookup(self.lens.records(), i),
                    lookup(self.control.records(), i),
                )
            })
            .collect()
    }

    /// Pairwise separations (arcmin) among the matched objects of each
    /// field, pooled per side.
    pub fn pooled_separations(&self) -> (Vec<f64>, Vec<f64>) {
        (pooled(&self.lens), pooled(&self.control))
    }
}

fn pooled(outcome: &BatchOutcome) -> Vec<f64> {
    outcome
        .records()
        .iter()
        .filter_map(|r| r.outcome.matches())
        .flat_map(|m| pairwise_separations(&m.positions()))
        .collect()
}

/// Queries the lens fields and the control fields at `radius`.
///
/// With `concurrent` set and a rate gate on the runner, both batches run at
/// once; without a gate they run in sequence.
pub async fn query_field_pair<Q>(
    runner: &RateLimitedQueryRunner,
    lens: &[SkyPoint],
    control: &[SkyPoint],
    radius: Angle,
    query: &Q,
    concurrent: bool,
) -> FieldPair
where
    Q: RegionQuery + ?Sized,
{
    let ignore = |_: &QueryRecord| {};
    query_field_pair_observed(runner, lens, control, radius, query, concurrent, &ignore).await
}

/// Like [`query_field_pair`], calling `on_record` as each field finishes on
/// either side.
pub async fn query_field_pair_observed<Q, F>(
    runner: &RateLimitedQueryRunner,
    lens: &[SkyPoint],
    control: &[SkyPoint],
    radius: Angle,
    query: &Q,
    concurrent: bool,
    on_record: &F,
) -> FieldPair
where
    Q: RegionQuery + ?Sized,
    F: Fn(&QueryRecord) + ?Sized,
{
    let (lens_outcome, control_outcome) = if concurrent && runner.has_rate_gate() {
        tokio::join!(
            runner.run_observed(lens, radius, query, |r| on_record(r)),
            runner.run_observed(control, radius, query, |r| on_record(r))
        )
    } else {
        if concurrent {
            warn!("concurrent batches need a shared rate gate; running sequentially");
        }
        let lens_outcome = runner
            .run_observed(lens, radius, query, |r| on_record(r))
            .await;
        let control_outcome = runner
            .run_observed(control, radius, query, |r| on_record(r))
            .await;
        (lens_outcome, control_outcome)
    };

    let pair = FieldPair {
        radius,
        lens: lens_outcome,
        control: control_outcome,
    };
    info!(
        radius_arcmin = radius.arcminutes(),
        lens_fields = pair.lens.len(),
        control_fields = pair.control.len(),
        complete = pair.is_complete(),
        "field pair done"
    );
    pair
}

/// Draws `count` control points clear of `exclusion`.
///
/// A shortfall is an error unless `allow_partial` is set, in which case the
/// shorter sample is returned and a warning logged.
pub fn draw_controls<R: Rng + ?Sized>(
    sampler: &ControlPointSampler,
    count: usize,
    exclusion: &ExclusionSet,
    min_separation: Angle,
    allow_partial: bool,
    rng: &mut R,
) -> Result<Vec<SkyPoint>> {
    let sample = sampler.sample(count, exclusion, min_separation, rng);
    if allow_partial {
        if sample.is_partial() {
            warn!(
                requested = count,
                produced = sample.points().len(),
                "continuing with a partial control sample"
            );
        }
        Ok(sample.accept_partial())
    } else {
        sample.into_points()
    }
}
