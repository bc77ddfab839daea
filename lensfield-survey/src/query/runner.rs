//! Sequential, throttled, retrying cone-query loop.
//!
//! [`RateLimitedQueryRunner::run`] issues one region query per input point,
//! strictly in input order, and returns a [`BatchOutcome`] whose records are
//! index-aligned with the input. Per point:
//!
//! 1. stop early if cancellation was requested;
//! 2. wait on the shared [`RateGate`], if one is configured;
//! 3. run the query and classify the result;
//! 4. sleep the throttle interval (after every attempt, whatever its result);
//! 5. on a transient failure, wait the backoff and try the same point again
//!    until the [`RetryPolicy`] runs out.
//!
//! Every wait races the cancellation signal. A cancelled or exhausted batch
//! comes back marked [`Completion::Truncated`] with the records gathered so
//! far; it is never padded.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use lensfield_core::{Angle, SkyPoint};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use super::cancel::Cancellation;
use super::gate::RateGate;
use super::types::{CatalogObject, FieldMatches, QueryError, TargetTypes};
use crate::error::SurveyError;

/// Pause after every query attempt.
pub const DEFAULT_THROTTLE: Duration = Duration::from_secs(1);

/// Wait before retrying a point whose query failed transiently.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(5);

/// Attempts per point before the batch is truncated.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// "All catalog objects within `radius` of `center`."
///
/// Implemented by [`SimbadClient`](super::SimbadClient) and by any
/// `Fn(SkyPoint, Angle) -> impl Future<...>` closure, which is what tests
/// and offline runs use.
pub trait RegionQuery {
    fn query_region(
        &self,
        center: SkyPoint,
        radius: Angle,
    ) -> impl Future<Output = Result<Vec<CatalogObject>, QueryError>> + Send;
}

impl<F, Fut> RegionQuery for F
where
    F: Fn(SkyPoint, Angle) -> Fut,
    Fut: Future<Output = Result<Vec<CatalogObject>, QueryError>> + Send,
{
    fn query_region(
        &self,
        center: SkyPoint,
        radius: Angle,
    ) -> impl Future<Output = Result<Vec<CatalogObject>, QueryError>> + Send {
        self(center, radius)
    }
}

/// Delay schedule between attempts on the same point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed(Duration),
    /// `initial * factor^(n-1)` after the n-th consecutive failure, capped
    /// at `max`.
    Exponential {
        initial: Duration,
        factor: f64,
        max: Duration,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Fixed(DEFAULT_BACKOFF)
    }
}

impl Backoff {
    /// Delay after the `failures`-th consecutive transient failure.
    pub fn delay(&self, failures: u32) -> Duration {
        match *self {
            Self::Fixed(delay) => delay,
            Self::Exponential {
                initial,
                factor,
                max,
            } => {
                // A factor below one (or NaN) would shrink the delay.
                let factor = if factor.is_finite() && factor >= 1.0 {
                    factor
                } else {
                    1.0
                };
                let exponent = failures.saturating_sub(1) as f64;
                let secs = initial.as_secs_f64() * libm::pow(factor, exponent);
                if !secs.is_finite() || secs >= max.as_secs_f64() {
                    max
                } else {
                    Duration::from_secs_f64(secs)
                }
            }
        }
    }
}

/// Caps on retrying a single point. `None` disables a cap; with both
/// disabled a point is retried until it stops failing transiently.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: Option<u32>,
    /// No retry starts this long or later after the point's first attempt.
    pub max_elapsed: Option<Duration>,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
            max_elapsed: None,
            backoff: Backoff::default(),
        }
    }
}

impl RetryPolicy {
    pub fn unbounded(backoff: Backoff) -> Self {
        Self {
            max_attempts: None,
            max_elapsed: None,
            backoff,
        }
    }

    fn is_exhausted(&self, attempts: u32, elapsed: Duration) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max.max(1))
            || self.max_elapsed.is_some_and(|max| elapsed >= max)
    }
}

/// Final result of querying one point.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Success(FieldMatches),
    /// The service rejected the query. The count for this field is unknown.
    PermanentFailure(String),
}

impl QueryOutcome {
    pub fn count(&self) -> Option<usize> {
        match self {
            Self::Success(matches) => Some(matches.count()),
            Self::PermanentFailure(_) => None,
        }
    }

    pub fn matches(&self) -> Option<&FieldMatches> {
        match self {
            Self::Success(matches) => Some(matches),
            Self::PermanentFailure(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryRecord {
    /// Position of the point in the input sequence.
    pub index: usize,
    pub point: SkyPoint,
    pub attempts: u32,
    pub outcome: QueryOutcome,
}

impl QueryRecord {
    pub fn count(&self) -> Option<usize> {
        self.outcome.count()
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, QueryOutcome::Success(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruncationReason {
    Cancelled,
    RetryBudgetExhausted { index: usize, attempts: u32 },
}

impl fmt::Display for TruncationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "cancelled"),
            Self::RetryBudgetExhausted { index, attempts } => write!(
                f,
                "retry budget exhausted at point {index} after {attempts} attempts"
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Complete,
    Truncated(TruncationReason),
}

/// Records for one batch, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    records: Vec<QueryRecord>,
    requested: usize,
    completion: Completion,
}

impl BatchOutcome {
    pub fn records(&self) -> &[QueryRecord] {
        &self.records
    }

    /// Number of input points.
    pub fn requested(&self) -> usize {
        self.requested
    }

    pub fn completion(&self) -> Completion {
        self.completion
    }

    pub fn is_complete(&self) -> bool {
        self.completion == Completion::Complete
    }

    pub fn truncation(&self) -> Option<TruncationReason> {
        match self.completion {
            Completion::Complete => None,
            Completion::Truncated(reason) => Some(reason),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Per-point counts; `None` where the query failed permanently.
    pub fn counts(&self) -> Vec<Option<usize>> {
        self.records.iter().map(QueryRecord::count).collect()
    }

    /// Counts of the successful points only.
    pub fn known_counts(&self) -> Vec<usize> {
        self.records.iter().filter_map(QueryRecord::count).collect()
    }

    pub fn failures(&self) -> usize {
        self.records.iter().filter(|r| !r.is_success()).count()
    }

    pub fn into_records(self) -> Vec<QueryRecord> {
        self.records
    }

    /// The records, or [`SurveyError::BatchTruncated`] if the batch stopped
    /// early.
    pub fn into_complete(self) -> Result<Vec<QueryRecord>, SurveyError> {
        match self.completion {
            Completion::Complete => Ok(self.records),
            Completion::Truncated(reason) => Err(SurveyError::BatchTruncated {
                requested: self.requested,
                completed: self.records.len(),
                reason,
            }),
        }
    }
}

struct Interrupted;

async fn interruptible<F: Future>(
    cancel: &mut Cancellation,
    fut: F,
) -> Result<F::Output, Interrupted> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupted),
        out = fut => Ok(out),
    }
}

enum PointStep {
    Recorded(QueryRecord),
    Exhausted { attempts: u32 },
}

pub struct RateLimitedQueryRunner {
    targets: TargetTypes,
    throttle: Duration,
    retry: RetryPolicy,
    gate: Option<Arc<RateGate>>,
    cancel: Cancellation,
}

impl RateLimitedQueryRunner {
    pub fn new(targets: TargetTypes) -> Self {
        Self {
            targets,
            throttle: DEFAULT_THROTTLE,
            retry: RetryPolicy::default(),
            gate: None,
            cancel: Cancellation::never(),
        }
    }

    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_rate_gate(mut self, gate: Arc<RateGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn targets(&self) -> &TargetTypes {
        &self.targets
    }

    pub fn throttle(&self) -> Duration {
        self.throttle
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn has_rate_gate(&self) -> bool {
        self.gate.is_some()
    }

    pub async fn run<Q>(&self, points: &[SkyPoint], radius: Angle, query: &Q) -> BatchOutcome
    where
        Q: RegionQuery + ?Sized,
    {
        self.run_observed(points, radius, query, |_| {}).await
    }

    /// Like [`run`](Self::run), calling `on_record` as each point finishes.
    pub async fn run_observed<Q, F>(
        &self,
        points: &[SkyPoint],
        radius: Angle,
        query: &Q,
        mut on_record: F,
    ) -> BatchOutcome
    where
        Q: RegionQuery + ?Sized,
        F: FnMut(&QueryRecord),
    {
        let mut cancel = self.cancel.clone();
        let mut records = Vec::with_capacity(points.len());

        info!(
            points = points.len(),
            radius_arcmin = radius.arcminutes(),
            "starting query batch"
        );

        for (index, &point) in points.iter().enumerate() {
            if cancel.is_cancelled() {
                return self.truncated(records, points.len(), TruncationReason::Cancelled);
            }

            let step = self
                .query_point(index, point, radius, query, &mut cancel)
                .await;
            match step {
                Ok(PointStep::Recorded(record)) => {
                    on_record(&record);
                    records.push(record);
                }
                Ok(PointStep::Exhausted { attempts }) => {
                    let reason = TruncationReason::RetryBudgetExhausted { index, attempts };
                    return self.truncated(records, points.len(), reason);
                }
                Err(Interrupted) => {
                    return self.truncated(records, points.len(), TruncationReason::Cancelled);
                }
            }

            // A cancel during this sleep keeps the record; the check at the
            // top of the loop ends the batch.
            let _ = interruptible(&mut cancel, sleep(self.throttle)).await;
        }

        info!(points = records.len(), "query batch complete");
        BatchOutcome {
            records,
            requested: points.len(),
            completion: Completion::Complete,
        }
    }

    async fn query_point<Q>(
        &self,
        index: usize,
        point: SkyPoint,
        radius: Angle,
        query: &Q,
        cancel: &mut Cancellation,
    ) -> Result<PointStep, Interrupted>
    where
        Q: RegionQuery + ?Sized,
    {
        let started = Instant::now();
        let mut attempts = 0u32;

        loop {
            if let Some(gate) = &self.gate {
                interruptible(cancel, gate.acquire()).await?;
            }

            attempts += 1;
            debug!(index, attempt = attempts, %point, "querying field");

            let result = interruptible(cancel, query.query_region(point, radius)).await?;
            let reason = match result {
                Ok(objects) => {
                    let matches = self.targets.select(objects);
                    debug!(index, attempt = attempts, found = %matches, "field done");
                    return Ok(PointStep::Recorded(QueryRecord {
                        index,
                        point,
                        attempts,
                        outcome: QueryOutcome::Success(matches),
                    }));
                }
                Err(QueryError::Permanent(reason)) => {
                    warn!(index, %point, %reason, "query failed permanently");
                    return Ok(PointStep::Recorded(QueryRecord {
                        index,
                        point,
                        attempts,
                        outcome: QueryOutcome::PermanentFailure(reason),
                    }));
                }
                Err(QueryError::Transient(reason)) => reason,
            };

            interruptible(cancel, sleep(self.throttle)).await?;

            // The elapsed cap bounds when the next attempt would start.
            let delay = self.retry.backoff.delay(attempts);
            if self.retry.is_exhausted(attempts, started.elapsed() + delay) {
                warn!(index, attempts, %reason, "retry budget exhausted");
                return Ok(PointStep::Exhausted { attempts });
            }

            warn!(
                index,
                attempt = attempts,
                %reason,
                delay_ms = delay.as_millis() as u64,
                "transient query failure, retrying"
            );
            interruptible(cancel, sleep(delay)).await?;
        }
    }

    fn truncated(
        &self,
        records: Vec<QueryRecord>,
        requested: usize,
        reason: TruncationReason,
    ) -> BatchOutcome {
        warn!(
            completed = records.len(),
            requested,
            %reason,
            "query batch truncated"
        );
        BatchOutcome {
            records,
            requested,
            completion: Completion::Truncated(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::CancelHandle;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn points(n: usize) -> Vec<SkyPoint> {
        (0..n)
            .map(|i| SkyPoint::new(10.0 * i as f64, 0.0).unwrap())
            .collect()
    }

    fn qso_at(point: SkyPoint) -> CatalogObject {
        CatalogObject::new("J0000", "QSO", point)
    }

    fn runner(throttle_secs: u64, backoff_secs: u64) -> RateLimitedQueryRunner {
        RateLimitedQueryRunner::new(TargetTypes::default())
            .with_throttle(Duration::from_secs(throttle_secs))
            .with_retry_policy(RetryPolicy {
                max_attempts: Some(10),
                max_elapsed: None,
                backoff: Backoff::Fixed(Duration::from_secs(backoff_secs)),
            })
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_transient_failures_then_success() {
        let calls = AtomicUsize::new(0);
        let query = |point: SkyPoint, _radius: Angle| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(QueryError::transient("timeout"))
                } else {
                    Ok(vec![qso_at(point)])
                }
            }
        };

        let start = Instant::now();
        let outcome = runner(1, 5)
            .run(&points(1), Angle::from_arcminutes(15.0), &query)
            .await;

        assert!(outcome.is_complete());
        assert_eq!(outcome.len(), 1);
        assert_eq!(outcome.records()[0].attempts, 3);
        assert_eq!(outcome.records()[0].count(), Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Three throttle sleeps plus two backoffs.
        assert_eq!(start.elapsed(), Duration::from_secs(3 + 10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_between_points() {
        let query = |_p: SkyPoint, _r: Angle| async { Ok::<_, QueryError>(Vec::new()) };
        let start = Instant::now();
        let outcome = runner(2, 5)
            .run(&points(3), Angle::from_arcminutes(10.0), &query)
            .await;
        assert!(outcome.is_complete());
        assert_eq!(outcome.counts(), vec![Some(0), Some(0), Some(0)]);
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_records_aligned_with_input() {
        let input = points(5);
        // Field i holds i quasars plus one star.
        let query = |point: SkyPoint, _r: Angle| async move {
            let n = (point.ra_deg() / 10.0).round() as usize;
            let mut objects: Vec<_> = (0..n).map(|_| qso_at(point)).collect();
            objects.push(CatalogObject::new("HD 1", "Star", point));
            Ok::<_, QueryError>(objects)
        };

        let outcome = runner(0, 0)
            .run(&input, Angle::from_arcminutes(10.0), &query)
            .await;

        assert!(outcome.is_complete());
        assert_eq!(outcome.len(), input.len());
        for (i, record) in outcome.records().iter().enumerate() {
            assert_eq!(record.index, i);
            assert_eq!(record.point, input[i]);
            assert_eq!(record.count(), Some(i));
            assert_eq!(record.outcome.matches().unwrap().returned(), i + 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_recorded_without_retry() {
        let calls = AtomicUsize::new(0);
        let query = |point: SkyPoint, _r: Angle| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if point.ra_deg() == 10.0 {
                    Err(QueryError::permanent("ADQL syntax error"))
                } else {
                    Ok(vec![qso_at(point)])
                }
            }
        };

        let outcome = runner(1, 5)
            .run(&points(3), Angle::from_arcminutes(10.0), &query)
            .await;

        assert!(outcome.is_complete());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.counts(), vec![Some(1), None, Some(1)]);
        assert_eq!(outcome.known_counts(), vec![1, 1]);
        assert_eq!(outcome.failures(), 1);
        assert_eq!(outcome.records()[1].attempts, 1);
        assert_eq!(
            outcome.records()[1].outcome,
            QueryOutcome::PermanentFailure("ADQL syntax error".into())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_exhausted_truncates() {
        let query = |point: SkyPoint, _r: Angle| async move {
            if point.ra_deg() == 10.0 {
                Err(QueryError::transient("HTTP 503"))
            } else {
                Ok(Vec::new())
            }
        };
        let runner = runner(1, 5).with_retry_policy(RetryPolicy {
            max_attempts: Some(3),
            max_elapsed: None,
            backoff: Backoff::Fixed(Duration::from_secs(5)),
        });

        let outcome = runner
            .run(&points(4), Angle::from_arcminutes(10.0), &query)
            .await;

        assert!(!outcome.is_complete());
        assert_eq!(
            outcome.truncation(),
            Some(TruncationReason::RetryBudgetExhausted {
                index: 1,
                attempts: 3
            })
        );
        assert_eq!(outcome.len(), 1);

        match outcome.into_complete() {
            Err(SurveyError::BatchTruncated {
                requested,
                completed,
                ..
            }) => {
                assert_eq!(requested, 4);
                assert_eq!(completed, 1);
            }
            other => panic!("expected truncation, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_elapsed_caps_retry() {
        let origin = Instant::now();
        let starts = std::sync::Mutex::new(Vec::new());
        let query = |_p: SkyPoint, _r: Angle| {
            starts.lock().unwrap().push(origin.elapsed().as_secs());
            async { Err::<Vec<CatalogObject>, _>(QueryError::transient("timeout")) }
        };
        let runner = runner(1, 5).with_retry_policy(RetryPolicy {
            max_attempts: None,
            max_elapsed: Some(Duration::from_secs(10)),
            backoff: Backoff::Fixed(Duration::from_secs(5)),
        });

        let outcome = runner
            .run(&points(2), Angle::from_arcminutes(10.0), &query)
            .await;

        // A third attempt would start at 12 s, past the 10 s cap.
        assert_eq!(*starts.lock().unwrap(), vec![0, 6]);
        assert_eq!(origin.elapsed(), Duration::from_secs(7));
        assert_eq!(
            outcome.truncation(),
            Some(TruncationReason::RetryBudgetExhausted {
                index: 0,
                attempts: 2
            })
        );
        assert!(outcome.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_attempt_starts_at_the_elapsed_cap() {
        let calls = AtomicUsize::new(0);
        let query = |_p: SkyPoint, _r: Angle| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<Vec<CatalogObject>, _>(QueryError::transient("HTTP 503")) }
        };
        // Next start would land exactly on the cap: 1 s throttle + 5 s backoff.
        let runner = runner(1, 5).with_retry_policy(RetryPolicy {
            max_attempts: None,
            max_elapsed: Some(Duration::from_secs(6)),
            backoff: Backoff::Fixed(Duration::from_secs(5)),
        });

        let outcome = runner
            .run(&points(1), Angle::from_arcminutes(10.0), &query)
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            outcome.truncation(),
            Some(TruncationReason::RetryBudgetExhausted {
                index: 0,
                attempts: 1
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_retry_eventually_succeeds() {
        let calls = AtomicUsize::new(0);
        let query = |_p: SkyPoint, _r: Angle| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 25 {
                    Err(QueryError::transient("HTTP 429"))
                } else {
                    Ok(Vec::new())
                }
            }
        };
        let runner = RateLimitedQueryRunner::new(TargetTypes::default())
            .with_retry_policy(RetryPolicy::unbounded(Backoff::Fixed(Duration::from_secs(5))));

        let outcome = runner
            .run(&points(1), Angle::from_arcminutes(10.0), &query)
            .await;

        assert!(outcome.is_complete());
        assert_eq!(outcome.records()[0].attempts, 26);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start() {
        let (handle, cancel) = CancelHandle::new();
        handle.cancel();
        let calls = AtomicUsize::new(0);
        let query = |_p: SkyPoint, _r: Angle| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, QueryError>(Vec::new()) }
        };

        let outcome = runner(1, 5)
            .with_cancellation(cancel)
            .run(&points(3), Angle::from_arcminutes(10.0), &query)
            .await;

        assert_eq!(outcome.truncation(), Some(TruncationReason::Cancelled));
        assert!(outcome.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_batch_keeps_finished_records() {
        let (handle, cancel) = CancelHandle::new();
        let query = |point: SkyPoint, _r: Angle| {
            if point.ra_deg() == 20.0 {
                handle.cancel();
            }
            async move { Ok::<_, QueryError>(vec![qso_at(point)]) }
        };

        let outcome = runner(1, 5)
            .with_cancellation(cancel)
            .run(&points(5), Angle::from_arcminutes(10.0), &query)
            .await;

        assert_eq!(outcome.truncation(), Some(TruncationReason::Cancelled));
        // The in-flight query for point 2 is abandoned by the cancel.
        assert_eq!(outcome.len(), 2);
        assert!(outcome.records().iter().all(QueryRecord::is_success));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_backoff() {
        let (handle, cancel) = CancelHandle::new();
        let query = |_p: SkyPoint, _r: Angle| async {
            Err::<Vec<CatalogObject>, _>(QueryError::transient("timeout"))
        };
        let runner = runner(1, 600).with_cancellation(cancel);
        let pts = points(2);

        let start = Instant::now();
        let (outcome, ()) = tokio::join!(
            runner.run(&pts, Angle::from_arcminutes(10.0), &query),
            async {
                sleep(Duration::from_secs(30)).await;
                handle.cancel();
            }
        );

        assert_eq!(outcome.truncation(), Some(TruncationReason::Cancelled));
        assert!(outcome.is_empty());
        assert!(start.elapsed() < Duration::from_secs(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_last_point_is_complete() {
        let (handle, cancel) = CancelHandle::new();
        let query = |point: SkyPoint, _r: Angle| async move { Ok::<_, QueryError>(vec![qso_at(point)]) };
        let runner = runner(1, 5).with_cancellation(cancel);
        let pts = points(2);

        let outcome = runner
            .run_observed(&pts, Angle::from_arcminutes(10.0), &query, |record| {
                if record.index == 1 {
                    handle.cancel();
                }
            })
            .await;

        assert!(outcome.is_complete());
        assert_eq!(outcome.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deterministic_query_gives_identical_outcomes() {
        let query = |point: SkyPoint, _r: Angle| async move {
            let n = (point.ra_deg() as usize / 10) % 3;
            Ok::<_, QueryError>((0..n).map(|_| qso_at(point)).collect())
        };
        let runner = runner(1, 5);
        let input = points(6);
        let first = runner.run(&input, Angle::from_arcminutes(20.0), &query).await;
        let second = runner.run(&input, Angle::from_arcminutes(20.0), &query).await;
        assert_eq!(first, second);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_gate_spaces_request_starts() {
        let gate = Arc::new(RateGate::new(Duration::from_secs(3)));
        let query = |_p: SkyPoint, _r: Angle| async { Ok::<_, QueryError>(Vec::new()) };
        let runner = runner(1, 5).with_rate_gate(gate);

        let start = Instant::now();
        let outcome = runner
            .run(&points(2), Angle::from_arcminutes(10.0), &query)
            .await;

        assert!(outcome.is_complete());
        // Second start waits for the gate at 3 s, then one more throttle.
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_sees_every_record() {
        let query = |_p: SkyPoint, _r: Angle| async { Ok::<_, QueryError>(Vec::new()) };
        let mut seen = Vec::new();
        let outcome = runner(0, 0)
            .run_observed(&points(4), Angle::from_arcminutes(10.0), &query, |r| {
                seen.push(r.index)
            })
            .await;
        assert_eq!(seen, vec![0, 1, 2, 3]);
        assert_eq!(outcome.len(), 4);
    }

    #[test]
    fn test_fixed_backoff() {
        let backoff = Backoff::Fixed(Duration::from_secs(5));
        assert_eq!(backoff.delay(1), Duration::from_secs(5));
        assert_eq!(backoff.delay(7), Duration::from_secs(5));
    }

    #[test]
    fn test_exponential_backoff_caps() {
        let backoff = Backoff::Exponential {
            initial: Duration::from_secs(1),
            factor: 2.0,
            max: Duration::from_secs(10),
        };
        assert_eq!(backoff.delay(1), Duration::from_secs(1));
        assert_eq!(backoff.delay(2), Duration::from_secs(2));
        assert_eq!(backoff.delay(4), Duration::from_secs(8));
        assert_eq!(backoff.delay(5), Duration::from_secs(10));
        assert_eq!(backoff.delay(5000), Duration::from_secs(10));
    }

    #[test]
    fn test_exponential_backoff_rejects_shrinking_factor() {
        let backoff = Backoff::Exponential {
            initial: Duration::from_secs(3),
            factor: f64::NAN,
            max: Duration::from_secs(10),
        };
        assert_eq!(backoff.delay(6), Duration::from_secs(3));
    }

    #[test]
    fn test_truncation_reason_display() {
        assert_eq!(TruncationReason::Cancelled.to_string(), "cancelled");
        let reason = TruncationReason::RetryBudgetExhausted {
            index: 4,
            attempts: 10,
        };
        assert_eq!(
            reason.to_string(),
            "retry budget exhausted at point 4 after 10 attempts"
        );
    }
}
