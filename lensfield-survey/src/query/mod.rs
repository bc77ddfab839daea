//! Remote cone queries: the SIMBAD client, the object-type filter and the
//! rate-limited runner that drives them one point at a time.

mod cancel;
mod gate;
mod runner;
mod simbad;
mod types;

pub use cancel::{CancelHandle, Cancellation};
pub use gate::RateGate;
pub use runner::{
    Backoff, BatchOutcome, Completion, QueryOutcome, QueryRecord, RateLimitedQueryRunner,
    RegionQuery, RetryPolicy, TruncationReason, DEFAULT_BACKOFF, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_THROTTLE,
};
pub use simbad::{SimbadClient, SimbadConfig, SIMBAD_TAP_URL};
pub use types::{
    CatalogObject, FieldMatches, MatchMode, QueryError, TargetTypes, DEFAULT_TARGET_LABELS,
};
