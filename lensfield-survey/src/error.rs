use lensfield_core::AstroError;
use thiserror::Error;

use crate::query::TruncationReason;

pub type Result<T> = std::result::Result<T, SurveyError>;

/// Batch-level failures of a survey run.
///
/// Per-point query failures are not here: transient ones are retried inside
/// the runner and permanent ones are recorded in the
/// [`BatchOutcome`](crate::query::BatchOutcome). What remains are the
/// conditions a caller has to acknowledge before using a result.
#[derive(Debug, Error)]
pub enum SurveyError {
    #[error("partial sample: {produced} of {requested} control points after {attempts} attempts")]
    PartialSample {
        requested: usize,
        produced: usize,
        attempts: usize,
    },

    #[error("batch truncated after {completed} of {requested} points: {reason}")]
    BatchTruncated {
        requested: usize,
        completed: usize,
        reason: TruncationReason,
    },

    #[error("catalog error at line {line}: {message}")]
    Catalog { line: usize, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Coordinate(#[from] AstroError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("plot error: {0}")]
    Plot(String),
}

impl SurveyError {
    pub fn catalog(line: usize, message: impl Into<String>) -> Self {
        Self::Catalog {
            line,
            message: message.into(),
        }
    }

    /// Returns `true` for the two conditions that still carry usable (but
    /// shorter) data: a partial control sample and a truncated batch.
    pub fn is_shortfall(&self) -> bool {
        matches!(
            self,
            Self::PartialSample { .. } | Self::BatchTruncated { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_sample_message() {
        let err = SurveyError::PartialSample {
            requested: 50,
            produced: 48,
            attempts: 5000,
        };
        assert_eq!(
            err.to_string(),
            "partial sample: 48 of 50 control points after 5000 attempts"
        );
        assert!(err.is_shortfall());
    }

    #[test]
    fn test_batch_truncated_message() {
        let err = SurveyError::BatchTruncated {
            requested: 10,
            completed: 3,
            reason: TruncationReason::Cancelled,
        };
        assert!(err.to_string().contains("after 3 of 10 points"));
        assert!(err.to_string().contains("cancelled"));
        assert!(err.is_shortfall());
    }

    #[test]
    fn test_catalog_error_is_not_shortfall() {
        let err = SurveyError::catalog(7, "missing RA");
        assert_eq!(err.to_string(), "catalog error at line 7: missing RA");
        assert!(!err.is_shortfall());
    }

    #[test]
    fn test_coordinate_error_converts() {
        let err: SurveyError = lensfield_core::SkyPoint::new(0.0, 100.0).unwrap_err().into();
        assert!(matches!(err, SurveyError::Coordinate(_)));
    }
}
