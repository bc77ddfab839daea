//! Records exchanged with a remote object catalog.

use std::collections::BTreeSet;
use std::fmt;

use lensfield_core::SkyPoint;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One object returned by a cone query.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogObject {
    pub identifier: String,
    /// Published object-type label, e.g. `QSO` or `BLLac`.
    pub type_label: String,
    pub position: SkyPoint,
}

impl CatalogObject {
    pub fn new(identifier: impl Into<String>, type_label: impl Into<String>, position: SkyPoint) -> Self {
        Self {
            identifier: identifier.into(),
            type_label: type_label.into(),
            position,
        }
    }
}

/// Failure of a single remote query.
///
/// The split decides what the runner does next: transient failures are
/// retried, permanent ones are recorded and the runner moves on.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueryError {
    /// Network error, timeout, or the service asking us to slow down.
    #[error("transient query failure: {0}")]
    Transient(String),

    /// Malformed query, rejected input, or an unreadable response.
    #[error("permanent query failure: {0}")]
    Permanent(String),
}

impl QueryError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent(message.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// How an object's label is compared against the target vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMode {
    /// The trimmed label equals one of the targets.
    #[default]
    Exact,
    /// Some target occurs inside the label (`XRB` matches `LMXRB`).
    Substring,
}

/// The set of object-type labels that count as "BH-type".
#[derive(Debug, Clone, PartialEq)]
pub struct TargetTypes {
    labels: BTreeSet<String>,
    mode: MatchMode,
}

/// Labels associated with accreting compact objects.
pub const DEFAULT_TARGET_LABELS: &[&str] = &[
    "BH", "BH?", "BLLac", "Blazar", "QSO", "AGN", "XRB", "LMXB", "HMXB", "BHXRB",
];

impl Default for TargetTypes {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_LABELS.iter().copied(), MatchMode::Exact)
    }
}

impl TargetTypes {
    pub fn new<I, S>(labels: I, mode: MatchMode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels = labels
            .into_iter()
            .map(Into::into)
            .map(|l: String| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        Self { labels, mode }
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    pub fn matches(&self, type_label: &str) -> bool {
        let label = type_label.trim();
        match self.mode {
            MatchMode::Exact => self.labels.contains(label),
            MatchMode::Substring => self.labels.iter().any(|t| label.contains(t.as_str())),
        }
    }

    /// Keeps the objects whose label is a target type.
    pub fn select(&self, objects: Vec<CatalogObject>) -> FieldMatches {
        let returned = objects.len();
        let objects = objects
            .into_iter()
            .filter(|o| self.matches(&o.type_label))
            .collect();
        FieldMatches { objects, returned }
    }
}

/// Target-type objects found in one field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldMatches {
    objects: Vec<CatalogObject>,
    returned: usize,
}

impl FieldMatches {
    /// Number of target-type objects.
    pub fn count(&self) -> usize {
        self.objects.len()
    }

    /// Number of objects the service returned before filtering.
    pub fn returned(&self) -> usize {
        self.returned
    }

    pub fn objects(&self) -> &[CatalogObject] {
        &self.objects
    }

    pub fn positions(&self) -> Vec<SkyPoint> {
        self.objects.iter().map(|o| o.position).collect()
    }
}

impl fmt::Display for FieldMatches {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {} objects", self.count(), self.returned)
    }
}
