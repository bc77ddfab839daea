//! Survey configuration.
//!
//! Values are layered, later sources winning:
//! - built-in defaults
//! - a TOML file (`lensfield.toml` in the working directory, or an explicit
//!   path)
//! - environment variables with the `LENSFIELD_` prefix
//!
//! ```toml
//! [simbad]
//! timeout_secs = 60
//!
//! [runner]
//! throttle_ms = 500
//! max_attempts = 5
//!
//! [runner.backoff]
//! kind = "exponential"
//! initial_ms = 2000
//!
//! [sampler]
//! min_separation_arcmin = 20.0
//! declination = "area-uniform"
//! ```
//!
//! Environment overrides use `__` between section and key:
//! ```bash
//! LENSFIELD_RUNNER__THROTTLE_MS=250
//! LENSFIELD_SIMBAD__ENDPOINT=http://localhost:8080/sync
//! ```

use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use lensfield_core::Angle;
use serde::{Deserialize, Serialize};

use crate::catalog::CatalogColumns;
use crate::error::{Result, SurveyError};
use crate::query::{
    Backoff, MatchMode, RetryPolicy, SimbadConfig, TargetTypes, DEFAULT_TARGET_LABELS,
};
use crate::sampler::{ControlPointSampler, DeclinationSampling, DEFAULT_ATTEMPTS_PER_POINT};

pub const ENV_PREFIX: &str = "LENSFIELD_";
pub const DEFAULT_CONFIG_FILE: &str = "lensfield.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurveyConfig {
    pub simbad: SimbadConfig,
    pub runner: RunnerConfig,
    pub sampler: SamplerConfig,
    pub targets: TargetsConfig,
    pub catalog: CatalogConfig,
}

/// Pacing and retry of remote queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Pause after every query attempt.
    pub throttle_ms: u64,
    /// Attempts per point. Defaults to
    /// [`DEFAULT_MAX_ATTEMPTS`](crate::query::DEFAULT_MAX_ATTEMPTS); `0`
    /// means unlimited.
    pub max_attempts: Option<u32>,
    /// Wall-clock cap per point; absent means unlimited.
    pub max_elapsed_secs: Option<u64>,
    pub backoff: BackoffConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            throttle_ms: 1000,
            max_attempts: Some(crate::query::DEFAULT_MAX_ATTEMPTS),
            max_elapsed_secs: None,
            backoff: BackoffConfig::default(),
        }
    }
}

impl RunnerConfig {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.filter(|&n| n > 0),
            max_elapsed: self.max_elapsed_secs.map(Duration::from_secs),
            backoff: self.backoff.backoff(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackoffKind {
    #[default]
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub kind: BackoffKind,
    /// Fixed delay, or the first delay of an exponential schedule.
    pub initial_ms: u64,
    pub factor: f64,
    pub max_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            kind: BackoffKind::Fixed,
            initial_ms: 5000,
            factor: 2.0,
            max_ms: 60_000,
        }
    }
}

impl BackoffConfig {
    pub fn backoff(&self) -> Backoff {
        let initial = Duration::from_millis(self.initial_ms);
        match self.kind {
            BackoffKind::Fixed => Backoff::Fixed(initial),
            BackoffKind::Exponential => Backoff::Exponential {
                initial,
                factor: self.factor,
                max: Duration::from_millis(self.max_ms),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Control points must lie strictly farther than this from every lens.
    pub min_separation_arcmin: f64,
    pub attempts_per_point: usize,
    pub declination: DeclinationSampling,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            min_separation_arcmin: 20.0,
            attempts_per_point: DEFAULT_ATTEMPTS_PER_POINT,
            declination: DeclinationSampling::AreaUniform,
        }
    }
}

impl SamplerConfig {
    pub fn min_separation(&self) -> Angle {
        Angle::from_arcminutes(self.min_separation_arcmin)
    }

    pub fn sampler(&self) -> ControlPointSampler {
        ControlPointSampler::new()
            .with_declination(self.declination)
            .with_attempts_per_point(self.attempts_per_point)
    }
}

/// Object types counted as matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetsConfig {
    pub labels: Vec<String>,
    pub match_mode: MatchMode,
}

impl Default for TargetsConfig {
    fn default() -> Self {
        Self {
            labels: DEFAULT_TARGET_LABELS.iter().map(|s| s.to_string()).collect(),
            match_mode: MatchMode::Exact,
        }
    }
}

impl TargetsConfig {
    pub fn target_types(&self) -> TargetTypes {
        TargetTypes::new(self.labels.iter().cloned(), self.match_mode)
    }
}

/// Which lenses to use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub columns: CatalogColumns,
    /// Accepted grades; empty accepts every grade.
    pub grades: Vec<String>,
    pub require_redshift: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            columns: CatalogColumns::default(),
            grades: vec!["confident".to_string(), "probable".to_string()],
            require_redshift: true,
        }
    }
}

impl SurveyConfig {
    /// Defaults, then `lensfield.toml` if present, then the environment.
    pub fn load() -> Result<Self> {
        Self::extract(Self::base().merge(Toml::file(DEFAULT_CONFIG_FILE)))
    }

    /// Like [`load`](Self::load) but with an explicit file, which must exist.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(SurveyError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        Self::extract(Self::base().merge(Toml::file(path)))
    }

    fn base() -> Figment {
        Figment::from(Serialized::defaults(SurveyConfig::default()))
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| SurveyError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let sep = self.sampler.min_separation_arcmin;
        if !sep.is_finite() {
            return Err(SurveyError::Config(format!(
                "sampler.min_separation_arcmin must be finite, got {sep}"
            )));
        }
        if self.sampler.attempts_per_point == 0 {
            return Err(SurveyError::Config(
                "sampler.attempts_per_point must be at least 1".into(),
            ));
        }
        let factor = self.runner.backoff.factor;
        if self.runner.backoff.kind == BackoffKind::Exponential
            && !(factor.is_finite() && factor >= 1.0)
        {
            return Err(SurveyError::Config(format!(
                "runner.backoff.factor must be >= 1, got {factor}"
            )));
        }
        if self.targets.labels.iter().all(|l| l.trim().is_empty()) {
            return Err(SurveyError::Config("targets.labels is empty".into()));
        }
        Ok(())
    }
}
