//! Setup shared by the subcommands.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use lensfield_core::Angle;
use lensfield_survey::catalog::LensCatalog;
use lensfield_survey::config::SurveyConfig;
use lensfield_survey::pipeline::FieldPair;
use lensfield_survey::query::{CancelHandle, Cancellation, RateGate, RateLimitedQueryRunner};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::CommonArgs;

pub fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

pub fn load_config(path: Option<&Path>) -> Result<SurveyConfig> {
    let config = match path {
        Some(path) => SurveyConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => SurveyConfig::load().context("Failed to load configuration")?,
    };
    Ok(config)
}

/// Cancellation that fires on the first Ctrl-C.
pub fn cancel_on_ctrl_c() -> Cancellation {
    let (handle, token) = CancelHandle::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current query");
            handle.cancel();
        }
    });
    token
}

pub fn min_separation(args: &CommonArgs, config: &SurveyConfig) -> Angle {
    args.min_separation_arcmin
        .map(Angle::from_arcminutes)
        .unwrap_or_else(|| config.sampler.min_separation())
}

/// Runner built from the config, with CLI overrides. Concurrent runs get a
/// gate spaced at the throttle interval so the combined rate stays the same.
pub fn build_runner(
    args: &CommonArgs,
    config: &SurveyConfig,
    cancel: Cancellation,
) -> RateLimitedQueryRunner {
    let throttle = args
        .throttle_ms
        .map(std::time::Duration::from_millis)
        .unwrap_or_else(|| config.runner.throttle());
    let runner = RateLimitedQueryRunner::new(config.targets.target_types())
        .with_throttle(throttle)
        .with_retry_policy(config.runner.retry_policy())
        .with_cancellation(cancel);
    if args.concurrent {
        runner.with_rate_gate(Arc::new(RateGate::new(throttle)))
    } else {
        runner
    }
}

/// Loads the catalog and keeps the lenses with an accepted grade.
pub fn load_lenses(args: &CommonArgs, config: &SurveyConfig) -> Result<LensCatalog> {
    let catalog = LensCatalog::from_path(&args.catalog, &config.catalog.columns)
        .with_context(|| format!("Failed to read lens catalog {}", args.catalog.display()))?;
    let grades = args.grades.as_ref().unwrap_or(&config.catalog.grades);
    let filtered = catalog.filter(grades.as_slice(), config.catalog.require_redshift);
    info!(
        total = catalog.len(),
        kept = filtered.len(),
        "lens catalog loaded"
    );
    if filtered.is_empty() {
        bail!("No lenses left after filtering {}", args.catalog.display());
    }
    Ok(filtered)
}

pub fn progress_bar(len: u64) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Turns a truncated pair into an error unless partial results are allowed.
pub fn check_complete(pair: &FieldPair, allow_partial: bool) -> Result<()> {
    match pair.ensure_complete() {
        Ok(()) => Ok(()),
        Err(e) if allow_partial && e.is_shortfall() => {
            warn!(error = %e, "continuing with a truncated batch");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// CSV cell for a value that may be missing.
pub fn cell<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn float_cell(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.6}")).unwrap_or_default()
}
