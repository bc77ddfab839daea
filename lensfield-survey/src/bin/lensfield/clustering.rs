//! `clustering`: do matched objects bunch up more in lens fields?

use anyhow::{Context, Result};
use lensfield_core::Angle;
use lensfield_survey::config::SurveyConfig;
use lensfield_survey::pipeline::{draw_controls, query_field_pair_observed};
use lensfield_survey::plot::{separation_histogram_svg, HistogramOptions};
use lensfield_survey::query::{Cancellation, QueryRecord, SimbadClient};
use lensfield_survey::stats::{ks_2samp, mean};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::cli::ClusteringArgs;
use crate::common;

pub async fn run(
    args: &ClusteringArgs,
    config: &SurveyConfig,
    cancel: Cancellation,
) -> Result<()> {
    let common_args = &args.common;
    let catalog = common::load_lenses(common_args, config)?;
    let mut rng = StdRng::seed_from_u64(common_args.seed);

    let lenses = catalog.sample(args.lenses, &mut rng).positions();
    let controls = draw_controls(
        &config.sampler.sampler(),
        lenses.len(),
        &catalog.exclusion_set(),
        common::min_separation(common_args, config),
        common_args.allow_partial,
        &mut rng,
    )?;

    let client = SimbadClient::new(config.simbad.clone())?;
    let runner = common::build_runner(common_args, config, cancel);

    let pb = common::progress_bar((lenses.len() + controls.len()) as u64)?;
    let pair = query_field_pair_observed(
        &runner,
        &lenses,
        &controls,
        Angle::from_arcminutes(args.radius_arcmin),
        &client,
        common_args.concurrent,
        &|_: &QueryRecord| pb.inc(1),
    )
    .await;
    pb.finish_and_clear();
    common::check_complete(&pair, common_args.allow_partial)?;

    let (lens_seps, control_seps) = pair.pooled_separations();
    let fmt = |v: Option<f64>| v.map_or("n/a".to_string(), |v| format!("{v:.2}'"));
    println!(
        "Lens fields:    {} pairs, mean separation {}",
        lens_seps.len(),
        fmt(mean(&lens_seps))
    );
    println!(
        "Control fields: {} pairs, mean separation {}",
        control_seps.len(),
        fmt(mean(&control_seps))
    );
    match ks_2samp(&lens_seps, &control_seps) {
        Some(ks) => println!("KS statistic = {:.4}, p = {:.4}", ks.statistic, ks.p_value),
        None => println!("Not enough object pairs for a KS test"),
    }

    let options = HistogramOptions {
        title: format!(
            "Pairwise separations within {:.0}' fields",
            args.radius_arcmin
        ),
        bins: args.bins,
        ..HistogramOptions::default()
    };
    separation_histogram_svg(&lens_seps, &control_seps, &args.output, &options)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    if args.output.exists() {
        println!("Histogram written to {}", args.output.display());
    }
    Ok(())
}
