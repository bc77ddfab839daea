//! `survey`: batched lens/control comparison at several radii.

use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::{bail, Context, Result};
use lensfield_core::{Angle, SkyPoint};
use lensfield_survey::config::SurveyConfig;
use lensfield_survey::pipeline::{draw_controls, query_field_pair_observed, FieldPair};
use lensfield_survey::query::{Cancellation, QueryRecord, SimbadClient};
use lensfield_survey::stats::FieldComparison;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

use crate::cli::SurveyArgs;
use crate::common;

const HEADER: &str = "batch,radius_arcmin,lens_fields,control_fields,lens_fraction,\
control_fraction,chi2,chi2_p,mean_lens,mean_control,lens_total,control_total,poisson_p,failed";

/// Known counts pooled over every batch at one radius.
#[derive(Default)]
struct Pooled {
    lens: Vec<usize>,
    control: Vec<usize>,
}

pub async fn run(args: &SurveyArgs, config: &SurveyConfig, cancel: Cancellation) -> Result<()> {
    let common_args = &args.common;
    if args.radii.is_empty() || args.radii.iter().any(|r| !(r.is_finite() && *r > 0.0)) {
        bail!("--radii needs positive arcminute values, got {:?}", args.radii);
    }
    let catalog = common::load_lenses(common_args, config)?;
    let exclusion = catalog.exclusion_set();
    let sampler = config.sampler.sampler();
    let min_separation = common::min_separation(common_args, config);
    let mut rng = StdRng::seed_from_u64(common_args.seed);

    let client = SimbadClient::new(config.simbad.clone())?;
    let runner = common::build_runner(common_args, config, cancel);

    let file = File::create(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    let mut out = BufWriter::new(file);
    writeln!(out, "{HEADER}")?;

    let batches: Vec<_> = catalog
        .batches(args.batch_size)
        .take(args.limit.unwrap_or(usize::MAX))
        .collect();
    let mut pooled: Vec<Pooled> = args.radii.iter().map(|_| Pooled::default()).collect();
    let mut interrupted = None;

    'batches: for (batch_index, batch) in batches.iter().enumerate() {
        let lenses: Vec<SkyPoint> = batch.iter().map(|r| r.position).collect();
        let controls = draw_controls(
            &sampler,
            lenses.len(),
            &exclusion,
            min_separation,
            common_args.allow_partial,
            &mut rng,
        )?;
        info!(
            batch = batch_index + 1,
            of = batches.len(),
            lenses = lenses.len(),
            controls = controls.len(),
            "starting batch"
        );

        for (radius_arcmin, totals) in args.radii.iter().zip(pooled.iter_mut()) {
            let radius = Angle::from_arcminutes(*radius_arcmin);
            let pb = common::progress_bar((lenses.len() + controls.len()) as u64)?;
            pb.set_message(format!("batch {} at {radius:.1}", batch_index + 1));
            let pair = query_field_pair_observed(
                &runner,
                &lenses,
                &controls,
                radius,
                &client,
                common_args.concurrent,
                &|_: &QueryRecord| pb.inc(1),
            )
            .await;
            pb.finish_and_clear();

            if pair.was_cancelled() {
                warn!(batch = batch_index + 1, "survey interrupted; batch not recorded");
                interrupted = Some(pair);
                break 'batches;
            }
            common::check_complete(&pair, common_args.allow_partial)?;

            write_row(&mut out, batch_index + 1, *radius_arcmin, &pair)?;
            out.flush()?;
            totals.lens.extend(pair.lens.known_counts());
            totals.control.extend(pair.control.known_counts());
        }
    }

    print_summary(&args.radii, &pooled);
    println!("Batch rows written to {}", args.output.display());
    // Rows already written stay; the exit status still reports the stop.
    match interrupted {
        Some(pair) => common::check_complete(&pair, common_args.allow_partial),
        None => Ok(()),
    }
}

fn write_row(out: &mut impl Write, batch: usize, radius_arcmin: f64, pair: &FieldPair) -> Result<()> {
    let cmp = pair.comparison();
    writeln!(
        out,
        "{batch},{radius_arcmin},{},{},{},{},{:.6},{:.6},{},{},{},{},{:.6},{}",
        cmp.lens_fields,
        cmp.control_fields,
        common::float_cell(cmp.lens_fraction()),
        common::float_cell(cmp.control_fraction()),
        cmp.chi2.statistic,
        cmp.chi2.p_value,
        common::float_cell(cmp.mean_lens),
        common::float_cell(cmp.mean_control),
        cmp.lens_total,
        cmp.control_total,
        cmp.poisson_p,
        pair.lens.failures() + pair.control.failures(),
    )?;
    Ok(())
}

fn print_summary(radii: &[f64], pooled: &[Pooled]) {
    let fmt = |v: Option<f64>| v.map_or("n/a".to_string(), |v| format!("{v:.3}"));
    println!();
    println!(
        "{:>8} {:>7} {:>7} {:>8} {:>8} {:>9} {:>9} {:>10}",
        "radius'", "lens", "control", "f_lens", "f_ctrl", "chi2 p", "<n_lens>", "Poisson p"
    );
    for (radius, totals) in radii.iter().zip(pooled) {
        if totals.lens.is_empty() && totals.control.is_empty() {
            continue;
        }
        let cmp = FieldComparison::from_counts(&totals.lens, &totals.control);
        println!(
            "{:>8.1} {:>7} {:>7} {:>8} {:>8} {:>9.4} {:>9} {:>10.4}",
            radius,
            cmp.lens_fields,
            cmp.control_fields,
            fmt(cmp.lens_fraction()),
            fmt(cmp.control_fraction()),
            cmp.chi2.p_value,
            fmt(cmp.mean_lens),
            cmp.poisson_p,
        );
    }
}
