//! `counts`: per-field match counts around lenses and their control points.

use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::{Context, Result};
use lensfield_core::{Angle, SkyPoint};
use lensfield_survey::config::SurveyConfig;
use lensfield_survey::pipeline::{draw_controls, query_field_pair_observed, FieldPair};
use lensfield_survey::query::{Cancellation, QueryRecord, SimbadClient};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::cli::CountsArgs;
use crate::common;

pub async fn run(args: &CountsArgs, config: &SurveyConfig, cancel: Cancellation) -> Result<()> {
    let common_args = &args.common;
    let catalog = common::load_lenses(common_args, config)?;
    let mut rng = StdRng::seed_from_u64(common_args.seed);

    let lenses = catalog.sample(args.lenses, &mut rng);
    let lens_points = lenses.positions();
    let controls = draw_controls(
        &config.sampler.sampler(),
        lens_points.len(),
        &catalog.exclusion_set(),
        common::min_separation(common_args, config),
        common_args.allow_partial,
        &mut rng,
    )?;

    let client = SimbadClient::new(config.simbad.clone())?;
    let runner = common::build_runner(common_args, config, cancel);
    let radius = Angle::from_arcminutes(args.radius_arcmin);

    println!(
        "Querying {} lens and {} control fields at {:.1}'",
        lens_points.len(),
        controls.len(),
        args.radius_arcmin
    );
    let pb = common::progress_bar((lens_points.len() + controls.len()) as u64)?;
    let pair = query_field_pair_observed(
        &runner,
        &lens_points,
        &controls,
        radius,
        &client,
        common_args.concurrent,
        &|_: &QueryRecord| pb.inc(1),
    )
    .await;
    pb.finish_and_clear();

    common::check_complete(&pair, common_args.allow_partial)?;
    write_counts(&args.output, &lens_points, &controls, &pair)?;
    print_summary(&pair);
    println!("Counts written to {}", args.output.display());
    Ok(())
}

fn write_counts(
    path: &std::path::Path,
    lenses: &[SkyPoint],
    controls: &[SkyPoint],
    pair: &FieldPair,
) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    writeln!(out, "lens_ra,lens_dec,lens_count,control_ra,control_dec,control_count")?;
    for (i, (lens_count, control_count)) in pair.aligned_counts().into_iter().enumerate() {
        let lens = lenses.get(i);
        let control = controls.get(i);
        writeln!(
            out,
            "{},{},{},{},{},{}",
            common::float_cell(lens.map(SkyPoint::ra_deg)),
            common::float_cell(lens.map(SkyPoint::dec_deg)),
            common::cell(lens_count),
            common::float_cell(control.map(SkyPoint::ra_deg)),
            common::float_cell(control.map(SkyPoint::dec_deg)),
            common::cell(control_count),
        )?;
    }
    out.flush()?;
    Ok(())
}

fn print_summary(pair: &FieldPair) {
    let cmp = pair.comparison();
    let pct = |f: Option<f64>| f.map_or("n/a".to_string(), |v| format!("{:.1}%", v * 100.0));
    println!();
    println!("Fields with matches:");
    println!(
        "  lens:    {}/{} ({})",
        cmp.lens_positive,
        cmp.lens_fields,
        pct(cmp.lens_fraction())
    );
    println!(
        "  control: {}/{} ({})",
        cmp.control_positive,
        cmp.control_fields,
        pct(cmp.control_fraction())
    );
    println!(
        "  chi2 = {:.3}, p = {:.4}",
        cmp.chi2.statistic, cmp.chi2.p_value
    );
    println!(
        "Total matches: lens {}, control {} (Poisson p = {:.4})",
        cmp.lens_total, cmp.control_total, cmp.poisson_p
    );
    let failed = pair.lens.failures() + pair.control.failures();
    if failed > 0 {
        println!("{failed} fields failed permanently and were left out");
    }
}
