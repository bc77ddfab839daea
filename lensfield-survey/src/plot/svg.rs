use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;
use std::path::Path;

use crate::error::{Result, SurveyError};

type PlotResult = std::result::Result<(), Box<dyn std::error::Error>>;

/// Labels and binning for an overlaid two-sample histogram.
#[derive(Debug, Clone)]
pub struct HistogramOptions {
    pub title: String,
    pub x_label: String,
    pub first_label: String,
    pub second_label: String,
    pub bins: usize,
}

impl Default for HistogramOptions {
    fn default() -> Self {
        Self {
            title: "Pairwise separations of matched objects".to_string(),
            x_label: "Separation (arcmin)".to_string(),
            first_label: "Lens fields".to_string(),
            second_label: "Control fields".to_string(),
            bins: 20,
        }
    }
}

/// Writes both samples as density-normalised histograms on shared bins,
/// drawn half-transparent over each other.
///
/// Nothing is written when both samples are empty.
pub fn separation_histogram_svg(
    first: &[f64],
    second: &[f64],
    path: &Path,
    options: &HistogramOptions,
) -> Result<()> {
    let values: Vec<f64> = first
        .iter()
        .chain(second)
        .copied()
        .filter(|v| v.is_finite())
        .collect();
    if values.is_empty() {
        return Ok(());
    }
    let n_bins = options.bins.max(1);
    let (min_val, max_val) = extent(values.iter().copied());
    let bin_width = (max_val - min_val).max(1e-10) / n_bins as f64;

    let first_density = density_bins(first, min_val, bin_width, n_bins);
    let second_density = density_bins(second, min_val, bin_width, n_bins);

    draw_overlay(
        path,
        options,
        min_val,
        bin_width,
        &[
            (&first_density, &options.first_label, BLUE),
            (&second_density, &options.second_label, RED),
        ],
    )
    .map_err(|e| SurveyError::Plot(e.to_string()))
}

/// Histogram heights normalised so that each sample integrates to one.
/// Values outside the binned range are ignored.
pub fn density_bins(values: &[f64], min_val: f64, bin_width: f64, n_bins: usize) -> Vec<f64> {
    let mut bins = vec![0u32; n_bins];
    let mut total = 0u32;
    for &v in values {
        if !v.is_finite() || v < min_val {
            continue;
        }
        let idx = ((v - min_val) / bin_width).floor() as usize;
        // The maximum lands on the upper edge of the last bin, give or take
        // rounding in `bin_width`.
        if idx > n_bins {
            continue;
        }
        bins[idx.min(n_bins - 1)] += 1;
        total += 1;
    }
    if total == 0 {
        return vec![0.0; n_bins];
    }
    let norm = total as f64 * bin_width;
    bins.into_iter().map(|c| c as f64 / norm).collect()
}

fn draw_overlay(
    path: &Path,
    options: &HistogramOptions,
    min_val: f64,
    bin_width: f64,
    series: &[(&Vec<f64>, &String, RGBColor)],
) -> PlotResult {
    let n_bins = series.first().map_or(0, |s| s.0.len());
    let x_max = min_val + n_bins as f64 * bin_width;
    let y_max = series
        .iter()
        .flat_map(|s| s.0.iter().copied())
        .fold(0.0_f64, f64::max)
        .max(1e-10)
        * 1.1;

    let root = SVGBackend::new(path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(&options.title, ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(min_val..x_max, 0.0..y_max)?;
    chart
        .configure_mesh()
        .x_desc(options.x_label.as_str())
        .y_desc("Density")
        .draw()?;

    for &(density, label, color) in series {
        draw_density_bars(&mut chart, density, min_val, bin_width, color, label)?;
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

fn draw_density_bars<DB: DrawingBackend>(
    chart: &mut ChartContext<DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>,
    density: &[f64],
    min_val: f64,
    bin_width: f64,
    color: RGBColor,
    label: &str,
) -> PlotResult
where
    DB::ErrorType: 'static,
{
    let fill = color.mix(0.5).filled();
    chart
        .draw_series(density.iter().enumerate().map(|(i, &height)| {
            let x0 = min_val + i as f64 * bin_width;
            let x1 = x0 + bin_width;
            Rectangle::new([(x0, 0.0), (x1, height)], fill)
        }))?
        .label(label)
        .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], fill));
    Ok(())
}

fn extent(iter: impl Iterator<Item = f64>) -> (f64, f64) {
    iter.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}
