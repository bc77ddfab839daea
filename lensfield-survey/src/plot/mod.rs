//! SVG output for survey results.

mod svg;

pub use svg::{density_bins, separation_histogram_svg, HistogramOptions};
