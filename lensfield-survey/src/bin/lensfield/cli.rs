//! CLI argument definitions for lensfield

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lensfield")]
#[command(about = "Compact-object counts around strong lenses versus random control fields")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to ./lensfield.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Count matches around sampled lenses and one control point per lens
    Counts(CountsArgs),

    /// Batched lens/control comparison at several radii
    Survey(SurveyArgs),

    /// Compare pairwise separations of matched objects in lens and control fields
    Clustering(ClusteringArgs),
}

/// Options shared by every subcommand.
#[derive(Args)]
pub struct CommonArgs {
    /// Lens catalog CSV
    #[arg(long)]
    pub catalog: PathBuf,

    /// Accepted lens grades, comma separated (overrides the config)
    #[arg(long, value_delimiter = ',')]
    pub grades: Option<Vec<String>>,

    /// Minimum control-to-lens separation in arcminutes (overrides the config)
    #[arg(long)]
    pub min_separation_arcmin: Option<f64>,

    /// Seed for lens and control sampling
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Continue with partial control samples and truncated batches
    #[arg(long)]
    pub allow_partial: bool,

    /// Run lens and control batches side by side behind a shared rate gate
    #[arg(long)]
    pub concurrent: bool,

    /// Pause after every query in milliseconds (overrides the config)
    #[arg(long)]
    pub throttle_ms: Option<u64>,
}

#[derive(Parser)]
pub struct CountsArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Number of lenses to sample
    #[arg(long, default_value = "100")]
    pub lenses: usize,

    /// Search radius in arcminutes
    #[arg(long, default_value = "15.0")]
    pub radius_arcmin: f64,

    /// Output CSV
    #[arg(long, default_value = "bh_counts.csv")]
    pub output: PathBuf,
}

#[derive(Parser)]
pub struct SurveyArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Lenses per batch
    #[arg(long, default_value = "50")]
    pub batch_size: usize,

    /// Search radii in arcminutes, comma separated
    #[arg(long, value_delimiter = ',', default_value = "10,15,20")]
    pub radii: Vec<f64>,

    /// Process only the first N batches
    #[arg(long)]
    pub limit: Option<usize>,

    /// Output CSV with one row per batch and radius
    #[arg(long, default_value = "survey_batches.csv")]
    pub output: PathBuf,
}

#[derive(Parser)]
pub struct ClusteringArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Number of lenses to sample
    #[arg(long, default_value = "1000")]
    pub lenses: usize,

    /// Search radius in arcminutes
    #[arg(long, default_value = "20.0")]
    pub radius_arcmin: f64,

    /// Number of histogram bins
    #[arg(long, default_value = "30")]
    pub bins: usize,

    /// Output SVG histogram
    #[arg(long, default_value = "separations.svg")]
    pub output: PathBuf,
}
