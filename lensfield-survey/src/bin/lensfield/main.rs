//! lensfield: compact-object counts around strong gravitational lenses
//!
//! Samples lenses from a catalog, draws control fields clear of every lens,
//! queries SIMBAD around both and compares the two populations.

mod cli;
mod clustering;
mod common;
mod counts;
mod survey;

use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    common::init_tracing(cli.verbose);

    let config = common::load_config(cli.config.as_deref())?;
    let cancel = common::cancel_on_ctrl_c();

    match &cli.command {
        Commands::Counts(args) => counts::run(args, &config, cancel).await,
        Commands::Survey(args) => survey::run(args, &config, cancel).await,
        Commands::Clustering(args) => clustering::run(args, &config, cancel).await,
    }
}
