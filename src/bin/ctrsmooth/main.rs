use anyhow::{bail, Result};
use clap::Parser;
use env_logger::Env;
use log::info;
use std::path::Path;

mod cli;
mod io;
mod smoothing;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    // Set up logging level
    match args.verbosity {
        cli::LogLevel::Silent => {
            env_logger::Builder::from_env(Env::default().default_filter_or("off")).init();
        }
        cli::LogLevel::Normal => {
            env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
        }
        cli::LogLevel::Verbose => {
            env_logger::Builder::from_env(Env::default().default_filter_or("debug")).init();
        }
    }

    // Create output directory
    info!("Running empirical-Bayes CTR smoothing");
    let out_path = Path::new(&args.out);
    if out_path.exists() {
        bail!("Output directory already exists: {}", args.out);
    }
    std::fs::create_dir(out_path)?;

    smoothing::ctrsmooth(&args)?;
    Ok(())
}
