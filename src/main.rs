//! Reserve forecast command line.
//!
//! Builds trainval artifacts from raw forecast tables and scores
//! cross-validated quantile predictions.

use anyhow::Context;
use clap::{Parser, Subcommand};
use reserve_forecast::{
    config::TrainvalConfig,
    pipeline::{self, EvaluationRun},
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "reserve-forecast")]
#[command(about = "Trainval construction and quantile-forecast evaluation for reserve sizing")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build trainval artifacts from value and validity CSVs
    BuildTrainval {
        /// Config file path; built-in CAISO defaults when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Score quantile predictions against observations
    Evaluate {
        /// Prediction CSV with quantile/fold/output header rows
        #[arg(long)]
        predictions: PathBuf,
        /// Observed CSV (timestamp, outputs)
        #[arg(long)]
        observed: PathBuf,
        /// Validation masks CSV (fold id, flags)
        #[arg(long)]
        masks: Option<PathBuf>,
        /// Metrics CSV from an earlier run; only new quantiles are scored
        #[arg(long)]
        previous: Option<PathBuf>,
        /// Also write fold-averaged metrics to this path
        #[arg(long)]
        average_folds: Option<PathBuf>,
        /// Metrics CSV to write
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Count quantile crossings in a prediction file
    Crossings {
        #[arg(long)]
        predictions: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::BuildTrainval { config } => {
            let config = match config {
                Some(path) => TrainvalConfig::load(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => TrainvalConfig::default(),
            };
            let set = pipeline::run_trainval(&config).context("building trainval set")?;
            info!(
                samples = set.n_samples(),
                predictors = set.predictor_labels.len(),
                "trainval build finished"
            );
        }
        Commands::Evaluate {
            predictions,
            observed,
            masks,
            previous,
            average_folds,
            output,
        } => {
            let run = EvaluationRun {
                predictions,
                observed,
                masks,
                previous,
                output,
                averaged_output: average_folds,
            };
            let metrics = pipeline::run_evaluation(&run).context("evaluating predictions")?;
            info!(entries = metrics.len(), "evaluation finished");
        }
        Commands::Crossings {
            predictions,
            output,
        } => {
            pipeline::run_crossings(&predictions, &output).context("counting crossings")?;
        }
    }

    Ok(())
}
