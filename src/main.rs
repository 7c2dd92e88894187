// Fraud classifier pipeline. Loads a transaction log, balances the classes,
// tunes a random forest and prints the held-out evaluation.
use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use config::PipelineConfig;
use csv_reader::load_frame;
use model_selection::ParamGrid;
use pipeline::{run, RunReport};

mod balancer;
mod config;
mod csv_reader;
mod encoder;
mod error;
mod forest;
mod frame;
mod imputer;
mod metrics;
mod model_selection;
mod pipeline;
mod scaler;
mod sparse;
mod splitter;
//test module
#[cfg(test)]
mod tests;

#[derive(Parser)]
#[command(name = "fraud_pipeline")]
#[command(about = "Train and evaluate a balanced random-forest fraud classifier")]
#[command(version)]
struct Cli {
    /// Transaction log (CSV with the standard header)
    #[arg(long, default_value = config::DEFAULT_CSV_FILE_PATH)]
    input: PathBuf,

    /// Read at most this many rows from the head of the file
    #[arg(long, default_value_t = config::DEFAULT_ROW_CAP)]
    rows: usize,

    /// RNG seed for sampling, splitting and the forest
    #[arg(long, default_value_t = config::DEFAULT_SEED)]
    seed: u64,

    /// Minority neighbours used by SMOTE
    #[arg(long, default_value_t = config::DEFAULT_K_NEIGHBORS)]
    k_neighbors: usize,

    /// Fraction of the balanced rows held out for evaluation
    #[arg(long, default_value_t = config::DEFAULT_TEST_FRACTION)]
    test_size: f64,

    /// Cross-validation folds
    #[arg(long, default_value_t = config::DEFAULT_FOLDS)]
    folds: usize,

    /// Candidate tree counts (comma separated)
    #[arg(long, value_delimiter = ',', default_values_t = ParamGrid::default().n_estimators)]
    n_estimators: Vec<usize>,

    /// Candidate maximum depths (comma separated)
    #[arg(long, value_delimiter = ',', default_values_t = ParamGrid::default().max_depth)]
    max_depth: Vec<usize>,

    /// Fraction of columns each tree sees
    #[arg(long, default_value_t = config::DEFAULT_FEATURE_SUBSAMPLE)]
    feature_subsample: f64,

    /// Also write the result as JSON to this path
    #[arg(long)]
    output: Option<PathBuf>,

    /// Score another transaction log with the fitted model
    #[arg(long)]
    score: Option<PathBuf>,

    /// Enable verbose (debug-level) logging
    #[arg(long)]
    verbose: bool,

    /// Suppress all logging except errors
    #[arg(long)]
    quiet: bool,
}

impl Cli {
    fn to_config(&self) -> PipelineConfig {
        PipelineConfig {
            input: self.input.clone(),
            row_cap: self.rows,
            seed: self.seed,
            k_neighbors: self.k_neighbors,
            test_fraction: self.test_size,
            n_folds: self.folds,
            grid: ParamGrid {
                n_estimators: self.n_estimators.clone(),
                max_depth: self.max_depth.clone(),
            },
            feature_subsample: self.feature_subsample,
            ..PipelineConfig::default()
        }
    }
}

// Prints the run result to stdout
// Inputs: the report of a finished run
// Outputs: best hyperparameters, the metrics table and AUC-ROC
fn print_report(report: &RunReport) {
    println!("Best Parameters:");
    println!("  n_estimators: {}", report.best_params.n_estimators);
    println!("  max_depth: {}", report.best_params.max_depth);

    println!("\nClassification Report:");
    print!("{}", report.classification_report);

    println!("\nAUC-ROC Score: {:.4}", report.auc_roc);
}

// Main entry point for the fraud pipeline
// Key steps:
// 1. Parse arguments and set up logging
// 2. Run the pipeline end to end
// 3. Print the report and optionally write it as JSON
fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.to_config();
    let outcome = run(&config)?;
    info!(
        candidates = outcome.search.candidates.len(),
        n_fits = outcome.search.n_fits,
        best_cv_accuracy = outcome.search.best_score,
        "cross-validation summary"
    );
    print_report(&outcome.report);

    if let Some(path) = &cli.score {
        let frame = load_frame(path, config.row_cap)
            .with_context(|| format!("loading {}", path.display()))?;
        let predicted = outcome.model.predict(&frame).context("scoring")?;
        let flagged = predicted.iter().filter(|&&p| p == 1).count();
        println!(
            "\nScored {}: {} of {} transactions flagged as fraud",
            path.display(),
            flagged,
            predicted.len()
        );
    }

    if let Some(path) = &cli.output {
        let file = File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(file, &outcome.report)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "wrote result artifact");
    }

    Ok(())
}
