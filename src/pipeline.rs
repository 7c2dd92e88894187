// Stage-by-stage orchestration: load, impute, encode, split, balance, scale,
// tune, evaluate. Each stage returns a fresh artifact for the next one.
use anyhow::{Context, Result};
use ndarray::{Array1, Axis};
use serde::Serialize;
use tracing::info;

use crate::balancer::{undersample, Smote};
use crate::config::PipelineConfig;
use crate::csv_reader::load_frame;
use crate::encoder::OneHotVocabulary;
use crate::error::PipelineError;
use crate::forest::{ForestParams, RandomForest};
use crate::frame::Frame;
use crate::imputer::ImputerStats;
use crate::metrics::{classification_report, roc_auc, ClassificationReport};
use crate::model_selection::{train_test_split, GridSearch, GridSearchResult};
use crate::scaler::ScalerStats;
use crate::splitter::{drop_named_columns, split_features_target};

/// The externally consumable result of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub best_params: ForestParams,
    pub classification_report: ClassificationReport,
    pub auc_roc: f64,
}

/// Fitted preprocessing artifacts plus the refit forest.
pub struct FraudModel {
    pub imputer: ImputerStats,
    pub vocabulary: OneHotVocabulary,
    pub scaler: ScalerStats,
    /// Scaled columns fed to the forest; the rest are constant.
    pub active_columns: Vec<usize>,
    pub forest: RandomForest,
    schema: Vec<String>,
    dropped: Vec<String>,
}

impl FraudModel {
    /// Scores a frame with the training schema. Its label values are ignored.
    pub fn predict(&self, frame: &Frame) -> Result<Array1<usize>, PipelineError> {
        let schema: Vec<&str> = self.schema.iter().map(String::as_str).collect();
        let imputed = self.imputer.transform(&frame.select(&schema)?)?;
        let encoded = self.vocabulary.transform(&imputed)?;
        let dropped: Vec<&str> = self.dropped.iter().map(String::as_str).collect();
        let features = drop_named_columns(&encoded, &dropped)?;
        let scaled = self.scaler.transform(&features)?;
        self.forest.predict(&scaled.to_dense(&self.active_columns)?)
    }
}

pub struct RunOutcome {
    pub report: RunReport,
    pub search: GridSearchResult,
    pub model: FraudModel,
}

pub fn run(config: &PipelineConfig) -> Result<RunOutcome> {
    config.validate()?;
    let frame = load_frame(&config.input, config.row_cap).context("loading transactions")?;
    run_on_frame(&frame, config)
}

pub fn run_on_frame(frame: &Frame, config: &PipelineConfig) -> Result<RunOutcome> {
    let (numeric, categorical) = (config.numeric(), config.categorical());
    let schema = config.schema();
    let frame = frame.select(&schema).context("selecting schema columns")?;

    let imputer = ImputerStats::fit(&frame, &numeric, &categorical).context("imputation")?;
    let imputed = imputer.transform(&frame).context("imputation")?;

    let vocabulary = OneHotVocabulary::fit(&imputed, &categorical).context("encoding")?;
    let encoded = vocabulary.transform(&imputed).context("encoding")?;

    let excluded = config.excluded();
    let labeled = split_features_target(&encoded, &config.label_column, &excluded)
        .context("splitting features and target")?;

    let subset = undersample(&labeled.labels, config.seed).context("undersampling")?;
    let reduced = labeled.select_rows(&subset);
    let balanced = Smote::new(config.k_neighbors, config.seed)
        .resample(&reduced)
        .context("synthetic oversampling")?;

    let scaler = ScalerStats::fit(&balanced.features).context("scaling")?;
    let scaled = scaler.transform(&balanced.features).context("scaling")?;

    let active_columns = scaled.active_columns();
    let x = scaled.to_dense(&active_columns).context("training")?;
    let y = Array1::from(balanced.labels.clone());
    info!(rows = x.nrows(), features = x.ncols(), "prepared training matrix");

    let (train, test) =
        train_test_split(x.nrows(), config.test_fraction, config.seed).context("train/test split")?;
    let (x_train, y_train) = (x.select(Axis(0), &train), y.select(Axis(0), &train));
    let (x_test, y_test) = (x.select(Axis(0), &test), y.select(Axis(0), &test));

    let search = GridSearch {
        grid: config.grid.clone(),
        n_folds: config.n_folds,
        feature_subsample: config.feature_subsample,
        seed: config.seed,
    }
    .fit(&x_train, &y_train)
    .context("grid search")?;

    let forest = RandomForest::fit(
        &x_train,
        &y_train,
        search.best_params,
        config.feature_subsample,
        config.seed,
    )
    .context("refitting best parameters")?;

    let predicted = forest.predict(&x_test).context("evaluation")?.to_vec();
    let truth = y_test.to_vec();
    let classification_report = classification_report(&truth, &predicted).context("evaluation")?;
    let hard_scores: Vec<f64> = predicted.iter().map(|&p| p as f64).collect();
    let auc_roc = roc_auc(&truth, &hard_scores).context("evaluation")?;
    info!(auc_roc, accuracy = classification_report.accuracy, "evaluated on held-out rows");

    let mut dropped = vec![config.label_column.clone()];
    dropped.extend(config.excluded_columns.iter().cloned());

    Ok(RunOutcome {
        report: RunReport {
            best_params: search.best_params,
            classification_report,
            auc_roc,
        },
        search,
        model: FraudModel {
            imputer,
            vocabulary,
            scaler,
            active_columns,
            forest,
            schema: schema.iter().map(|s| s.to_string()).collect(),
            dropped,
        },
    })
}
