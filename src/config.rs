use std::path::PathBuf;

use crate::error::{PipelineError, Result};
use crate::model_selection::ParamGrid;

pub const DEFAULT_CSV_FILE_PATH: &str = "transactions.csv";
pub const DEFAULT_ROW_CAP: usize = 100_000;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_K_NEIGHBORS: usize = 5;
pub const DEFAULT_TEST_FRACTION: f64 = 0.3;
pub const DEFAULT_FOLDS: usize = 5;
pub const DEFAULT_FEATURE_SUBSAMPLE: f64 = 0.7;

/// Schema and run parameters for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub row_cap: usize,
    pub seed: u64,
    pub numeric_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
    pub label_column: String,
    /// Dropped from the features alongside the label.
    pub excluded_columns: Vec<String>,
    pub k_neighbors: usize,
    pub test_fraction: f64,
    pub n_folds: usize,
    pub grid: ParamGrid,
    pub feature_subsample: f64,
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_CSV_FILE_PATH),
            row_cap: DEFAULT_ROW_CAP,
            seed: DEFAULT_SEED,
            numeric_columns: owned(&[
                "step",
                "amount",
                "oldbalanceOrg",
                "newbalanceOrig",
                "oldbalanceDest",
                "newbalanceDest",
            ]),
            categorical_columns: owned(&["type", "nameOrig", "nameDest"]),
            label_column: "isFraud".to_string(),
            excluded_columns: owned(&["isFlaggedFraud"]),
            k_neighbors: DEFAULT_K_NEIGHBORS,
            test_fraction: DEFAULT_TEST_FRACTION,
            n_folds: DEFAULT_FOLDS,
            grid: ParamGrid::default(),
            feature_subsample: DEFAULT_FEATURE_SUBSAMPLE,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(PipelineError::InvalidConfig(msg));
        if self.row_cap == 0 {
            return fail("row cap must be positive".to_string());
        }
        if self.k_neighbors == 0 {
            return fail("k_neighbors must be positive".to_string());
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return fail(format!("test fraction must be in (0, 1), got {}", self.test_fraction));
        }
        if self.n_folds < 2 {
            return fail(format!("need at least 2 folds, got {}", self.n_folds));
        }
        if !(self.feature_subsample > 0.0 && self.feature_subsample <= 1.0) {
            return fail(format!(
                "feature subsample must be in (0, 1], got {}",
                self.feature_subsample
            ));
        }
        if self.grid.n_estimators.is_empty() || self.grid.max_depth.is_empty() {
            return fail("parameter grid is empty".to_string());
        }
        if self.grid.n_estimators.contains(&0) || self.grid.max_depth.contains(&0) {
            return fail("grid values must be positive".to_string());
        }
        Ok(())
    }

    pub fn numeric(&self) -> Vec<&str> {
        self.numeric_columns.iter().map(String::as_str).collect()
    }

    pub fn categorical(&self) -> Vec<&str> {
        self.categorical_columns.iter().map(String::as_str).collect()
    }

    /// Every column the run reads: features, label and excluded columns.
    pub fn schema(&self) -> Vec<&str> {
        let mut columns = self.numeric();
        columns.extend(self.categorical());
        columns.push(&self.label_column);
        columns.extend(self.excluded());
        columns
    }

    pub fn excluded(&self) -> Vec<&str> {
        self.excluded_columns.iter().map(String::as_str).collect()
    }
}
