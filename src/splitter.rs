use tracing::{info, instrument};

use crate::error::{PipelineError, Result};
use crate::sparse::FeatureMatrix;

/// Feature rows paired with their 0/1 labels.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSet {
    pub features: FeatureMatrix,
    pub labels: Vec<usize>,
}

impl LabeledSet {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Row counts of class 0 and class 1.
    pub fn class_counts(&self) -> [usize; 2] {
        class_counts(&self.labels)
    }

    pub fn select_rows(&self, rows: &[usize]) -> Self {
        Self {
            features: self.features.select_rows(rows),
            labels: rows.iter().map(|&r| self.labels[r]).collect(),
        }
    }
}

pub fn class_counts(labels: &[usize]) -> [usize; 2] {
    let positives = labels.iter().filter(|&&l| l == 1).count();
    [labels.len() - positives, positives]
}

pub fn drop_named_columns(matrix: &FeatureMatrix, names: &[&str]) -> Result<FeatureMatrix> {
    let drop = names
        .iter()
        .map(|name| matrix.column_index(name))
        .collect::<Result<Vec<_>>>()?;
    Ok(matrix.drop_columns(&drop))
}

fn clean_label(row: usize, value: f64) -> Result<usize> {
    let value = if value.is_nan() { 0.0 } else { value.trunc() };
    match value {
        v if v == 0.0 => Ok(0),
        v if v == 1.0 => Ok(1),
        v => Err(PipelineError::InvalidLabel { row, value: v }),
    }
}

/// Pulls `label` out as a 0/1 vector and drops it and `excluded` from the
/// features.
#[instrument(skip(matrix), fields(rows = matrix.n_rows()))]
pub fn split_features_target(
    matrix: &FeatureMatrix,
    label: &str,
    excluded: &[&str],
) -> Result<LabeledSet> {
    let label_col = matrix.column_index(label)?;
    let labels = matrix
        .column(label_col)
        .into_iter()
        .enumerate()
        .map(|(row, value)| clean_label(row, value))
        .collect::<Result<Vec<_>>>()?;

    let mut dropped = vec![label];
    dropped.extend_from_slice(excluded);
    let features = drop_named_columns(matrix, &dropped)?;

    let [negatives, positives] = class_counts(&labels);
    info!(features = features.n_cols(), negatives, positives, "split features and target");
    Ok(LabeledSet { features, labels })
}
