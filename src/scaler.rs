use serde::Serialize;
use tracing::{info, instrument};

use crate::error::{PipelineError, Result};
use crate::sparse::FeatureMatrix;

/// Per-column divisors for unit-variance scaling without centering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScalerStats {
    scales: Vec<f64>,
}

/// Population mean and variance of each column, implicit zeros included.
fn column_moments(matrix: &FeatureMatrix) -> (Vec<f64>, Vec<f64>) {
    let n = matrix.n_rows() as f64;
    let mut sums = vec![0.0; matrix.n_cols()];
    let mut stored = vec![0usize; matrix.n_cols()];
    for row in 0..matrix.n_rows() {
        for (col, value) in matrix.row(row).iter() {
            sums[col] += value;
            stored[col] += 1;
        }
    }
    let means: Vec<f64> = sums.iter().map(|s| s / n).collect();

    let mut squares = vec![0.0; matrix.n_cols()];
    for row in 0..matrix.n_rows() {
        for (col, value) in matrix.row(row).iter() {
            squares[col] += (value - means[col]).powi(2);
        }
    }
    let variances = (0..matrix.n_cols())
        .map(|col| {
            let zeros = n - stored[col] as f64;
            (squares[col] + zeros * means[col].powi(2)) / n
        })
        .collect();
    (means, variances)
}

impl ScalerStats {
    #[instrument(skip(matrix), fields(rows = matrix.n_rows(), columns = matrix.n_cols()))]
    pub fn fit(matrix: &FeatureMatrix) -> Result<Self> {
        if matrix.n_rows() == 0 {
            return Err(PipelineError::ShapeMismatch(
                "cannot fit a scaler on zero rows".to_string(),
            ));
        }
        let mut constant = 0;
        let (means, variances) = column_moments(matrix);
        let scales: Vec<f64> = means
            .iter()
            .zip(variances)
            .map(|(mean, var)| {
                let std = var.sqrt();
                // constant columns keep their values
                if std.is_finite() && std > 10.0 * f64::EPSILON * mean.abs().max(1.0) {
                    std
                } else {
                    constant += 1;
                    1.0
                }
            })
            .collect();
        info!(constant, "fitted scaler");
        Ok(Self { scales })
    }

    pub fn transform(&self, matrix: &FeatureMatrix) -> Result<FeatureMatrix> {
        if matrix.n_cols() != self.scales.len() {
            return Err(PipelineError::ShapeMismatch(format!(
                "scaler fitted on {} columns, got {}",
                self.scales.len(),
                matrix.n_cols()
            )));
        }
        Ok(matrix.map_values(|col, value| value / self.scales[col]))
    }
}
