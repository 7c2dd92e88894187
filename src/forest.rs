use linfa::prelude::Predict;
use linfa::traits::Fit;
use linfa::Dataset;
use linfa_trees::DecisionTree;
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::debug;

use crate::error::{PipelineError, Result};

/// The two tuned hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
}

struct ForestTree {
    features: Vec<usize>,
    tree: DecisionTree<f64, usize>,
}

/// Bagged ensemble of `linfa-trees` decision trees. Each tree sees a
/// bootstrap sample of the rows and a random subset of the columns.
pub struct RandomForest {
    n_features: usize,
    trees: Vec<ForestTree>,
}

impl RandomForest {
    /// # Errors
    ///
    /// [`PipelineError::Fit`] for an empty or single-class training set, or
    /// when a tree fails to fit. [`PipelineError::InvalidConfig`] for zero
    /// trees, zero depth or a subsample fraction outside `(0, 1]`.
    pub fn fit(
        records: &Array2<f64>,
        targets: &Array1<usize>,
        params: ForestParams,
        feature_subsample: f64,
        seed: u64,
    ) -> Result<Self> {
        if params.n_estimators == 0 || params.max_depth == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "forest needs at least one tree of depth >= 1, got {params:?}"
            )));
        }
        if !(feature_subsample > 0.0 && feature_subsample <= 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "feature_subsample must be in (0, 1], got {feature_subsample}"
            )));
        }
        let (n_rows, n_features) = records.dim();
        if n_rows == 0 || n_features == 0 {
            return Err(PipelineError::Fit(format!(
                "empty training set ({n_rows} rows, {n_features} features)"
            )));
        }
        if targets.len() != n_rows {
            return Err(PipelineError::ShapeMismatch(format!(
                "{n_rows} rows but {} targets",
                targets.len()
            )));
        }
        if targets.iter().all(|&t| t == targets[0]) {
            return Err(PipelineError::Fit(format!(
                "training set holds only class {}",
                targets[0]
            )));
        }

        let per_tree = ((n_features as f64 * feature_subsample).ceil() as usize).clamp(1, n_features);
        let mut master = ChaCha8Rng::seed_from_u64(seed);
        let mut trees = Vec::with_capacity(params.n_estimators);

        for _ in 0..params.n_estimators {
            let mut rng = ChaCha8Rng::seed_from_u64(master.gen());
            let rows: Vec<usize> = (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect();
            let mut features = rand::seq::index::sample(&mut rng, n_features, per_tree).into_vec();
            features.sort_unstable();

            let sample = records.select(Axis(0), &rows).select(Axis(1), &features);
            let dataset = Dataset::new(sample, targets.select(Axis(0), &rows));
            let tree = DecisionTree::params()
                .max_depth(Some(params.max_depth))
                .fit(&dataset)
                .map_err(|e| PipelineError::Fit(e.to_string()))?;
            trees.push(ForestTree { features, tree });
        }

        debug!(?params, per_tree, "fitted forest");
        Ok(Self {
            n_features,
            trees,
        })
    }

    /// Share of trees voting for class 1, per row.
    pub fn predict_proba(&self, records: &Array2<f64>) -> Result<Array1<f64>> {
        if records.ncols() != self.n_features {
            return Err(PipelineError::ShapeMismatch(format!(
                "forest fitted on {} features, got {}",
                self.n_features,
                records.ncols()
            )));
        }
        let mut votes = Array1::<f64>::zeros(records.nrows());
        for member in &self.trees {
            let view = records.select(Axis(1), &member.features);
            let predicted: Array1<usize> = member.tree.predict(&view);
            for (vote, &class) in votes.iter_mut().zip(predicted.iter()) {
                if class == 1 {
                    *vote += 1.0;
                }
            }
        }
        Ok(votes / self.trees.len() as f64)
    }

    /// Majority vote; an even split goes to class 0.
    pub fn predict(&self, records: &Array2<f64>) -> Result<Array1<usize>> {
        Ok(self
            .predict_proba(records)?
            .mapv(|p| usize::from(p > 0.5)))
    }
}
