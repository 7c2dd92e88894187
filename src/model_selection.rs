use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::error::{PipelineError, Result};
use crate::forest::{ForestParams, RandomForest};
use crate::metrics::accuracy;

/// Seeded shuffle split. Returns `(train, test)` row indices; the test side
/// gets `ceil(n * test_fraction)` rows.
pub fn train_test_split(
    n_rows: usize,
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(PipelineError::InvalidConfig(format!(
            "test fraction must be in (0, 1), got {test_fraction}"
        )));
    }
    let n_test = (n_rows as f64 * test_fraction).ceil() as usize;
    if n_test == 0 || n_test >= n_rows {
        return Err(PipelineError::InsufficientSamples {
            class: 0,
            count: n_rows,
            required: 2,
        });
    }

    let mut order: Vec<usize> = (0..n_rows).collect();
    order.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));
    let train = order.split_off(n_test);
    Ok((train, order))
}

/// Validation folds for stratified k-fold. Each class is cut into `n_folds`
/// contiguous chunks in row order; fold `f` takes chunk `f` of every class.
pub fn stratified_folds(labels: &[usize], n_folds: usize) -> Result<Vec<Vec<usize>>> {
    if n_folds < 2 {
        return Err(PipelineError::InvalidConfig(format!(
            "need at least 2 folds, got {n_folds}"
        )));
    }
    if labels.len() < n_folds {
        return Err(PipelineError::Fit(format!(
            "{} rows for {n_folds} folds",
            labels.len()
        )));
    }

    let mut folds = vec![Vec::new(); n_folds];
    let n_classes = labels.iter().max().map_or(0, |&m| m + 1);
    for class in 0..n_classes {
        let rows: Vec<usize> = (0..labels.len()).filter(|&r| labels[r] == class).collect();
        let (base, extra) = (rows.len() / n_folds, rows.len() % n_folds);
        let mut start = 0;
        for (f, fold) in folds.iter_mut().enumerate() {
            let size = base + usize::from(f < extra);
            fold.extend_from_slice(&rows[start..start + size]);
            start += size;
        }
    }
    for (f, fold) in folds.iter_mut().enumerate() {
        if fold.is_empty() {
            return Err(PipelineError::Fit(format!(
                "fold {f} of {n_folds} is empty for {} rows",
                labels.len()
            )));
        }
        fold.sort_unstable();
    }
    Ok(folds)
}

/// Hyperparameter grid. Candidates are enumerated `max_depth`-major.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamGrid {
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<usize>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![100, 200, 300],
            max_depth: vec![10, 20, 30],
        }
    }
}

impl ParamGrid {
    pub fn candidates(&self) -> Vec<ForestParams> {
        self.max_depth
            .iter()
            .flat_map(|&max_depth| {
                self.n_estimators.iter().map(move |&n_estimators| ForestParams {
                    n_estimators,
                    max_depth,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateScore {
    pub params: ForestParams,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GridSearchResult {
    pub best_params: ForestParams,
    pub best_score: f64,
    pub candidates: Vec<CandidateScore>,
    /// Forests fitted during cross-validation (the final refit excluded).
    pub n_fits: usize,
}

/// Exhaustive grid search scored by mean fold accuracy.
#[derive(Debug, Clone)]
pub struct GridSearch {
    pub grid: ParamGrid,
    pub n_folds: usize,
    pub feature_subsample: f64,
    pub seed: u64,
}

impl GridSearch {
    /// Scores every candidate and keeps the first one with the highest mean.
    #[instrument(skip_all, fields(rows = x.nrows(), n_folds = self.n_folds))]
    pub fn fit(&self, x: &Array2<f64>, y: &Array1<usize>) -> Result<GridSearchResult> {
        let candidates = self.grid.candidates();
        if candidates.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "parameter grid is empty".to_string(),
            ));
        }
        let labels = y.to_vec();
        let folds = stratified_folds(&labels, self.n_folds)?;

        let mut scored = Vec::with_capacity(candidates.len());
        let mut n_fits = 0;
        for params in candidates {
            let mut fold_scores = Vec::with_capacity(folds.len());
            for validation in &folds {
                let train: Vec<usize> = (0..labels.len())
                    .filter(|r| validation.binary_search(r).is_err())
                    .collect();
                let forest = RandomForest::fit(
                    &x.select(Axis(0), &train),
                    &y.select(Axis(0), &train),
                    params,
                    self.feature_subsample,
                    self.seed,
                )?;
                n_fits += 1;

                let predicted = forest.predict(&x.select(Axis(0), validation))?.to_vec();
                let truth: Vec<usize> = validation.iter().map(|&r| labels[r]).collect();
                fold_scores.push(accuracy(&truth, &predicted)?);
            }
            let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
            debug!(?params, mean_score, "scored candidate");
            scored.push(CandidateScore {
                params,
                fold_scores,
                mean_score,
            });
        }

        let best = scored
            .iter()
            .fold(&scored[0], |best, c| if c.mean_score > best.mean_score { c } else { best });
        let (best_params, best_score) = (best.params, best.mean_score);
        info!(?best_params, best_score, n_fits, "grid search finished");

        Ok(GridSearchResult {
            best_params,
            best_score,
            candidates: scored,
            n_fits,
        })
    }
}
