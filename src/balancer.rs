// Class balancing: seeded undersampling of the majority class followed by
// SMOTE oversampling of whatever minority remains.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, instrument};

use crate::error::{PipelineError, Result};
use crate::sparse::{interpolate, squared_distance, FeatureMatrix};
use crate::splitter::LabeledSet;

/// Returns every fraud row plus an equally sized random sample of non-fraud
/// rows, in ascending row order.
///
/// # Errors
///
/// [`PipelineError::InsufficientSamples`] when there is no fraud row, or
/// fewer non-fraud rows than fraud rows to draw from.
#[instrument(skip(labels), fields(rows = labels.len()))]
pub fn undersample(labels: &[usize], seed: u64) -> Result<Vec<usize>> {
    let (fraud, legit): (Vec<usize>, Vec<usize>) =
        (0..labels.len()).partition(|&row| labels[row] == 1);

    if fraud.is_empty() {
        return Err(PipelineError::InsufficientSamples {
            class: 1,
            count: 0,
            required: 1,
        });
    }
    if legit.len() < fraud.len() {
        return Err(PipelineError::InsufficientSamples {
            class: 0,
            count: legit.len(),
            required: fraud.len(),
        });
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut subset: Vec<usize> = legit
        .choose_multiple(&mut rng, fraud.len())
        .copied()
        .chain(fraud.iter().copied())
        .collect();
    subset.sort_unstable();

    info!(fraud = fraud.len(), subset = subset.len(), "undersampled majority class");
    Ok(subset)
}

/// SMOTE oversampler for the binary case.
#[derive(Debug, Clone)]
pub struct Smote {
    k_neighbors: usize,
    seed: u64,
}

impl Smote {
    pub fn new(k_neighbors: usize, seed: u64) -> Self {
        Self { k_neighbors, seed }
    }

    /// Indices (into `rows`) of the `k` nearest other rows, closest first.
    fn neighbours(&self, features: &FeatureMatrix, rows: &[usize], of: usize) -> Vec<usize> {
        let base = features.row(rows[of]);
        let mut scored: Vec<(f64, usize)> = rows
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != of)
            .map(|(i, &row)| (squared_distance(base, features.row(row)), i))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        scored
            .into_iter()
            .take(self.k_neighbors)
            .map(|(_, i)| i)
            .collect()
    }

    /// Appends synthetic minority rows until both classes have the same count.
    /// Already balanced input comes back unchanged.
    ///
    /// # Errors
    ///
    /// [`PipelineError::InsufficientSamples`] when a class is empty, or when
    /// synthesis is needed and the minority class has `k_neighbors` rows or
    /// fewer.
    #[instrument(skip(self, set), fields(rows = set.len(), k = self.k_neighbors))]
    pub fn resample(&self, set: &LabeledSet) -> Result<LabeledSet> {
        let counts = set.class_counts();
        for (class, &count) in counts.iter().enumerate() {
            if count == 0 {
                return Err(PipelineError::InsufficientSamples {
                    class,
                    count,
                    required: 1,
                });
            }
        }

        let minority = if counts[1] < counts[0] { 1 } else { 0 };
        let n_synthetic = counts[1 - minority] - counts[minority];
        if n_synthetic == 0 {
            debug!("classes already balanced");
            return Ok(set.clone());
        }
        if counts[minority] <= self.k_neighbors {
            return Err(PipelineError::InsufficientSamples {
                class: minority,
                count: counts[minority],
                required: self.k_neighbors + 1,
            });
        }

        let rows: Vec<usize> = (0..set.len())
            .filter(|&r| set.labels[r] == minority)
            .collect();
        let neighbours: Vec<Vec<usize>> = (0..rows.len())
            .map(|i| self.neighbours(&set.features, &rows, i))
            .collect();

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut out = set.clone();
        for _ in 0..n_synthetic {
            let i = rng.gen_range(0..rows.len());
            let nn = neighbours[i][rng.gen_range(0..neighbours[i].len())];
            let gap: f64 = rng.gen();
            let synthetic = interpolate(
                set.features.row(rows[i]),
                set.features.row(rows[nn]),
                gap,
            );
            out.features.push_row(synthetic);
            out.labels.push(minority);
        }

        info!(synthetic = n_synthetic, rows = out.len(), "oversampled minority class");
        Ok(out)
    }
}
