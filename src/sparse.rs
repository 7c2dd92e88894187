use ndarray::Array2;

use crate::error::{PipelineError, Result};

/// Row-compressed feature matrix with named columns.
///
/// Only non-zero cells are stored; one-hot blocks over account identifiers
/// are almost entirely zeros. Column indices within a row are strictly
/// increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    names: Vec<String>,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    values: Vec<f64>,
}

/// Borrowed view of one stored row.
#[derive(Debug, Clone, Copy)]
pub struct SparseRow<'a> {
    pub indices: &'a [usize],
    pub values: &'a [f64],
}

impl<'a> SparseRow<'a> {
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + 'a {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }
}

impl FeatureMatrix {
    pub fn new(names: Vec<String>) -> Self {
        Self {
            names,
            indptr: vec![0],
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Appends a row given as `(column, value)` pairs in increasing column
    /// order. Zeros are dropped.
    pub fn push_row<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (usize, f64)>,
    {
        for (col, value) in entries {
            debug_assert!(col < self.names.len());
            if value != 0.0 {
                self.indices.push(col);
                self.values.push(value);
            }
        }
        self.indptr.push(self.indices.len());
    }

    pub fn n_rows(&self) -> usize {
        self.indptr.len() - 1
    }

    pub fn n_cols(&self) -> usize {
        self.names.len()
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.names()
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| PipelineError::MissingColumn {
                column: name.to_string(),
            })
    }

    pub fn row(&self, row: usize) -> SparseRow<'_> {
        let span = self.indptr[row]..self.indptr[row + 1];
        SparseRow {
            indices: &self.indices[span.clone()],
            values: &self.values[span],
        }
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        let r = self.row(row);
        r.indices
            .binary_search(&col)
            .map_or(0.0, |pos| r.values[pos])
    }

    /// Dense copy of one column.
    pub fn column(&self, col: usize) -> Vec<f64> {
        (0..self.n_rows()).map(|row| self.get(row, col)).collect()
    }

    /// Gathers `rows` (in the given order) into a new matrix.
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        let mut out = Self::new(self.names.clone());
        for &row in rows {
            out.push_row(self.row(row).iter());
        }
        out
    }

    /// Removes the given columns and renumbers the rest.
    pub fn drop_columns(&self, drop: &[usize]) -> Self {
        let mut remap = vec![None; self.n_cols()];
        let mut names = Vec::with_capacity(self.n_cols());
        for (col, name) in self.names.iter().enumerate() {
            if !drop.contains(&col) {
                remap[col] = Some(names.len());
                names.push(name.clone());
            }
        }

        let mut out = Self::new(names);
        for row in 0..self.n_rows() {
            out.push_row(
                self.row(row)
                    .iter()
                    .filter_map(|(col, value)| remap[col].map(|c| (c, value))),
            );
        }
        out
    }

    /// Applies `f(column, value)` to every stored value.
    pub fn map_values(&self, f: impl Fn(usize, f64) -> f64) -> Self {
        let mut out = Self::new(self.names.clone());
        for row in 0..self.n_rows() {
            out.push_row(self.row(row).iter().map(|(col, value)| (col, f(col, value))));
        }
        out
    }

    /// Columns holding at least one non-zero value, ascending.
    pub fn active_columns(&self) -> Vec<usize> {
        let mut seen = vec![false; self.n_cols()];
        for &col in &self.indices {
            seen[col] = true;
        }
        (0..self.n_cols()).filter(|&col| seen[col]).collect()
    }

    /// Dense `n_rows x columns.len()` copy restricted to `columns`.
    pub fn to_dense(&self, columns: &[usize]) -> Result<Array2<f64>> {
        let mut position = vec![None; self.n_cols()];
        for (dense_col, &col) in columns.iter().enumerate() {
            let slot = position.get_mut(col).ok_or_else(|| {
                PipelineError::ShapeMismatch(format!(
                    "column {col} out of range for {} columns",
                    self.n_cols()
                ))
            })?;
            *slot = Some(dense_col);
        }

        let mut dense = Array2::zeros((self.n_rows(), columns.len()));
        for row in 0..self.n_rows() {
            for (col, value) in self.row(row).iter() {
                if let Some(dense_col) = position[col] {
                    dense[[row, dense_col]] = value;
                }
            }
        }
        Ok(dense)
    }
}

pub fn squared_distance(a: SparseRow<'_>, b: SparseRow<'_>) -> f64 {
    merge(a, b)
        .map(|(_, x, y)| (x - y) * (x - y))
        .sum()
}

/// `a + gap * (b - a)` over the union of stored columns.
pub fn interpolate(a: SparseRow<'_>, b: SparseRow<'_>, gap: f64) -> Vec<(usize, f64)> {
    merge(a, b).map(|(col, x, y)| (col, x + gap * (y - x))).collect()
}

// Walks two rows in column order, yielding (column, a_value, b_value).
fn merge<'a>(a: SparseRow<'a>, b: SparseRow<'a>) -> impl Iterator<Item = (usize, f64, f64)> + 'a {
    let (mut i, mut j) = (0, 0);
    std::iter::from_fn(move || {
        let next_a = a.indices.get(i).copied();
        let next_b = b.indices.get(j).copied();
        match (next_a, next_b) {
            (Some(ca), Some(cb)) if ca == cb => {
                i += 1;
                j += 1;
                Some((ca, a.values[i - 1], b.values[j - 1]))
            }
            (Some(ca), Some(cb)) if ca < cb => {
                i += 1;
                Some((ca, a.values[i - 1], 0.0))
            }
            (Some(_), Some(cb)) => {
                j += 1;
                Some((cb, 0.0, b.values[j - 1]))
            }
            (Some(ca), None) => {
                i += 1;
                Some((ca, a.values[i - 1], 0.0))
            }
            (None, Some(cb)) => {
                j += 1;
                Some((cb, 0.0, b.values[j - 1]))
            }
            (None, None) => None,
        }
    })
}
