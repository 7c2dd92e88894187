use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use tracing::{info, instrument};

use crate::error::{PipelineError, Result};
use crate::frame::{Column, Frame};
use crate::sparse::FeatureMatrix;

/// Column layout learned from a table: the numeric columns passed through
/// as-is, then one indicator column per observed value of each categorical
/// column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OneHotVocabulary {
    passthrough: Vec<String>,
    groups: Vec<(String, Vec<String>)>,
}

impl OneHotVocabulary {
    #[instrument(skip(frame), fields(rows = frame.n_rows()))]
    pub fn fit(frame: &Frame, categorical: &[&str]) -> Result<Self> {
        let mut groups = Vec::with_capacity(categorical.len());
        for &name in categorical {
            let distinct: BTreeSet<&str> = frame
                .categorical(name)?
                .iter()
                .flatten()
                .map(String::as_str)
                .collect();
            groups.push((
                name.to_string(),
                distinct.into_iter().map(str::to_string).collect(),
            ));
        }

        let mut passthrough = Vec::new();
        for (name, column) in frame.iter() {
            if categorical.contains(&name) {
                continue;
            }
            if let Column::Categorical(_) = column {
                return Err(PipelineError::ColumnType {
                    column: name.to_string(),
                    expected: "numeric or listed as categorical",
                });
            }
            passthrough.push(name.to_string());
        }

        Ok(Self { passthrough, groups })
    }

    pub fn feature_names(&self) -> Vec<String> {
        let mut names = self.passthrough.clone();
        for (column, values) in &self.groups {
            names.extend(values.iter().map(|value| format!("{column}_{value}")));
        }
        names
    }

    /// Encodes `frame`. A missing or unseen category leaves its group all zero.
    pub fn transform(&self, frame: &Frame) -> Result<FeatureMatrix> {
        let passthrough = self
            .passthrough
            .iter()
            .map(|name| frame.numeric(name))
            .collect::<Result<Vec<_>>>()?;

        let mut offset = self.passthrough.len();
        let mut groups = Vec::with_capacity(self.groups.len());
        for (name, values) in &self.groups {
            let lookup: HashMap<&str, usize> = values
                .iter()
                .enumerate()
                .map(|(i, value)| (value.as_str(), offset + i))
                .collect();
            groups.push((frame.categorical(name)?, lookup));
            offset += values.len();
        }

        let mut matrix = FeatureMatrix::new(self.feature_names());
        let mut row = Vec::with_capacity(passthrough.len() + groups.len());
        for r in 0..frame.n_rows() {
            row.clear();
            for (col, values) in passthrough.iter().enumerate() {
                row.push((col, values[r].unwrap_or(f64::NAN)));
            }
            for (values, lookup) in &groups {
                let hit = values[r].as_deref().and_then(|v| lookup.get(v));
                if let Some(&col) = hit {
                    row.push((col, 1.0));
                }
            }
            matrix.push_row(row.iter().copied());
        }

        info!(
            rows = matrix.n_rows(),
            columns = matrix.n_cols(),
            stored = matrix.nnz(),
            "one-hot encoded"
        );
        Ok(matrix)
    }
}
