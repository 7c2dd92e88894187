use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::error::{PipelineError, Result};
use crate::frame::{Column, Frame};

/// Fill values learned from a table: a mean per numeric column and a mode
/// per categorical column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImputerStats {
    pub means: Vec<(String, f64)>,
    pub modes: Vec<(String, String)>,
}

/// Arithmetic mean over the observed values, `None` if there are none.
pub fn column_mean(values: &[Option<f64>]) -> Option<f64> {
    let (sum, count) = values
        .iter()
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Most frequent observed value. Ties go to the value seen first.
pub fn column_mode(values: &[Option<String>]) -> Option<String> {
    // value -> (count, first position)
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (pos, value) in values.iter().enumerate() {
        if let Some(value) = value {
            counts.entry(value.as_str()).or_insert((0, pos)).0 += 1;
        }
    }
    counts
        .into_iter()
        .max_by(|(_, (ca, pa)), (_, (cb, pb))| ca.cmp(cb).then(pb.cmp(pa)))
        .map(|(value, _)| value.to_string())
}

impl ImputerStats {
    #[instrument(skip(frame), fields(rows = frame.n_rows()))]
    pub fn fit(frame: &Frame, numeric: &[&str], categorical: &[&str]) -> Result<Self> {
        let mut means = Vec::with_capacity(numeric.len());
        for &name in numeric {
            let mean = column_mean(frame.numeric(name)?).ok_or_else(|| {
                PipelineError::EmptyColumn {
                    column: name.to_string(),
                }
            })?;
            debug!(column = name, mean, "fitted mean");
            means.push((name.to_string(), mean));
        }

        let mut modes = Vec::with_capacity(categorical.len());
        for &name in categorical {
            let mode = column_mode(frame.categorical(name)?).ok_or_else(|| {
                PipelineError::EmptyColumn {
                    column: name.to_string(),
                }
            })?;
            debug!(column = name, mode = %mode, "fitted mode");
            modes.push((name.to_string(), mode));
        }

        Ok(Self { means, modes })
    }

    /// Returns a copy of `frame` with the fitted columns filled in.
    pub fn transform(&self, frame: &Frame) -> Result<Frame> {
        let mut out = frame.clone();
        let mut filled = 0;

        for (name, mean) in &self.means {
            filled += frame.column(name)?.missing_count();
            let values = frame.numeric(name)?;
            let column = values.iter().map(|v| Some(v.unwrap_or(*mean))).collect();
            out.replace(name, Column::Numeric(column))?;
        }
        for (name, mode) in &self.modes {
            filled += frame.column(name)?.missing_count();
            let values = frame.categorical(name)?;
            let column = values
                .iter()
                .map(|v| Some(v.clone().unwrap_or_else(|| mode.clone())))
                .collect();
            out.replace(name, Column::Categorical(column))?;
        }

        info!(filled, "imputed missing values");
        Ok(out)
    }
}
