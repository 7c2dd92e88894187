use std::fs::File;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, instrument};

use crate::error::{PipelineError, Result};
use crate::frame::{Column, Frame};

/// One row of the transaction log. Empty cells deserialize to `None`.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Transaction {
    pub step: Option<i64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub amount: Option<f64>,
    #[serde(rename = "nameOrig")]
    pub name_orig: Option<String>,
    #[serde(rename = "oldbalanceOrg")]
    pub old_balance_orig: Option<f64>,
    #[serde(rename = "newbalanceOrig")]
    pub new_balance_orig: Option<f64>,
    #[serde(rename = "nameDest")]
    pub name_dest: Option<String>,
    #[serde(rename = "oldbalanceDest")]
    pub old_balance_dest: Option<f64>,
    #[serde(rename = "newbalanceDest")]
    pub new_balance_dest: Option<f64>,
    #[serde(rename = "isFraud")]
    pub is_fraud: Option<i64>,
    #[serde(rename = "isFlaggedFraud")]
    pub is_flagged_fraud: Option<i64>,
}

/// Header names every transaction log must carry.
pub const TRANSACTION_COLUMNS: [&str; 11] = [
    "step",
    "type",
    "amount",
    "nameOrig",
    "oldbalanceOrg",
    "newbalanceOrig",
    "nameDest",
    "oldbalanceDest",
    "newbalanceDest",
    "isFraud",
    "isFlaggedFraud",
];

// Reads at most `row_cap` data rows from the head of the file.
// The header must name every column in TRANSACTION_COLUMNS; extra columns are ignored.
pub fn read_transactions(file_path: &Path, row_cap: usize) -> Result<Vec<Transaction>> {
    let file = File::open(file_path).map_err(|source| PipelineError::Io {
        path: file_path.to_path_buf(),
        source,
    })?;
    let mut rdr = csv::Reader::from_reader(file);

    let headers = rdr.headers().map_err(|e| csv_error(file_path, e))?;
    if let Some(absent) = TRANSACTION_COLUMNS
        .iter()
        .find(|name| !headers.iter().any(|h| h == **name))
    {
        return Err(PipelineError::MissingColumn {
            column: absent.to_string(),
        });
    }

    rdr.deserialize()
        .take(row_cap)
        .map(|row| row.map_err(|e| csv_error(file_path, e)))
        .collect()
}

fn csv_error(file_path: &Path, err: csv::Error) -> PipelineError {
    if err.is_io_error() {
        return PipelineError::Io {
            path: file_path.to_path_buf(),
            source: err.into(),
        };
    }
    PipelineError::Parse {
        line: err.position().map(|p| p.line()),
        source: err,
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| !v.is_nan())
}

/// Lays the records out column-wise in header order.
pub fn transactions_to_frame(transactions: &[Transaction]) -> Result<Frame> {
    let numeric = |f: fn(&Transaction) -> Option<f64>| {
        Column::Numeric(transactions.iter().map(|t| finite(f(t))).collect())
    };
    let categorical = |f: fn(&Transaction) -> Option<String>| {
        Column::Categorical(transactions.iter().map(f).collect())
    };

    Frame::new()
        .with_column("step", numeric(|t| t.step.map(|v| v as f64)))?
        .with_column("type", categorical(|t| t.kind.clone()))?
        .with_column("amount", numeric(|t| t.amount))?
        .with_column("nameOrig", categorical(|t| t.name_orig.clone()))?
        .with_column("oldbalanceOrg", numeric(|t| t.old_balance_orig))?
        .with_column("newbalanceOrig", numeric(|t| t.new_balance_orig))?
        .with_column("nameDest", categorical(|t| t.name_dest.clone()))?
        .with_column("oldbalanceDest", numeric(|t| t.old_balance_dest))?
        .with_column("newbalanceDest", numeric(|t| t.new_balance_dest))?
        .with_column("isFraud", numeric(|t| t.is_fraud.map(|v| v as f64)))?
        .with_column("isFlaggedFraud", numeric(|t| t.is_flagged_fraud.map(|v| v as f64)))
}

#[instrument(skip_all, fields(path = %file_path.display(), row_cap = row_cap))]
pub fn load_frame(file_path: &Path, row_cap: usize) -> Result<Frame> {
    let transactions = read_transactions(file_path, row_cap)?;
    let frame = transactions_to_frame(&transactions)?;
    info!(rows = frame.n_rows(), columns = frame.n_cols(), "loaded transactions");
    Ok(frame)
}
