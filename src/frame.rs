use crate::error::{PipelineError, Result};

/// One typed column of a [`Frame`]. `None` marks a missing cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Numeric(Vec<Option<f64>>),
    Categorical(Vec<Option<String>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(values) => values.len(),
            Column::Categorical(values) => values.len(),
        }
    }

    pub fn missing_count(&self) -> usize {
        match self {
            Column::Numeric(values) => values.iter().filter(|v| v.is_none()).count(),
            Column::Categorical(values) => values.iter().filter(|v| v.is_none()).count(),
        }
    }
}

/// In-memory table of equally long, named columns.
///
/// Every stage looks columns up through [`Frame::column`], so a schema drift
/// surfaces as [`PipelineError::MissingColumn`] at the stage that needs it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Frame::push_column`].
    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Result<Self> {
        self.push_column(name, column)?;
        Ok(self)
    }

    pub fn push_column(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        if let Some(first) = self.columns.first() {
            if first.len() != column.len() {
                return Err(PipelineError::LengthMismatch {
                    column: name,
                    expected: first.len(),
                    got: column.len(),
                });
            }
        }
        self.names.push(name);
        self.columns.push(column);
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&str, &Column)> {
        self.names.iter().map(String::as_str).zip(self.columns.iter())
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| PipelineError::MissingColumn {
                column: name.to_string(),
            })
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        Ok(&self.columns[self.position(name)?])
    }

    pub fn numeric(&self, name: &str) -> Result<&[Option<f64>]> {
        match self.column(name)? {
            Column::Numeric(values) => Ok(values),
            Column::Categorical(_) => Err(PipelineError::ColumnType {
                column: name.to_string(),
                expected: "numeric",
            }),
        }
    }

    pub fn categorical(&self, name: &str) -> Result<&[Option<String>]> {
        match self.column(name)? {
            Column::Categorical(values) => Ok(values),
            Column::Numeric(_) => Err(PipelineError::ColumnType {
                column: name.to_string(),
                expected: "categorical",
            }),
        }
    }

    /// Swaps the contents of an existing column, keeping its position.
    pub fn replace(&mut self, name: &str, column: Column) -> Result<()> {
        let idx = self.position(name)?;
        if column.len() != self.n_rows() {
            return Err(PipelineError::LengthMismatch {
                column: name.to_string(),
                expected: self.n_rows(),
                got: column.len(),
            });
        }
        self.columns[idx] = column;
        Ok(())
    }

    /// Projects the frame onto `names`, in the order given.
    pub fn select(&self, names: &[&str]) -> Result<Frame> {
        let mut selected = Frame::new();
        for name in names {
            selected.push_column(*name, self.column(name)?.clone())?;
        }
        Ok(selected)
    }
}
