//! Minimal in-memory numeric table threaded through the pipeline.
//!
//! A [`Frame`] holds named columns of `Option<f64>` cells in insertion
//! order. `None` is a missing value; NaN and ±infinity are ordinary
//! representable cells, not missing. The pipeline never needs string
//! columns: the loader coerces anything non-numeric to missing.

use crate::errors::AutofeatError;

/// A single named column of optional numeric cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Column name, matched exactly against derivation references.
    pub name: String,
    /// Cell values; `None` marks a missing cell.
    pub values: Vec<Option<f64>>,
}

impl Column {
    /// Creates a new column.
    #[must_use]
    pub fn new(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Creates a column from non-missing values.
    #[must_use]
    pub fn dense(name: impl Into<String>, values: &[f64]) -> Self {
        Self::new(name, values.iter().copied().map(Some).collect())
    }

    /// Returns the fraction of missing cells, 0.0 for an empty column.
    #[must_use]
    pub fn missing_ratio(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let missing = self.values.iter().filter(|v| v.is_none()).count();
        missing as f64 / self.values.len() as f64
    }
}

/// An insertion-ordered collection of equally sized columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    columns: Vec<Column>,
}

impl Frame {
    /// Creates an empty frame.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a frame from columns, validating that lengths agree.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self, AutofeatError> {
        if let Some(first) = columns.first() {
            let n = first.values.len();
            for col in &columns {
                if col.values.len() != n {
                    return Err(AutofeatError::Frame(format!(
                        "column '{}' has {} rows, expected {}",
                        col.name,
                        col.values.len(),
                        n
                    )));
                }
            }
        }
        Ok(Self { columns })
    }

    /// Number of rows (0 for an empty frame).
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    /// Number of columns.
    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Column names in insertion order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Returns true if a column with this exact name exists.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Looks up a column by exact name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Inserts a column, replacing an existing one of the same name in
    /// place (ordering preserved). The column must match the frame's
    /// row count unless the frame is empty.
    pub fn insert_column(&mut self, column: Column) -> Result<(), AutofeatError> {
        if !self.columns.is_empty() && column.values.len() != self.n_rows() {
            return Err(AutofeatError::Frame(format!(
                "column '{}' has {} rows, expected {}",
                column.name,
                column.values.len(),
                self.n_rows()
            )));
        }
        if let Some(existing) = self.columns.iter_mut().find(|c| c.name == column.name) {
            *existing = column;
        } else {
            self.columns.push(column);
        }
        Ok(())
    }

    /// Renders the header and the first `n` rows, the shape the
    /// Summarize prompt embeds as a data preview.
    #[must_use]
    pub fn preview(&self, n: usize) -> String {
        let mut out = self
            .columns
            .iter()
            .map(|c| c.name.clone())
            .collect::<Vec<_>>()
            .join(",");
        out.push('\n');
        for row in 0..self.n_rows().min(n) {
            let line = self
                .columns
                .iter()
                .map(|c| match c.values[row] {
                    Some(v) => format!("{v}"),
                    None => String::new(),
                })
                .collect::<Vec<_>>()
                .join(",");
            out.push_str(&line);
            out.push('\n');
        }
        out
    }
}
