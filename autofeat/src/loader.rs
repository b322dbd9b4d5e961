//! Convenience loaders for manuscripts and numeric CSV datasets.
//!
//! The loader is deliberately small: a header row names the columns and
//! every cell either parses as `f64` or becomes a missing value. Blank
//! cells and non-numeric text are both treated as missing rather than
//! rejected, matching how raw scientific exports tend to arrive.

use std::fs;
use std::path::Path;

use crate::errors::AutofeatError;
use crate::frame::{Column, Frame};

/// Reads a manuscript file into a string.
pub fn load_manuscript(path: impl AsRef<Path>) -> Result<String, AutofeatError> {
    Ok(fs::read_to_string(path)?)
}

/// Reads a CSV file into a [`Frame`].
pub fn load_csv(path: impl AsRef<Path>) -> Result<Frame, AutofeatError> {
    let text = fs::read_to_string(path)?;
    parse_csv(&text)
}

/// Parses CSV text into a [`Frame`].
///
/// The first non-empty line is the header. Each later line must carry
/// the same number of cells as the header; cells that fail to parse as
/// `f64` (including blanks) become missing values.
pub fn parse_csv(text: &str) -> Result<Frame, AutofeatError> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header = lines
        .next()
        .ok_or_else(|| AutofeatError::Frame("empty csv input".to_string()))?;
    let names: Vec<String> = header.split(',').map(|h| unquote(h).to_string()).collect();
    if names.iter().any(String::is_empty) {
        return Err(AutofeatError::Frame("blank column name in header".to_string()));
    }

    let mut values: Vec<Vec<Option<f64>>> = vec![Vec::new(); names.len()];
    for (row_idx, line) in lines.enumerate() {
        let cells: Vec<&str> = line.split(',').collect();
        if cells.len() != names.len() {
            return Err(AutofeatError::Frame(format!(
                "row {} has {} cells, expected {}",
                row_idx + 1,
                cells.len(),
                names.len()
            )));
        }
        for (col, cell) in cells.iter().enumerate() {
            values[col].push(unquote(cell).parse::<f64>().ok());
        }
    }

    let columns = names
        .into_iter()
        .zip(values)
        .map(|(name, vals)| Column::new(name, vals))
        .collect();
    Frame::from_columns(columns)
}

fn unquote(cell: &str) -> &str {
    let trimmed = cell.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed)
}
