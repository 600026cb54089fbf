use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ColumnError {
    #[error("Failed to read '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid number '{value}' on line {line}")]
    InvalidNumber { line: usize, value: String },
    #[error("Row {row} has {found} column(s), column {index} was requested")]
    MissingColumn {
        row: usize,
        found: usize,
        index: usize,
    },
    #[error("No data rows found in '{path}'", path = path.display())]
    Empty { path: PathBuf },
}

/// A whitespace-separated numeric table, as written by the engine's
/// time-averaging and print fixes. Lines starting with `#` are comments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnTable {
    rows: Vec<Vec<f64>>,
}

impl ColumnTable {
    pub fn read(path: &Path) -> Result<Self, ColumnError> {
        let content = fs::read_to_string(path).map_err(|source| ColumnError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::parse(&content)?;
        if table.is_empty() {
            return Err(ColumnError::Empty {
                path: path.to_path_buf(),
            });
        }
        Ok(table)
    }

    pub fn parse(content: &str) -> Result<Self, ColumnError> {
        let mut rows = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let row = trimmed
                .split_whitespace()
                .map(|token| {
                    token.parse::<f64>().map_err(|_| ColumnError::InvalidNumber {
                        line: idx + 1,
                        value: token.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(row);
        }
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, index: usize) -> Result<Vec<f64>, ColumnError> {
        self.rows
            .iter()
            .enumerate()
            .map(|(row, values)| {
                values
                    .get(index)
                    .copied()
                    .ok_or(ColumnError::MissingColumn {
                        row: row + 1,
                        found: values.len(),
                        index,
                    })
            })
            .collect()
    }

    /// The last `count` rows. Asking for more rows than exist, or for zero
    /// rows, yields the whole table.
    pub fn tail(&self, count: usize) -> ColumnTable {
        if count == 0 || count >= self.rows.len() {
            return self.clone();
        }
        Self {
            rows: self.rows[self.rows.len() - count..].to_vec(),
        }
    }
}
