//! Column-oriented tabular input for the writers

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

/// Kind of data a column holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Int,
    Float,
    Date,
    Text,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnKind::Int => "int64",
            ColumnKind::Float => "float64",
            ColumnKind::Date => "date",
            ColumnKind::Text => "text",
        };
        f.write_str(name)
    }
}

/// Typed column values. Missing floats are NaN, missing dates `None`.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Int(Vec<i64>),
    Float(Vec<f64>),
    Date(Vec<Option<NaiveDate>>),
    Text(Vec<String>),
}

impl Column {
    pub fn kind(&self) -> ColumnKind {
        match self {
            Column::Int(_) => ColumnKind::Int,
            Column::Float(_) => ColumnKind::Float,
            Column::Date(_) => ColumnKind::Date,
            Column::Text(_) => ColumnKind::Text,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Int(v) => v.len(),
            Column::Float(v) => v.len(),
            Column::Date(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Integer value at `row`; text must parse as an integer
    pub fn int_at(&self, row: usize) -> Result<i64, String> {
        match self {
            Column::Int(v) => v.get(row).copied().ok_or_else(|| out_of_range(row)),
            Column::Text(v) => {
                let raw = v.get(row).ok_or_else(|| out_of_range(row))?;
                raw.trim()
                    .parse()
                    .map_err(|_| format!("'{}' is not an integer", raw))
            }
            other => Err(format!("{} column has no integer values", other.kind())),
        }
    }

    /// Numeric value at `row`; ints widen, text must parse as a number
    pub fn float_at(&self, row: usize) -> Result<f64, String> {
        match self {
            Column::Float(v) => v.get(row).copied().ok_or_else(|| out_of_range(row)),
            Column::Int(v) => v
                .get(row)
                .map(|x| *x as f64)
                .ok_or_else(|| out_of_range(row)),
            Column::Text(v) => {
                let raw = v.get(row).ok_or_else(|| out_of_range(row))?;
                raw.trim()
                    .parse()
                    .map_err(|_| format!("'{}' is not numeric", raw))
            }
            Column::Date(_) => Err("date column has no numeric values".to_string()),
        }
    }

    /// Date value at `row`; text must be `YYYY-MM-DD` (time suffix ignored)
    pub fn date_at(&self, row: usize) -> Result<Option<NaiveDate>, String> {
        match self {
            Column::Date(v) => v.get(row).copied().ok_or_else(|| out_of_range(row)),
            Column::Text(v) => {
                let raw = v.get(row).ok_or_else(|| out_of_range(row))?;
                let trimmed = raw.trim();
                let day = trimmed.get(..10).unwrap_or(trimmed);
                NaiveDate::parse_from_str(day, "%Y-%m-%d")
                    .map(Some)
                    .map_err(|_| format!("'{}' is not a date", raw))
            }
            other => Err(format!("{} column has no date values", other.kind())),
        }
    }

    /// Empty column of the given kind
    pub fn empty(kind: ColumnKind) -> Self {
        match kind {
            ColumnKind::Int => Column::Int(Vec::new()),
            ColumnKind::Float => Column::Float(Vec::new()),
            ColumnKind::Date => Column::Date(Vec::new()),
            ColumnKind::Text => Column::Text(Vec::new()),
        }
    }
}

fn out_of_range(row: usize) -> String {
    format!("row {} out of range", row)
}

/// Named, typed columns plus the names of the columns forming the row key
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    index: Vec<String>,
    columns: Vec<(String, Column)>,
}

impl Frame {
    /// Create an empty frame with no declared index
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the key columns
    pub fn with_index<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.index = names.iter().map(|s| s.as_ref().to_string()).collect();
        self
    }

    /// Add or replace a column
    pub fn with_column(mut self, name: &str, column: Column) -> Self {
        self.insert(name, column);
        self
    }

    /// Add or replace a column in place
    pub fn insert(&mut self, name: &str, column: Column) {
        match self.columns.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = column,
            None => self.columns.push((name.to_string(), column)),
        }
    }

    /// Declared key column names
    pub fn index(&self) -> &[String] {
        &self.index
    }

    /// Column names in insertion order
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.columns.iter().map(|(n, c)| (n.as_str(), c))
    }

    /// All columns have the same length
    pub fn is_tabular(&self) -> bool {
        match self.columns.first() {
            Some((_, first)) => self.columns.iter().all(|(_, c)| c.len() == first.len()),
            None => true,
        }
    }

    /// Number of rows (length of the first column)
    pub fn len(&self) -> usize {
        self.columns.first().map(|(_, c)| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
