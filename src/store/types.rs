//! Store types and errors

use super::frame::ColumnKind;
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Stable integer identifier of a tradable instrument
pub type Sid = i64;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Writer input has the wrong shape
    #[error("Invalid input: {0}")]
    Validation(String),
    /// Corporate-action frame columns differ from the table's columns
    #[error("Unexpected columns for {table}: expected {expected:?}, received {received:?}")]
    SchemaMismatch {
        table: &'static str,
        expected: Vec<String>,
        received: Vec<String>,
    },
    /// Corporate-action column holds the wrong kind of data
    #[error("Expected {expected} data for column '{column}' of {table}, got {actual}")]
    TypeMismatch {
        table: &'static str,
        column: String,
        expected: ColumnKind,
        actual: ColumnKind,
    },
    /// No bar was ever written for this sid
    #[error("Unknown asset: sid={0}")]
    UnknownAsset(Sid),
    /// The sid is known but has no bar on the requested day
    #[error("No data on or before day={date} for sid={sid}")]
    NoDataBeforeDate { sid: Sid, date: NaiveDate },
    /// Store lacks (or names an unusable) trading calendar
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Field name outside open/high/low/close/volume
    #[error("Unknown bar field: {0}")]
    UnknownField(String),
    /// Stored date text could not be parsed
    #[error("Corrupt date in store: {0}")]
    CorruptDate(String),
    /// Storage layer failure
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// One day's OHLCV for one asset
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub sid: Sid,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// Value of a single field
    pub fn field(&self, field: BarField) -> f64 {
        match field {
            BarField::Open => self.open,
            BarField::High => self.high,
            BarField::Low => self.low,
            BarField::Close => self.close,
            BarField::Volume => self.volume,
        }
    }
}

/// Numeric bar column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BarField {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl BarField {
    /// All fields in storage order
    pub const ALL: [BarField; 5] = [
        BarField::Open,
        BarField::High,
        BarField::Low,
        BarField::Close,
        BarField::Volume,
    ];

    /// Column name in the `prices` table
    pub fn column(self) -> &'static str {
        match self {
            BarField::Open => "open",
            BarField::High => "high",
            BarField::Low => "low",
            BarField::Close => "close",
            BarField::Volume => "volume",
        }
    }
}

impl fmt::Display for BarField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for BarField {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(BarField::Open),
            "high" => Ok(BarField::High),
            "low" => Ok(BarField::Low),
            "close" => Ok(BarField::Close),
            "volume" => Ok(BarField::Volume),
            _ => Err(StoreError::UnknownField(s.to_string())),
        }
    }
}

/// Maps a domain asset object to its sid
pub trait Asset {
    fn sid(&self) -> Sid;
}

impl Asset for Sid {
    fn sid(&self) -> Sid {
        *self
    }
}

impl<A: Asset + ?Sized> Asset for &A {
    fn sid(&self) -> Sid {
        (**self).sid()
    }
}

/// Resolve a slice of assets to sids, preserving order
pub fn sids_of<A: Asset>(assets: &[A]) -> Vec<Sid> {
    assets.iter().map(Asset::sid).collect()
}

/// A row a writer did not persist
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRow {
    /// Position of the row in the input
    pub position: usize,
    /// Human-readable primary key of the row
    pub key: String,
    pub reason: String,
}

/// Outcome of one write call
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WriteReport {
    pub written: usize,
    pub skipped: Vec<SkippedRow>,
}

impl WriteReport {
    /// Whether every row was persisted
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }

    pub(crate) fn skip(&mut self, position: usize, key: String, reason: impl Into<String>) {
        self.skipped.push(SkippedRow {
            position,
            key,
            reason: reason.into(),
        });
    }
}
