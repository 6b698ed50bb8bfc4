//! Daily bar writer

use super::frame::{Column, ColumnKind, Frame};
use super::schema::{self, CALENDAR_NAME_KEY};
use super::types::{BarField, PriceBar, StoreError, WriteReport};
use crate::calendar::TradingCalendar;
use crate::telemetry::{increment, CounterMetric};
use rusqlite::params;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Key columns a bar frame must declare, in order
pub const BAR_INDEX: [&str; 2] = ["date", "sid"];

const UPSERT_CALENDAR: &str = "INSERT OR REPLACE INTO properties (key, value) VALUES (?1, ?2)";

const UPSERT_PRICE: &str = "INSERT OR REPLACE INTO prices (date, sid, open, high, low, close, volume)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

/// Row that could not be turned into a bar: (key, reason)
type RowError = (String, String);

/// Writes daily OHLCV bars into the `prices` table
pub struct DailyBarWriter {
    path: PathBuf,
    calendar: Arc<dyn TradingCalendar>,
}

impl DailyBarWriter {
    /// Open (creating if needed) the store at `path`, binding it to `calendar`
    pub fn new(
        path: impl Into<PathBuf>,
        calendar: Arc<dyn TradingCalendar>,
    ) -> Result<Self, StoreError> {
        let path = path.into();
        let conn = schema::connect(&path)?;
        if !schema::table_exists(&conn, "prices")? {
            schema::init_prices_schema(&conn)?;
            tracing::debug!(path = ?path, "Created price schema");
        }
        Ok(Self { path, calendar })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn calendar(&self) -> &Arc<dyn TradingCalendar> {
        &self.calendar
    }

    /// Upsert every row of a bar frame.
    ///
    /// The frame must be tabular and indexed by exactly `["date", "sid"]`.
    /// Rows that fail to convert or insert are skipped and reported.
    pub fn write(&self, frame: &Frame) -> Result<WriteReport, StoreError> {
        let columns = BarColumns::validate(frame)?;
        self.upsert(frame.len(), |row| columns.bar_at(row))
    }

    /// Upsert typed bars
    pub fn write_bars(&self, bars: &[PriceBar]) -> Result<WriteReport, StoreError> {
        self.upsert(bars.len(), |row| Ok(bars[row]))
    }

    fn upsert<F>(&self, count: usize, mut bar_at: F) -> Result<WriteReport, StoreError>
    where
        F: FnMut(usize) -> Result<PriceBar, RowError>,
    {
        let started = Instant::now();
        let mut conn = schema::connect(&self.path)?;
        let tx = conn.transaction()?;
        tx.execute(UPSERT_CALENDAR, params![CALENDAR_NAME_KEY, self.calendar.name()])?;

        let mut report = WriteReport::default();
        {
            let mut stmt = tx.prepare_cached(UPSERT_PRICE)?;
            for row in 0..count {
                let bar = match bar_at(row) {
                    Ok(bar) => bar,
                    Err((key, reason)) => {
                        tracing::error!(row, key = %key, reason = %reason, "Skipping malformed price row");
                        report.skip(row, key, reason);
                        continue;
                    }
                };

                let result = stmt.execute(params![
                    schema::format_day(bar.date),
                    bar.sid,
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume,
                ]);
                match result {
                    Ok(_) => report.written += 1,
                    Err(e) => {
                        tracing::error!(error = %e, values = ?bar, "Failed to insert price bar");
                        report.skip(row, bar_key(&bar), e.to_string());
                    }
                }
            }
        }
        tx.commit()?;

        increment(CounterMetric::RowsWritten, report.written as u64);
        increment(CounterMetric::RowsSkipped, report.skipped.len() as u64);
        tracing::info!(
            path = ?self.path,
            calendar = self.calendar.name(),
            written = report.written,
            skipped = report.skipped.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Wrote price bars"
        );

        Ok(report)
    }
}

fn bar_key(bar: &PriceBar) -> String {
    format!("({}, {})", bar.date, bar.sid)
}

/// Validated column references of a bar frame
struct BarColumns<'a> {
    date: &'a Column,
    sid: &'a Column,
    fields: [&'a Column; 5],
}

impl<'a> BarColumns<'a> {
    fn validate(frame: &'a Frame) -> Result<Self, StoreError> {
        if !frame.is_tabular() {
            return Err(StoreError::Validation(
                "data must be tabular: columns differ in length".to_string(),
            ));
        }
        if frame.index() != BAR_INDEX {
            return Err(StoreError::Validation(format!(
                "data indexes must be {:?}, got {:?}",
                BAR_INDEX,
                frame.index()
            )));
        }

        let date = require(frame, "date", &[ColumnKind::Date, ColumnKind::Text])?;
        let sid = require(frame, "sid", &[ColumnKind::Int])?;
        let numeric = [ColumnKind::Float, ColumnKind::Int, ColumnKind::Text];
        let fields = [
            require(frame, BarField::Open.column(), &numeric)?,
            require(frame, BarField::High.column(), &numeric)?,
            require(frame, BarField::Low.column(), &numeric)?,
            require(frame, BarField::Close.column(), &numeric)?,
            require(frame, BarField::Volume.column(), &numeric)?,
        ];

        Ok(Self { date, sid, fields })
    }

    fn bar_at(&self, row: usize) -> Result<PriceBar, RowError> {
        let sid = self
            .sid
            .int_at(row)
            .map_err(|e| (format!("row {}", row), e))?;
        let date = match self.date.date_at(row) {
            Ok(Some(date)) => date,
            Ok(None) => return Err((format!("(NaT, {})", sid), "missing date".to_string())),
            Err(e) => return Err((format!("(?, {})", sid), e)),
        };

        let key = || format!("({}, {})", date, sid);
        let mut values = [0.0; 5];
        for (value, (column, field)) in values
            .iter_mut()
            .zip(self.fields.iter().zip(BarField::ALL))
        {
            *value = column
                .float_at(row)
                .map_err(|e| (key(), format!("{}: {}", field, e)))?;
        }
        let [open, high, low, close, volume] = values;

        Ok(PriceBar {
            date,
            sid,
            open,
            high,
            low,
            close,
            volume,
        })
    }
}

fn require<'a>(
    frame: &'a Frame,
    name: &str,
    kinds: &[ColumnKind],
) -> Result<&'a Column, StoreError> {
    let column = frame
        .column(name)
        .ok_or_else(|| StoreError::Validation(format!("missing column '{}'", name)))?;
    if !kinds.contains(&column.kind()) {
        return Err(StoreError::Validation(format!(
            "column '{}' has kind {}, expected one of {:?}",
            name,
            column.kind(),
            kinds
        )));
    }
    Ok(column)
}
