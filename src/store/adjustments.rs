//! Corporate-actions writer

use super::dividends::{calc_dividend_ratios, DividendPayout, DividendRatio};
use super::frame::{Column, ColumnKind, Frame};
use super::schema;
use super::types::{StoreError, WriteReport};
use super::BarReader;
use crate::calendar::TradingCalendar;
use crate::telemetry::{increment, CounterMetric};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Transaction};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

type Schema = &'static [(&'static str, ColumnKind)];

const RATIO_COLUMNS: Schema = &[
    ("sid", ColumnKind::Int),
    ("effective_date", ColumnKind::Date),
    ("ratio", ColumnKind::Float),
];

const DIVIDEND_COLUMNS: Schema = &[
    ("sid", ColumnKind::Int),
    ("ex_date", ColumnKind::Date),
    ("declared_date", ColumnKind::Date),
    ("record_date", ColumnKind::Date),
    ("pay_date", ColumnKind::Date),
    ("amount", ColumnKind::Float),
];

const STOCK_DIVIDEND_COLUMNS: Schema = &[
    ("sid", ColumnKind::Int),
    ("ex_date", ColumnKind::Date),
    ("declared_date", ColumnKind::Date),
    ("record_date", ColumnKind::Date),
    ("pay_date", ColumnKind::Date),
    ("payment_sid", ColumnKind::Int),
    ("ratio", ColumnKind::Float),
];

const UPSERT_SPLIT: &str =
    r#"INSERT OR REPLACE INTO splits ("index", effective_date, ratio, sid) VALUES (?1, ?2, ?3, ?4)"#;
const UPSERT_MERGER: &str =
    r#"INSERT OR REPLACE INTO mergers ("index", effective_date, ratio, sid) VALUES (?1, ?2, ?3, ?4)"#;
const UPSERT_DIVIDEND: &str =
    r#"INSERT OR REPLACE INTO dividends ("index", effective_date, ratio, sid) VALUES (?1, ?2, ?3, ?4)"#;
const UPSERT_DIVIDEND_PAYOUT: &str = "INSERT OR REPLACE INTO dividend_payouts
     (date, amount, sid, record_date, declared_date, pay_date, ex_date)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";
const UPSERT_STOCK_DIVIDEND: &str = r#"INSERT OR REPLACE INTO stock_dividend_payouts
     ("index", sid, ex_date, declared_date, record_date, pay_date, payment_sid, ratio)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#;

/// Row that could not be converted: (key, reason)
type RowError = (String, String);

/// Corporate-action inputs; `None` means no new events of that kind
#[derive(Debug, Clone, Copy, Default)]
pub struct AdjustmentFrames<'a> {
    pub splits: Option<&'a Frame>,
    pub mergers: Option<&'a Frame>,
    pub dividends: Option<&'a Frame>,
    pub stock_dividends: Option<&'a Frame>,
}

/// Per-table outcome of an adjustment write
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AdjustmentReport {
    pub splits: WriteReport,
    pub mergers: WriteReport,
    pub dividend_payouts: WriteReport,
    /// Ratios derived from the dividend payouts
    pub dividends: WriteReport,
    pub stock_dividends: WriteReport,
}

impl AdjustmentReport {
    fn tables(&self) -> [&WriteReport; 5] {
        [
            &self.splits,
            &self.mergers,
            &self.dividend_payouts,
            &self.dividends,
            &self.stock_dividends,
        ]
    }

    pub fn total_written(&self) -> usize {
        self.tables().iter().map(|r| r.written).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.tables().iter().map(|r| r.skipped.len()).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.total_skipped() == 0
    }
}

/// Writes splits, mergers and dividends into the adjustment tables
pub struct AdjustmentWriter {
    path: PathBuf,
    bar_reader: Arc<dyn BarReader>,
    calendar: Arc<dyn TradingCalendar>,
}

impl AdjustmentWriter {
    /// Open (creating if needed) the adjustment tables at `path`.
    ///
    /// `bar_reader` supplies the closes used to turn dividend amounts into ratios.
    pub fn new(
        path: impl Into<PathBuf>,
        bar_reader: Arc<dyn BarReader>,
        calendar: Arc<dyn TradingCalendar>,
    ) -> Result<Self, StoreError> {
        let path = path.into();
        let conn = schema::connect(&path)?;
        if !schema::table_exists(&conn, "dividends")? {
            schema::init_adjustments_schema(&conn)?;
            tracing::debug!(path = ?path, "Created adjustment schema");
        }
        Ok(Self {
            path,
            bar_reader,
            calendar,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validate every supplied frame, then upsert all of them in one transaction
    pub fn write(&self, frames: AdjustmentFrames<'_>) -> Result<AdjustmentReport, StoreError> {
        let splits = validate("splits", RATIO_COLUMNS, frames.splits)?;
        let mergers = validate("mergers", RATIO_COLUMNS, frames.mergers)?;
        let dividends = validate("dividends", DIVIDEND_COLUMNS, frames.dividends)?;
        let stock_dividends =
            validate("stock_dividends", STOCK_DIVIDEND_COLUMNS, frames.stock_dividends)?;

        let payouts: Vec<(usize, DividendPayout)> = dividends
            .map(|frame| {
                (0..frame.len())
                    .filter_map(|row| dividend_payout(frame, row).ok().map(|p| (row, p)))
                    .collect()
            })
            .unwrap_or_default();
        let (origins, payouts): (Vec<usize>, Vec<DividendPayout>) = payouts.into_iter().unzip();
        let mut ratios = calc_dividend_ratios(&payouts, self.bar_reader.as_ref(), self.calendar.as_ref());
        // Every payout yields either a ratio or a skip, in payout order
        let unpriced: HashSet<usize> = ratios.skipped.iter().map(|s| s.position).collect();
        let ratio_origins: Vec<usize> = (0..payouts.len())
            .filter(|i| !unpriced.contains(i))
            .map(|i| origins[i])
            .collect();
        for skipped in &mut ratios.skipped {
            skipped.position = origins[skipped.position];
        }

        let mut conn = schema::connect(&self.path)?;
        let tx = conn.transaction()?;
        let mut report = AdjustmentReport::default();

        if let Some(frame) = splits {
            report.splits = upsert(&tx, "splits", UPSERT_SPLIT, frame.len(), |row| {
                ratio_row(frame, row)
            })?;
        }
        if let Some(frame) = mergers {
            report.mergers = upsert(&tx, "mergers", UPSERT_MERGER, frame.len(), |row| {
                ratio_row(frame, row)
            })?;
        }
        if let Some(frame) = dividends {
            report.dividend_payouts = upsert(
                &tx,
                "dividend_payouts",
                UPSERT_DIVIDEND_PAYOUT,
                frame.len(),
                |row| dividend_payout_row(frame, row),
            )?;
            let ratio_rows = &ratios.ratios;
            let mut derived = upsert(&tx, "dividends", UPSERT_DIVIDEND, ratio_rows.len(), |i| {
                Ok(dividend_ratio_row(ratio_origins[i], &ratio_rows[i]))
            })?;
            derived.skipped.append(&mut ratios.skipped);
            report.dividends = derived;
        }
        if let Some(frame) = stock_dividends {
            report.stock_dividends = upsert(
                &tx,
                "stock_dividend_payouts",
                UPSERT_STOCK_DIVIDEND,
                frame.len(),
                |row| stock_dividend_row(frame, row),
            )?;
        }

        tx.commit()?;

        increment(CounterMetric::RowsWritten, report.total_written() as u64);
        increment(CounterMetric::RowsSkipped, report.total_skipped() as u64);
        tracing::info!(
            path = ?self.path,
            splits = report.splits.written,
            mergers = report.mergers.written,
            dividend_payouts = report.dividend_payouts.written,
            dividends = report.dividends.written,
            stock_dividends = report.stock_dividends.written,
            skipped = report.total_skipped(),
            "Wrote adjustments"
        );

        Ok(report)
    }
}

/// Check a frame against a table's columns. `None` and empty frames pass as `None`.
fn validate<'a>(
    table: &'static str,
    expected: Schema,
    frame: Option<&'a Frame>,
) -> Result<Option<&'a Frame>, StoreError> {
    let Some(frame) = frame.filter(|f| !f.is_empty()) else {
        return Ok(None);
    };

    if !frame.is_tabular() {
        return Err(StoreError::Validation(format!(
            "{} frame must be tabular: columns differ in length",
            table
        )));
    }

    let expected_names: BTreeSet<&str> = expected.iter().map(|(name, _)| *name).collect();
    let received: BTreeSet<&str> = frame.columns().map(|(name, _)| name).collect();
    if expected_names != received {
        return Err(StoreError::SchemaMismatch {
            table,
            expected: expected_names.iter().map(|s| s.to_string()).collect(),
            received: frame.column_names(),
        });
    }

    for (name, kind) in expected {
        if let Some(column) = frame.column(name) {
            if column.kind() != *kind {
                return Err(StoreError::TypeMismatch {
                    table,
                    column: name.to_string(),
                    expected: *kind,
                    actual: column.kind(),
                });
            }
        }
    }

    Ok(Some(frame))
}

/// Insert rows one by one; conversion and storage failures skip the row
fn upsert<F>(
    tx: &Transaction<'_>,
    table: &'static str,
    sql: &str,
    count: usize,
    mut row_values: F,
) -> Result<WriteReport, StoreError>
where
    F: FnMut(usize) -> Result<(String, Vec<Value>), RowError>,
{
    let mut report = WriteReport::default();
    let mut stmt = tx.prepare_cached(sql)?;

    for row in 0..count {
        let (key, values) = match row_values(row) {
            Ok(converted) => converted,
            Err((key, reason)) => {
                tracing::error!(table, row, key = %key, reason = %reason, "Skipping malformed adjustment row");
                report.skip(row, key, reason);
                continue;
            }
        };
        if let Err(e) = stmt.execute(params_from_iter(values.iter())) {
            tracing::error!(table, error = %e, values = ?values, "Failed to insert adjustment row");
            report.skip(row, key, e.to_string());
            continue;
        }
        report.written += 1;
    }

    Ok(report)
}

fn column<'a>(frame: &'a Frame, name: &str) -> Result<&'a Column, String> {
    frame
        .column(name)
        .ok_or_else(|| format!("missing column '{}'", name))
}

fn date_value(date: Option<NaiveDate>) -> Value {
    date.map(|d| Value::Integer(schema::epoch_seconds(d)))
        .unwrap_or(Value::Null)
}

fn fmt_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_else(|| "NaT".to_string())
}

fn ratio_row(frame: &Frame, row: usize) -> Result<(String, Vec<Value>), RowError> {
    let at = |e: String| (format!("row {}", row), e);
    let sid = column(frame, "sid").and_then(|c| c.int_at(row)).map_err(at)?;
    let effective_date = column(frame, "effective_date")
        .and_then(|c| c.date_at(row))
        .map_err(at)?;
    let ratio = column(frame, "ratio").and_then(|c| c.float_at(row)).map_err(at)?;

    Ok((
        format!("({}, {})", fmt_date(effective_date), sid),
        vec![
            Value::Integer(row as i64),
            date_value(effective_date),
            Value::Real(ratio),
            Value::Integer(sid),
        ],
    ))
}

fn dividend_payout(frame: &Frame, row: usize) -> Result<DividendPayout, String> {
    let date = |name: &str| column(frame, name).and_then(|c| c.date_at(row));
    Ok(DividendPayout {
        sid: column(frame, "sid").and_then(|c| c.int_at(row))?,
        ex_date: date("ex_date")?.ok_or_else(|| "missing ex_date".to_string())?,
        declared_date: date("declared_date")?,
        record_date: date("record_date")?,
        pay_date: date("pay_date")?,
        amount: column(frame, "amount").and_then(|c| c.float_at(row))?,
    })
}

fn dividend_payout_row(frame: &Frame, row: usize) -> Result<(String, Vec<Value>), RowError> {
    let payout = dividend_payout(frame, row).map_err(|e| (format!("row {}", row), e))?;
    Ok((
        format!("({}, {})", payout.ex_date, payout.sid),
        vec![
            Value::Text(schema::format_day(payout.ex_date)),
            Value::Real(payout.amount),
            Value::Integer(payout.sid),
            date_value(payout.record_date),
            date_value(payout.declared_date),
            date_value(payout.pay_date),
            date_value(Some(payout.ex_date)),
        ],
    ))
}

fn dividend_ratio_row(position: usize, ratio: &DividendRatio) -> (String, Vec<Value>) {
    (
        format!("({}, {})", ratio.effective_date, ratio.sid),
        vec![
            Value::Integer(position as i64),
            date_value(Some(ratio.effective_date)),
            Value::Real(ratio.ratio),
            Value::Integer(ratio.sid),
        ],
    )
}

fn stock_dividend_row(frame: &Frame, row: usize) -> Result<(String, Vec<Value>), RowError> {
    let at = |e: String| (format!("row {}", row), e);
    let date = |name: &str| column(frame, name).and_then(|c| c.date_at(row)).map_err(at);
    let sid = column(frame, "sid").and_then(|c| c.int_at(row)).map_err(at)?;
    let ex_date = date("ex_date")?;
    let declared_date = date("declared_date")?;
    let record_date = date("record_date")?;
    let pay_date = date("pay_date")?;
    let payment_sid = column(frame, "payment_sid")
        .and_then(|c| c.int_at(row))
        .map_err(at)?;
    let ratio = column(frame, "ratio").and_then(|c| c.float_at(row)).map_err(at)?;

    Ok((
        format!("({}, {})", sid, fmt_date(ex_date)),
        vec![
            Value::Integer(row as i64),
            Value::Integer(sid),
            date_value(ex_date),
            date_value(declared_date),
            date_value(record_date),
            date_value(pay_date),
            Value::Integer(payment_sid),
            Value::Real(ratio),
        ],
    ))
}
