//! Database schema and date encodings

use super::types::StoreError;
use chrono::{NaiveDate, NaiveTime};
use rusqlite::Connection;
use std::path::Path;

/// Property key holding the calendar name
pub const CALENDAR_NAME_KEY: &str = "calendar_name";

const PRICES_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS properties (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS prices (
    date TIMESTAMP NOT NULL,
    sid INTEGER NOT NULL,
    open REAL NOT NULL,
    high REAL NOT NULL,
    low REAL NOT NULL,
    close REAL NOT NULL,
    volume REAL NOT NULL,
    PRIMARY KEY (date, sid)
);
CREATE INDEX IF NOT EXISTS ix_prices_date ON prices (date);
CREATE INDEX IF NOT EXISTS ix_prices_sid ON prices (sid);
"#;

const ADJUSTMENTS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS splits (
    "index" INTEGER,
    effective_date INTEGER NOT NULL,
    ratio REAL NOT NULL,
    sid INTEGER NOT NULL,
    PRIMARY KEY (effective_date, sid)
);
CREATE INDEX IF NOT EXISTS ix_splits_index ON splits ("index");
CREATE INDEX IF NOT EXISTS splits_sids ON splits (sid);
CREATE INDEX IF NOT EXISTS splits_effective_date ON splits (effective_date);

CREATE TABLE IF NOT EXISTS mergers (
    "index" INTEGER,
    effective_date INTEGER NOT NULL,
    ratio REAL NOT NULL,
    sid INTEGER NOT NULL,
    PRIMARY KEY (effective_date, sid)
);
CREATE INDEX IF NOT EXISTS ix_mergers_index ON mergers ("index");
CREATE INDEX IF NOT EXISTS mergers_sids ON mergers (sid);
CREATE INDEX IF NOT EXISTS mergers_effective_date ON mergers (effective_date);

CREATE TABLE IF NOT EXISTS dividends (
    "index" INTEGER,
    effective_date INTEGER NOT NULL,
    ratio REAL NOT NULL,
    sid INTEGER NOT NULL,
    PRIMARY KEY (effective_date, sid)
);
CREATE INDEX IF NOT EXISTS ix_dividends_index ON dividends ("index");
CREATE INDEX IF NOT EXISTS dividends_sid ON dividends (sid);
CREATE INDEX IF NOT EXISTS dividends_effective_date ON dividends (effective_date);

CREATE TABLE IF NOT EXISTS dividend_payouts (
    date TIMESTAMP NOT NULL,
    amount REAL NOT NULL,
    sid INTEGER NOT NULL,
    record_date INTEGER,
    declared_date INTEGER,
    pay_date INTEGER,
    ex_date INTEGER NOT NULL,
    PRIMARY KEY (date, sid)
);
CREATE INDEX IF NOT EXISTS ix_dividend_payouts_date ON dividend_payouts (date);
CREATE INDEX IF NOT EXISTS dividend_payouts_sid ON dividend_payouts (sid);
CREATE INDEX IF NOT EXISTS dividends_payouts_ex_date ON dividend_payouts (ex_date);

CREATE TABLE IF NOT EXISTS stock_dividend_payouts (
    "index" INTEGER,
    sid INTEGER NOT NULL,
    ex_date INTEGER NOT NULL,
    declared_date INTEGER,
    record_date INTEGER,
    pay_date INTEGER,
    payment_sid INTEGER NOT NULL,
    ratio REAL NOT NULL,
    PRIMARY KEY (sid, ex_date)
);
CREATE INDEX IF NOT EXISTS ix_stock_dividend_payouts_index ON stock_dividend_payouts ("index");
CREATE INDEX IF NOT EXISTS stock_dividend_payouts_sid ON stock_dividend_payouts (sid);
CREATE INDEX IF NOT EXISTS stock_dividends_payouts_ex_date ON stock_dividend_payouts (ex_date);
"#;

/// Open a connection to the store file. Dropping it closes the file.
pub fn connect(path: &Path) -> Result<Connection, StoreError> {
    Ok(Connection::open(path)?)
}

/// Create the properties and prices tables if absent
pub fn init_prices_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(PRICES_SCHEMA)?;
    Ok(())
}

/// Create the corporate-action tables if absent
pub fn init_adjustments_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(ADJUSTMENTS_SCHEMA)?;
    Ok(())
}

/// Whether a table exists
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool, StoreError> {
    let count: i64 = conn.query_row(
        "SELECT count(name) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Encode a session as stored in `prices.date`
pub fn format_day(date: NaiveDate) -> String {
    format!("{} 00:00:00", date.format("%Y-%m-%d"))
}

/// Decode a `prices.date` value
pub fn parse_day(raw: &str) -> Result<NaiveDate, StoreError> {
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| StoreError::CorruptDate(raw.to_string()))
}

/// Seconds since the Unix epoch at UTC midnight
pub fn epoch_seconds(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

/// Inverse of [`epoch_seconds`]
pub fn from_epoch_seconds(seconds: i64) -> Option<NaiveDate> {
    chrono::DateTime::from_timestamp(seconds, 0).map(|dt| dt.date_naive())
}
