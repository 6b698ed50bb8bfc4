//! Daily bar reader

use super::cache::{CacheEntry, CacheKey, QueryCache};
use super::schema::{self, CALENDAR_NAME_KEY};
use super::types::{sids_of, Asset, BarField, Sid, StoreError};
use super::BarReader;
use crate::calendar::{CalendarRegistry, TradingCalendar};
use crate::telemetry::{record_latency, QueryKind};
use chrono::NaiveDate;
use ndarray::{Array1, Array2};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Upper bound on sids bound into a single `IN (...)` query
pub const MAX_SIDS_PER_QUERY: usize = 2000;

/// Default number of memoised lookups per reader
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Single-field table: sessions down, sids across
#[derive(Debug, Clone, PartialEq)]
pub struct BarTable {
    pub field: BarField,
    pub sessions: Vec<NaiveDate>,
    pub sids: Vec<Sid>,
    pub values: Array2<f64>,
}

impl BarTable {
    /// Value for a session/sid pair, NaN when absent
    pub fn get(&self, session: NaiveDate, sid: Sid) -> Option<f64> {
        let row = self.sessions.iter().position(|s| *s == session)?;
        let col = self.sids.iter().position(|s| *s == sid)?;
        Some(self.values[[row, col]])
    }
}

/// Single-asset, single-field sequence over sessions
#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    pub field: BarField,
    pub sid: Sid,
    pub sessions: Vec<NaiveDate>,
    pub values: Array1<f64>,
}

/// Reads bars written by [`super::DailyBarWriter`].
///
/// Every call opens and closes its own connection, so readers can be shared
/// across threads. Results of `get_value` and `load_raw_arrays` are memoised in
/// a bounded cache that is only cleared by [`DailyBarReader::invalidate_cache`].
pub struct DailyBarReader {
    path: PathBuf,
    calendars: CalendarRegistry,
    cache: QueryCache,
}

impl DailyBarReader {
    /// Open the store at `path`, creating the price schema if absent
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::with_options(path, CalendarRegistry::default(), DEFAULT_CACHE_CAPACITY)
    }

    /// Open with a custom calendar registry and cache capacity
    pub fn with_options(
        path: impl Into<PathBuf>,
        calendars: CalendarRegistry,
        cache_capacity: usize,
    ) -> Result<Self, StoreError> {
        let path = path.into();
        let conn = schema::connect(&path)?;
        if !schema::table_exists(&conn, "prices")? {
            schema::init_prices_schema(&conn)?;
        }
        Ok(Self {
            path,
            calendars,
            cache: QueryCache::new(cache_capacity),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Forget every memoised lookup
    pub fn invalidate_cache(&self) {
        self.cache.clear();
        tracing::debug!(path = ?self.path, "Reader cache invalidated");
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        schema::connect(&self.path)
    }

    /// Distinguish an unknown sid from a known sid without a bar on `date`
    fn missing_bar(&self, conn: &Connection, sid: Sid, date: NaiveDate) -> StoreError {
        match sid_exists(conn, sid) {
            Ok(true) => StoreError::NoDataBeforeDate { sid, date },
            Ok(false) => StoreError::UnknownAsset(sid),
            Err(e) => e,
        }
    }

    fn boundary_day(&self, aggregate: &str) -> Result<Option<NaiveDate>, StoreError> {
        let conn = self.connect()?;
        let sql = format!("SELECT {}(date) FROM prices", aggregate);
        let raw: Option<String> = conn.query_row(&sql, [], |row| row.get(0))?;
        raw.as_deref().map(schema::parse_day).transpose()
    }

    /// Arrays for any asset type that resolves to a sid
    pub fn load_raw_arrays_for<A: Asset>(
        &self,
        fields: &[BarField],
        start: NaiveDate,
        end: NaiveDate,
        assets: &[A],
    ) -> Result<Vec<Array2<f64>>, StoreError> {
        self.load_raw_arrays(fields, start, end, &sids_of(assets))
    }

    /// One field as a table indexed by session and sid
    pub fn load_dataframe<A: Asset>(
        &self,
        field: BarField,
        start: NaiveDate,
        end: NaiveDate,
        assets: &[A],
    ) -> Result<BarTable, StoreError> {
        let sids = sids_of(assets);
        let mut arrays = self.load_raw_arrays(&[field], start, end, &sids)?;
        let sessions = self.trading_calendar()?.sessions_in_range(start, end);
        Ok(BarTable {
            field,
            sessions,
            sids,
            values: arrays.remove(0),
        })
    }

    /// One field of one asset as a sequence over sessions
    pub fn load_series<A: Asset>(
        &self,
        field: BarField,
        start: NaiveDate,
        end: NaiveDate,
        asset: A,
    ) -> Result<BarSeries, StoreError> {
        let sid = asset.sid();
        let mut arrays = self.load_raw_arrays(&[field], start, end, &[sid])?;
        let sessions = self.trading_calendar()?.sessions_in_range(start, end);
        let values = arrays.remove(0).column(0).to_owned();
        Ok(BarSeries {
            field,
            sid,
            sessions,
            values,
        })
    }

    fn query_raw_arrays(
        &self,
        fields: &[BarField],
        start: NaiveDate,
        end: NaiveDate,
        sids: &[Sid],
    ) -> Result<Vec<Array2<f64>>, StoreError> {
        let sessions = self.trading_calendar()?.sessions_in_range(start, end);
        tracing::debug!(
            assets = sids.len(),
            sessions = sessions.len(),
            fields = fields.len(),
            "Loading raw arrays"
        );

        let row_of: HashMap<NaiveDate, usize> =
            sessions.iter().enumerate().map(|(i, d)| (*d, i)).collect();
        let mut cols_of: HashMap<Sid, Vec<usize>> = HashMap::new();
        for (i, sid) in sids.iter().enumerate() {
            cols_of.entry(*sid).or_default().push(i);
        }
        let mut unique: Vec<Sid> = cols_of.keys().copied().collect();
        unique.sort_unstable();

        let start_day = schema::format_day(start);
        let end_day = schema::format_day(end);
        let conn = self.connect()?;
        let mut arrays = Vec::with_capacity(fields.len());

        for field in fields {
            let mut out = Array2::from_elem((sessions.len(), sids.len()), f64::NAN);
            for chunk in unique.chunks(MAX_SIDS_PER_QUERY) {
                let placeholders = vec!["?"; chunk.len()].join(",");
                let sql = format!(
                    "SELECT date, sid, {} FROM prices WHERE sid IN ({}) AND date >= ? AND date <= ?",
                    field.column(),
                    placeholders
                );
                let mut stmt = conn.prepare(&sql)?;
                let bound = chunk
                    .iter()
                    .map(|sid| rusqlite::types::Value::Integer(*sid))
                    .chain([
                        rusqlite::types::Value::Text(start_day.clone()),
                        rusqlite::types::Value::Text(end_day.clone()),
                    ]);
                let mut rows = stmt.query(params_from_iter(bound))?;
                while let Some(row) = rows.next()? {
                    let day: String = row.get(0)?;
                    let sid: Sid = row.get(1)?;
                    let value: f64 = row.get(2)?;
                    // Bars off the calendar are dropped by the reindex
                    let Some(&r) = row_of.get(&schema::parse_day(&day)?) else {
                        continue;
                    };
                    if let Some(cols) = cols_of.get(&sid) {
                        for &c in cols {
                            out[[r, c]] = value;
                        }
                    }
                }
            }
            arrays.push(out);
        }

        Ok(arrays)
    }
}

impl BarReader for DailyBarReader {
    fn trading_calendar(&self) -> Result<Arc<dyn TradingCalendar>, StoreError> {
        let conn = self.connect()?;
        let name: Option<String> = conn
            .query_row(
                "SELECT value FROM properties WHERE key = ?1",
                [CALENDAR_NAME_KEY],
                |row| row.get(0),
            )
            .optional()?;
        let name = name
            .ok_or_else(|| StoreError::Configuration("No trading calendar defined.".to_string()))?;
        self.calendars
            .get(&name)
            .map_err(|e| StoreError::Configuration(e.to_string()))
    }

    fn first_trading_day(&self) -> Result<Option<NaiveDate>, StoreError> {
        self.boundary_day("MIN")
    }

    fn last_available_dt(&self) -> Result<Option<NaiveDate>, StoreError> {
        self.boundary_day("MAX")
    }

    fn sessions(&self) -> Result<Vec<NaiveDate>, StoreError> {
        let calendar = self.trading_calendar()?;
        match (self.first_trading_day()?, self.last_available_dt()?) {
            (Some(first), Some(last)) => Ok(calendar.sessions_in_range(first, last)),
            _ => Ok(Vec::new()),
        }
    }

    fn get_value(&self, sid: Sid, date: NaiveDate, field: BarField) -> Result<f64, StoreError> {
        let key = CacheKey::Value { sid, date, field };
        if let Some(CacheEntry::Value(value)) = self.cache.get(&key) {
            return Ok(value);
        }

        let started = Instant::now();
        let conn = self.connect()?;
        let sql = format!(
            "SELECT {} FROM prices WHERE sid = ?1 AND date = ?2",
            field.column()
        );
        let value: Option<f64> = conn
            .query_row(&sql, params![sid, schema::format_day(date)], |row| {
                row.get(0)
            })
            .optional()?;
        record_latency(QueryKind::Value, started.elapsed());

        match value {
            Some(value) => {
                self.cache.put(key, CacheEntry::Value(value));
                Ok(value)
            }
            None => Err(self.missing_bar(&conn, sid, date)),
        }
    }

    fn get_last_traded_dt(&self, sid: Sid, date: NaiveDate) -> Result<Option<NaiveDate>, StoreError> {
        // Exact-day match: a bar on an earlier day does not count
        let conn = self.connect()?;
        let found: Option<String> = conn
            .query_row(
                "SELECT date FROM prices WHERE sid = ?1 AND date = ?2",
                params![sid, schema::format_day(date)],
                |row| row.get(0),
            )
            .optional()?;

        match found {
            Some(day) => schema::parse_day(&day).map(Some),
            None if sid_exists(&conn, sid)? => Ok(None),
            None => Err(StoreError::UnknownAsset(sid)),
        }
    }

    fn load_raw_arrays(
        &self,
        fields: &[BarField],
        start: NaiveDate,
        end: NaiveDate,
        sids: &[Sid],
    ) -> Result<Vec<Array2<f64>>, StoreError> {
        let key = CacheKey::RawArrays {
            fields: fields.to_vec(),
            start,
            end,
            sids: sids.to_vec(),
        };
        if let Some(CacheEntry::RawArrays(arrays)) = self.cache.get(&key) {
            return Ok(arrays.as_ref().clone());
        }

        let started = Instant::now();
        let arrays = self.query_raw_arrays(fields, start, end, sids)?;
        record_latency(QueryKind::RawArrays, started.elapsed());

        self.cache
            .put(key, CacheEntry::RawArrays(Arc::new(arrays.clone())));
        Ok(arrays)
    }
}

fn sid_exists(conn: &Connection, sid: Sid) -> Result<bool, StoreError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM prices WHERE sid = ?1 LIMIT 1",
            [sid],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}
