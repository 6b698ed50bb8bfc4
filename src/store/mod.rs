//! Pricing store module
//!
//! SQLite-backed daily bars and corporate actions for a backtest data layer

mod adjustments;
mod cache;
mod dividends;
mod frame;
mod reader;
mod registry;
pub mod schema;
mod types;
mod writer;

pub use adjustments::{AdjustmentFrames, AdjustmentReport, AdjustmentWriter};
pub use cache::{CacheEntry, CacheKey, QueryCache};
pub use dividends::{calc_dividend_ratios, DividendPayout, DividendRatio, RatioOutcome};
pub use frame::{Column, ColumnKind, Frame};
pub use reader::{BarSeries, BarTable, DailyBarReader, DEFAULT_CACHE_CAPACITY, MAX_SIDS_PER_QUERY};
pub use registry::{PricingStore, StoreRegistry};
pub use types::{sids_of, Asset, BarField, PriceBar, Sid, SkippedRow, StoreError, WriteReport};
pub use writer::{DailyBarWriter, BAR_INDEX};

use crate::calendar::TradingCalendar;
use chrono::NaiveDate;
use ndarray::Array2;
use std::sync::Arc;

/// Session bar reader contract consumed by the backtest engine's data layer
pub trait BarReader: Send + Sync {
    /// Calendar the stored bars are aligned to
    fn trading_calendar(&self) -> Result<Arc<dyn TradingCalendar>, StoreError>;
    /// Earliest bar date, `None` for an empty store
    fn first_trading_day(&self) -> Result<Option<NaiveDate>, StoreError>;
    /// Latest bar date, `None` for an empty store
    fn last_available_dt(&self) -> Result<Option<NaiveDate>, StoreError>;
    /// Calendar sessions spanned by the stored bars
    fn sessions(&self) -> Result<Vec<NaiveDate>, StoreError>;
    /// Exact lookup of one field
    fn get_value(&self, sid: Sid, date: NaiveDate, field: BarField) -> Result<f64, StoreError>;
    /// `date` if the sid has a bar on it, `None` if the sid is known but not on that day
    fn get_last_traded_dt(&self, sid: Sid, date: NaiveDate)
        -> Result<Option<NaiveDate>, StoreError>;
    /// One (sessions × sids) array per field, NaN where no bar exists
    fn load_raw_arrays(
        &self,
        fields: &[BarField],
        start: NaiveDate,
        end: NaiveDate,
        sids: &[Sid],
    ) -> Result<Vec<Array2<f64>>, StoreError>;
}
