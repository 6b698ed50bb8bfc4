//! Caller-owned store handles

use super::adjustments::{AdjustmentFrames, AdjustmentReport, AdjustmentWriter};
use super::frame::Frame;
use super::reader::DailyBarReader;
use super::types::{PriceBar, StoreError, WriteReport};
use super::writer::DailyBarWriter;
use super::BarReader;
use crate::calendar::{CalendarRegistry, TradingCalendar};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Writer and reader bound to one store file.
///
/// Writes through the handle clear the reader's cache.
pub struct PricingStore {
    path: PathBuf,
    writer: DailyBarWriter,
    reader: Arc<DailyBarReader>,
}

impl PricingStore {
    /// Open a store, binding new writes to `calendar`
    pub fn open(
        path: impl Into<PathBuf>,
        calendar: Arc<dyn TradingCalendar>,
        calendars: CalendarRegistry,
        cache_capacity: usize,
    ) -> Result<Self, StoreError> {
        let path = path.into();
        let writer = DailyBarWriter::new(&path, calendar)?;
        let reader = Arc::new(DailyBarReader::with_options(
            &path,
            calendars,
            cache_capacity,
        )?);
        Ok(Self {
            path,
            writer,
            reader,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn reader(&self) -> &Arc<DailyBarReader> {
        &self.reader
    }

    pub fn calendar(&self) -> &Arc<dyn TradingCalendar> {
        self.writer.calendar()
    }

    /// Write a bar frame and invalidate cached reads
    pub fn write(&self, frame: &Frame) -> Result<WriteReport, StoreError> {
        let report = self.writer.write(frame);
        self.reader.invalidate_cache();
        report
    }

    /// Write typed bars and invalidate cached reads
    pub fn write_bars(&self, bars: &[PriceBar]) -> Result<WriteReport, StoreError> {
        let report = self.writer.write_bars(bars);
        self.reader.invalidate_cache();
        report
    }

    /// Corporate-actions writer for the same file, reading closes through this store
    pub fn adjustment_writer(&self) -> Result<AdjustmentWriter, StoreError> {
        let reader: Arc<dyn BarReader> = self.reader.clone();
        AdjustmentWriter::new(&self.path, reader, self.writer.calendar().clone())
    }

    /// Write corporate actions
    pub fn write_adjustments(
        &self,
        frames: AdjustmentFrames<'_>,
    ) -> Result<AdjustmentReport, StoreError> {
        self.adjustment_writer()?.write(frames)
    }
}

/// One [`PricingStore`] per path, owned by the caller
pub struct StoreRegistry {
    calendars: CalendarRegistry,
    cache_capacity: usize,
    stores: Mutex<HashMap<PathBuf, Arc<PricingStore>>>,
}

impl StoreRegistry {
    pub fn new(calendars: CalendarRegistry, cache_capacity: usize) -> Self {
        Self {
            calendars,
            cache_capacity,
            stores: Mutex::new(HashMap::new()),
        }
    }

    pub fn calendars(&self) -> &CalendarRegistry {
        &self.calendars
    }

    /// Handle for `path`, opening it with `calendar_name` on first use.
    ///
    /// Handles are keyed by the canonical file path, so every spelling of the
    /// same file shares one handle. Asking for a different calendar than the
    /// handle was opened with is a configuration error.
    pub fn open(
        &self,
        path: impl AsRef<Path>,
        calendar_name: &str,
    ) -> Result<Arc<PricingStore>, StoreError> {
        let path = path.as_ref();
        let mut stores = self.stores.lock();

        if let Ok(key) = std::fs::canonicalize(path) {
            if let Some(store) = stores.get(&key) {
                return reuse(store, &key, calendar_name);
            }
        }

        let calendar = self
            .calendars
            .get(calendar_name)
            .map_err(|e| StoreError::Configuration(e.to_string()))?;
        let store = Arc::new(PricingStore::open(
            path,
            calendar,
            self.calendars.clone(),
            self.cache_capacity,
        )?);
        let key = std::fs::canonicalize(path).map_err(|e| {
            StoreError::Configuration(format!("cannot resolve {}: {}", path.display(), e))
        })?;
        stores.insert(key.clone(), store.clone());
        tracing::debug!(path = ?key, calendar = calendar_name, "Opened pricing store");

        Ok(store)
    }

    /// Drop the handle for `path`; returns whether one was open
    pub fn close(&self, path: impl AsRef<Path>) -> bool {
        match std::fs::canonicalize(path) {
            Ok(key) => self.stores.lock().remove(&key).is_some(),
            Err(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.stores.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn reuse(
    store: &Arc<PricingStore>,
    key: &Path,
    calendar_name: &str,
) -> Result<Arc<PricingStore>, StoreError> {
    if store.calendar().name() != calendar_name {
        return Err(StoreError::Configuration(format!(
            "{} is open with calendar {}, not {}",
            key.display(),
            store.calendar().name(),
            calendar_name
        )));
    }
    Ok(store.clone())
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::new(
            CalendarRegistry::default(),
            super::reader::DEFAULT_CACHE_CAPACITY,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::BarField;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn bar(close: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            sid: 1,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn test_same_path_same_handle() {
        let dir = TempDir::new().unwrap();
        let registry = StoreRegistry::default();
        let path = dir.path().join("prices.sqlite");
        let a = registry.open(&path, "XNYS").unwrap();
        let b = registry.open(&path, "XNYS").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_conflicting_calendar_rejected() {
        let dir = TempDir::new().unwrap();
        let registry = StoreRegistry::default();
        let path = dir.path().join("prices.sqlite");
        registry.open(&path, "XNYS").unwrap();
        assert!(matches!(
            registry.open(&path, "24/7"),
            Err(StoreError::Configuration(_))
        ));
    }

    #[test]
    fn test_unknown_calendar_rejected() {
        let dir = TempDir::new().unwrap();
        let registry = StoreRegistry::default();
        assert!(matches!(
            registry.open(dir.path().join("prices.sqlite"), "MOON"),
            Err(StoreError::Configuration(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_write_invalidates_reader_cache() {
        let dir = TempDir::new().unwrap();
        let registry = StoreRegistry::default();
        let store = registry.open(dir.path().join("prices.sqlite"), "XNYS").unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();

        store.write_bars(&[bar(10.0)]).unwrap();
        assert_eq!(store.reader().get_value(1, day, BarField::Close).unwrap(), 10.0);
        store.write_bars(&[bar(11.0)]).unwrap();
        assert_eq!(store.reader().get_value(1, day, BarField::Close).unwrap(), 11.0);
    }

    #[test]
    fn test_path_spellings_share_one_handle() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let registry = StoreRegistry::default();
        let plain = dir.path().join("prices.sqlite");
        let dotted = dir.path().join("sub").join("..").join("prices.sqlite");
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();

        let a = registry.open(&plain, "XNYS").unwrap();
        let b = registry.open(&dotted, "XNYS").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
        assert!(matches!(
            registry.open(&dotted, "24/7"),
            Err(StoreError::Configuration(_))
        ));

        a.write_bars(&[bar(10.0)]).unwrap();
        assert_eq!(b.reader().get_value(1, day, BarField::Close).unwrap(), 10.0);
        a.write_bars(&[bar(11.0)]).unwrap();
        assert_eq!(b.reader().get_value(1, day, BarField::Close).unwrap(), 11.0);

        assert!(registry.close(&dotted));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_close_forgets_handle() {
        let dir = TempDir::new().unwrap();
        let registry = StoreRegistry::default();
        let path = dir.path().join("prices.sqlite");
        registry.open(&path, "XNYS").unwrap();
        assert!(registry.close(&path));
        assert!(!registry.close(&path));
    }
}
