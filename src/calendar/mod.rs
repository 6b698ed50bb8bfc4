//! Trading calendar module
//!
//! Resolves a calendar name to the list of trading sessions used to align bars

mod exchange;
mod holidays;

pub use exchange::ExchangeCalendar;
pub use holidays::{easter_sunday, nyse_holidays};

use chrono::{Duration, NaiveDate};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Longest run of consecutive non-session days any built-in calendar produces
const MAX_SESSION_GAP_DAYS: i64 = 14;

/// Calendar lookup errors
#[derive(Debug, Error)]
pub enum CalendarError {
    /// No calendar registered under this name
    #[error("Unknown trading calendar: {0}")]
    Unknown(String),
}

/// Trait for trading calendar implementations
pub trait TradingCalendar: Send + Sync + fmt::Debug {
    /// Calendar identity, persisted alongside the bars it aligns
    fn name(&self) -> &str;

    /// Whether the market holds a session on this day
    fn is_session(&self, date: NaiveDate) -> bool;

    /// All sessions in `[start, end]`, ascending
    fn sessions_in_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter(|d| self.is_session(*d))
            .collect()
    }

    /// The last session strictly before `date`
    fn previous_session(&self, date: NaiveDate) -> Option<NaiveDate> {
        (1..=MAX_SESSION_GAP_DAYS)
            .filter_map(|n| date.checked_sub_signed(Duration::days(n)))
            .find(|d| self.is_session(*d))
    }
}

/// Name-indexed set of trading calendars
#[derive(Debug, Clone)]
pub struct CalendarRegistry {
    calendars: HashMap<String, Arc<dyn TradingCalendar>>,
}

impl CalendarRegistry {
    /// Create an empty registry
    pub fn empty() -> Self {
        Self {
            calendars: HashMap::new(),
        }
    }

    /// Register a calendar under its own name
    pub fn register(&mut self, calendar: Arc<dyn TradingCalendar>) {
        self.calendars.insert(calendar.name().to_string(), calendar);
    }

    /// Register a calendar under an additional name
    pub fn register_alias(&mut self, alias: &str, calendar: Arc<dyn TradingCalendar>) {
        self.calendars.insert(alias.to_string(), calendar);
    }

    /// Resolve a calendar by name
    pub fn get(&self, name: &str) -> Result<Arc<dyn TradingCalendar>, CalendarError> {
        self.calendars
            .get(name)
            .cloned()
            .ok_or_else(|| CalendarError::Unknown(name.to_string()))
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.calendars.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for CalendarRegistry {
    /// Registry holding the built-in calendars
    fn default() -> Self {
        let mut registry = Self::empty();

        let xnys: Arc<dyn TradingCalendar> = Arc::new(ExchangeCalendar::xnys());
        registry.register(xnys.clone());
        registry.register_alias("NYSE", xnys);
        registry.register(Arc::new(ExchangeCalendar::weekdays()));
        registry.register(Arc::new(ExchangeCalendar::always_open()));

        registry
    }
}

/// Resolve one of the built-in calendars by name
pub fn get_calendar(name: &str) -> Result<Arc<dyn TradingCalendar>, CalendarError> {
    CalendarRegistry::default().get(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_builtin_calendars_registered() {
        let registry = CalendarRegistry::default();
        assert_eq!(registry.names(), vec!["24/5", "24/7", "NYSE", "XNYS"]);
    }

    #[test]
    fn test_alias_resolves_to_same_calendar() {
        let cal = get_calendar("NYSE").unwrap();
        assert_eq!(cal.name(), "XNYS");
    }

    #[test]
    fn test_unknown_calendar() {
        let err = get_calendar("XLON").unwrap_err();
        assert!(matches!(err, CalendarError::Unknown(ref n) if n == "XLON"));
    }

    #[test]
    fn test_previous_session_skips_weekend() {
        let cal = get_calendar("24/5").unwrap();
        // Monday 2024-03-11 -> Friday 2024-03-08
        assert_eq!(cal.previous_session(date(2024, 3, 11)), Some(date(2024, 3, 8)));
    }

    #[test]
    fn test_previous_session_skips_holiday() {
        let cal = get_calendar("XNYS").unwrap();
        // Tuesday after Memorial Day 2024 -> Friday before it
        assert_eq!(cal.previous_session(date(2024, 5, 28)), Some(date(2024, 5, 24)));
    }

    #[test]
    fn test_sessions_in_range_empty_when_reversed() {
        let cal = get_calendar("24/7").unwrap();
        assert!(cal
            .sessions_in_range(date(2024, 1, 10), date(2024, 1, 1))
            .is_empty());
    }

    #[test]
    fn test_custom_calendar_registration() {
        let mut registry = CalendarRegistry::empty();
        registry.register(Arc::new(ExchangeCalendar::new("TEST", &[], Vec::new())));
        let cal = registry.get("TEST").unwrap();
        assert!(!cal.is_session(date(2024, 1, 2)));
    }
}
