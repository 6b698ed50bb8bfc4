//! Weekmask + holiday calendars

use super::holidays::nyse_holidays;
use super::TradingCalendar;
use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::HashSet;

/// Rule producing the holidays of one year
type HolidayRule = fn(i32) -> Vec<NaiveDate>;

const WEEKDAYS: [Weekday; 5] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
];

const ALL_DAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Calendar defined by open weekdays, explicit holidays and an optional yearly rule
#[derive(Debug, Clone)]
pub struct ExchangeCalendar {
    name: String,
    weekmask: [bool; 7],
    holidays: HashSet<NaiveDate>,
    rule: Option<HolidayRule>,
}

impl ExchangeCalendar {
    /// Create a calendar open on `open_days` except for `holidays`
    pub fn new(name: &str, open_days: &[Weekday], holidays: Vec<NaiveDate>) -> Self {
        let mut weekmask = [false; 7];
        for day in open_days {
            weekmask[day.num_days_from_monday() as usize] = true;
        }
        Self {
            name: name.to_string(),
            weekmask,
            holidays: holidays.into_iter().collect(),
            rule: None,
        }
    }

    /// New York Stock Exchange
    pub fn xnys() -> Self {
        Self::new("XNYS", &WEEKDAYS, Vec::new()).with_rule(nyse_holidays)
    }

    /// Every weekday, no holidays
    pub fn weekdays() -> Self {
        Self::new("24/5", &WEEKDAYS, Vec::new())
    }

    /// Every calendar day
    pub fn always_open() -> Self {
        Self::new("24/7", &ALL_DAYS, Vec::new())
    }

    /// Attach a yearly holiday rule
    pub fn with_rule(mut self, rule: HolidayRule) -> Self {
        self.rule = Some(rule);
        self
    }

    /// Add an explicit closure
    pub fn with_holiday(mut self, date: NaiveDate) -> Self {
        self.holidays.insert(date);
        self
    }

    fn is_open_weekday(&self, date: NaiveDate) -> bool {
        self.weekmask[date.weekday().num_days_from_monday() as usize]
    }

    fn rule_holidays(&self, first_year: i32, last_year: i32) -> HashSet<NaiveDate> {
        match self.rule {
            Some(rule) => (first_year..=last_year).flat_map(rule).collect(),
            None => HashSet::new(),
        }
    }
}

impl TradingCalendar for ExchangeCalendar {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_session(&self, date: NaiveDate) -> bool {
        self.is_open_weekday(date)
            && !self.holidays.contains(&date)
            && !self
                .rule
                .is_some_and(|rule| rule(date.year()).contains(&date))
    }

    fn sessions_in_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        if start > end {
            return Vec::new();
        }
        // Rule holidays for every year in range
        let ruled = self.rule_holidays(start.year(), end.year());
        start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter(|d| {
                self.is_open_weekday(*d) && !self.holidays.contains(d) && !ruled.contains(d)
            })
            .collect()
    }
}
