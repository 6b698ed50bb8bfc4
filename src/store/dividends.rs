//! Cash dividends to price adjustment ratios

use super::types::{BarField, Sid, SkippedRow};
use super::BarReader;
use crate::calendar::TradingCalendar;
use chrono::NaiveDate;
use serde::Serialize;

/// Cash dividend announcement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DividendPayout {
    pub sid: Sid,
    pub ex_date: NaiveDate,
    pub declared_date: Option<NaiveDate>,
    pub record_date: Option<NaiveDate>,
    pub pay_date: Option<NaiveDate>,
    pub amount: f64,
}

/// Multiplicative adjustment applied to prices before `effective_date`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DividendRatio {
    pub sid: Sid,
    pub effective_date: NaiveDate,
    pub ratio: f64,
}

/// Ratios that could be computed, plus the payouts that could not
#[derive(Debug, Default)]
pub struct RatioOutcome {
    pub ratios: Vec<DividendRatio>,
    pub skipped: Vec<SkippedRow>,
}

/// Convert payouts into `1 - amount / close`, where `close` is the sid's close
/// on the session before the ex-date.
///
/// Payouts without a previous session or close, or whose ratio is NaN or not
/// positive, are skipped.
pub fn calc_dividend_ratios(
    payouts: &[DividendPayout],
    reader: &dyn BarReader,
    calendar: &dyn TradingCalendar,
) -> RatioOutcome {
    let mut outcome = RatioOutcome::default();

    for (position, payout) in payouts.iter().enumerate() {
        match ratio_for(payout, reader, calendar) {
            Ok(ratio) => outcome.ratios.push(DividendRatio {
                sid: payout.sid,
                effective_date: payout.ex_date,
                ratio,
            }),
            Err(reason) => {
                tracing::warn!(
                    sid = payout.sid,
                    ex_date = %payout.ex_date,
                    amount = payout.amount,
                    reason = %reason,
                    "Couldn't compute ratio for dividend"
                );
                outcome.skipped.push(SkippedRow {
                    position,
                    key: format!("({}, {})", payout.ex_date, payout.sid),
                    reason,
                });
            }
        }
    }

    outcome
}

fn ratio_for(
    payout: &DividendPayout,
    reader: &dyn BarReader,
    calendar: &dyn TradingCalendar,
) -> Result<f64, String> {
    let prev = calendar
        .previous_session(payout.ex_date)
        .ok_or_else(|| "no session before ex_date".to_string())?;
    let close = reader
        .get_value(payout.sid, prev, BarField::Close)
        .map_err(|e| e.to_string())?;

    let ratio = 1.0 - payout.amount / close;
    if ratio.is_nan() {
        return Err(format!("ratio is NaN (close={} on {})", close, prev));
    }
    if ratio <= 0.0 {
        return Err(format!("dividend ratio <= 0 (close={} on {})", close, prev));
    }
    Ok(ratio)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::get_calendar;
    use crate::store::{DailyBarReader, DailyBarWriter, PriceBar};
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn payout(sid: Sid, ex_date: NaiveDate, amount: f64) -> DividendPayout {
        DividendPayout {
            sid,
            ex_date,
            declared_date: None,
            record_date: None,
            pay_date: None,
            amount,
        }
    }

    fn store_with_close(close: f64) -> (TempDir, DailyBarReader) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prices.sqlite");
        let writer = DailyBarWriter::new(&path, get_calendar("XNYS").unwrap()).unwrap();
        // Friday before the Memorial Day weekend
        writer
            .write_bars(&[PriceBar {
                date: date(2024, 5, 24),
                sid: 1,
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
            }])
            .unwrap();
        let reader = DailyBarReader::open(&path).unwrap();
        (dir, reader)
    }

    #[test]
    fn test_ratio_uses_previous_session_close() {
        let (_dir, reader) = store_with_close(50.0);
        let cal = get_calendar("XNYS").unwrap();
        // Ex-date Tuesday 2024-05-28; previous session skips the holiday
        let outcome = calc_dividend_ratios(
            &[payout(1, date(2024, 5, 28), 0.5)],
            &reader,
            cal.as_ref(),
        );
        assert!(outcome.skipped.is_empty());
        assert_eq!(outcome.ratios.len(), 1);
        assert!((outcome.ratios[0].ratio - 0.99).abs() < 1e-12);
        assert_eq!(outcome.ratios[0].effective_date, date(2024, 5, 28));
    }

    #[test]
    fn test_missing_close_is_skipped() {
        let (_dir, reader) = store_with_close(50.0);
        let cal = get_calendar("XNYS").unwrap();
        let outcome = calc_dividend_ratios(
            &[payout(1, date(2024, 6, 4), 0.5), payout(7, date(2024, 5, 28), 0.5)],
            &reader,
            cal.as_ref(),
        );
        assert!(outcome.ratios.is_empty());
        assert_eq!(outcome.skipped.len(), 2);
        assert!(outcome.skipped[1].reason.contains("Unknown asset"));
    }

    #[test]
    fn test_non_positive_ratio_is_skipped() {
        let (_dir, reader) = store_with_close(0.4);
        let cal = get_calendar("XNYS").unwrap();
        let outcome = calc_dividend_ratios(
            &[payout(1, date(2024, 5, 28), 0.5)],
            &reader,
            cal.as_ref(),
        );
        assert!(outcome.ratios.is_empty());
        assert!(outcome.skipped[0].reason.contains("<= 0"));
    }
}
