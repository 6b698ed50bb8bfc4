//! Bar writer and reader integration tests

use chrono::NaiveDate;
use daily_pricing::calendar::CalendarRegistry;
use daily_pricing::store::{
    BarField, BarReader, Column, DailyBarReader, Frame, PriceBar, StoreError, StoreRegistry,
    BAR_INDEX, MAX_SIDS_PER_QUERY,
};
use tempfile::TempDir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn bar(day: NaiveDate, sid: i64, close: f64) -> PriceBar {
    PriceBar {
        date: day,
        sid,
        open: close - 0.5,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume: 10_000.0,
    }
}

#[test]
fn test_repeated_writes_are_idempotent() {
    let dir = TempDir::new().unwrap();
    let registry = StoreRegistry::default();
    let store = registry.open(dir.path().join("prices.sqlite"), "XNYS").unwrap();
    let bars = [bar(date(2024, 1, 2), 1, 10.0), bar(date(2024, 1, 3), 1, 11.0)];

    let first = store.write_bars(&bars).unwrap();
    let second = store.write_bars(&bars).unwrap();
    assert_eq!(first.written, 2);
    assert_eq!(second.written, 2);

    let reader = store.reader();
    assert_eq!(reader.first_trading_day().unwrap(), Some(date(2024, 1, 2)));
    assert_eq!(reader.last_available_dt().unwrap(), Some(date(2024, 1, 3)));
    assert_eq!(reader.sessions().unwrap().len(), 2);
}

#[test]
fn test_frame_write_round_trips_through_get_value() {
    let dir = TempDir::new().unwrap();
    let registry = StoreRegistry::default();
    let store = registry.open(dir.path().join("prices.sqlite"), "XNYS").unwrap();

    let frame = Frame::new()
        .with_index(&BAR_INDEX)
        .with_column("date", Column::Text(vec!["2024-01-05 00:00:00".into()]))
        .with_column("sid", Column::Int(vec![42]))
        .with_column("open", Column::Float(vec![99.0]))
        .with_column("high", Column::Float(vec![101.0]))
        .with_column("low", Column::Float(vec![98.0]))
        .with_column("close", Column::Float(vec![100.25]))
        .with_column("volume", Column::Int(vec![5_000]));
    let report = store.write(&frame).unwrap();
    assert!(report.is_complete());

    let reader = store.reader();
    assert_eq!(
        reader.get_value(42, date(2024, 1, 5), BarField::Close).unwrap(),
        100.25
    );
    assert_eq!(
        reader.get_value(42, date(2024, 1, 5), BarField::Volume).unwrap(),
        5_000.0
    );
}

#[test]
fn test_missing_bar_tiering() {
    let dir = TempDir::new().unwrap();
    let registry = StoreRegistry::default();
    let store = registry.open(dir.path().join("prices.sqlite"), "XNYS").unwrap();
    store.write_bars(&[bar(date(2024, 1, 2), 1, 10.0)]).unwrap();

    let reader = store.reader();
    assert!(matches!(
        reader.get_value(2, date(2024, 1, 2), BarField::Close),
        Err(StoreError::UnknownAsset(2))
    ));
    assert!(matches!(
        reader.get_value(1, date(2024, 1, 3), BarField::Close),
        Err(StoreError::NoDataBeforeDate { sid: 1, .. })
    ));

    assert_eq!(
        reader.get_last_traded_dt(1, date(2024, 1, 2)).unwrap(),
        Some(date(2024, 1, 2))
    );
    assert_eq!(reader.get_last_traded_dt(1, date(2024, 1, 3)).unwrap(), None);
    assert!(matches!(
        reader.get_last_traded_dt(9, date(2024, 1, 2)),
        Err(StoreError::UnknownAsset(9))
    ));
}

#[test]
fn test_raw_arrays_shape_and_order() {
    let dir = TempDir::new().unwrap();
    let registry = StoreRegistry::default();
    let store = registry.open(dir.path().join("prices.sqlite"), "XNYS").unwrap();
    store
        .write_bars(&[
            bar(date(2024, 1, 2), 1, 10.0),
            bar(date(2024, 1, 3), 1, 11.0),
            bar(date(2024, 1, 3), 2, 20.0),
        ])
        .unwrap();

    // Fri 2024-01-05 through Mon 2024-01-08 in the window, sid 3 never traded
    let arrays = store
        .reader()
        .load_raw_arrays(
            &[BarField::Close, BarField::Volume],
            date(2024, 1, 2),
            date(2024, 1, 8),
            &[2, 3, 1],
        )
        .unwrap();

    assert_eq!(arrays.len(), 2);
    let close = &arrays[0];
    assert_eq!(close.dim(), (5, 3));
    assert!(close[[0, 0]].is_nan());
    assert_eq!(close[[1, 0]], 20.0);
    assert!(close.column(1).iter().all(|v| v.is_nan()));
    assert_eq!(close[[0, 2]], 10.0);
    assert_eq!(close[[1, 2]], 11.0);
    assert!(close[[4, 2]].is_nan());
}

#[test]
fn test_calendar_binding() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("prices.sqlite");

    let reader = DailyBarReader::open(&path).unwrap();
    assert!(matches!(
        reader.trading_calendar(),
        Err(StoreError::Configuration(_))
    ));

    let registry = StoreRegistry::new(CalendarRegistry::default(), 0);
    let store = registry.open(&path, "24/7").unwrap();
    store.write_bars(&[bar(date(2024, 1, 6), 1, 10.0)]).unwrap();

    assert_eq!(reader.trading_calendar().unwrap().name(), "24/7");
    assert_eq!(
        reader.get_value(1, date(2024, 1, 6), BarField::Close).unwrap(),
        10.0
    );
}

#[test]
fn test_bad_rows_are_reported() {
    let dir = TempDir::new().unwrap();
    let registry = StoreRegistry::default();
    let store = registry.open(dir.path().join("prices.sqlite"), "XNYS").unwrap();

    let mut bad = bar(date(2024, 1, 3), 1, 11.0);
    bad.close = f64::NAN;
    let report = store
        .write_bars(&[bar(date(2024, 1, 2), 1, 10.0), bad])
        .unwrap();

    assert_eq!(report.written, 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].position, 1);
}

#[test]
fn test_store_writes_refresh_cached_reads() {
    let dir = TempDir::new().unwrap();
    let registry = StoreRegistry::default();
    let store = registry.open(dir.path().join("prices.sqlite"), "XNYS").unwrap();
    store.write_bars(&[bar(date(2024, 1, 2), 1, 10.0)]).unwrap();

    let before = store
        .reader()
        .load_raw_arrays(&[BarField::Close], date(2024, 1, 2), date(2024, 1, 3), &[1])
        .unwrap();
    assert!(before[0][[1, 0]].is_nan());

    store.write_bars(&[bar(date(2024, 1, 3), 1, 11.0)]).unwrap();
    let after = store
        .reader()
        .load_raw_arrays(&[BarField::Close], date(2024, 1, 2), date(2024, 1, 3), &[1])
        .unwrap();
    assert_eq!(after[0][[1, 0]], 11.0);
}

#[test]
fn test_raw_arrays_span_sid_chunks() {
    let dir = TempDir::new().unwrap();
    let registry = StoreRegistry::default();
    let store = registry.open(dir.path().join("prices.sqlite"), "XNYS").unwrap();
    let day = date(2024, 1, 2);
    let bars: Vec<PriceBar> = (1..=4500).map(|sid| bar(day, sid, sid as f64)).collect();
    assert_eq!(store.write_bars(&bars).unwrap().written, 4500);

    let mut sids: Vec<i64> = (1..=4500).rev().collect();
    sids.push(99_999);
    assert!(sids.len() > 2 * MAX_SIDS_PER_QUERY);

    let arrays = store
        .reader()
        .load_raw_arrays(&[BarField::Close], day, day, &sids)
        .unwrap();
    let close = &arrays[0];
    assert_eq!(close.dim(), (1, 4501));
    for (col, sid) in sids[..4500].iter().enumerate() {
        assert_eq!(close[[0, col]], *sid as f64, "column {}", col);
    }
    assert_eq!(close[[0, MAX_SIDS_PER_QUERY - 1]], 2501.0);
    assert_eq!(close[[0, MAX_SIDS_PER_QUERY]], 2500.0);
    assert!(close[[0, 4500]].is_nan());
}
