//! Corporate actions integration tests

use chrono::NaiveDate;
use daily_pricing::store::{
    schema, AdjustmentFrames, Column, Frame, PriceBar, StoreError, StoreRegistry,
};
use tempfile::TempDir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn count(path: &std::path::Path, table: &str) -> i64 {
    let conn = schema::connect(path).unwrap();
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })
    .unwrap()
}

fn ratio_frame(sid: i64, day: NaiveDate, ratio: f64) -> Frame {
    Frame::new()
        .with_column("sid", Column::Int(vec![sid]))
        .with_column("effective_date", Column::Date(vec![Some(day)]))
        .with_column("ratio", Column::Float(vec![ratio]))
}

#[test]
fn test_empty_input_creates_empty_tables() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("prices.sqlite");
    let registry = StoreRegistry::default();
    let store = registry.open(&path, "XNYS").unwrap();

    let empty = Frame::new()
        .with_column("sid", Column::Int(vec![]))
        .with_column("effective_date", Column::Date(vec![]))
        .with_column("ratio", Column::Float(vec![]));
    let report = store
        .write_adjustments(AdjustmentFrames {
            splits: Some(&empty),
            ..Default::default()
        })
        .unwrap();

    assert_eq!(report.total_written(), 0);
    for table in [
        "splits",
        "mergers",
        "dividends",
        "dividend_payouts",
        "stock_dividend_payouts",
    ] {
        assert_eq!(count(&path, table), 0, "{}", table);
    }
}

#[test]
fn test_schema_mismatch_inserts_nothing() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("prices.sqlite");
    let registry = StoreRegistry::default();
    let store = registry.open(&path, "XNYS").unwrap();

    let splits = ratio_frame(1, date(2024, 6, 10), 0.5);
    let missing = Frame::new()
        .with_column("sid", Column::Int(vec![1]))
        .with_column("ratio", Column::Float(vec![0.9]));

    let err = store
        .write_adjustments(AdjustmentFrames {
            splits: Some(&splits),
            mergers: Some(&missing),
            ..Default::default()
        })
        .unwrap_err();
    match err {
        StoreError::SchemaMismatch {
            table,
            expected,
            received,
        } => {
            assert_eq!(table, "mergers");
            assert!(expected.contains(&"effective_date".to_string()));
            assert!(!received.contains(&"effective_date".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(count(&path, "splits"), 0);
}

#[test]
fn test_dividend_ratio_from_prior_close() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("prices.sqlite");
    let registry = StoreRegistry::default();
    let store = registry.open(&path, "XNYS").unwrap();

    // Thursday before Good Friday 2024
    store
        .write_bars(&[PriceBar {
            date: date(2024, 3, 28),
            sid: 5,
            open: 20.0,
            high: 20.0,
            low: 20.0,
            close: 20.0,
            volume: 100.0,
        }])
        .unwrap();

    let dividends = Frame::new()
        .with_column("sid", Column::Int(vec![5]))
        .with_column("ex_date", Column::Date(vec![Some(date(2024, 4, 1))]))
        .with_column("declared_date", Column::Date(vec![Some(date(2024, 3, 1))]))
        .with_column("record_date", Column::Date(vec![None]))
        .with_column("pay_date", Column::Date(vec![Some(date(2024, 4, 15))]))
        .with_column("amount", Column::Float(vec![0.2]));

    let report = store
        .write_adjustments(AdjustmentFrames {
            dividends: Some(&dividends),
            ..Default::default()
        })
        .unwrap();
    assert!(report.is_complete());
    assert_eq!(report.dividend_payouts.written, 1);
    assert_eq!(report.dividends.written, 1);

    let conn = schema::connect(&path).unwrap();
    let (effective, ratio): (i64, f64) = conn
        .query_row(
            "SELECT effective_date, ratio FROM dividends WHERE sid = 5",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(effective, schema::epoch_seconds(date(2024, 4, 1)));
    assert!((ratio - 0.99).abs() < 1e-12);
}
