//! End-to-end integration tests

use chrono::NaiveDate;
use daily_pricing::config::Config;
use daily_pricing::data::{read_frame, BarParquetWriter};
use daily_pricing::store::{BarField, BarReader, PriceBar, StoreRegistry};
use tempfile::TempDir;

#[test]
fn test_config_example_loads() {
    let config = Config::load(concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml.example")).unwrap();
    assert_eq!(config.store.calendar, "XNYS");
    assert!(config.telemetry.metrics_port.is_none());
}

#[test]
fn test_parquet_import_into_store() {
    let dir = TempDir::new().unwrap();
    let day = |d| NaiveDate::from_ymd_opt(2024, 2, d).unwrap();
    let bars: Vec<PriceBar> = (5..=9)
        .map(|d| PriceBar {
            date: day(d),
            sid: 3,
            open: d as f64,
            high: d as f64 + 1.0,
            low: d as f64 - 1.0,
            close: d as f64 + 0.5,
            volume: 1_000.0 * d as f64,
        })
        .collect();

    let writer = BarParquetWriter::new(dir.path().join("export"));
    let file = writer.file_path(day(5), day(9));
    writer.write_bars(&file, &bars).unwrap();

    let registry = StoreRegistry::default();
    let store = registry.open(dir.path().join("prices.sqlite"), "XNYS").unwrap();
    let report = store.write(&read_frame(&file).unwrap()).unwrap();
    assert_eq!(report.written, 5);

    let closes = store
        .reader()
        .load_series(BarField::Close, day(5), day(9), 3)
        .unwrap();
    assert_eq!(closes.sessions.len(), 5);
    assert_eq!(closes.values.to_vec(), vec![5.5, 6.5, 7.5, 8.5, 9.5]);
    assert_eq!(store.reader().last_available_dt().unwrap(), Some(day(9)));
}
