//! daily-pricing: SQLite-backed daily bar store for backtesting
//!
//! This library provides the core components for:
//! - Writing daily OHLCV bars aligned to a trading calendar
//! - Session-indexed bar reads with a bounded query cache
//! - Corporate actions (splits, mergers, dividends) and dividend ratios
//! - Exchange calendars with rule-based holidays
//! - Parquet import and export
//! - Logging and Prometheus metrics

pub mod calendar;
pub mod cli;
pub mod config;
pub mod data;
pub mod store;
pub mod telemetry;
