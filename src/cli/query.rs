//! Read-only store commands

use crate::store::{BarField, BarReader, PricingStore, Sid, StoreError};
use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use ndarray::Array2;

/// Output format for array dumps
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

/// Print the store's calendar, date range and session count
pub fn print_info(store: &PricingStore) -> anyhow::Result<()> {
    let reader = store.reader();
    println!("daily-pricing store {}", store.path().display());

    match reader.trading_calendar() {
        Ok(calendar) => println!("  Calendar: {}", calendar.name()),
        Err(StoreError::Configuration(_)) => {
            println!("  Calendar: unbound (no bars written)");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    let first = reader.first_trading_day()?;
    let last = reader.last_available_dt()?;
    match (first, last) {
        (Some(first), Some(last)) => {
            println!("  First trading day: {}", first);
            println!("  Last available day: {}", last);
            println!("  Sessions: {}", reader.sessions()?.len());
        }
        _ => println!("  No bars"),
    }
    Ok(())
}

#[derive(Args, Debug)]
pub struct ValueArgs {
    /// Asset id
    #[arg(long)]
    pub sid: Sid,

    /// Session date (YYYY-MM-DD)
    #[arg(long)]
    pub date: NaiveDate,

    /// open, high, low, close or volume
    #[arg(long, default_value = "close")]
    pub field: BarField,
}

impl ValueArgs {
    pub fn execute(&self, store: &PricingStore) -> anyhow::Result<()> {
        let reader = store.reader();
        let value = reader.get_value(self.sid, self.date, self.field)?;
        println!("{} sid={} {}: {}", self.date, self.sid, self.field, value);

        match reader.get_last_traded_dt(self.sid, self.date)? {
            Some(day) => println!("  Last traded: {}", day),
            None => println!("  Last traded: none on {}", self.date),
        }
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct ArraysArgs {
    /// Comma-separated fields
    #[arg(long, value_delimiter = ',', default_value = "open,high,low,close,volume")]
    pub fields: Vec<BarField>,

    /// First session (YYYY-MM-DD)
    #[arg(long)]
    pub start: NaiveDate,

    /// Last session (YYYY-MM-DD)
    #[arg(long)]
    pub end: NaiveDate,

    /// Comma-separated asset ids, output columns follow this order
    #[arg(long, value_delimiter = ',', required = true)]
    pub sids: Vec<Sid>,

    /// Output format: table or json
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

impl ArraysArgs {
    pub fn execute(&self, store: &PricingStore) -> anyhow::Result<()> {
        let reader = store.reader();
        let arrays = reader.load_raw_arrays(&self.fields, self.start, self.end, &self.sids)?;
        let sessions = reader
            .trading_calendar()?
            .sessions_in_range(self.start, self.end);

        match self.format {
            OutputFormat::Json => {
                let out = arrays_json(&self.fields, &sessions, &self.sids, &arrays);
                println!("{}", serde_json::to_string_pretty(&out)?);
            }
            OutputFormat::Table => {
                for (field, array) in self.fields.iter().zip(&arrays) {
                    print_table(*field, &sessions, &self.sids, array);
                }
            }
        }
        Ok(())
    }
}

fn arrays_json(
    fields: &[BarField],
    sessions: &[NaiveDate],
    sids: &[Sid],
    arrays: &[Array2<f64>],
) -> serde_json::Value {
    let tables: Vec<serde_json::Value> = fields
        .iter()
        .zip(arrays)
        .map(|(field, array)| {
            // NaN has no JSON form; missing bars become null
            let values: Vec<Vec<serde_json::Value>> = array
                .rows()
                .into_iter()
                .map(|row| row.iter().map(|v| serde_json::Value::from(*v)).collect())
                .collect();
            serde_json::json!({
                "field": field,
                "sessions": sessions,
                "sids": sids,
                "values": values,
            })
        })
        .collect();
    serde_json::Value::Array(tables)
}

fn print_table(field: BarField, sessions: &[NaiveDate], sids: &[Sid], array: &Array2<f64>) {
    println!("{}", field);
    let header: String = sids.iter().map(|sid| format!("{:>14}", sid)).collect();
    println!("{:<12}{}", "session", header);
    for (session, row) in sessions.iter().zip(array.rows()) {
        let cells: String = row.iter().map(|v| format!("{:>14.4}", v)).collect();
        println!("{:<12}{}", session.to_string(), cells);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_arrays_json_nan_is_null() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let out = arrays_json(
            &[BarField::Close],
            &[day],
            &[1, 2],
            &[array![[10.5, f64::NAN]]],
        );
        assert_eq!(out[0]["field"], "close");
        assert_eq!(out[0]["sessions"][0], "2024-01-02");
        assert_eq!(out[0]["values"][0][0], 10.5);
        assert!(out[0]["values"][0][1].is_null());
    }
}
