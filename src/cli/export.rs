//! Export command implementation

use crate::data::BarParquetWriter;
use crate::store::{BarField, BarReader, PriceBar, PricingStore, Sid};
use chrono::NaiveDate;
use clap::Args;
use ndarray::Array2;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// First session (YYYY-MM-DD)
    #[arg(long)]
    pub start: NaiveDate,

    /// Last session (YYYY-MM-DD)
    #[arg(long)]
    pub end: NaiveDate,

    /// Comma-separated asset ids
    #[arg(long, value_delimiter = ',', required = true)]
    pub sids: Vec<Sid>,

    /// Output directory
    #[arg(long, default_value = "./output")]
    pub output: PathBuf,
}

impl ExportArgs {
    pub fn execute(&self, store: &PricingStore) -> anyhow::Result<()> {
        let reader = store.reader();
        let arrays = reader.load_raw_arrays(&BarField::ALL, self.start, self.end, &self.sids)?;
        let sessions = reader
            .trading_calendar()?
            .sessions_in_range(self.start, self.end);
        let bars = collect_bars(&sessions, &self.sids, &arrays);

        let writer = BarParquetWriter::new(&self.output);
        let path = writer.file_path(self.start, self.end);
        writer.write_bars(&path, &bars)?;

        if bars.is_empty() {
            println!("No bars in range, nothing written");
        } else {
            println!("Exported {} bars to {}", bars.len(), path.display());
        }
        Ok(())
    }
}

/// Bars present in arrays ordered as [`BarField::ALL`]; a NaN close marks no bar
fn collect_bars(sessions: &[NaiveDate], sids: &[Sid], arrays: &[Array2<f64>]) -> Vec<PriceBar> {
    let [open, high, low, close, volume] = arrays else {
        return Vec::new();
    };
    let mut bars = Vec::new();
    for (r, date) in sessions.iter().enumerate() {
        for (c, sid) in sids.iter().enumerate() {
            if close[[r, c]].is_nan() {
                continue;
            }
            bars.push(PriceBar {
                date: *date,
                sid: *sid,
                open: open[[r, c]],
                high: high[[r, c]],
                low: low[[r, c]],
                close: close[[r, c]],
                volume: volume[[r, c]],
            });
        }
    }
    bars
}
