//! Import command implementation

use crate::data::read_frame;
use crate::store::{AdjustmentFrames, PricingStore, WriteReport};
use clap::{Args, ValueEnum};
use std::path::PathBuf;

/// What the imported file holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImportKind {
    Bars,
    Splits,
    Mergers,
    Dividends,
    StockDividends,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Parquet file to import
    pub input: PathBuf,

    /// Frame contents
    #[arg(long, value_enum, default_value = "bars")]
    pub kind: ImportKind,
}

impl ImportArgs {
    pub fn execute(&self, store: &PricingStore) -> anyhow::Result<()> {
        let frame = read_frame(&self.input)?;
        tracing::info!(path = ?self.input, rows = frame.len(), kind = ?self.kind, "Importing");

        if self.kind == ImportKind::Bars {
            let report = store.write(&frame)?;
            print_report("prices", &report);
            return Ok(());
        }

        let mut frames = AdjustmentFrames::default();
        match self.kind {
            ImportKind::Splits => frames.splits = Some(&frame),
            ImportKind::Mergers => frames.mergers = Some(&frame),
            ImportKind::Dividends => frames.dividends = Some(&frame),
            ImportKind::StockDividends => frames.stock_dividends = Some(&frame),
            ImportKind::Bars => {}
        }
        let report = store.write_adjustments(frames)?;
        print_report("splits", &report.splits);
        print_report("mergers", &report.mergers);
        print_report("dividend_payouts", &report.dividend_payouts);
        print_report("dividends", &report.dividends);
        print_report("stock_dividend_payouts", &report.stock_dividends);
        Ok(())
    }
}

fn print_report(table: &str, report: &WriteReport) {
    if report.written == 0 && report.skipped.is_empty() {
        return;
    }
    println!("{}: {} written, {} skipped", table, report.written, report.skipped.len());
    for row in &report.skipped {
        println!("  row {} {}: {}", row.position, row.key, row.reason);
    }
}
