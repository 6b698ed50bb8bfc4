//! CLI interface for daily-pricing
//!
//! Provides subcommands for:
//! - `info`: Store calendar and date range
//! - `value`: Single field lookup
//! - `arrays`: Session by sid arrays for a range
//! - `import`: Load a Parquet file into the store
//! - `export`: Dump a range of bars to Parquet
//! - `config`: Show effective configuration

mod export;
mod import;
mod query;

pub use export::ExportArgs;
pub use import::{ImportArgs, ImportKind};
pub use query::{print_info, ArraysArgs, OutputFormat, ValueArgs};

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "daily-pricing")]
#[command(about = "SQLite-backed daily OHLCV bars and corporate actions")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the store's calendar and date range
    Info,
    /// Look up one field for one asset and day
    Value(ValueArgs),
    /// Load session by sid arrays
    Arrays(ArraysArgs),
    /// Import bars or corporate actions from Parquet
    Import(ImportArgs),
    /// Export bars to Parquet
    Export(ExportArgs),
    /// Show effective configuration
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_arrays() {
        let cli = Cli::try_parse_from([
            "daily-pricing",
            "arrays",
            "--fields",
            "close,volume",
            "--start",
            "2024-01-02",
            "--end",
            "2024-01-31",
            "--sids",
            "1,2",
            "--format",
            "json",
        ])
        .unwrap();
        let Commands::Arrays(args) = cli.command else {
            panic!("expected arrays");
        };
        assert_eq!(args.fields.len(), 2);
        assert_eq!(args.sids, vec![1, 2]);
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(cli.config, "config.toml");
    }

    #[test]
    fn test_arrays_default_fields() {
        let cli = Cli::try_parse_from([
            "daily-pricing",
            "arrays",
            "--start",
            "2024-01-02",
            "--end",
            "2024-01-31",
            "--sids",
            "1",
        ])
        .unwrap();
        let Commands::Arrays(args) = cli.command else {
            panic!("expected arrays");
        };
        assert_eq!(args.fields.len(), 5);
        assert_eq!(args.format, OutputFormat::Table);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = Cli::try_parse_from([
            "daily-pricing",
            "value",
            "--sid",
            "1",
            "--date",
            "2024-01-02",
            "--field",
            "vwap",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_import_kind() {
        let cli = Cli::try_parse_from([
            "daily-pricing",
            "--config",
            "other.toml",
            "import",
            "splits.parquet",
            "--kind",
            "splits",
        ])
        .unwrap();
        let Commands::Import(args) = cli.command else {
            panic!("expected import");
        };
        assert_eq!(args.kind, ImportKind::Splits);
        assert_eq!(cli.config, "other.toml");
    }
}
