//! Data interchange module
//!
//! Moves bar frames between Parquet files and the pricing store

mod parquet;

pub use parquet::{read_frame, write_frame, BarParquetWriter, INDEX_METADATA_KEY};
