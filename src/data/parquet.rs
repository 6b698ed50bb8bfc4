//! Parquet import and export of bar frames

use crate::store::{Column, Frame, PriceBar, BAR_INDEX};
use arrow::array::{
    Array, ArrayRef, Date32Array, Float32Array, Float64Array, Int32Array, Int64Array,
    StringArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, NaiveDate};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Schema metadata key listing the frame's index columns, comma separated
pub const INDEX_METADATA_KEY: &str = "index";

/// Days between 0001-01-01 and 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

fn to_date32(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

fn arrow_column(column: &Column) -> (DataType, ArrayRef) {
    match column {
        Column::Int(values) => (DataType::Int64, Arc::new(Int64Array::from(values.clone()))),
        Column::Float(values) => (
            DataType::Float64,
            Arc::new(Float64Array::from(values.clone())),
        ),
        Column::Date(values) => (
            DataType::Date32,
            Arc::new(Date32Array::from(
                values.iter().map(|d| d.map(to_date32)).collect::<Vec<_>>(),
            )),
        ),
        Column::Text(values) => (
            DataType::Utf8,
            Arc::new(StringArray::from(
                values.iter().map(String::as_str).collect::<Vec<_>>(),
            )),
        ),
    }
}

/// Write a tabular frame to `path`, recording its index in the schema metadata
pub fn write_frame(path: &Path, frame: &Frame) -> anyhow::Result<()> {
    if !frame.is_tabular() {
        anyhow::bail!("Frame columns have differing lengths");
    }

    let mut fields = Vec::new();
    let mut arrays = Vec::new();
    for (name, column) in frame.columns() {
        let (data_type, array) = arrow_column(column);
        let nullable = matches!(column, Column::Date(_));
        fields.push(Field::new(name, data_type, nullable));
        arrays.push(array);
    }

    let metadata = HashMap::from([(INDEX_METADATA_KEY.to_string(), frame.index().join(","))]);
    let schema = Arc::new(Schema::new_with_metadata(fields, metadata));

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;
    let batch = RecordBatch::try_new(schema, arrays)?;
    writer.write(&batch)?;
    writer.close()?;

    tracing::debug!(path = ?path, rows = frame.len(), "Wrote frame to Parquet");

    Ok(())
}

/// Read a Parquet file into a [`Frame`].
///
/// Integer columns become `Int`, floating point `Float` (nulls as NaN), Date32
/// `Date` and strings `Text`. Index names come from the `index` metadata key.
pub fn read_frame(path: &Path) -> anyhow::Result<Frame> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;

    let mut columns: Vec<Column> = schema
        .fields()
        .iter()
        .map(|field| empty_column(field.name(), field.data_type()))
        .collect::<anyhow::Result<_>>()?;

    for batch in reader {
        let batch = batch?;
        for (column, array) in columns.iter_mut().zip(batch.columns()) {
            append(column, array.as_ref())?;
        }
    }

    let index: Vec<&str> = schema
        .metadata()
        .get(INDEX_METADATA_KEY)
        .map(|names| names.split(',').filter(|n| !n.is_empty()).collect())
        .unwrap_or_default();

    let mut frame = Frame::new().with_index(&index);
    for (field, column) in schema.fields().iter().zip(columns) {
        frame.insert(field.name(), column);
    }

    tracing::debug!(path = ?path, rows = frame.len(), "Read frame from Parquet");

    Ok(frame)
}

fn empty_column(name: &str, data_type: &DataType) -> anyhow::Result<Column> {
    let column = match data_type {
        DataType::Int32 | DataType::Int64 => Column::Int(Vec::new()),
        DataType::Float32 | DataType::Float64 => Column::Float(Vec::new()),
        DataType::Date32 => Column::Date(Vec::new()),
        DataType::Utf8 => Column::Text(Vec::new()),
        other => anyhow::bail!("Unsupported type {} for column {}", other, name),
    };
    Ok(column)
}

fn downcast<'a, T: 'static>(array: &'a dyn Array) -> anyhow::Result<&'a T> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| anyhow::anyhow!("Unexpected array type {}", array.data_type()))
}

fn append(column: &mut Column, array: &dyn Array) -> anyhow::Result<()> {
    let valid = |i: usize| array.is_valid(i);
    match column {
        Column::Int(values) => {
            let ints: Vec<Option<i64>> = match array.data_type() {
                DataType::Int32 => downcast::<Int32Array>(array)?
                    .iter()
                    .map(|v| v.map(i64::from))
                    .collect(),
                _ => downcast::<Int64Array>(array)?.iter().collect(),
            };
            for (i, v) in ints.into_iter().enumerate() {
                values.push(v.ok_or_else(|| anyhow::anyhow!("Null integer at row {}", i))?);
            }
        }
        Column::Float(values) => match array.data_type() {
            DataType::Float32 => {
                let floats = downcast::<Float32Array>(array)?;
                values.extend((0..floats.len()).map(|i| {
                    if valid(i) {
                        f64::from(floats.value(i))
                    } else {
                        f64::NAN
                    }
                }));
            }
            _ => {
                let floats = downcast::<Float64Array>(array)?;
                values.extend(
                    (0..floats.len()).map(|i| if valid(i) { floats.value(i) } else { f64::NAN }),
                );
            }
        },
        Column::Date(values) => {
            let dates = downcast::<Date32Array>(array)?;
            values.extend((0..dates.len()).map(|i| {
                if valid(i) {
                    dates.value_as_date(i)
                } else {
                    None
                }
            }));
        }
        Column::Text(values) => {
            let strings = downcast::<StringArray>(array)?;
            values.extend(strings.iter().map(|s| s.unwrap_or_default().to_string()));
        }
    }
    Ok(())
}

fn bars_frame(bars: &[PriceBar]) -> Frame {
    let floats = |f: fn(&PriceBar) -> f64| Column::Float(bars.iter().map(f).collect());
    Frame::new()
        .with_index(&BAR_INDEX)
        .with_column("date", Column::Date(bars.iter().map(|b| Some(b.date)).collect()))
        .with_column("sid", Column::Int(bars.iter().map(|b| b.sid).collect()))
        .with_column("open", floats(|b| b.open))
        .with_column("high", floats(|b| b.high))
        .with_column("low", floats(|b| b.low))
        .with_column("close", floats(|b| b.close))
        .with_column("volume", floats(|b| b.volume))
}

/// Exports daily bars as Parquet files under one directory
pub struct BarParquetWriter {
    output_dir: PathBuf,
}

impl BarParquetWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Ensure output directory exists
    pub fn ensure_dir(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }

    /// File path for bars covering `start..=end`
    pub fn file_path(&self, start: NaiveDate, end: NaiveDate) -> PathBuf {
        let filename = format!(
            "bars_{}_{}.parquet",
            start.format("%Y%m%d"),
            end.format("%Y%m%d")
        );
        self.output_dir.join(filename)
    }

    /// Write bars to `path`; an empty slice writes nothing
    pub fn write_bars(&self, path: &Path, bars: &[PriceBar]) -> anyhow::Result<()> {
        if bars.is_empty() {
            return Ok(());
        }
        self.ensure_dir()?;
        write_frame(path, &bars_frame(bars))?;
        tracing::info!(path = ?path, count = bars.len(), "Exported bars to Parquet");
        Ok(())
    }
}
