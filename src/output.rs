//! Writing per-entity series and metadata tables as CSV or Parquet.

use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, Date32Array, Float64Array, StringArray},
    csv::WriterBuilder,
    datatypes::{DataType, Date32Type, Field, Schema},
    record_batch::RecordBatch,
};
use chrono::NaiveDate;
use clap::ValueEnum;
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};
use serde::Serialize;
use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::metadata::Table;
use crate::series::EntityTimeSeries;

pub const TIMESTAMP_COLUMN: &str = "measured_on";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Parquet,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Parquet => "parquet",
        }
    }
}

/// `measured_on` (Date32) followed by one nullable Float64 column per sensor.
pub fn series_to_batch(series: &EntityTimeSeries) -> Result<RecordBatch> {
    let mut fields = vec![Field::new(TIMESTAMP_COLUMN, DataType::Date32, false)];
    let mut columns: Vec<ArrayRef> = vec![Arc::new(Date32Array::from_iter_values(
        series.timestamps().map(Date32Type::from_naive_date),
    ))];

    for sensor in series.sensors() {
        fields.push(Field::new(sensor, DataType::Float64, true));
        let values: Float64Array = series
            .timestamps()
            .map(|ts| series.get(ts, sensor))
            .collect();
        columns.push(Arc::new(values));
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
        .with_context(|| format!("building series batch for {}", series.entity_id))
}

/// All-Utf8 batch for a metadata table.
pub fn table_to_batch(table: &Table) -> Result<RecordBatch> {
    let fields: Vec<Field> = table
        .columns
        .iter()
        .map(|c| Field::new(c, DataType::Utf8, true))
        .collect();
    let columns: Vec<ArrayRef> = (0..table.columns.len())
        .map(|i| {
            let values: StringArray = table
                .rows
                .iter()
                .map(|row| row.get(i).and_then(|v| v.as_deref()))
                .collect();
            Arc::new(values) as ArrayRef
        })
        .collect();
    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).context("building metadata batch")
}

pub fn write_batch(path: &Path, batch: &RecordBatch, format: OutputFormat) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    match format {
        OutputFormat::Csv => {
            let mut writer = WriterBuilder::new().with_header(true).build(file);
            writer
                .write(batch)
                .with_context(|| format!("writing {}", path.display()))?;
        }
        OutputFormat::Parquet => {
            let props = WriterProperties::builder()
                .set_compression(Compression::SNAPPY)
                .build();
            let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
                .context("creating Arrow writer")?;
            writer
                .write(batch)
                .with_context(|| format!("writing {}", path.display()))?;
            writer.close().context("closing parquet writer")?;
        }
    }
    Ok(())
}

/// File-system safe name for an entity id.
pub fn entity_file_name(entity_id: &str, format: OutputFormat) -> String {
    let safe: String = entity_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect();
    format!("{}.{}", safe, format.extension())
}

pub fn write_series(
    dir: &Path,
    series: &EntityTimeSeries,
    format: OutputFormat,
) -> Result<PathBuf> {
    let path = dir.join(entity_file_name(&series.entity_id, format));
    write_batch(&path, &series_to_batch(series)?, format)?;
    Ok(path)
}
