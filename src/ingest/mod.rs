// src/ingest/mod.rs
use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::path::Path;
use tracing::{debug, instrument};

pub mod extract;
pub mod utils;
pub mod vintage;

pub use extract::{EntityRecord, ReportExtract};
pub use vintage::{Release, SheetKind, VintageId};

use crate::schema::DatasetSchema;

/// Read every record of a pre-parsed sheet, headers included, as raw cells.
pub fn read_raw_rows<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<String>>> {
    let path = path.as_ref();
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true) // preambles and footers have ragged field counts
        .from_path(path)
        .with_context(|| format!("opening extract {}", path.display()))?;

    let mut rows = Vec::new();
    // cp1252 exports carry stray non-UTF-8 bytes; keep the row and replace them
    for (idx, result) in rdr.byte_records().enumerate() {
        let record = result.with_context(|| {
            format!("CSV parse error in {} at record {}", path.display(), idx)
        })?;
        rows.push(
            record
                .iter()
                .map(|field| String::from_utf8_lossy(field).into_owned())
                .collect(),
        );
    }
    Ok(rows)
}

/// Read and normalize one extract file. Schema and vintage failures come back
/// as `PipelineError` inside the `anyhow` chain so callers can classify them.
#[instrument(level = "info", skip(path, schema), fields(path = %path.as_ref().display()))]
pub fn load_extract<P: AsRef<Path>>(path: P, schema: &DatasetSchema) -> Result<ReportExtract> {
    let path = path.as_ref();
    let file_name = path
        .file_name()
        .and_then(|f| f.to_str())
        .with_context(|| format!("non UTF-8 file name {}", path.display()))?;
    let rows = read_raw_rows(path)?;
    let vintage = VintageId::from_file_name(file_name);
    let extract = ReportExtract::from_raw_rows(vintage, &rows, schema)?;
    debug!(rows = extract.rows.len(), "loaded extract");
    Ok(extract)
}

/// Concatenate the records of every extract into one corpus.
pub fn merge_corpus(extracts: &[ReportExtract], schema: &DatasetSchema) -> Vec<EntityRecord> {
    extracts
        .iter()
        .flat_map(|extract| extract.records(schema))
        .collect()
}
