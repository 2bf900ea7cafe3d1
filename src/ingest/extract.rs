use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{PipelineError, Result};
use crate::ingest::utils::{clean_id, clean_str};
use crate::ingest::vintage::VintageId;
use crate::schema::{locate_header_row, normalize_headers, DatasetSchema, ReconcilePolicy};

pub const RETIRED_STATUS: &str =
    "(OS) Out of service and NOT expected to return to service in next calendar year";

/// One ingested vintage, immutable once built.
#[derive(Debug, Clone)]
pub struct ReportExtract {
    pub vintage: Arc<VintageId>,
    /// Canonical column names, in source order.
    pub columns: Arc<[String]>,
    /// Data rows projected onto `columns`.
    pub rows: Vec<Vec<String>>,
}

impl ReportExtract {
    /// Locate the header row, normalize it and keep only the rows below it.
    #[instrument(level = "debug", skip(vintage, raw_rows, schema), fields(file = %vintage.file))]
    pub fn from_raw_rows(
        vintage: VintageId,
        raw_rows: &[Vec<String>],
        schema: &DatasetSchema,
    ) -> Result<Self> {
        let header_idx = locate_header_row(raw_rows).ok_or_else(|| PipelineError::HeaderNotFound {
            extract: vintage.file.clone(),
        })?;
        let headers = normalize_headers(&raw_rows[header_idx]);
        let mut columns = headers.names.clone();
        let mut rows: Vec<Vec<String>> = raw_rows[header_idx + 1..]
            .iter()
            .map(|r| headers.project(r))
            .filter(|r| r.iter().any(|c| !clean_str(c).is_empty()))
            .collect();

        if vintage.sheet.is_some_and(|s| s.is_retired()) {
            apply_retired_renames(&mut columns, &mut rows);
        }

        for column in schema.required_columns {
            if !columns.iter().any(|c| c == column) {
                return Err(PipelineError::MissingColumn {
                    extract: vintage.file.clone(),
                    column: column.to_string(),
                });
            }
        }

        if schema.policy == ReconcilePolicy::Snapshot && vintage.report_date().is_none() {
            return Err(PipelineError::Vintage {
                file: vintage.file.clone(),
                reason: "no `<month>_generator<year>` report period".into(),
            });
        }

        debug!(
            header_row = header_idx,
            columns = columns.len(),
            rows = rows.len(),
            "extract normalized"
        );
        Ok(Self {
            vintage: Arc::new(vintage),
            columns: columns.into(),
            rows,
        })
    }

    /// Rows as entity records; rows without an entity id are skipped.
    pub fn records<'a>(
        &'a self,
        schema: &'a DatasetSchema,
    ) -> impl Iterator<Item = EntityRecord> + 'a {
        let entity_idx = self.column_index(schema.entity_column);
        let sub_idx = schema.sub_unit_column.and_then(|c| self.column_index(c));
        self.rows.iter().filter_map(move |row| {
            let entity_id = clean_id(row.get(entity_idx?)?)?;
            let sub_unit = sub_idx.and_then(|i| row.get(i)).and_then(|c| clean_id(c));
            Some(EntityRecord::new(
                entity_id,
                sub_unit,
                Arc::clone(&self.vintage),
                Arc::clone(&self.columns),
                row.clone(),
            ))
        })
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Retired sheets report actual retirement dates under different headers and
/// have no status column.
fn apply_retired_renames(columns: &mut Vec<String>, rows: &mut [Vec<String>]) {
    for (from, to) in [
        ("RETIREMENT MONTH", "PLANNED RETIREMENT MONTH"),
        ("RETIREMENT YEAR", "PLANNED RETIREMENT YEAR"),
    ] {
        if columns.iter().any(|c| c == to) {
            continue;
        }
        if let Some(c) = columns.iter_mut().find(|c| c.as_str() == from) {
            *c = to.to_string();
        }
    }

    let status_idx = match columns.iter().position(|c| c == "STATUS") {
        Some(i) => i,
        None => {
            columns.push("STATUS".to_string());
            columns.len() - 1
        }
    };
    for row in rows.iter_mut() {
        if row.len() <= status_idx {
            row.resize(status_idx + 1, String::new());
        }
        if clean_str(&row[status_idx]).is_empty() {
            row[status_idx] = RETIRED_STATUS.to_string();
        }
    }
}

/// One row of one vintage, keyed by entity (and sub-unit).
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub entity_id: String,
    pub sub_unit: Option<String>,
    pub vintage: Arc<VintageId>,
    columns: Arc<[String]>,
    values: Vec<String>,
}

impl EntityRecord {
    pub fn new(
        entity_id: String,
        sub_unit: Option<String>,
        vintage: Arc<VintageId>,
        columns: Arc<[String]>,
        values: Vec<String>,
    ) -> Self {
        Self {
            entity_id,
            sub_unit,
            vintage,
            columns,
            values,
        }
    }

    /// Raw cell for a canonical column, if the vintage had it.
    pub fn get(&self, column: &str) -> Option<&str> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.values.get(idx).map(String::as_str)
    }

    /// `(column, raw value)` pairs in source order.
    pub fn cells(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns
            .iter()
            .zip(self.values.iter())
            .map(|(c, v)| (c.as_str(), v.as_str()))
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Key used by the reconciler: entity id plus optional sub-unit.
    pub fn key(&self) -> (String, Option<String>) {
        (self.entity_id.clone(), self.sub_unit.clone())
    }
}
