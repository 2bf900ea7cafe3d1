use anyhow::{Context, Result};
use serde::Serialize;
use std::{collections::BTreeSet, fs, path::Path};

use crate::output::OutputFormat;
use crate::reconcile::Ambiguity;
use crate::schema::DatasetKind;
use crate::series::MeltStats;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub subject: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObservationCounts {
    pub melted: usize,
    pub sentinel_values: usize,
    pub invalid_dates: usize,
    pub unnamed: usize,
}

/// Summary of one batch run, written next to the outputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub dataset: DatasetKind,
    pub format: OutputFormat,
    pub strict_ties: bool,
    pub extracts_loaded: usize,
    pub extract_failures: Vec<Failure>,
    pub reconciliation_failures: Vec<Failure>,
    pub ambiguities: Vec<Ambiguity>,
    pub metadata_rows: usize,
    pub entities_written: usize,
    pub entity_failures: Vec<Failure>,
    pub observations: ObservationCounts,
    pub unrecognized_columns: BTreeSet<String>,
}

impl RunReport {
    pub fn new(dataset: DatasetKind, format: OutputFormat, strict_ties: bool) -> Self {
        Self {
            dataset,
            format,
            strict_ties,
            ..Default::default()
        }
    }

    pub fn absorb_melt(&mut self, stats: MeltStats, unnamed: usize) {
        self.observations.melted += stats.melted;
        self.observations.sentinel_values += stats.sentinel_values;
        self.observations.invalid_dates += stats.invalid_dates;
        self.observations.unnamed += unnamed;
        self.unrecognized_columns.extend(stats.unrecognized_columns);
    }

    /// Any extract, reconciliation year or entity that could not be produced.
    pub fn has_fatal(&self) -> bool {
        !self.extract_failures.is_empty()
            || !self.reconciliation_failures.is_empty()
            || !self.entity_failures.is_empty()
    }

    pub fn write_yaml(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("serializing run report")?;
        fs::write(path, yaml).with_context(|| format!("writing {}", path.display()))
    }
}
