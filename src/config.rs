use clap::Parser;
use std::path::PathBuf;

use crate::output::OutputFormat;
use crate::schema::{DatasetKind, DatasetSchema};

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Reconcile EIA plant extracts into per-plant monthly time series"
)]
pub struct RunConfig {
    /// Directory of pre-parsed sheet extracts (`*.csv`).
    #[arg(short, long, default_value = "./assets/extracts")]
    pub input: PathBuf,
    /// Directory holding the code lookup tables.
    #[arg(short, long, default_value = "./assets/lookups")]
    pub lookups: PathBuf,
    #[arg(short, long, default_value = "./output")]
    pub output: PathBuf,
    #[arg(short, long, value_enum, default_value_t = DatasetKind::Generation)]
    pub dataset: DatasetKind,
    /// Append the MER fuel type label to generation sensor names.
    #[arg(long)]
    pub mer_labels: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    pub format: OutputFormat,
    /// Fail an entity instead of keeping tied vintages.
    #[arg(long)]
    pub strict_ties: bool,
    /// Worker threads; 0 lets rayon decide.
    #[arg(long, default_value_t = 0)]
    pub threads: usize,
}

impl RunConfig {
    pub fn schema(&self) -> DatasetSchema {
        DatasetSchema::for_kind(self.dataset, self.mer_labels)
    }

    pub fn input_pattern(&self) -> String {
        format!("{}/*.csv", self.input.display())
    }

    pub fn series_dir(&self) -> PathBuf {
        self.output.join(self.schema().name)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.output
            .join(format!("{}_metadata.{}", self.schema().name, self.format.extension()))
    }

    pub fn report_path(&self) -> PathBuf {
        self.output.join("run_report.yaml")
    }
}
