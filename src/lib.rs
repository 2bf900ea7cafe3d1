//! Reconciles periodic EIA plant extracts into per-plant monthly sensor time
//! series and entity metadata tables.

pub mod config;
pub mod enrich;
pub mod error;
pub mod ingest;
pub mod metadata;
pub mod output;
pub mod pipeline;
pub mod reconcile;
pub mod report;
pub mod schema;
pub mod series;

pub use config::RunConfig;
pub use error::PipelineError;
pub use pipeline::{run, Pipeline};
pub use report::RunReport;
