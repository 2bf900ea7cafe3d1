use chrono::NaiveDate;
use thiserror::Error;

/// Failure taxonomy for one extract, one reconciliation year or one entity.
///
/// Enrichment misses and sentinel cells are not errors: they null a label or
/// drop an observation and are only counted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("extract `{extract}`: header marker (Plant ID / Entity ID) not found")]
    HeaderNotFound { extract: String },

    #[error("extract `{extract}`: required column `{column}` missing after normalization")]
    MissingColumn { extract: String, column: String },

    #[error("vintage `{file}`: {reason}")]
    Vintage { file: String, reason: String },

    #[error(
        "entity `{entity}`: {count} vintages tie for latest report date {report_date:?}"
    )]
    ReconciliationAmbiguity {
        entity: String,
        report_date: Option<NaiveDate>,
        count: usize,
    },

    #[error(
        "entity `{entity}`: `{sensor}` at {timestamp} observed as both {first} and {second}"
    )]
    PivotCollision {
        entity: String,
        timestamp: NaiveDate,
        sensor: String,
        first: f64,
        second: f64,
    },

    #[error("output for `{entity}`: {reason}")]
    Output { entity: String, reason: String },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
