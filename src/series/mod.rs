pub mod melt;
pub mod naming;
pub mod pivot;

pub use melt::{MeltStats, SeriesMelter};
pub use naming::SensorNamer;
pub use pivot::{pivot_observations, EntityTimeSeries};

use chrono::NaiveDate;

use crate::enrich::EnrichmentLabels;
use crate::schema::CommonName;

/// One long-format observation: a single (entity, month, metric) value.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalObservation {
    pub entity_id: String,
    pub sub_unit: Option<String>,
    /// First day of the observed month.
    pub timestamp: NaiveDate,
    /// Wide column the value came from, e.g. `NETGEN JAN`.
    pub variable: String,
    pub common_name: CommonName,
    pub value: f64,
    pub labels: EnrichmentLabels,
    /// Unit qualifier (nuclear unit id); empty when absent.
    pub qualifier: String,
    pub sensor_name: Option<String>,
}
