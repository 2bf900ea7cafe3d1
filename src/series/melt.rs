use chrono::NaiveDate;
use std::collections::BTreeSet;
use tracing::trace;

use crate::enrich::EnrichmentLabels;
use crate::ingest::utils::{clean_id, is_sentinel, parse_month_token, parse_value, parse_year};
use crate::ingest::EntityRecord;
use crate::schema::{ColumnRole, DatasetSchema};
use crate::series::CanonicalObservation;

/// Counts of what the melt stage left out, per entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeltStats {
    pub melted: usize,
    pub sentinel_values: usize,
    pub invalid_dates: usize,
    pub unrecognized_columns: BTreeSet<String>,
}

impl MeltStats {
    pub fn merge(&mut self, other: MeltStats) {
        self.melted += other.melted;
        self.sentinel_values += other.sentinel_values;
        self.invalid_dates += other.invalid_dates;
        self.unrecognized_columns.extend(other.unrecognized_columns);
    }
}

/// Turns the wide `<METRIC> <MON>` columns of a record into observations.
#[derive(Debug, Clone, Copy)]
pub struct SeriesMelter<'a> {
    schema: &'a DatasetSchema,
}

impl<'a> SeriesMelter<'a> {
    pub fn new(schema: &'a DatasetSchema) -> Self {
        Self { schema }
    }

    pub fn melt(
        &self,
        record: &EntityRecord,
        labels: &EnrichmentLabels,
        stats: &mut MeltStats,
    ) -> Vec<CanonicalObservation> {
        let year = self
            .schema
            .year_column
            .and_then(|c| record.get(c))
            .and_then(parse_year);
        let qualifier = self
            .schema
            .qualifier_column
            .and_then(|c| record.get(c))
            .filter(|q| !is_sentinel(q))
            .and_then(clean_id)
            .unwrap_or_default();

        let mut out = Vec::new();
        for (column, raw) in record.cells() {
            let (common_name, month) = match self.schema.classify(column) {
                ColumnRole::Metric {
                    common_name, month, ..
                } => (common_name, month),
                ColumnRole::Unrecognized => {
                    stats.unrecognized_columns.insert(column.to_string());
                    continue;
                }
                ColumnRole::Metadata | ColumnRole::Ignored => continue,
            };

            let Some(timestamp) = year
                .zip(parse_month_token(month))
                .and_then(|(y, m)| NaiveDate::from_ymd_opt(y, m, 1))
            else {
                trace!(column, year = ?year, "rejecting observation without a valid month");
                stats.invalid_dates += 1;
                continue;
            };
            let Some(value) = parse_value(raw) else {
                stats.sentinel_values += 1;
                continue;
            };

            stats.melted += 1;
            out.push(CanonicalObservation {
                entity_id: record.entity_id.clone(),
                sub_unit: record.sub_unit.clone(),
                timestamp,
                variable: column.to_string(),
                common_name,
                value,
                labels: labels.clone(),
                qualifier: qualifier.clone(),
                sensor_name: None,
            });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::VintageId;
    use crate::schema::CommonName;
    use std::sync::Arc;

    fn record(columns: &[&str], values: &[&str]) -> EntityRecord {
        let columns: Arc<[String]> = columns
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .into();
        EntityRecord::new(
            values[0].to_string(),
            None,
            Arc::new(VintageId::from_file_name("gen_2_2024.csv")),
            columns,
            values.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn melts_metric_columns_and_rejects_sentinels() {
        let schema = DatasetSchema::generation();
        let record = record(
            &[
                "PLANT ID",
                "YEAR",
                "NUCLEAR UNIT ID",
                "NETGEN JAN",
                "NETGEN FEB",
                "TOT MMBTU MAR",
                "QUANTITY JAN",
                "SOLAR FLUX JAN",
            ],
            &["3", "2024", ".", "100", ".", "7.5", "1", "2"],
        );
        let mut stats = MeltStats::default();
        let obs =
            SeriesMelter::new(&schema).melt(&record, &EnrichmentLabels::default(), &mut stats);

        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].timestamp, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(obs[0].common_name, CommonName::Generation);
        assert_eq!(obs[0].value, 100.0);
        assert_eq!(obs[0].qualifier, "");
        assert_eq!(obs[1].timestamp, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(obs[1].common_name, CommonName::TotalFuelConsumed);
        assert_eq!(stats.sentinel_values, 1);
        assert_eq!(
            stats.unrecognized_columns,
            BTreeSet::from(["SOLAR FLUX JAN".to_string()])
        );
    }

    #[test]
    fn sentinel_year_rejects_every_observation() {
        let schema = DatasetSchema::generation();
        let record = record(&["PLANT ID", "YEAR", "NETGEN JAN"], &["3", ".", "100"]);
        let mut stats = MeltStats::default();
        let obs =
            SeriesMelter::new(&schema).melt(&record, &EnrichmentLabels::default(), &mut stats);
        assert!(obs.is_empty());
        assert_eq!(stats.invalid_dates, 1);
    }

    #[test]
    fn qualifier_is_kept_for_naming() {
        let schema = DatasetSchema::generation();
        let record = record(
            &["PLANT ID", "YEAR", "NUCLEAR UNIT ID", "NETGEN JUN"],
            &["46", "2024", "2.0", "900"],
        );
        let mut stats = MeltStats::default();
        let obs =
            SeriesMelter::new(&schema).melt(&record, &EnrichmentLabels::default(), &mut stats);
        assert_eq!(obs[0].qualifier, "2");
    }
}
