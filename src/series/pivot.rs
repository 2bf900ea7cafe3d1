use chrono::NaiveDate;
use std::collections::{btree_map::Entry, BTreeMap, BTreeSet};

use crate::error::{PipelineError, Result};
use crate::series::CanonicalObservation;

/// Wide per-entity table: one row per month, one column per sensor name.
/// Sensor columns sort byte-wise; missing cells stay absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityTimeSeries {
    pub entity_id: String,
    rows: BTreeMap<NaiveDate, BTreeMap<String, f64>>,
    sensors: BTreeSet<String>,
}

impl EntityTimeSeries {
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            ..Default::default()
        }
    }

    /// Insert one cell. Repeating an identical value is a no-op; a different
    /// value for the same cell is a collision.
    pub fn insert(&mut self, timestamp: NaiveDate, sensor: &str, value: f64) -> Result<()> {
        let row = self.rows.entry(timestamp).or_default();
        match row.entry(sensor.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(value);
                self.sensors.insert(sensor.to_string());
                Ok(())
            }
            Entry::Occupied(existing) if *existing.get() == value => Ok(()),
            Entry::Occupied(existing) => Err(PipelineError::PivotCollision {
                entity: self.entity_id.clone(),
                timestamp,
                sensor: sensor.to_string(),
                first: *existing.get(),
                second: value,
            }),
        }
    }

    pub fn sensors(&self) -> impl Iterator<Item = &str> {
        self.sensors.iter().map(String::as_str)
    }

    pub fn timestamps(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.rows.keys().copied()
    }

    pub fn get(&self, timestamp: NaiveDate, sensor: &str) -> Option<f64> {
        self.rows.get(&timestamp)?.get(sensor).copied()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_sensors(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Pivot named observations of one entity. Unnamed observations are skipped.
pub fn pivot_observations(
    entity_id: &str,
    observations: &[CanonicalObservation],
) -> Result<EntityTimeSeries> {
    let mut series = EntityTimeSeries::new(entity_id);
    for obs in observations {
        if let Some(sensor) = obs.sensor_name.as_deref() {
            series.insert(obs.timestamp, sensor, obs.value)?;
        }
    }
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::EnrichmentLabels;
    use crate::schema::CommonName;

    fn obs(month: u32, sensor: &str, value: f64) -> CanonicalObservation {
        CanonicalObservation {
            entity_id: "3".into(),
            sub_unit: None,
            timestamp: NaiveDate::from_ymd_opt(2024, month, 1).unwrap(),
            variable: "NETGEN".into(),
            common_name: CommonName::Generation,
            value,
            labels: EnrichmentLabels::default(),
            qualifier: String::new(),
            sensor_name: Some(sensor.into()),
        }
    }

    #[test]
    fn pivots_and_deduplicates_exact_repeats() -> anyhow::Result<()> {
        let observations = vec![
            obs(1, "b", 1.0),
            obs(1, "a", 2.0),
            obs(2, "a", 3.0),
            obs(2, "a", 3.0),
        ];
        let series = pivot_observations("3", &observations)?;
        assert_eq!(series.sensors().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(series.num_rows(), 2);
        let feb = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        assert_eq!(series.get(feb, "a"), Some(3.0));
        assert_eq!(series.get(feb, "b"), None);
        Ok(())
    }

    #[test]
    fn differing_values_collide() {
        let observations = vec![obs(1, "a", 1.0), obs(1, "a", 1.5)];
        let err = pivot_observations("3", &observations).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::PivotCollision { first, second, .. } if first == 1.0 && second == 1.5
        ));
    }
}
