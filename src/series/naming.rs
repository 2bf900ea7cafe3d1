use crate::enrich::EnrichmentLabels;
use crate::schema::{CommonName, Label};
use crate::series::CanonicalObservation;

/// Builds `<label> - <label> <Suffix>[ Unit <id>]` sensor names.
#[derive(Debug, Clone, Copy)]
pub struct SensorNamer<'a> {
    labels: &'a [Label],
}

impl<'a> SensorNamer<'a> {
    pub fn new(labels: &'a [Label]) -> Self {
        Self { labels }
    }

    /// `None` when any label in the naming order is unresolved.
    pub fn sensor_name(
        &self,
        labels: &EnrichmentLabels,
        common_name: CommonName,
        qualifier: &str,
    ) -> Option<String> {
        let parts = self
            .labels
            .iter()
            .map(|label| labels.get(*label))
            .collect::<Option<Vec<&str>>>()?;

        let mut name = parts.join(" - ");
        if !name.is_empty() {
            name.push(' ');
        }
        name.push_str(common_name.sensor_suffix());
        if !qualifier.is_empty() {
            name.push_str(" Unit ");
            name.push_str(qualifier);
        }
        Some(name)
    }

    /// Name every observation, dropping the ones that cannot be named.
    /// Returns the named observations and how many were dropped.
    pub fn name_all(
        &self,
        observations: Vec<CanonicalObservation>,
    ) -> (Vec<CanonicalObservation>, usize) {
        let total = observations.len();
        let named: Vec<CanonicalObservation> = observations
            .into_iter()
            .filter_map(|mut obs| {
                let name = self.sensor_name(&obs.labels, obs.common_name, &obs.qualifier)?;
                obs.sensor_name = Some(name);
                Some(obs)
            })
            .collect();
        let dropped = total - named.len();
        (named, dropped)
    }
}
