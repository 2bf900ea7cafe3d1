//! Selecting the authoritative vintage per entity.
//!
//! Snapshot datasets keep the latest report per entity key. Revision datasets
//! keep, for the current year only, the file with the highest release
//! sequence and drop every other file claiming that year.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::{PipelineError, Result};
use crate::ingest::utils::parse_year;
use crate::ingest::{EntityRecord, VintageId};

/// Several vintages still tie after both snapshot filters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ambiguity {
    pub entity_id: String,
    pub sub_unit: Option<String>,
    pub report_date: Option<NaiveDate>,
    pub files: Vec<String>,
    pub rows: usize,
}

impl Ambiguity {
    pub fn to_error(&self) -> PipelineError {
        let entity = match &self.sub_unit {
            Some(sub) => format!("{}/{}", self.entity_id, sub),
            None => self.entity_id.clone(),
        };
        PipelineError::ReconciliationAmbiguity {
            entity,
            report_date: self.report_date,
            count: self.rows,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Reconciled {
    pub records: Vec<EntityRecord>,
    pub ambiguities: Vec<Ambiguity>,
}

/// Drop exact repeats: same vintage file, same cell values.
pub fn drop_exact_duplicates(records: Vec<EntityRecord>) -> Vec<EntityRecord> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|r| seen.insert((r.vintage.file.clone(), r.values().to_vec())))
        .collect()
}

/// Snapshot policy: keep only the entity's max report year, then per
/// (entity, sub-unit) the max report date within it. A sub-unit absent from
/// the entity's latest year is dropped. Remaining ties survive and are
/// reported.
#[instrument(level = "info", skip(records), fields(records = records.len()))]
pub fn reconcile_snapshots(records: Vec<EntityRecord>) -> Reconciled {
    let records = drop_exact_duplicates(records);
    let mut max_years: HashMap<String, Option<i32>> = HashMap::new();
    for record in &records {
        let year = max_years.entry(record.entity_id.clone()).or_default();
        *year = (*year).max(record.vintage.report_year);
    }

    let mut groups: BTreeMap<(String, Option<String>), Vec<EntityRecord>> = BTreeMap::new();
    for record in records {
        if max_years.get(&record.entity_id).copied().flatten() == record.vintage.report_year {
            groups.entry(record.key()).or_default().push(record);
        }
    }

    let mut out = Reconciled::default();
    for ((entity_id, sub_unit), group) in groups {
        let max_date = group.iter().map(|r| r.vintage.report_date()).max().flatten();
        let latest: Vec<EntityRecord> = group
            .into_iter()
            .filter(|r| r.vintage.report_date() == max_date)
            .collect();

        if latest.len() > 1 {
            let files: BTreeSet<String> = latest.iter().map(|r| r.vintage.file.clone()).collect();
            warn!(
                entity = %entity_id,
                sub_unit = ?sub_unit,
                report_date = ?max_date,
                rows = latest.len(),
                "vintages tie for latest report; keeping all"
            );
            out.ambiguities.push(Ambiguity {
                entity_id: entity_id.clone(),
                sub_unit: sub_unit.clone(),
                report_date: max_date,
                files: files.into_iter().collect(),
                rows: latest.len(),
            });
        }
        out.records.extend(latest);
    }

    info!(
        kept = out.records.len(),
        ambiguous = out.ambiguities.len(),
        "snapshot reconciliation done"
    );
    out
}

/// The winning release for the current year.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseSelection {
    pub year: i32,
    pub sequence: u32,
    pub winners: BTreeSet<String>,
    pub superseded: BTreeSet<String>,
}

impl ReleaseSelection {
    /// Remove every row of every superseded file.
    pub fn apply(&self, records: Vec<EntityRecord>) -> Vec<EntityRecord> {
        records
            .into_iter()
            .filter(|r| !self.superseded.contains(&r.vintage.file))
            .collect()
    }
}

/// Largest numeric year in `year_column`; sentinel years are ignored.
pub fn current_year(records: &[EntityRecord], year_column: &str) -> Option<i32> {
    records
        .iter()
        .filter_map(|r| r.get(year_column).and_then(parse_year))
        .max()
}

/// Files with at least one row for `year`.
fn files_claiming(
    records: &[EntityRecord],
    year: i32,
    year_column: &str,
) -> BTreeMap<String, Arc<VintageId>> {
    records
        .iter()
        .filter(|r| r.get(year_column).and_then(parse_year) == Some(year))
        .map(|r| (r.vintage.file.clone(), Arc::clone(&r.vintage)))
        .collect()
}

/// Revision policy: pick the highest release sequence among files claiming
/// the current year. A claiming file without a release token for that year
/// is an error for the whole year.
#[instrument(level = "info", skip(records), fields(records = records.len()))]
pub fn select_current_release(
    records: &[EntityRecord],
    year_column: &str,
) -> Result<Option<ReleaseSelection>> {
    let Some(year) = current_year(records, year_column) else {
        return Ok(None);
    };

    let files = files_claiming(records, year, year_column)
        .into_iter()
        .map(|(file, vintage)| vintage.release_sequence_for(year).map(|seq| (file, seq)))
        .collect::<Result<BTreeMap<String, u32>>>()?;

    let sequence = files.values().copied().max().unwrap_or_default();
    let (winners, superseded): (BTreeSet<String>, BTreeSet<String>) = {
        let (w, s): (Vec<_>, Vec<_>) = files.into_iter().partition(|(_, seq)| *seq == sequence);
        (
            w.into_iter().map(|(f, _)| f).collect(),
            s.into_iter().map(|(f, _)| f).collect(),
        )
    };
    if winners.len() > 1 {
        warn!(year, sequence, files = ?winners, "several files share the latest release sequence");
    }
    debug!(year, sequence, superseded = superseded.len(), "current release selected");

    Ok(Some(ReleaseSelection {
        year,
        sequence,
        winners,
        superseded,
    }))
}

/// Drop every file that claims `year`. Used when no release can be chosen.
pub fn discard_year(records: Vec<EntityRecord>, year: i32, year_column: &str) -> Vec<EntityRecord> {
    let claiming = files_claiming(&records, year, year_column);
    records
        .into_iter()
        .filter(|r| !claiming.contains_key(&r.vintage.file))
        .collect()
}
