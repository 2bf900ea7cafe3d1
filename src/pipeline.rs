//! End-to-end batch run: discover extracts, reconcile, build metadata, then
//! fan out per entity to produce the wide time series.

use anyhow::{Context, Result};
use glob::glob;
use rayon::prelude::*;
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};
use tracing::{debug, error, info, instrument, warn};

use crate::config::RunConfig;
use crate::enrich::{CodeEnricher, LookupTables};
use crate::error::PipelineError;
use crate::ingest::{load_extract, merge_corpus, EntityRecord, ReportExtract};
use crate::metadata::{build_metadata, retain_named_plants};
use crate::output::{table_to_batch, write_batch, write_series, OutputFormat};
use crate::reconcile::{
    current_year, discard_year, drop_exact_duplicates, reconcile_snapshots, select_current_release,
};
use crate::report::{Failure, RunReport};
use crate::schema::{DatasetKind, DatasetSchema, ReconcilePolicy};
use crate::series::{
    pivot_observations, CanonicalObservation, EntityTimeSeries, MeltStats, SensorNamer,
    SeriesMelter,
};

type EntityKey = (String, Option<String>);

/// Result of processing one entity. A failure here never affects siblings.
#[derive(Debug)]
pub struct EntityOutcome {
    pub entity_id: String,
    pub series: Result<EntityTimeSeries, PipelineError>,
    pub stats: MeltStats,
    pub unnamed: usize,
}

/// Observations of one entity between melt and pivot. Consumed by `finish`.
struct EntityContext<'a> {
    entity_id: &'a str,
    observations: Vec<CanonicalObservation>,
    stats: MeltStats,
}

impl<'a> EntityContext<'a> {
    fn new(entity_id: &'a str) -> Self {
        Self {
            entity_id,
            observations: Vec::new(),
            stats: MeltStats::default(),
        }
    }

    fn collect(&mut self, observations: Vec<CanonicalObservation>) {
        self.observations.extend(observations);
    }

    fn finish(self, namer: SensorNamer<'_>) -> EntityOutcome {
        let (named, unnamed) = namer.name_all(self.observations);
        if unnamed > 0 {
            debug!(unnamed, "observations without a resolvable sensor name");
        }
        let series = pivot_observations(self.entity_id, &named);
        if let Err(err) = &series {
            warn!(%err, "entity failed to pivot");
        }
        EntityOutcome {
            entity_id: self.entity_id.to_string(),
            series,
            stats: self.stats,
            unnamed,
        }
    }
}

/// What survives reconciliation, plus the keys strict mode rejects.
#[derive(Debug, Default)]
pub struct ReconcileOutput {
    pub records: Vec<EntityRecord>,
    pub rejected: BTreeSet<EntityKey>,
}

pub struct Pipeline {
    schema: DatasetSchema,
    enricher: CodeEnricher,
    strict_ties: bool,
}

impl Pipeline {
    pub fn new(schema: DatasetSchema, tables: Arc<LookupTables>) -> Self {
        Self {
            schema,
            enricher: CodeEnricher::new(tables),
            strict_ties: false,
        }
    }

    pub fn strict_ties(mut self, strict: bool) -> Self {
        self.strict_ties = strict;
        self
    }

    pub fn schema(&self) -> &DatasetSchema {
        &self.schema
    }

    /// Apply the dataset's reconciliation policy to the merged corpus.
    /// Failures and ambiguities are recorded on `report`.
    #[instrument(
        level = "info",
        skip_all,
        fields(dataset = self.schema.name, records = corpus.len())
    )]
    pub fn reconcile(&self, corpus: Vec<EntityRecord>, report: &mut RunReport) -> ReconcileOutput {
        match self.schema.policy {
            ReconcilePolicy::Snapshot => {
                let reconciled = reconcile_snapshots(corpus);
                let mut rejected = BTreeSet::new();
                for ambiguity in &reconciled.ambiguities {
                    if self.strict_ties {
                        let err = ambiguity.to_error();
                        error!(%err, "rejecting tied entity");
                        report.entity_failures.push(Failure {
                            subject: ambiguity.entity_id.clone(),
                            error: err.to_string(),
                        });
                        rejected.insert((ambiguity.entity_id.clone(), ambiguity.sub_unit.clone()));
                    }
                }
                report.ambiguities.extend(reconciled.ambiguities);
                let records = reconciled
                    .records
                    .into_iter()
                    .filter(|r| !rejected.contains(&r.key()))
                    .collect();
                ReconcileOutput { records, rejected }
            }
            ReconcilePolicy::Revision => {
                let corpus = drop_exact_duplicates(corpus);
                let Some(year_column) = self.schema.year_column else {
                    return ReconcileOutput {
                        records: corpus,
                        ..Default::default()
                    };
                };
                let records = match select_current_release(&corpus, year_column) {
                    Ok(Some(selection)) => {
                        info!(
                            year = selection.year,
                            sequence = selection.sequence,
                            superseded = selection.superseded.len(),
                            "current-year release chosen"
                        );
                        selection.apply(corpus)
                    }
                    Ok(None) => corpus,
                    Err(err) => {
                        let year = current_year(&corpus, year_column);
                        error!(%err, ?year, "cannot choose a release; dropping the year");
                        report.reconciliation_failures.push(Failure {
                            subject: year.map_or_else(|| "unknown year".into(), |y| y.to_string()),
                            error: err.to_string(),
                        });
                        match year {
                            Some(year) => discard_year(corpus, year, year_column),
                            None => corpus,
                        }
                    }
                };
                ReconcileOutput {
                    records,
                    ..Default::default()
                }
            }
        }
    }

    /// Enrich, melt, name and pivot the reconciled records of one entity.
    #[instrument(level = "debug", skip(self, records), fields(records = records.len()))]
    pub fn process_entity(&self, entity_id: &str, records: &[EntityRecord]) -> EntityOutcome {
        let melter = SeriesMelter::new(&self.schema);
        let mut ctx = EntityContext::new(entity_id);
        for record in records {
            let labels = self.enricher.enrich(record, &self.schema);
            let observations = melter.melt(record, &labels, &mut ctx.stats);
            ctx.collect(observations);
        }
        ctx.finish(SensorNamer::new(self.schema.labels))
    }
}

/// Sorted `*.csv` files in the input directory.
pub fn discover_extracts(config: &RunConfig) -> Result<Vec<PathBuf>> {
    let pattern = config.input_pattern();
    let mut paths = glob(&pattern)
        .with_context(|| format!("bad glob pattern {pattern}"))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("listing input extracts")?;
    paths.sort();
    Ok(paths)
}

/// Load every extract; a bad file is logged and recorded, never fatal.
fn load_all(
    paths: &[PathBuf],
    schema: &DatasetSchema,
    report: &mut RunReport,
) -> Vec<ReportExtract> {
    let results: Vec<(&PathBuf, Result<ReportExtract>)> = paths
        .par_iter()
        .map(|path| (path, load_extract(path, schema)))
        .collect();

    let mut extracts = Vec::with_capacity(results.len());
    for (path, result) in results {
        match result {
            Ok(extract) => extracts.push(extract),
            Err(err) => {
                error!(path = %path.display(), "skipping extract: {err:#}");
                report.extract_failures.push(Failure {
                    subject: path.display().to_string(),
                    error: format!("{err:#}"),
                });
            }
        }
    }
    report.extracts_loaded = extracts.len();
    extracts
}

fn group_by_entity(records: Vec<EntityRecord>) -> Vec<(String, Vec<EntityRecord>)> {
    let mut groups: BTreeMap<String, Vec<EntityRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.entity_id.clone()).or_default().push(record);
    }
    groups.into_iter().collect()
}

fn write_entity(dir: &Path, format: OutputFormat, outcome: &mut EntityOutcome) -> Option<PathBuf> {
    let series = outcome.series.as_ref().ok()?;
    if series.is_empty() {
        debug!(entity = %outcome.entity_id, "no named observations; nothing written");
        return None;
    }
    match write_series(dir, series, format) {
        Ok(path) => Some(path),
        Err(err) => {
            outcome.series = Err(PipelineError::Output {
                entity: outcome.entity_id.clone(),
                reason: format!("{err:#}"),
            });
            None
        }
    }
}

/// Run the whole batch described by `config`. Returns the run report, which
/// has also been written to `<output>/run_report.yaml`.
#[instrument(level = "info", skip_all, fields(dataset = ?config.dataset))]
pub fn run(config: &RunConfig, tables: Arc<LookupTables>) -> Result<RunReport> {
    let start = Instant::now();
    let pipeline =
        Pipeline::new(config.schema(), Arc::clone(&tables)).strict_ties(config.strict_ties);
    let schema = pipeline.schema();
    let mut report = RunReport::new(schema.kind, config.format, config.strict_ties);
    fs::create_dir_all(&config.output)
        .with_context(|| format!("creating {}", config.output.display()))?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()
        .context("building worker pool")?;

    let paths = discover_extracts(config)?;
    info!(files = paths.len(), input = %config.input.display(), "extracts discovered");
    let extracts = pool.install(|| load_all(&paths, schema, &mut report));

    let mut corpus = merge_corpus(&extracts, schema);
    drop(extracts);
    if schema.kind == DatasetKind::GeneratorStatus {
        corpus = retain_named_plants(corpus);
    }
    info!(records = corpus.len(), "corpus merged");

    let reconciled = pipeline.reconcile(corpus, &mut report);
    if !reconciled.rejected.is_empty() {
        warn!(rejected = reconciled.rejected.len(), "tied entities rejected");
    }

    let metadata = build_metadata(&reconciled.records, schema, &tables);
    report.metadata_rows = metadata.rows.len();
    write_batch(&config.metadata_path(), &table_to_batch(&metadata)?, config.format)?;
    info!(rows = metadata.rows.len(), path = %config.metadata_path().display(), "metadata written");

    if !schema.metric_prefixes.is_empty() {
        let series_dir = config.series_dir();
        fs::create_dir_all(&series_dir)
            .with_context(|| format!("creating {}", series_dir.display()))?;
        let groups = group_by_entity(reconciled.records);

        let outcomes: Vec<(EntityOutcome, Option<PathBuf>)> = pool.install(|| {
            groups
                .par_iter()
                .map(|(entity_id, records)| {
                    let mut outcome = pipeline.process_entity(entity_id, records);
                    let path = write_entity(&series_dir, config.format, &mut outcome);
                    (outcome, path)
                })
                .collect()
        });

        for (outcome, path) in outcomes {
            report.absorb_melt(outcome.stats, outcome.unnamed);
            match outcome.series {
                Ok(_) if path.is_some() => report.entities_written += 1,
                Ok(_) => {}
                Err(err) => report.entity_failures.push(Failure {
                    subject: outcome.entity_id,
                    error: err.to_string(),
                }),
            }
        }
        if !report.unrecognized_columns.is_empty() {
            warn!(columns = ?report.unrecognized_columns, "unrecognized columns were not melted");
        }
    }

    report.write_yaml(&config.report_path())?;
    info!(
        entities = report.entities_written,
        failures = report.entity_failures.len() + report.extract_failures.len(),
        elapsed = ?start.elapsed(),
        "run complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::lookup::{FUEL_CODES_FILE, PRIME_MOVER_CODES_FILE};
    use std::path::Path;
    use tempfile::tempdir;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    fn init_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    const GEN_HEADER: &str =
        "Plant Id,Plant Name,Plant State,Reported Prime Mover,Reported Fuel Type Code,Nuclear Unit Id,YEAR,NETGEN_JAN,NETGEN_FEB";

    fn write_lookups(dir: &Path) -> Result<Arc<LookupTables>> {
        fs::write(
            dir.join(FUEL_CODES_FILE),
            "Energy Source Code,Energy Source Description,Grouping\nBIT,Bituminous Coal,Fossil\nNG,Natural Gas,Fossil\n",
        )?;
        fs::write(
            dir.join(PRIME_MOVER_CODES_FILE),
            "Prime Mover Code,Prime Mover Description\nST,Steam Turbine\nCT,Combustion Turbine\n",
        )?;
        Ok(Arc::new(LookupTables::load_dir(dir)?))
    }

    fn write_extract(dir: &Path, name: &str, rows: &[&str]) -> Result<()> {
        let mut text = format!("Page 1 Generation and Fuel Data\n{GEN_HEADER}\n");
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        fs::write(dir.join(name), text)?;
        Ok(())
    }

    fn config(root: &Path) -> RunConfig {
        RunConfig {
            input: root.join("in"),
            lookups: root.join("lookups"),
            output: root.join("out"),
            dataset: DatasetKind::Generation,
            mer_labels: false,
            format: OutputFormat::Csv,
            strict_ties: false,
            threads: 2,
        }
    }

    #[test]
    fn generation_run_isolates_entity_failures() -> Result<()> {
        init_logging();
        let root = tempdir()?;
        let config = config(root.path());
        fs::create_dir_all(&config.input)?;
        fs::create_dir_all(&config.lookups)?;
        let tables = write_lookups(&config.lookups)?;

        // superseded by release 2 of the same year
        write_extract(&config.input, "EIA923_M_01_2024.csv", &["3,Barry,AL,ST,BIT,.,2024,1,."])?;
        write_extract(
            &config.input,
            "EIA923_M_02_2024.csv",
            &[
                "3,Barry,AL,ST,BIT,.,2024,100,90.5",
                "7,Mystery,TX,CT,XX,.,2024,5,6",
                "9,Twin,TX,CT,NG,.,2024,10,.",
                "9,Twin,TX,CT,NG,.,2024,11,.",
            ],
        )?;
        fs::write(config.input.join("notes.csv"), "nothing,useful\n")?;

        let report = run(&config, tables)?;

        assert_eq!(report.extracts_loaded, 2);
        assert_eq!(report.extract_failures.len(), 1);
        assert_eq!(report.entities_written, 1);
        assert_eq!(report.entity_failures.len(), 1);
        assert_eq!(report.entity_failures[0].subject, "9");
        assert_eq!(report.observations.unnamed, 2);
        assert!(report.has_fatal());

        let text = fs::read_to_string(config.series_dir().join("3.csv"))?;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "measured_on,Bituminous Coal - Steam Turbine Generation");
        assert!(lines[1].starts_with("2024-01-01,100"));
        assert!(lines[2].starts_with("2024-02-01,90.5"));
        assert!(!config.series_dir().join("7.csv").exists());
        assert!(!config.series_dir().join("9.csv").exists());
        assert!(config.metadata_path().exists());
        let yaml = fs::read_to_string(config.report_path())?;
        assert!(yaml.contains("dataset: generation"));
        assert!(yaml.contains("format: csv"));
        Ok(())
    }

    #[test]
    fn unversioned_current_year_is_dropped() -> Result<()> {
        init_logging();
        let root = tempdir()?;
        let config = config(root.path());
        fs::create_dir_all(&config.input)?;
        fs::create_dir_all(&config.lookups)?;
        let tables = write_lookups(&config.lookups)?;

        write_extract(&config.input, "EIA923_M_12_2023.csv", &["3,Barry,AL,ST,BIT,.,2023,50,."])?;
        write_extract(&config.input, "gen_final.csv", &["3,Barry,AL,ST,BIT,.,2024,100,."])?;

        let report = run(&config, tables)?;
        assert_eq!(report.reconciliation_failures.len(), 1);
        assert_eq!(report.reconciliation_failures[0].subject, "2024");

        let text = fs::read_to_string(config.series_dir().join("3.csv"))?;
        assert!(text.contains("2023-01-01,50"));
        assert!(!text.contains("2024-01-01"));
        Ok(())
    }

    #[test]
    fn strict_ties_reject_tied_generators() -> Result<()> {
        init_logging();
        let root = tempdir()?;
        let mut config = config(root.path());
        config.dataset = DatasetKind::GeneratorStatus;
        config.strict_ties = true;
        fs::create_dir_all(&config.input)?;
        fs::create_dir_all(&config.lookups)?;
        let tables = write_lookups(&config.lookups)?;

        let header = "Plant Id,Generator Id,Plant Name,Status";
        fs::write(
            config.input.join("june_generator2024__operating.csv"),
            format!("{header}\n3,1,Barry,(OP)\n5,A,Gaston,(OP)\n"),
        )?;
        fs::write(
            config.input.join("june_generator2024__planned.csv"),
            format!("{header}\n3,1,Barry,(P)\n"),
        )?;

        let report = run(&config, tables)?;
        assert_eq!(report.ambiguities.len(), 1);
        assert_eq!(report.entity_failures.len(), 1);
        assert_eq!(report.metadata_rows, 1);
        assert_eq!(report.entities_written, 0);
        Ok(())
    }
}
