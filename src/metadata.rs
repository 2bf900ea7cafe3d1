//! Entity-level metadata tables: one row per entity key, never the metric
//! columns.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::enrich::LookupTables;
use crate::ingest::utils::{clean_str, is_sentinel, parse_month_number, parse_year};
use crate::ingest::EntityRecord;
use crate::schema::{DatasetKind, DatasetSchema};

/// A plain string table, written as-is by the output stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

/// `NAMEPLATE CAPACITY (MW)` → `nameplate_capacity_mw`.
pub fn snake_case(column: &str) -> String {
    column
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Output name for a canonical column. Operator names publish as
/// `utility_name`; everything else is snake_cased.
pub fn output_column(column: &str) -> String {
    match column {
        "ENTITY NAME" => "utility_name".to_string(),
        _ => snake_case(column),
    }
}

/// Status workbooks list placeholder rows with no plant name.
pub fn retain_named_plants(records: Vec<EntityRecord>) -> Vec<EntityRecord> {
    records
        .into_iter()
        .filter(|r| r.get("PLANT NAME").is_some_and(|n| !is_sentinel(n)))
        .collect()
}

fn year_month(record: &EntityRecord, year_col: &str, month_col: &str) -> Option<NaiveDate> {
    let year = record.get(year_col).and_then(parse_year)?;
    let month = record.get(month_col).and_then(parse_month_number)?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Operating date, falling back to the planned operation date when the
/// generator has not come online yet.
pub fn operating_year_month(record: &EntityRecord) -> Option<NaiveDate> {
    year_month(record, "OPERATING YEAR", "OPERATING MONTH")
        .or_else(|| year_month(record, "PLANNED OPERATION YEAR", "PLANNED OPERATION MONTH"))
}

pub fn planned_retirement_year_month(record: &EntityRecord) -> Option<NaiveDate> {
    year_month(record, "PLANNED RETIREMENT YEAR", "PLANNED RETIREMENT MONTH")
}

fn cell(record: &EntityRecord, column: &str, tables: &LookupTables) -> Option<String> {
    let raw = record.get(column).filter(|v| !is_sentinel(v))?;
    let value = clean_str(raw);
    if column == "STATE" {
        Some(tables.normalize_state(&value).to_string())
    } else {
        Some(value)
    }
}

/// Build the metadata table for `records`, which must already be reconciled.
pub fn build_metadata(
    records: &[EntityRecord],
    schema: &DatasetSchema,
    tables: &LookupTables,
) -> Table {
    match schema.kind {
        DatasetKind::Generation => entity_metadata(records, schema, tables),
        DatasetKind::GeneratorStatus => status_metadata(records, schema, tables),
    }
}

/// One row per entity id, from its most recent vintage.
fn entity_metadata(
    records: &[EntityRecord],
    schema: &DatasetSchema,
    tables: &LookupTables,
) -> Table {
    let mut latest: BTreeMap<&str, &EntityRecord> = BTreeMap::new();
    for record in records {
        let slot = latest.entry(record.entity_id.as_str()).or_insert(record);
        let newer = (record.vintage.report_year, record.vintage.release, &record.vintage.file)
            > (slot.vintage.report_year, slot.vintage.release, &slot.vintage.file);
        if newer {
            *slot = record;
        }
    }

    Table {
        columns: schema.entity_columns.iter().map(|c| output_column(c)).collect(),
        rows: latest
            .values()
            .map(|record| {
                schema
                    .entity_columns
                    .iter()
                    .map(|c| cell(record, c, tables))
                    .collect()
            })
            .collect(),
    }
}

/// One row per surviving (plant, generator) record with standardized dates
/// and enriched codes.
fn status_metadata(
    records: &[EntityRecord],
    schema: &DatasetSchema,
    tables: &LookupTables,
) -> Table {
    let mut columns: Vec<String> = schema
        .entity_columns
        .iter()
        .map(|c| output_column(c))
        .collect();
    columns.extend(
        [
            "operating_year_month",
            "planned_retirement_year_month",
            "last_status_date",
            "energy_source",
            "energy_source_group",
            "prime_mover",
            "file",
        ]
        .map(String::from),
    );

    let mut sorted: Vec<&EntityRecord> = records.iter().collect();
    sorted.sort_by(|a, b| a.key().cmp(&b.key()).then_with(|| a.vintage.file.cmp(&b.vintage.file)));

    let code = |record: &EntityRecord, column: Option<&str>| {
        column
            .and_then(|c| record.get(c))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let rows = sorted
        .into_iter()
        .map(|record| {
            let mut row: Vec<Option<String>> = schema
                .entity_columns
                .iter()
                .map(|c| cell(record, c, tables))
                .collect();
            let fuel_code = code(record, schema.fuel_code_column);
            let mover_code = code(record, schema.prime_mover_column);
            row.push(operating_year_month(record).map(|d| d.to_string()));
            row.push(planned_retirement_year_month(record).map(|d| d.to_string()));
            row.push(record.vintage.report_date().map(|d| d.to_string()));
            row.push(fuel_code.as_deref().and_then(|c| tables.fuel.describe(c)).map(String::from));
            row.push(fuel_code.as_deref().and_then(|c| tables.fuel.group(c)).map(String::from));
            row.push(
                mover_code
                    .as_deref()
                    .and_then(|c| tables.prime_mover.describe(c))
                    .map(String::from),
            );
            row.push(Some(record.vintage.file.clone()));
            row
        })
        .collect();

    Table { columns, rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::CodeTable;
    use crate::ingest::VintageId;
    use std::sync::Arc;

    fn status_record(file: &str, cells: &[(&str, &str)]) -> EntityRecord {
        let columns: Arc<[String]> = cells
            .iter()
            .map(|(c, _)| c.to_string())
            .collect::<Vec<_>>()
            .into();
        EntityRecord::new(
            "3".into(),
            Some("1".into()),
            Arc::new(VintageId::from_file_name(file)),
            columns,
            cells.iter().map(|(_, v)| v.to_string()).collect(),
        )
    }

    #[test]
    fn snake_cases_headers() {
        assert_eq!(snake_case("NAMEPLATE CAPACITY (MW)"), "nameplate_capacity_mw");
        assert_eq!(snake_case("PLANT ID"), "plant_id");
        assert_eq!(output_column("ENTITY NAME"), "utility_name");
    }

    fn generation_record(file: &str, cells: &[(&str, &str)]) -> EntityRecord {
        let columns: Arc<[String]> = cells
            .iter()
            .map(|(c, _)| c.to_string())
            .collect::<Vec<_>>()
            .into();
        EntityRecord::new(
            "3".into(),
            None,
            Arc::new(VintageId::from_file_name(file)),
            columns,
            cells.iter().map(|(_, v)| v.to_string()).collect(),
        )
    }

    #[test]
    fn generation_metadata_uses_latest_vintage() {
        let older = generation_record(
            "EIA923_M_12_2023.csv",
            &[
                ("PLANT ID", "3"),
                ("PLANT NAME", "Barry Old"),
                ("OPERATOR NAME", "Alabama Power Co"),
                ("YEAR", "2023"),
                ("NETGEN JAN", "50"),
            ],
        );
        let newer = generation_record(
            "EIA923_M_02_2024.csv",
            &[
                ("PLANT ID", "3"),
                ("PLANT NAME", "Barry"),
                ("OPERATOR NAME", "Alabama Power"),
                ("YEAR", "2024"),
                ("NETGEN JAN", "100"),
            ],
        );
        let table = build_metadata(
            &[newer, older],
            &DatasetSchema::generation(),
            &LookupTables::default(),
        );

        assert_eq!(table.rows.len(), 1);
        assert!(!table.columns.iter().any(|c| c.starts_with("netgen")));
        let col = |name: &str| table.columns.iter().position(|c| c == name).unwrap();
        let row = &table.rows[0];
        assert_eq!(row[col("plant_id")].as_deref(), Some("3"));
        assert_eq!(row[col("plant_name")].as_deref(), Some("Barry"));
        assert_eq!(row[col("operator_name")].as_deref(), Some("Alabama Power"));
    }

    #[test]
    fn operating_date_falls_back_to_planned() {
        let record = status_record(
            "june_generator2024.csv",
            &[
                ("OPERATING YEAR", " "),
                ("OPERATING MONTH", " "),
                ("PLANNED OPERATION YEAR", "2026"),
                ("PLANNED OPERATION MONTH", "5"),
                ("PLANNED RETIREMENT YEAR", ""),
                ("PLANNED RETIREMENT MONTH", ""),
            ],
        );
        assert_eq!(operating_year_month(&record), NaiveDate::from_ymd_opt(2026, 5, 1));
        assert_eq!(planned_retirement_year_month(&record), None);
    }

    #[test]
    fn status_metadata_enriches_and_normalizes() {
        let tables = LookupTables {
            fuel: CodeTable::from_pairs([("SUN", "Solar")]).with_groups([("SUN", "Renewable")]),
            prime_mover: CodeTable::from_pairs([("PV", "Photovoltaic")]),
            states: [("Texas".to_string(), "TX".to_string())].into_iter().collect(),
            ..Default::default()
        };
        let record = status_record(
            "june_generator2024__operating.csv",
            &[
                ("PLANT ID", "3"),
                ("GENERATOR ID", "1"),
                ("PLANT NAME", "Sunny"),
                ("STATE", "Texas"),
                ("ENERGY SOURCE CODE", "SUN"),
                ("PRIME MOVER CODE", "PV"),
                ("OPERATING YEAR", "2020"),
                ("OPERATING MONTH", "7"),
            ],
        );
        let table = build_metadata(&[record], &DatasetSchema::generator_status(), &tables);
        assert_eq!(table.rows.len(), 1);
        let col = |name: &str| table.columns.iter().position(|c| c == name).unwrap();
        let row = &table.rows[0];
        assert_eq!(row[col("state")].as_deref(), Some("TX"));
        assert_eq!(row[col("operating_year_month")].as_deref(), Some("2020-07-01"));
        assert_eq!(row[col("last_status_date")].as_deref(), Some("2024-06-01"));
        assert_eq!(row[col("energy_source")].as_deref(), Some("Solar"));
        assert_eq!(row[col("energy_source_group")].as_deref(), Some("Renewable"));
        assert_eq!(row[col("prime_mover")].as_deref(), Some("Photovoltaic"));
        assert_eq!(row[col("county")], None);
        assert!(table.columns.iter().any(|c| c == "utility_name"));
        assert!(!table.columns.iter().any(|c| c == "entity_name"));
    }

    #[test]
    fn unnamed_plants_are_dropped() {
        let named = status_record("june_generator2024.csv", &[("PLANT NAME", "Barry")]);
        let unnamed = status_record("june_generator2024.csv", &[("PLANT NAME", "")]);
        assert_eq!(retain_named_plants(vec![named, unnamed]).len(), 1);
    }
}
