//! Declared schemas per dataset type.
//!
//! Columns are never inferred from "whatever is not metadata": each dataset
//! lists its metadata columns and the metric prefixes it knows how to melt.
//! Anything else is reported as unrecognized and left out.

use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DatasetKind {
    /// Monthly generation and fuel consumption (EIA-923 style).
    #[default]
    Generation,
    /// Generator inventory and status (EIA-860M style).
    GeneratorStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilePolicy {
    /// Latest report year, then latest report date, per entity key.
    Snapshot,
    /// Latest release of the current year supersedes earlier releases.
    Revision,
}

/// Enrichment labels that can take part in a sensor name, in naming order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    EnergyType,
    PrimeMover,
    MerFuelType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CommonName {
    Generation,
    GrossGeneration,
    QuantityConsumedElectricity,
    TotalFuelConsumed,
}

impl CommonName {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommonName::Generation => "generation",
            CommonName::GrossGeneration => "gross-generation",
            CommonName::QuantityConsumedElectricity => "quantity-consumed-electricity",
            CommonName::TotalFuelConsumed => "total-fuel-consumed",
        }
    }

    /// Literal appended to the joined labels.
    pub fn sensor_suffix(&self) -> &'static str {
        match self {
            CommonName::Generation => "Generation",
            CommonName::GrossGeneration => "Gross Generation",
            CommonName::QuantityConsumedElectricity => "Quantity Consumed For Electricity",
            CommonName::TotalFuelConsumed => "Total Fuel Consumed",
        }
    }
}

/// A wide-column prefix such as `NETGEN` in `NETGEN JAN`.
/// Prefixes without a common name are recognized but never melted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricPrefix {
    pub prefix: &'static str,
    pub common_name: Option<CommonName>,
}

/// How a canonical column participates in the reshape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole<'a> {
    Metadata,
    Ignored,
    Metric {
        prefix: &'static str,
        common_name: CommonName,
        month: &'a str,
    },
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSchema {
    pub kind: DatasetKind,
    pub name: &'static str,
    pub policy: ReconcilePolicy,
    pub entity_column: &'static str,
    pub sub_unit_column: Option<&'static str>,
    pub year_column: Option<&'static str>,
    pub required_columns: &'static [&'static str],
    pub metadata_columns: &'static [&'static str],
    /// Entity-level subset of the metadata written to the metadata table.
    pub entity_columns: &'static [&'static str],
    pub ignored_columns: &'static [&'static str],
    pub ignored_prefixes: &'static [&'static str],
    pub metric_prefixes: &'static [MetricPrefix],
    pub qualifier_column: Option<&'static str>,
    pub fuel_code_column: Option<&'static str>,
    pub prime_mover_column: Option<&'static str>,
    pub mer_code_column: Option<&'static str>,
    pub labels: &'static [Label],
}

pub const PLANT_ID: &str = "PLANT ID";
pub const GENERATOR_ID: &str = "GENERATOR ID";
pub const YEAR: &str = "YEAR";

static GENERATION_METADATA: &[&str] = &[
    PLANT_ID,
    "COMBINED HEAT AND POWER PLANT",
    "NUCLEAR UNIT ID",
    "PLANT NAME",
    "OPERATOR NAME",
    "OPERATOR ID",
    "STATE",
    "CENSUS REGION",
    "NERC REGION",
    "RESERVED",
    "NAICS CODE",
    "EIA SECTOR NUMBER",
    "SECTOR NAME",
    "REPORTED PRIME MOVER",
    "REPORTED FUEL TYPE CODE",
    "MER FUEL TYPE CODE",
    "BALANCING AUTHORITY CODE",
    "RESPONDENT FREQUENCY",
    "PHYSICAL UNIT LABEL",
    YEAR,
];

static GENERATION_ENTITY: &[&str] = &[
    PLANT_ID,
    "PLANT NAME",
    "OPERATOR NAME",
    "OPERATOR ID",
    "STATE",
    "CENSUS REGION",
    "NERC REGION",
    "NAICS CODE",
    "EIA SECTOR NUMBER",
    "SECTOR NAME",
    "BALANCING AUTHORITY CODE",
    "RESPONDENT FREQUENCY",
];

static GENERATION_IGNORED: &[&str] = &[
    "TOTAL FUEL CONSUMPTION QUANTITY",
    "ELEC FUEL CONSUMPTION QUANTITY",
    "TOTAL FUEL CONSUMPTION MMBTU",
    "ELEC FUEL CONSUMPTION MMBTU",
    "NET GENERATION (MEGAWATTHOURS)",
];

static GENERATION_METRICS: &[MetricPrefix] = &[
    MetricPrefix {
        prefix: "NETGEN",
        common_name: Some(CommonName::Generation),
    },
    MetricPrefix {
        prefix: "GROSSGEN",
        common_name: Some(CommonName::GrossGeneration),
    },
    MetricPrefix {
        prefix: "ELEC MMBTU",
        common_name: Some(CommonName::QuantityConsumedElectricity),
    },
    MetricPrefix {
        prefix: "TOT MMBTU",
        common_name: Some(CommonName::TotalFuelConsumed),
    },
    MetricPrefix {
        prefix: "QUANTITY",
        common_name: None,
    },
    MetricPrefix {
        prefix: "ELEC QUANTITY",
        common_name: None,
    },
    MetricPrefix {
        prefix: "MMBTU PER UNIT",
        common_name: None,
    },
];

static STATUS_METADATA: &[&str] = &[
    "ENTITY ID",
    "ENTITY NAME",
    PLANT_ID,
    "PLANT NAME",
    "STATE",
    "COUNTY",
    "BALANCING AUTHORITY CODE",
    "SECTOR",
    "UNIT CODE",
    "TECHNOLOGY",
    GENERATOR_ID,
    "NAMEPLATE CAPACITY (MW)",
    "DC NET CAPACITY (MW)",
    "NET SUMMER CAPACITY (MW)",
    "NET WINTER CAPACITY (MW)",
    "OPERATING MONTH",
    "OPERATING YEAR",
    "PLANNED OPERATION MONTH",
    "PLANNED OPERATION YEAR",
    "PLANNED RETIREMENT MONTH",
    "PLANNED RETIREMENT YEAR",
    "ENERGY SOURCE CODE",
    "PRIME MOVER CODE",
    "STATUS",
    "LATITUDE",
    "LONGITUDE",
];

static STATUS_ENTITY: &[&str] = &[
    PLANT_ID,
    GENERATOR_ID,
    "ENTITY NAME",
    "PLANT NAME",
    "STATE",
    "COUNTY",
    "BALANCING AUTHORITY CODE",
    "SECTOR",
    "UNIT CODE",
    "TECHNOLOGY",
    "NAMEPLATE CAPACITY (MW)",
    "DC NET CAPACITY (MW)",
    "NET SUMMER CAPACITY (MW)",
    "NET WINTER CAPACITY (MW)",
    "STATUS",
    "LATITUDE",
    "LONGITUDE",
];

impl DatasetSchema {
    pub fn generation() -> Self {
        Self {
            kind: DatasetKind::Generation,
            name: "generation",
            policy: ReconcilePolicy::Revision,
            entity_column: PLANT_ID,
            sub_unit_column: None,
            year_column: Some(YEAR),
            required_columns: &[PLANT_ID, YEAR, "REPORTED FUEL TYPE CODE", "REPORTED PRIME MOVER"],
            metadata_columns: GENERATION_METADATA,
            entity_columns: GENERATION_ENTITY,
            ignored_columns: GENERATION_IGNORED,
            ignored_prefixes: &["EARLY RELEASE"],
            metric_prefixes: GENERATION_METRICS,
            qualifier_column: Some("NUCLEAR UNIT ID"),
            fuel_code_column: Some("REPORTED FUEL TYPE CODE"),
            prime_mover_column: Some("REPORTED PRIME MOVER"),
            mer_code_column: Some("MER FUEL TYPE CODE"),
            labels: &[Label::EnergyType, Label::PrimeMover],
        }
    }

    /// Generation schema whose sensor names also carry the MER fuel type.
    pub fn generation_with_mer() -> Self {
        Self {
            required_columns: &[
                PLANT_ID,
                YEAR,
                "REPORTED FUEL TYPE CODE",
                "REPORTED PRIME MOVER",
                "MER FUEL TYPE CODE",
            ],
            labels: &[Label::EnergyType, Label::PrimeMover, Label::MerFuelType],
            ..Self::generation()
        }
    }

    pub fn generator_status() -> Self {
        Self {
            kind: DatasetKind::GeneratorStatus,
            name: "generator_status",
            policy: ReconcilePolicy::Snapshot,
            entity_column: PLANT_ID,
            sub_unit_column: Some(GENERATOR_ID),
            year_column: None,
            required_columns: &[PLANT_ID, GENERATOR_ID, "PLANT NAME"],
            metadata_columns: STATUS_METADATA,
            entity_columns: STATUS_ENTITY,
            ignored_columns: &[],
            ignored_prefixes: &[],
            metric_prefixes: &[],
            qualifier_column: None,
            fuel_code_column: Some("ENERGY SOURCE CODE"),
            prime_mover_column: Some("PRIME MOVER CODE"),
            mer_code_column: None,
            labels: &[],
        }
    }

    pub fn for_kind(kind: DatasetKind, mer_labels: bool) -> Self {
        match kind {
            DatasetKind::Generation if mer_labels => Self::generation_with_mer(),
            DatasetKind::Generation => Self::generation(),
            DatasetKind::GeneratorStatus => Self::generator_status(),
        }
    }

    pub fn classify<'a>(&self, column: &'a str) -> ColumnRole<'a> {
        if self.metadata_columns.contains(&column) {
            return ColumnRole::Metadata;
        }
        if self.ignored_columns.contains(&column)
            || self.ignored_prefixes.iter().any(|p| column.starts_with(p))
        {
            return ColumnRole::Ignored;
        }
        let Some((prefix, month)) = column.rsplit_once(' ') else {
            return ColumnRole::Unrecognized;
        };
        match self.metric_prefixes.iter().find(|m| m.prefix == prefix) {
            Some(metric) => match metric.common_name {
                Some(common_name) => ColumnRole::Metric {
                    prefix: metric.prefix,
                    common_name,
                    month,
                },
                None => ColumnRole::Ignored,
            },
            None => ColumnRole::Unrecognized,
        }
    }
}
