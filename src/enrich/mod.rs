pub mod lookup;

pub use lookup::{CodeTable, LookupTables};

use std::sync::Arc;

use crate::ingest::EntityRecord;
use crate::schema::{DatasetSchema, Label};

/// Resolved descriptions for one record's coded fields. `None` means the
/// code was missing or not in the table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct EnrichmentLabels {
    pub energy_type: Option<String>,
    pub prime_mover: Option<String>,
    pub mer_fuel_type: Option<String>,
}

impl EnrichmentLabels {
    pub fn get(&self, label: Label) -> Option<&str> {
        match label {
            Label::EnergyType => self.energy_type.as_deref(),
            Label::PrimeMover => self.prime_mover.as_deref(),
            Label::MerFuelType => self.mer_fuel_type.as_deref(),
        }
    }
}

/// Maps coded columns through the shared lookup tables.
#[derive(Debug, Clone)]
pub struct CodeEnricher {
    tables: Arc<LookupTables>,
}

impl CodeEnricher {
    pub fn new(tables: Arc<LookupTables>) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &LookupTables {
        &self.tables
    }

    pub fn enrich(&self, record: &EntityRecord, schema: &DatasetSchema) -> EnrichmentLabels {
        let resolve = |column: Option<&str>, table: &CodeTable| {
            column
                .and_then(|c| record.get(c))
                .and_then(|code| table.describe(code))
                .map(str::to_string)
        };
        EnrichmentLabels {
            energy_type: resolve(schema.fuel_code_column, &self.tables.fuel),
            prime_mover: resolve(schema.prime_mover_column, &self.tables.prime_mover),
            mer_fuel_type: resolve(schema.mer_code_column, &self.tables.mer_fuel),
        }
    }
}
