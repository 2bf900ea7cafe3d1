//! Static code → description tables, loaded once before processing starts.

use anyhow::{anyhow, Context, Result};
use csv::ReaderBuilder;
use std::{collections::HashMap, fs, path::Path};
use tracing::{info, warn};

pub const FUEL_CODES_FILE: &str = "eia_energy_code_key.csv";
pub const PRIME_MOVER_CODES_FILE: &str = "Prime_Mover_Codes.csv";
pub const MER_CODES_FILE: &str = "mer_fuel_type_codes.csv";
pub const STATE_NAMES_FILE: &str = "state_renamer_dict.json";

/// One coded field's descriptions, plus an optional grouping per code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodeTable {
    descriptions: HashMap<String, String>,
    groups: HashMap<String, String>,
}

impl CodeTable {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            descriptions: pairs
                .into_iter()
                .map(|(k, v)| (k.into().trim().to_string(), v.into()))
                .collect(),
            groups: HashMap::new(),
        }
    }

    pub fn with_groups<I, K, V>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.groups = groups
            .into_iter()
            .map(|(k, v)| (k.into().trim().to_string(), v.into()))
            .collect();
        self
    }

    pub fn describe(&self, code: &str) -> Option<&str> {
        self.descriptions.get(code.trim()).map(String::as_str)
    }

    pub fn group(&self, code: &str) -> Option<&str> {
        self.groups.get(code.trim()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.descriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty()
    }

    /// Load a table from a CSV with named code/description columns. The group
    /// column is read when present; older keys do not carry one.
    pub fn from_csv<P: AsRef<Path>>(
        path: P,
        code_column: &str,
        description_column: &str,
        group_column: Option<&str>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("opening lookup table {}", path.display()))?;
        let headers = rdr.headers()?.clone();
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| anyhow!("{}: missing column `{}`", path.display(), name))
        };
        let code_idx = find(code_column)?;
        let desc_idx = find(description_column)?;
        let group_idx = group_column.and_then(|name| find(name).ok());

        let mut table = CodeTable::default();
        for record in rdr.records() {
            let record = record.with_context(|| format!("reading {}", path.display()))?;
            let code = record.get(code_idx).unwrap_or_default().trim();
            if code.is_empty() {
                continue;
            }
            if let Some(desc) = record.get(desc_idx) {
                table
                    .descriptions
                    .insert(code.to_string(), desc.trim().to_string());
            }
            if let Some(group) = group_idx.and_then(|i| record.get(i)) {
                table.groups.insert(code.to_string(), group.trim().to_string());
            }
        }
        Ok(table)
    }
}

/// Every lookup the pipeline consults. Built once, shared read-only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LookupTables {
    pub fuel: CodeTable,
    pub prime_mover: CodeTable,
    pub mer_fuel: CodeTable,
    pub states: HashMap<String, String>,
}

impl LookupTables {
    /// State name normalization; unmapped values pass through unchanged.
    pub fn normalize_state<'a>(&'a self, raw: &'a str) -> &'a str {
        self.states.get(raw.trim()).map(String::as_str).unwrap_or(raw)
    }

    /// Load all tables from `dir`. Fuel and prime-mover tables are required;
    /// MER codes and state names are optional.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let fuel = CodeTable::from_csv(
            dir.join(FUEL_CODES_FILE),
            "Energy Source Code",
            "Energy Source Description",
            Some("Grouping"),
        )?;
        let prime_mover = CodeTable::from_csv(
            dir.join(PRIME_MOVER_CODES_FILE),
            "Prime Mover Code",
            "Prime Mover Description",
            None,
        )?;

        let mer_path = dir.join(MER_CODES_FILE);
        let mer_fuel = if mer_path.is_file() {
            CodeTable::from_csv(&mer_path, "MER Fuel Type Code", "MER Fuel Type Description", None)?
        } else {
            warn!(path = %mer_path.display(), "no MER fuel type table; MER labels resolve to null");
            CodeTable::default()
        };

        let state_path = dir.join(STATE_NAMES_FILE);
        let states: HashMap<String, String> = if state_path.is_file() {
            let text = fs::read_to_string(&state_path)
                .with_context(|| format!("reading {}", state_path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing {}", state_path.display()))?
        } else {
            HashMap::new()
        };

        info!(
            fuel = fuel.len(),
            prime_mover = prime_mover.len(),
            mer = mer_fuel.len(),
            states = states.len(),
            "lookup tables loaded"
        );
        Ok(Self {
            fuel,
            prime_mover,
            mer_fuel,
            states,
        })
    }
}
