//! Header canonicalization for schema-drifting extracts.
//!
//! Every vintage spells its headers a little differently: embedded newlines,
//! underscores instead of spaces, mixed case, full month names, `MMBTUJAN`
//! glued tokens and renamed code columns. [`normalize_header`] maps all of
//! them onto one vocabulary.

use std::collections::HashSet;
use tracing::{debug, trace};

/// Ordered `(pattern, replacement)` pairs, applied top to bottom.
///
/// Compound tokens come before the month names they contain so that
/// `MMBTUJANUARY` becomes `MMBTU JANUARY` first and then `MMBTU JAN`.
pub static HEADER_SUBSTITUTIONS: &[(&str, &str)] = &[
    ("MMBTUJAN", "MMBTU JAN"),
    ("MMBTUFEB", "MMBTU FEB"),
    ("MMBTUMAR", "MMBTU MAR"),
    ("MMBTUAPR", "MMBTU APR"),
    ("MMBTUMAY", "MMBTU MAY"),
    ("MMBTUJUN", "MMBTU JUN"),
    ("MMBTUJUL", "MMBTU JUL"),
    ("MMBTUAUG", "MMBTU AUG"),
    ("MMBTUSEP", "MMBTU SEP"),
    ("MMBTUOCT", "MMBTU OCT"),
    ("MMBTUNOV", "MMBTU NOV"),
    ("MMBTUDEC", "MMBTU DEC"),
    ("MMBTUPER", "MMBTU PER"),
    ("MMBTUS", "MMBTU"),
    ("JANUARY", "JAN"),
    ("FEBRUARY", "FEB"),
    ("MARCH", "MAR"),
    ("APRIL", "APR"),
    ("JUNE", "JUN"),
    ("JULY", "JUL"),
    ("AUGUST", "AUG"),
    ("SEPTEMBER", "SEP"),
    ("OCTOBER", "OCT"),
    ("NOVEMBER", "NOV"),
    ("DECEMBER", "DEC"),
    ("ELECTRIC", "ELEC"),
    ("&", "AND"),
    ("AER FUEL TYPE CODE", "MER FUEL TYPE CODE"),
    ("NUCLEAR UNIT I.D.", "NUCLEAR UNIT ID"),
    ("PLANT STATE", "STATE"),
];

/// Markers that identify the header row of a raw sheet.
const HEADER_MARKERS: &[&str] = &["plant id", "entity id"];

/// Canonicalize a single raw header.
///
/// The ordered pass is repeated until the header is stable, since one rule
/// can expose a token for an earlier rule (`MMBTUSJAN` → `MMBTUJAN`).
pub fn normalize_header(raw: &str) -> String {
    let mut header = collapse_whitespace(&raw.replace(['\r', '\n', '_'], " ").to_uppercase());
    for _ in 0..HEADER_SUBSTITUTIONS.len() {
        let next = substitute(&header);
        if next == header {
            break;
        }
        header = next;
    }
    header
}

fn substitute(header: &str) -> String {
    let mut out = header.to_string();
    for (pattern, replacement) in HEADER_SUBSTITUTIONS {
        if out.contains(pattern) {
            out = out.replace(pattern, replacement);
        }
    }
    collapse_whitespace(&out)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonical headers plus the raw column index each one was read from.
///
/// Blank headers and later duplicates are left out, so `source_index` is
/// what callers use to project data rows onto the canonical columns.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedHeaders {
    pub names: Vec<String>,
    pub source_index: Vec<usize>,
}

impl NormalizedHeaders {
    /// Pick the cells of `row` that belong to the kept columns.
    /// Short rows are padded with empty cells.
    pub fn project(&self, row: &[String]) -> Vec<String> {
        self.source_index
            .iter()
            .map(|&i| row.get(i).cloned().unwrap_or_default())
            .collect()
    }
}

/// Normalize a full header row, keeping only the first occurrence of each
/// resulting name.
pub fn normalize_headers(raw: &[String]) -> NormalizedHeaders {
    let mut seen = HashSet::with_capacity(raw.len());
    let mut names = Vec::with_capacity(raw.len());
    let mut source_index = Vec::with_capacity(raw.len());

    for (i, cell) in raw.iter().enumerate() {
        let name = normalize_header(cell);
        if name.is_empty() {
            trace!(column = i, "dropping blank header");
            continue;
        }
        if !seen.insert(name.clone()) {
            debug!(header = %name, column = i, "dropping duplicate header");
            continue;
        }
        names.push(name);
        source_index.push(i);
    }

    NormalizedHeaders {
        names,
        source_index,
    }
}

/// Index of the header row: the first row whose first or second cell is a
/// header marker, compared case-insensitively after trimming.
pub fn locate_header_row(rows: &[Vec<String>]) -> Option<usize> {
    rows.iter().position(|row| {
        row.iter()
            .take(2)
            .any(|cell| HEADER_MARKERS.contains(&cell.trim().to_lowercase().as_str()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn compound_tokens_split_before_months() {
        assert_eq!(normalize_header("Tot_MMBtuJan"), "TOT MMBTU JAN");
        assert_eq!(normalize_header("ELEC MMBTUJANUARY"), "ELEC MMBTU JAN");
        assert_eq!(normalize_header("MMBtuPer_Unit\nJanuary"), "MMBTU PER UNIT JAN");
        assert_eq!(normalize_header("Elec_MMBtus Feb"), "ELEC MMBTU FEB");
        assert_eq!(normalize_header("Netgen\nSeptember"), "NETGEN SEP");
    }

    #[test]
    fn historical_renames_and_whitespace() {
        assert_eq!(normalize_header("AER\nFuel Type Code"), "MER FUEL TYPE CODE");
        assert_eq!(normalize_header("Nuclear Unit I.D."), "NUCLEAR UNIT ID");
        assert_eq!(normalize_header("  Plant  State "), "STATE");
        assert_eq!(
            normalize_header("Combined Heat & Power Plant"),
            "COMBINED HEAT AND POWER PLANT"
        );
        assert_eq!(normalize_header("Electric Fuel"), "ELEC FUEL");
    }

    #[test]
    fn normalization_is_idempotent() {
        let raw = strings(&[
            "Plant Id",
            "Reserved ",
            "AER Fuel Type Code",
            "Tot_MMBtuMar",
            "NETGEN\nDecember",
            "Elec Fuel Consumption\nMMBtus",
            "Combined Heat &\nPower Plant",
            "MMBtuPer_Unit_June",
            "Elec_MMBtusJan",
        ]);
        let once = normalize_headers(&raw);
        let twice = normalize_headers(&once.names);
        assert_eq!(once.names, twice.names);
    }

    #[test]
    fn plural_mmbtu_glued_to_month_is_split() {
        assert_eq!(normalize_header("Elec_MMBtusJan"), "ELEC MMBTU JAN");
        assert_eq!(normalize_header("ELEC MMBTUJAN"), "ELEC MMBTU JAN");
        assert_eq!(normalize_header("Tot_MMBtusDecember"), "TOT MMBTU DEC");
    }

    #[test]
    fn duplicates_keep_first_occurrence() {
        let raw = strings(&["Plant Id", "AER Fuel Type Code", "", "MER_Fuel Type Code", "YEAR"]);
        let headers = normalize_headers(&raw);
        assert_eq!(headers.names, vec!["PLANT ID", "MER FUEL TYPE CODE", "YEAR"]);
        assert_eq!(headers.source_index, vec![0, 1, 4]);

        let row = strings(&["3", "NG", "x", "COL", "2024"]);
        assert_eq!(headers.project(&row), strings(&["3", "NG", "2024"]));
        assert_eq!(headers.project(&strings(&["3"])), strings(&["3", "", ""]));
    }

    #[test]
    fn header_row_found_in_either_leading_column() {
        let rows = vec![
            strings(&["EIA-923 Monthly Generation", ""]),
            strings(&["", ""]),
            strings(&["", "  plant id "]),
            strings(&["", "3"]),
        ];
        assert_eq!(locate_header_row(&rows), Some(2));

        let rows = vec![strings(&["Title"]), strings(&["Entity ID", "Entity Name"])];
        assert_eq!(locate_header_row(&rows), Some(1));

        let rows = vec![strings(&["nothing", "here", "Plant ID"])];
        assert_eq!(locate_header_row(&rows), None);
    }
}
