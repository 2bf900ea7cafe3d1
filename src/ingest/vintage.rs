//! Vintage identifiers parsed from extract file names.
//!
//! Two encodings are understood:
//!  - `<month>_generator<year>` (status workbooks, e.g. `april_generator2024`)
//!  - `<prefix>_<sequence>_<year>` (revised releases, e.g.
//!    `EIA923_Schedules_2_3_4_5_M_06_2025_21AUG2025`)
//!
//! A CSV per sheet may append `__<sheet>` to the workbook stem.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use crate::error::{PipelineError, Result};

static REPORT_PERIOD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(january|february|march|april|may|june|july|august|september|october|november|december)[_ ]generator[_ ]?(\d{4})",
    )
    .expect("valid report period regex")
});

static RELEASE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"_(\d{1,2})_((?:19|20)\d{2})(?:[_.\s]|$)").expect("valid release regex")
});

/// Which sheet of a status workbook an extract came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SheetKind {
    Operating,
    Planned,
    OperatingPr,
    PlannedPr,
    Canceled,
    Retired,
    RetiredPr,
}

impl SheetKind {
    pub fn parse(s: &str) -> Option<Self> {
        let key = s.trim().to_lowercase().replace([' ', '-'], "_");
        match key.as_str() {
            "operating" | "op" => Some(SheetKind::Operating),
            "planned" => Some(SheetKind::Planned),
            "operating_pr" | "op_pr" => Some(SheetKind::OperatingPr),
            "planned_pr" => Some(SheetKind::PlannedPr),
            "canceled_or_postponed" | "canceled" | "cancel" => Some(SheetKind::Canceled),
            "retired" => Some(SheetKind::Retired),
            "retired_pr" => Some(SheetKind::RetiredPr),
            _ => None,
        }
    }

    pub fn is_retired(&self) -> bool {
        matches!(self, SheetKind::Retired | SheetKind::RetiredPr)
    }
}

/// Release token: the sequence number and the year it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Release {
    pub sequence: u32,
    pub year: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VintageId {
    /// Source file name, as given.
    pub file: String,
    /// File stem without any `__<sheet>` suffix.
    pub workbook: String,
    pub sheet: Option<SheetKind>,
    pub report_year: Option<i32>,
    pub report_month: Option<u32>,
    pub release: Option<Release>,
}

impl VintageId {
    pub fn from_file_name(file_name: &str) -> Self {
        let stem = Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name);
        let (workbook, sheet) = match stem.split_once("__") {
            Some((wb, sheet)) => (wb, SheetKind::parse(sheet)),
            None => (stem, None),
        };

        let (report_year, report_month) = REPORT_PERIOD_RE
            .captures(workbook)
            .map(|caps| {
                let month = crate::ingest::utils::parse_month_token(&caps[1]);
                (caps[2].parse::<i32>().ok(), month)
            })
            .unwrap_or((None, None));

        let release = RELEASE_RE
            .captures_iter(workbook)
            .filter_map(|caps| {
                Some(Release {
                    sequence: caps[1].parse().ok()?,
                    year: caps[2].parse().ok()?,
                })
            })
            .last();

        Self {
            file: file_name.to_string(),
            workbook: workbook.to_string(),
            sheet,
            report_year: report_year.or(release.map(|r| r.year)),
            report_month,
            release,
        }
    }

    /// First day of the embedded report month.
    pub fn report_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.report_year?, self.report_month?, 1)
    }

    /// Release sequence for `year`, or a vintage error when the file name
    /// does not carry a `<prefix>_<sequence>_<year>` token for that year.
    pub fn release_sequence_for(&self, year: i32) -> Result<u32> {
        match self.release {
            Some(release) if release.year == year => Ok(release.sequence),
            Some(release) => Err(PipelineError::Vintage {
                file: self.file.clone(),
                reason: format!(
                    "release token names year {} but rows claim {}",
                    release.year, year
                ),
            }),
            None => Err(PipelineError::Vintage {
                file: self.file.clone(),
                reason: format!("no `<prefix>_<sequence>_{}` release token", year),
            }),
        }
    }
}
