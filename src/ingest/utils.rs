/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Empty cells and the `.` placeholder mean "no value".
pub fn is_sentinel(raw: &str) -> bool {
    let cleaned = clean_str(raw);
    cleaned.is_empty() || cleaned == "."
}

/// Parse a metric cell into a finite number, tolerating thousands separators.
pub fn parse_value(raw: &str) -> Option<f64> {
    if is_sentinel(raw) {
        return None;
    }
    clean_str(raw)
        .replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Spreadsheet exports turn integer ids into `3.0`; fold those back to `3`.
pub fn clean_id(raw: &str) -> Option<String> {
    if is_sentinel(raw) {
        return None;
    }
    let cleaned = clean_str(raw);
    match cleaned.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && v.abs() < 1e15 && cleaned.contains('.') => {
            Some(format!("{}", v as i64))
        }
        _ => Some(cleaned),
    }
}

pub fn parse_year(raw: &str) -> Option<i32> {
    let id = clean_id(raw)?;
    id.parse::<i32>().ok().filter(|y| (1900..=2100).contains(y))
}

pub fn parse_month_number(raw: &str) -> Option<u32> {
    clean_id(raw)?.parse::<u32>().ok().filter(|m| (1..=12).contains(m))
}

const MONTH_CODES: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// `JAN`..`DEC` (or a full month name) → 1..=12.
pub fn parse_month_token(token: &str) -> Option<u32> {
    let upper = token.trim().to_uppercase();
    let code = upper.get(..3)?;
    let month = MONTH_CODES.iter().position(|m| *m == code)? as u32 + 1;
    let full = chrono::Month::try_from(month as u8).ok()?.name().to_uppercase();
    (upper.len() == 3 || full == upper).then_some(month)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels() {
        assert!(is_sentinel(""));
        assert!(is_sentinel("  .  "));
        assert!(is_sentinel("\".\""));
        assert!(!is_sentinel("0"));
    }

    #[test]
    fn values_and_ids() {
        assert_eq!(parse_value("1,234.5"), Some(1234.5));
        assert_eq!(parse_value(" -12 "), Some(-12.0));
        assert_eq!(parse_value("NaN"), None);
        assert_eq!(parse_value("n/a"), None);
        assert_eq!(clean_id("3.0").as_deref(), Some("3"));
        assert_eq!(clean_id("GEN1").as_deref(), Some("GEN1"));
        assert_eq!(clean_id("."), None);
        assert_eq!(parse_year("2024.0"), Some(2024));
        assert_eq!(parse_year("."), None);
    }

    #[test]
    fn month_tokens() {
        assert_eq!(parse_month_token("JAN"), Some(1));
        assert_eq!(parse_month_token("sep"), Some(9));
        assert_eq!(parse_month_token("DECEMBER"), Some(12));
        assert_eq!(parse_month_token("."), None);
        assert_eq!(parse_month_token("JANX"), None);
        assert_eq!(parse_month_token("PER"), None);
    }
}
