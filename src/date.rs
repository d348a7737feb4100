//! The fixed RCS timestamp format.
//!
//! Archive dates are dot-separated `YYYY.MM.DD.hh.mm.ss` strings.
//! Old writers truncated the year to two digits; those are accepted
//! and expanded with the usual pivot (00 through 68 land in the
//! 2000s).  The model keeps the lexical string it parsed, so
//! truncated dates survive a round trip untouched; conversion to a
//! real timestamp happens here, on demand.

use chrono::NaiveDateTime;

use crate::errors::ParseError;

pub const TIMESTAMP_FORMAT: &str = "%Y.%m.%d.%H.%M.%S";

/// Last two-digit year mapped into the 2000s.
const PIVOT: u32 = 68;

/// Whether the year component was written with one or two digits.
pub fn is_truncated_year(value: &str) -> bool {
    match value.split('.').next() {
        Some(year) => !year.is_empty() && year.len() <= 2,
        None => false,
    }
}

/// Expand a one- or two-digit year to the century the pivot implies.
pub fn expand_year(year: u32) -> u32 {
    if year <= PIVOT {
        2000 + year
    } else {
        1900 + year
    }
}

/// Rewrite a truncated-year timestamp with the full year.  Returns
/// `None` when the year is already full length.
pub fn expand_truncated(value: &str) -> Option<String> {
    if !is_truncated_year(value) {
        return None;
    }
    let dot = value.find('.')?;
    let year: u32 = value[..dot].parse().ok()?;
    Some(format!("{}{}", expand_year(year), &value[dot..]))
}

/// Parse an archive timestamp, truncated or not.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, ParseError> {
    let expanded = expand_truncated(value);
    let full = expanded.as_deref().unwrap_or(value);
    NaiveDateTime::parse_from_str(full, TIMESTAMP_FORMAT).map_err(|_| ParseError::InvalidTimestamp {
        value: value.to_string(),
    })
}

pub fn format_timestamp(at: &NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}
