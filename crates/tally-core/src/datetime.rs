//! Permissive date/time parsing
//!
//! Accepts the date and timestamp spellings commonly found in exported
//! tabular data. Values carrying a UTC offset are normalized to UTC; values
//! without one are taken as-is.

use crate::error::{CoerceResult, CoercionError};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Formats with an explicit offset
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

/// Date + time formats without offset
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S%.f",
    "%d/%m/%Y %H:%M",
    "%B %d, %Y %H:%M:%S%.f",
    "%B %d %Y %H:%M:%S%.f",
    "%d %B %Y %H:%M:%S%.f",
    "%d %B %Y %H:%M",
    "%a %b %d %H:%M:%S %Y",
];

/// Date-only formats, midnight is assumed
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%m-%d-%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
    "%d %B, %Y",
    "%Y-%B-%d",
    "%d-%B-%Y",
    "%A, %B %d, %Y",
];

/// Parse a date or timestamp from text
///
/// # Example
/// ```rust
/// use tally_core::datetime::parse_datetime;
///
/// let dt = parse_datetime("2024-03-05 10:30").unwrap();
/// assert_eq!(dt.to_string(), "2024-03-05 10:30:00");
///
/// let d = parse_datetime("March 5, 2024").unwrap();
/// assert_eq!(d.to_string(), "2024-03-05 00:00:00");
/// ```
pub fn parse_datetime(text: &str) -> CoerceResult<NaiveDateTime> {
    let s = text.trim();
    if s.is_empty() {
        return Err(CoercionError::InvalidDateTime(text.to_string()));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Ok(dt.naive_utc());
    }

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Ok(dt.naive_utc());
        }
    }

    // Trailing "Z" without offset digits
    let naive_text = s.strip_suffix('Z').unwrap_or(s);
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive_text, fmt) {
            return Ok(dt);
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(midnight(date));
        }
    }

    // Compact YYYYMMDD
    if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
        let year = s[..4].parse().ok();
        let month = s[4..6].parse().ok();
        let day = s[6..].parse().ok();
        if let (Some(y), Some(m), Some(d)) = (year, month, day) {
            if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
                return Ok(midnight(date));
            }
        }
    }

    Err(CoercionError::InvalidDateTime(text.to_string()))
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(chrono::NaiveTime::MIN)
}
