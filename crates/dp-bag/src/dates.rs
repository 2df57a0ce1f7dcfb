//! Date range handling for registry date records.
//!
//! Registry dates are ISO-prefixed strings of varying precision (`1950`,
//! `1950-03`, `1950-03-14`). Because the prefixes share one layout, plain
//! string ordering picks the earliest begin and the latest end without
//! parsing. Normalization then widens the range to whole calendar days.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use dp_core::{Error, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single date record as returned by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRecord {
    /// Record type: `single`, `inclusive`, `bulk`, ...
    pub date_type: String,
    #[serde(default)]
    pub begin: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    /// Free-text rendering of the date, unused for computation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

impl DateRecord {
    /// A `single` record.
    pub fn single(begin: impl Into<String>) -> Self {
        Self {
            date_type: "single".into(),
            begin: Some(begin.into()),
            end: None,
            expression: None,
        }
    }

    /// An `inclusive` range record.
    pub fn range(begin: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            date_type: "inclusive".into(),
            begin: Some(begin.into()),
            end: Some(end.into()),
            expression: None,
        }
    }

    fn is_single(&self) -> bool {
        self.date_type == "single"
    }
}

/// Reduce date records to the earliest begin and the latest end.
///
/// Single records contribute their begin to both ends. Range records without
/// an end (open-ended) contribute their begin as the end.
///
/// # Errors
///
/// Returns [`Error::Precondition`] if there are no records or a record has
/// no begin value.
pub fn compute_date_range(records: &[DateRecord]) -> Result<(String, String)> {
    let mut start: Option<&str> = None;
    let mut end: Option<&str> = None;

    for record in records {
        let begin = record
            .begin
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| {
                Error::Precondition(format!("date record {:?} has no begin value", record))
            })?;

        let record_end = if record.is_single() {
            begin
        } else {
            match record.end.as_deref().filter(|e| !e.trim().is_empty()) {
                Some(e) => e,
                None => {
                    tracing::debug!("Open-ended {} date from {}", record.date_type, begin);
                    begin
                }
            }
        };

        if start.map_or(true, |s| begin < s) {
            start = Some(begin);
        }
        if end.map_or(true, |e| record_end > e) {
            end = Some(record_end);
        }
    }

    match (start, end) {
        (Some(s), Some(e)) => Ok((s.to_string(), e.to_string())),
        _ => Err(Error::Precondition("no date records found".into())),
    }
}

/// A normalized, inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Start date as `YYYY-MM-DD`.
    pub fn start_string(&self) -> String {
        self.start.format(DATE_FORMAT).to_string()
    }

    /// End date as `YYYY-MM-DD`.
    pub fn end_string(&self) -> String {
        self.end.format(DATE_FORMAT).to_string()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.start_string(), self.end_string())
    }
}

/// Widen a raw range into calendar dates.
///
/// The start is the earliest day consistent with its precision. The end is
/// widened: a year becomes December 31, a year-month becomes the last day of
/// that month, a full date passes through.
///
/// # Errors
///
/// Returns [`Error::InvalidDate`] if either value is not an ISO date prefix
/// or the normalized start falls after the end.
pub fn normalize_date_range(raw_start: &str, raw_end: &str) -> Result<DateRange> {
    let start = parse_earliest(raw_start)?;
    let end = parse_latest(raw_end)?;
    if start > end {
        return Err(Error::invalid_date(
            format!("{raw_start}/{raw_end}"),
            "start date falls after end date",
        ));
    }
    Ok(DateRange { start, end })
}

/// Split an ISO prefix into year and optional month/day.
fn components(raw: &str) -> Result<(i32, Option<u32>, Option<u32>)> {
    let value = raw.trim();
    // Timestamps carry a time part after the day; only the date matters.
    let value = match value.len() {
        n if n > 10 => value
            .get(..10)
            .filter(|_| matches!(value.as_bytes()[10], b'T' | b' '))
            .ok_or_else(|| Error::invalid_date(raw, "unrecognized date layout"))?,
        _ => value,
    };

    let parts: Vec<&str> = value.split('-').collect();
    let number = |s: &str, width: usize| -> Result<u32> {
        if s.len() != width || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::invalid_date(raw, "expected YYYY, YYYY-MM or YYYY-MM-DD"));
        }
        s.parse::<u32>()
            .map_err(|e| Error::invalid_date(raw, e.to_string()))
    };

    match parts.as_slice() {
        [y] => Ok((number(y, 4)? as i32, None, None)),
        [y, m] => Ok((number(y, 4)? as i32, Some(number(m, 2)?), None)),
        [y, m, d] => Ok((
            number(y, 4)? as i32,
            Some(number(m, 2)?),
            Some(number(d, 2)?),
        )),
        _ => Err(Error::invalid_date(raw, "expected YYYY, YYYY-MM or YYYY-MM-DD")),
    }
}

fn ymd(raw: &str, year: i32, month: u32, day: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| Error::invalid_date(raw, "not a calendar date"))
}

fn parse_earliest(raw: &str) -> Result<NaiveDate> {
    let (year, month, day) = components(raw)?;
    ymd(raw, year, month.unwrap_or(1), day.unwrap_or(1))
}

fn parse_latest(raw: &str) -> Result<NaiveDate> {
    match components(raw)? {
        (year, None, _) => ymd(raw, year, 12, 31),
        (year, Some(month), None) => {
            let first = ymd(raw, year, month, 1)?;
            Ok(last_day_of_month(first))
        }
        (year, Some(month), Some(day)) => ymd(raw, year, month, day),
    }
}

fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.pred_opt())
        .unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(json: &str) -> Vec<DateRecord> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn single_record() {
        let r = records(r#"[{"date_type": "single", "begin": "1950"}]"#);
        assert_eq!(compute_date_range(&r).unwrap(), ("1950".into(), "1950".into()));
    }

    #[test]
    fn single_range() {
        let r = records(r#"[{"date_type": "inclusive", "begin": "1950", "end": "1969"}]"#);
        assert_eq!(compute_date_range(&r).unwrap(), ("1950".into(), "1969".into()));
    }

    #[test]
    fn multiple_ranges() {
        let r = vec![
            DateRecord::range("1950", "1969"),
            DateRecord::range("1970", "1989"),
        ];
        assert_eq!(compute_date_range(&r).unwrap(), ("1950".into(), "1989".into()));
    }

    #[test]
    fn mixed_single_inside_range() {
        let r = vec![DateRecord::range("1950", "1969"), DateRecord::single("1960")];
        assert_eq!(compute_date_range(&r).unwrap(), ("1950".into(), "1969".into()));
    }

    #[test]
    fn mixed_single_after_end() {
        let r = vec![DateRecord::range("1950", "1969"), DateRecord::single("1980")];
        assert_eq!(compute_date_range(&r).unwrap(), ("1950".into(), "1980".into()));
    }

    #[test]
    fn mixed_single_before_start() {
        let r = vec![DateRecord::single("1940"), DateRecord::range("1950", "1969")];
        assert_eq!(compute_date_range(&r).unwrap(), ("1940".into(), "1969".into()));
    }

    #[test]
    fn open_ended_range_uses_begin() {
        let r = records(r#"[{"date_type": "bulk", "begin": "1975-06"}]"#);
        assert_eq!(
            compute_date_range(&r).unwrap(),
            ("1975-06".into(), "1975-06".into())
        );
    }

    #[test]
    fn empty_records_fail() {
        assert!(compute_date_range(&[]).is_err());
        let r = records(r#"[{"date_type": "single", "expression": "undated"}]"#);
        assert!(compute_date_range(&r).is_err());
    }

    #[test]
    fn normalize_year_only() {
        let range = normalize_date_range("1950", "1969").unwrap();
        assert_eq!(range.start_string(), "1950-01-01");
        assert_eq!(range.end_string(), "1969-12-31");

        let range = normalize_date_range("1950", "1950").unwrap();
        assert_eq!(range.start_string(), "1950-01-01");
        assert_eq!(range.end_string(), "1950-12-31");
    }

    #[test]
    fn normalize_year_month() {
        let range = normalize_date_range("1950-03", "1969-04").unwrap();
        assert_eq!(range.start_string(), "1950-03-01");
        assert_eq!(range.end_string(), "1969-04-30");
    }

    #[test]
    fn normalize_leap_february_and_december() {
        assert_eq!(
            normalize_date_range("1960-02", "1960-02").unwrap().end_string(),
            "1960-02-29"
        );
        assert_eq!(
            normalize_date_range("1961-12", "1961-12").unwrap().end_string(),
            "1961-12-31"
        );
    }

    #[test]
    fn normalize_full_dates_pass_through() {
        let range = normalize_date_range("1950-02-03", "1969-04-05").unwrap();
        assert_eq!(range.start_string(), "1950-02-03");
        assert_eq!(range.end_string(), "1969-04-05");
        assert_eq!(range.to_string(), "1950-02-03/1969-04-05");
    }

    #[test]
    fn normalize_timestamp_keeps_date() {
        let range = normalize_date_range("1950-02-03T10:00:00", "1950-02-04").unwrap();
        assert_eq!(range.start_string(), "1950-02-03");
    }

    #[test]
    fn normalize_rejects_garbage_and_inversion() {
        assert!(normalize_date_range("circa 1950", "1960").is_err());
        assert!(normalize_date_range("1950-13", "1960").is_err());
        assert!(normalize_date_range("1950", "1969-02-30").is_err());
        assert!(normalize_date_range("1970", "1960").is_err());
    }
}
