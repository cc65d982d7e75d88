// 📅 Dates and billing windows
//
// Dates travel as YYYYMMDD integers. Day counts are taken straight from the
// integer encoding (`end - start + 1`), not from the calendar.

use crate::error::{LedgerError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whole-day date encoded as YYYYMMDD
pub type Ymd = u32;

/// Lifecycle sentinel: component still installed / fuelcell still in service
pub const STILL_ACTIVE: Ymd = 0;

/// Parse a YYYYMMDD string into its integer form.
///
/// Rejects anything that is not exactly eight ASCII digits naming a real
/// calendar day.
pub fn parse_ymd(field: &'static str, raw: &str) -> Result<Ymd> {
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(LedgerError::validation(
            field,
            raw,
            "expected an 8-digit YYYYMMDD date",
        ));
    }

    let value: Ymd = raw
        .parse()
        .map_err(|_| LedgerError::validation(field, raw, "not a base-10 integer"))?;

    if !is_calendar_date(value) {
        return Err(LedgerError::validation(field, raw, "not a calendar date"));
    }

    Ok(value)
}

pub fn is_calendar_date(value: Ymd) -> bool {
    to_naive_date(value).is_some()
}

pub fn to_naive_date(value: Ymd) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt((value / 10_000) as i32, (value / 100) % 100, value % 100)
}

// ============================================================================
// WINDOW
// ============================================================================

/// Inclusive `[start, end]` date range a bill covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: Ymd,
    pub end: Ymd,
}

impl Window {
    pub fn new(start: Ymd, end: Ymd) -> Result<Self> {
        for (field, value) in [("start_date", start), ("end_date", end)] {
            if !is_calendar_date(value) {
                return Err(LedgerError::validation(
                    field,
                    value.to_string(),
                    "not a calendar date",
                ));
            }
        }

        if start > end {
            return Err(LedgerError::validation(
                "end_date",
                end.to_string(),
                format!("window ends before it starts ({})", start),
            ));
        }

        Ok(Window { start, end })
    }

    /// Parse both window boundaries from their string form
    pub fn parse(start_date: &str, end_date: &str) -> Result<Self> {
        let start = parse_ymd("start_date", start_date)?;
        let end = parse_ymd("end_date", end_date)?;
        Window::new(start, end)
    }

    /// Days charged for the window, both boundaries counted
    pub fn billable_days(&self) -> u32 {
        self.end - self.start + 1
    }

    /// Strictly between the boundaries; boundary dates are outside
    pub fn strictly_contains(&self, date: Ymd) -> bool {
        self.start < date && date < self.end
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    #[test]
    fn test_parse_ymd() {
        assert_eq!(parse_ymd("date", "20210131").unwrap(), 20210131);

        for bad in ["2021013", "2021-01-31", "abcdefgh", "20210231", "", " 20210131"] {
            let err = parse_ymd("date", bad).unwrap_err();
            assert_eq!(err.category(), ErrorCategory::Validation, "{:?}", bad);
        }
    }

    #[test]
    fn test_window_rejects_inverted_range() {
        let err = Window::parse("20210201", "20210101").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);

        let single_day = Window::parse("20210101", "20210101").unwrap();
        assert_eq!(single_day.billable_days(), 1);
    }

    #[test]
    fn test_billable_days_use_integer_encoding() {
        let january = Window::parse("20210101", "20210131").unwrap();
        assert_eq!(january.billable_days(), 31);

        // Crossing a month boundary counts encoded integers, not calendar days
        let straddle = Window::parse("20210115", "20210215").unwrap();
        assert_eq!(straddle.billable_days(), 101);
    }

    #[test]
    fn test_strictly_contains_excludes_boundaries() {
        let window = Window::new(20210101, 20210131).unwrap();
        assert!(!window.strictly_contains(20210101));
        assert!(window.strictly_contains(20210102));
        assert!(window.strictly_contains(20210130));
        assert!(!window.strictly_contains(20210131));
    }

    #[test]
    fn test_leap_days() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(to_naive_date(20240229), Some(date));
        assert_eq!(to_naive_date(20230229), None);
    }
}
