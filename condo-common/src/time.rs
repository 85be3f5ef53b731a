//! Date, period and timestamp utilities

use chrono::{Datelike, NaiveDate, Utc};

use crate::{Error, Result};

/// Get current unix timestamp in seconds
pub fn now_unix() -> i64 {
    Utc::now().timestamp()
}

/// Today's date (UTC)
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Parse a calendar date.
///
/// Accepts ISO `YYYY-MM-DD` and day-first `DD/MM/YYYY`.
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    let trimmed = input.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%d/%m/%Y"))
        .map_err(|_| Error::InvalidInput(format!("Invalid date: {}", input)))
}

/// Accounting period (`YYYY-MM`) containing a date
pub fn period_of(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// Validate and normalize a `YYYY-MM` period
pub fn parse_period(input: &str) -> Result<String> {
    let trimmed = input.trim();
    let invalid = || Error::InvalidInput(format!("Invalid period (expected YYYY-MM): {}", input));

    let (year, month) = trimmed.split_once('-').ok_or_else(invalid)?;
    let digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
    if year.len() != 4 || month.is_empty() || month.len() > 2 || !digits(year) || !digits(month) {
        return Err(invalid());
    }
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }
    Ok(format!("{:04}-{:02}", year, month))
}

/// Validate a reporting year
pub fn validate_year(year: i32) -> Result<i32> {
    if !(1900..=2999).contains(&year) {
        return Err(Error::InvalidInput(format!("Year out of range: {}", year)));
    }
    Ok(year)
}

/// The twelve `YYYY-MM` periods of a year, in order
pub fn month_periods(year: i32) -> Vec<String> {
    (1..=12).map(|m| format!("{:04}-{:02}", year, m)).collect()
}
