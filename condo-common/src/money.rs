//! Money helpers
//!
//! All amounts are integer cents. Parsing never goes through floating point.

use crate::{Error, Result};

/// Parse a human-entered amount into cents.
///
/// Accepts an optional leading `$`, thousands separators (`,`) and up to
/// two decimal places. Negative amounts are rejected.
///
/// ```
/// use condo_common::money::parse_cents;
///
/// assert_eq!(parse_cents("1,234.5").unwrap(), 123_450);
/// assert_eq!(parse_cents("$12").unwrap(), 1_200);
/// assert!(parse_cents("1.234").is_err());
/// ```
pub fn parse_cents(input: &str) -> Result<i64> {
    let trimmed = input.trim();
    let unsigned = trimmed.strip_prefix('$').unwrap_or(trimmed).trim();

    if unsigned.is_empty() {
        return Err(Error::InvalidInput("Empty amount".to_string()));
    }
    if unsigned.starts_with('-') {
        return Err(Error::InvalidInput(format!("Negative amount: {}", input)));
    }

    let cleaned: String = unsigned.chars().filter(|c| *c != ',').collect();
    let (whole, fraction) = match cleaned.split_once('.') {
        Some((w, f)) => (w, f),
        None => (cleaned.as_str(), ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(Error::InvalidInput(format!("Invalid amount: {}", input)));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::InvalidInput(format!("Invalid amount: {}", input)));
    }
    if fraction.len() > 2 {
        return Err(Error::InvalidInput(format!(
            "Amount has more than two decimal places: {}",
            input
        )));
    }

    let whole_value: i64 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|_| Error::InvalidInput(format!("Amount out of range: {}", input)))?
    };
    let fraction_value: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().unwrap_or(0) * 10,
        _ => fraction.parse::<i64>().unwrap_or(0),
    };

    whole_value
        .checked_mul(100)
        .and_then(|v| v.checked_add(fraction_value))
        .ok_or_else(|| Error::InvalidInput(format!("Amount out of range: {}", input)))
}

/// Format cents as a plain decimal string (`-12.05`, `1234.00`).
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Largest amount a single record may carry (one trillion)
///
/// Keeps yearly expectations and report totals far inside `i64`.
pub const MAX_AMOUNT_CENTS: i64 = 100_000_000_000_000;

fn require_in_range(field: &str, cents: i64) -> Result<()> {
    if cents > MAX_AMOUNT_CENTS {
        return Err(Error::InvalidInput(format!(
            "{} must not exceed {} (got {})",
            field, MAX_AMOUNT_CENTS, cents
        )));
    }
    Ok(())
}

/// Validate that an amount is strictly positive
pub fn require_positive(field: &str, cents: i64) -> Result<()> {
    if cents <= 0 {
        return Err(Error::InvalidInput(format!(
            "{} must be greater than zero (got {})",
            field, cents
        )));
    }
    require_in_range(field, cents)
}

/// Validate that an amount is zero or positive
pub fn require_non_negative(field: &str, cents: i64) -> Result<()> {
    if cents < 0 {
        return Err(Error::InvalidInput(format!(
            "{} must not be negative (got {})",
            field, cents
        )));
    }
    require_in_range(field, cents)
}

fn out_of_range() -> Error {
    Error::InvalidInput("Total exceeds the supported amount range".to_string())
}

/// Sum amounts, failing instead of overflowing
pub fn checked_total<I: IntoIterator<Item = i64>>(amounts: I) -> Result<i64> {
    amounts
        .into_iter()
        .try_fold(0i64, |acc, cents| acc.checked_add(cents))
        .ok_or_else(out_of_range)
}

/// `a - b`, failing instead of overflowing
pub fn checked_diff(a: i64, b: i64) -> Result<i64> {
    a.checked_sub(b).ok_or_else(out_of_range)
}

/// `cents * count`, failing instead of overflowing
pub fn checked_times(cents: i64, count: u32) -> Result<i64> {
    cents.checked_mul(i64::from(count)).ok_or_else(out_of_range)
}
