//! Calendar dates as typed by users: `mm-dd-yyyy`.

use chrono::NaiveDate;

pub const DATE_FORMAT: &str = "%m-%d-%Y";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid date '{0}', expected mm-dd-yyyy")]
pub struct InvalidDate(pub String);

/// Parse `mm-dd-yyyy` into a calendar date.
///
/// Month and day may be written with one or two digits; the year must have
/// four. Dates that do not exist (`02-30-2024`) are rejected.
pub fn parse_date(text: &str) -> Result<NaiveDate, InvalidDate> {
    let invalid = || InvalidDate(text.to_string());

    let parts: Vec<&str> = text.trim().split('-').collect();
    if parts.len() != 3 {
        return Err(invalid());
    }

    let numeric = |s: &str, max_len: usize| {
        !s.is_empty() && s.len() <= max_len && s.bytes().all(|b| b.is_ascii_digit())
    };
    if !numeric(parts[0], 2) || !numeric(parts[1], 2) || parts[2].len() != 4 || !numeric(parts[2], 4) {
        return Err(invalid());
    }

    let month: u32 = parts[0].parse().map_err(|_| invalid())?;
    let day: u32 = parts[1].parse().map_err(|_| invalid())?;
    let year: i32 = parts[2].parse().map_err(|_| invalid())?;

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}
