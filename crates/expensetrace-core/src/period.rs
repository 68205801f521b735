//! Report window helpers
//!
//! All windows are expressed in UTC because expense dates are stored as Unix
//! seconds and read back as UTC.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};

use crate::error::{Error, Result};

/// First instant and last second of a calendar month
pub fn month_range(month: u32, year: i32) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| Error::Validation(format!("invalid month {}/{}", month, year)))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| Error::Validation(format!("invalid month {}/{}", month, year)))?;

    Ok((start_of_day(first), start_of_day(next) - Duration::seconds(1)))
}

/// First instant and last second of a calendar year
pub fn year_range(year: i32) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let first = NaiveDate::from_ymd_opt(year, 1, 1)
        .ok_or_else(|| Error::Validation(format!("invalid year {}", year)))?;
    let last = NaiveDate::from_ymd_opt(year, 12, 31)
        .ok_or_else(|| Error::Validation(format!("invalid year {}", year)))?;

    Ok((start_of_day(first), start_of_day(last) + Duration::seconds(86_399)))
}

/// Whole days between the calendar dates of `start` and `end`, never less than one
pub fn calendar_days(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end.date_naive() - start.date_naive()).num_days().max(1)
}

/// Midnight UTC of a date
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

/// Month name and year, e.g. "January 2024"
pub fn month_title(date: DateTime<Utc>) -> String {
    format!("{} {}", date.format("%B"), date.year())
}
