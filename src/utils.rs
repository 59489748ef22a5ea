//! Shared calendar and file-name helpers for the gap filler
use chrono::NaiveDate;
use regex::Regex;

use crate::gap_fill::GapFillError;

/// Extract the target year from an uploaded file name
///
/// The year is the first run of four consecutive digits anywhere in the name,
/// so "rain_2019_data.xlsx" and "2019.xlsx" both give 2019. Names without such
/// a run are rejected and the user has to rename the file.
///
/// # Examples
///
/// ```
/// use rainfall_gap_filler::utils::extract_year_from_filename;
///
/// assert_eq!(extract_year_from_filename("rain_2019_data.xlsx").unwrap(), 2019);
/// assert_eq!(extract_year_from_filename("RF2020-stations.xlsx").unwrap(), 2020);
/// assert!(extract_year_from_filename("rain.xlsx").is_err());
/// ```
pub fn extract_year_from_filename(file_name: &str) -> Result<i32, GapFillError> {
    Regex::new(r"[0-9]{4}")
        .ok()
        .and_then(|re| re.find(file_name))
        .and_then(|m| m.as_str().parse::<i32>().ok())
        .ok_or_else(|| GapFillError::YearNotFound(file_name.to_string()))
}

/// Gregorian leap year rule
pub fn is_leap_year(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

pub fn days_in_year(year: i32) -> usize {
    if is_leap_year(year) {
        366
    } else {
        365
    }
}

/// Every calendar date from Jan 1 to Dec 31 of `year`, ascending
pub fn calendar_year_dates(year: i32) -> Result<Vec<NaiveDate>, GapFillError> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1).ok_or(GapFillError::InvalidYear(year))?;
    let dates: Vec<NaiveDate> = start.iter_days().take(days_in_year(year)).collect();
    if dates.len() != days_in_year(year) {
        return Err(GapFillError::InvalidYear(year));
    }
    Ok(dates)
}

/// Percentage of expected place-days with no observation
///
/// Zero counted places yields 0 rather than dividing by zero.
pub fn missing_percentage(total_missing_days: usize, place_count: usize, year: i32) -> f64 {
    let expected = place_count * days_in_year(year);
    if expected == 0 {
        return 0.0;
    }
    100.0 * total_missing_days as f64 / expected as f64
}
