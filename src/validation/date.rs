use chrono::{Datelike, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;

use crate::utils::VerificationError;

/// Oldest birth year accepted from a card.
pub const MIN_BIRTH_YEAR: i32 = 1900;
/// Newest birth year accepted from a card.
pub const MAX_BIRTH_YEAR: i32 = 2010;

lazy_static! {
    static ref DOB_SHAPE: Regex = Regex::new(r"^([0-9]{1,2})/([0-9]{1,2})/([0-9]{4})$").unwrap();
}

/// Builds a birth date if the components are in range and form a real calendar day.
pub fn birth_date_from_parts(day: u32, month: u32, year: i32) -> Option<NaiveDate> {
    if !(1..=31).contains(&day) || !(1..=12).contains(&month) {
        return None;
    }
    if !(MIN_BIRTH_YEAR..=MAX_BIRTH_YEAR).contains(&year) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parses a `DD/MM/YYYY` date of birth as typed or corrected by the user.
pub fn parse_date_of_birth(date_str: &str) -> Result<NaiveDate, VerificationError> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return Err(VerificationError::InvalidDate(
            "Please enter your date of birth".to_string(),
        ));
    }

    let captures = DOB_SHAPE.captures(trimmed).ok_or_else(|| {
        VerificationError::InvalidDate("Please enter date in DD/MM/YYYY format".to_string())
    })?;

    // The shape regex guarantees short ASCII digit runs.
    let day: u32 = captures[1].parse().unwrap_or(0);
    let month: u32 = captures[2].parse().unwrap_or(0);
    let year: i32 = captures[3].parse().unwrap_or(0);

    let date = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| VerificationError::InvalidDate("Please enter a valid date".to_string()))?;

    if !(MIN_BIRTH_YEAR..=MAX_BIRTH_YEAR).contains(&year) {
        return Err(VerificationError::InvalidDate(format!(
            "Please enter a valid birth year ({}-{})",
            MIN_BIRTH_YEAR, MAX_BIRTH_YEAR
        )));
    }

    Ok(date)
}

pub fn is_valid_date_of_birth(date_str: &str) -> bool {
    parse_date_of_birth(date_str).is_ok()
}

pub fn format_date_of_birth(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Whole years between `date_of_birth` and `today`. Negative when the birth date lies in the future.
pub fn calculate_age(date_of_birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - date_of_birth.year();
    if (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day()) {
        age -= 1;
    }
    age
}
