use super::error::SlotFormatError;
use chrono::{NaiveDate, NaiveTime, Weekday};

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date(input: &str) -> Result<NaiveDate, SlotFormatError> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").map_err(|_| SlotFormatError::InvalidDate {
        input: input.to_string(),
    })
}

/// Parses a 24-hour `HH:MM` time.
pub fn parse_time(input: &str) -> Result<NaiveTime, SlotFormatError> {
    NaiveTime::parse_from_str(input.trim(), "%H:%M").map_err(|_| SlotFormatError::InvalidTime {
        input: input.to_string(),
    })
}

/// Parses a weekday name, case-insensitive (`monday`, `Monday`, `mon`).
pub fn parse_weekday(input: &str) -> Result<Weekday, SlotFormatError> {
    input
        .trim()
        .parse::<Weekday>()
        .map_err(|_| SlotFormatError::InvalidWeekday {
            input: input.to_string(),
        })
}

/// Parses the date and start time of a requested slot.
pub fn parse_slot(date: &str, start_time: &str) -> Result<(NaiveDate, NaiveTime), SlotFormatError> {
    Ok((parse_date(date)?, parse_time(start_time)?))
}
