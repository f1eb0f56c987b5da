//! Slot validation for counsellor appointments.
//!
//! A slot is a `(counsellor, date, start time)` tuple with a fixed one hour
//! duration. Validation is a pure function over the counsellor's weekly
//! schedule and the start times already booked on the requested date; the
//! database layer loads both and runs the check inside the booking
//! transaction.

mod error;
mod parse;

pub use error::{SlotFormatError, SlotRejection};
pub use parse::{parse_date, parse_slot, parse_time, parse_weekday};

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use serde::Serialize;

/// Length of every appointment, in minutes.
pub const SLOT_MINUTES: i64 = 60;

/// Working hours for one weekday of a counsellor's recurring schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayHours {
    #[serde(serialize_with = "serialize_weekday")]
    pub day: Weekday,
    #[serde(serialize_with = "crate::db::hhmm::serialize")]
    pub start: NaiveTime,
    #[serde(serialize_with = "crate::db::hhmm::serialize")]
    pub end: NaiveTime,
}

/// A validated slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// Returns the end of a slot starting at `start`, or `None` if it would run
/// past midnight.
pub fn slot_end(start: NaiveTime) -> Option<NaiveTime> {
    let (end, wrapped_secs) = start.overflowing_add_signed(Duration::minutes(SLOT_MINUTES));
    (wrapped_secs == 0).then_some(end)
}

/// Returns true if two fixed-length slots starting at `a` and `b` share any time.
pub fn overlaps(a: NaiveTime, b: NaiveTime) -> bool {
    (a - b).num_minutes().abs() < SLOT_MINUTES
}

/// Checks a requested slot against the counsellor's schedule and bookings.
///
/// # Parameters
/// - `today`: The current date; earlier dates are rejected.
/// - `date`, `start`: The requested slot.
/// - `schedule`: The counsellor's weekly schedule (at most one entry per day).
/// - `booked`: Start times of the counsellor's active appointments on `date`.
///
/// # Returns
/// The slot with its computed end time, or the first rule it breaks.
pub fn validate_slot(
    today: NaiveDate,
    date: NaiveDate,
    start: NaiveTime,
    schedule: &[DayHours],
    booked: &[NaiveTime],
) -> Result<Slot, SlotRejection> {
    if date < today {
        return Err(SlotRejection::PastDate);
    }

    let day = date.weekday();
    let hours = schedule
        .iter()
        .find(|h| h.day == day)
        .ok_or(SlotRejection::NotAvailableThatDay { day })?;

    let end = slot_end(start).ok_or(SlotRejection::OutsideWorkingHours)?;
    if start < hours.start || end > hours.end {
        return Err(SlotRejection::OutsideWorkingHours);
    }

    if booked.iter().any(|&other| overlaps(start, other)) {
        return Err(SlotRejection::SlotAlreadyBooked);
    }

    Ok(Slot { date, start, end })
}

/// Full English weekday name, as stored in the schedule table.
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

pub(crate) fn serialize_weekday<S: serde::Serializer>(day: &Weekday, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(weekday_name(*day))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    // 2030-03-04 is a Monday
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 3, 4).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 3, 1).unwrap()
    }

    fn nine_to_five() -> Vec<DayHours> {
        vec![DayHours {
            day: Weekday::Mon,
            start: t(9, 0),
            end: t(17, 0),
        }]
    }

    #[test]
    fn test_accepts_slot_inside_hours() {
        let slot = validate_slot(today(), monday(), t(10, 0), &nine_to_five(), &[]).unwrap();
        assert_eq!(slot.end, t(11, 0));
    }

    #[test]
    fn test_accepts_last_full_hour() {
        assert!(validate_slot(today(), monday(), t(16, 0), &nine_to_five(), &[]).is_ok());
    }

    #[test]
    fn test_rejects_past_date_before_anything_else() {
        let yesterday = today().pred_opt().unwrap();
        assert_eq!(
            validate_slot(today(), yesterday, t(10, 0), &[], &[t(10, 0)]),
            Err(SlotRejection::PastDate)
        );
    }

    #[test]
    fn test_today_is_not_past() {
        let schedule = vec![DayHours {
            day: today().weekday(),
            start: t(9, 0),
            end: t(17, 0),
        }];
        assert!(validate_slot(today(), today(), t(9, 0), &schedule, &[]).is_ok());
    }

    #[test]
    fn test_rejects_day_without_schedule() {
        let tuesday = monday().succ_opt().unwrap();
        assert_eq!(
            validate_slot(today(), tuesday, t(10, 0), &nine_to_five(), &[]),
            Err(SlotRejection::NotAvailableThatDay { day: Weekday::Tue })
        );
    }

    #[test]
    fn test_rejects_end_past_closing() {
        // 16:30 + 1h = 17:30 > 17:00
        assert_eq!(
            validate_slot(today(), monday(), t(16, 30), &nine_to_five(), &[]),
            Err(SlotRejection::OutsideWorkingHours)
        );
    }

    #[test]
    fn test_rejects_start_before_opening() {
        assert_eq!(
            validate_slot(today(), monday(), t(8, 30), &nine_to_five(), &[]),
            Err(SlotRejection::OutsideWorkingHours)
        );
    }

    #[test]
    fn test_rejects_slot_crossing_midnight() {
        let late = vec![DayHours {
            day: Weekday::Mon,
            start: t(0, 0),
            end: t(23, 59),
        }];
        assert_eq!(
            validate_slot(today(), monday(), t(23, 30), &late, &[]),
            Err(SlotRejection::OutsideWorkingHours)
        );
    }

    #[test]
    fn test_rejects_exact_and_overlapping_bookings() {
        let schedule = nine_to_five();
        assert_eq!(
            validate_slot(today(), monday(), t(10, 0), &schedule, &[t(10, 0)]),
            Err(SlotRejection::SlotAlreadyBooked)
        );
        assert_eq!(
            validate_slot(today(), monday(), t(10, 30), &schedule, &[t(10, 0)]),
            Err(SlotRejection::SlotAlreadyBooked)
        );
        assert!(validate_slot(today(), monday(), t(11, 0), &schedule, &[t(10, 0)]).is_ok());
        assert!(validate_slot(today(), monday(), t(9, 0), &schedule, &[t(10, 0)]).is_ok());
    }

    #[test]
    fn test_slot_end() {
        assert_eq!(slot_end(t(9, 15)), Some(t(10, 15)));
        assert_eq!(slot_end(t(23, 0)), None);
    }

    #[test]
    fn test_weekday_and_time_serialization() {
        assert_eq!(
            serde_json::to_value(nine_to_five()[0]).unwrap(),
            serde_json::json!({ "day": "Monday", "start": "09:00", "end": "17:00" })
        );
        assert_eq!(
            serde_json::to_value(SlotRejection::NotAvailableThatDay { day: Weekday::Sun }).unwrap(),
            serde_json::json!({ "reason": "not_available_that_day", "day": "Sunday" })
        );
    }
}
