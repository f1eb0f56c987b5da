//! Error types for slot parsing and slot validation.

use chrono::Weekday;
use serde::Serialize;
use thiserror::Error;

/// Business-rule rejections produced by slot validation.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SlotRejection {
    /// The requested date is strictly before today
    #[error("past date")]
    PastDate,

    /// The counsellor has no schedule entry for that weekday
    #[error("not available that day")]
    NotAvailableThatDay {
        #[serde(serialize_with = "super::serialize_weekday")]
        day: Weekday,
    },

    /// The slot starts before or ends after the working hours for that day
    #[error("outside working hours")]
    OutsideWorkingHours,

    /// Another active appointment occupies the slot
    #[error("slot already booked")]
    SlotAlreadyBooked,
}

impl SlotRejection {
    /// Human readable message shown to the person requesting the slot.
    pub fn user_message(&self) -> String {
        match self {
            SlotRejection::PastDate => "Cannot schedule appointments in the past".to_string(),
            SlotRejection::NotAvailableThatDay { day } => {
                format!("Counsellor is not available on {}", super::weekday_name(*day))
            }
            SlotRejection::OutsideWorkingHours => {
                "Selected time is outside counsellor's working hours".to_string()
            }
            SlotRejection::SlotAlreadyBooked => {
                "This time slot is already booked. Please choose another time.".to_string()
            }
        }
    }
}

/// Malformed date or time input. Distinct from [`SlotRejection`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SlotFormatError {
    #[error("invalid date '{input}', expected YYYY-MM-DD")]
    InvalidDate { input: String },

    #[error("invalid time '{input}', expected HH:MM")]
    InvalidTime { input: String },

    #[error("unknown day of week '{input}'")]
    InvalidWeekday { input: String },
}
