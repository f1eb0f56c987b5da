use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Weekday;
use serde::Deserialize;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::info;

use crate::error::PortalError;
use crate::scheduling::{parse_time, parse_weekday, weekday_name, DayHours};
use crate::server::middleware::role_validator::Actor;
use crate::types::PortalState;

#[derive(Debug, Deserialize)]
pub struct DayTimes {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleUpdate {
    /// Weekday name to new hours. `null` or blank times remove the day.
    pub days: HashMap<String, Option<DayTimes>>,
}

/// Applies an update on top of the current schedule. Days not mentioned are kept.
fn apply_update(current: Vec<DayHours>, update: ScheduleUpdate) -> Result<Vec<DayHours>, PortalError> {
    let mut by_day: BTreeMap<u32, DayHours> = current
        .into_iter()
        .map(|h| (h.day.num_days_from_monday(), h))
        .collect();

    for (name, times) in update.days {
        let day: Weekday = parse_weekday(&name)?;
        let key = day.num_days_from_monday();

        let (start, end) = match times {
            Some(DayTimes {
                start: Some(start),
                end: Some(end),
            }) if !start.trim().is_empty() && !end.trim().is_empty() => (start, end),
            _ => {
                by_day.remove(&key);
                continue;
            }
        };

        let start = parse_time(&start)?;
        let end = parse_time(&end)?;
        if start >= end {
            return Err(PortalError::invalid(format!(
                "Start time must be before end time for {}",
                weekday_name(day)
            )));
        }
        by_day.insert(key, DayHours { day, start, end });
    }

    Ok(by_day.into_values().collect())
}

/// GET /counsellor/schedule
pub async fn get_schedule(
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
) -> Response {
    info!("GET /counsellor/schedule ({actor})");

    match s.db.get_schedule(actor.id) {
        Ok(hours) => (StatusCode::OK, Json(json!({ "schedule": hours }))).into_response(),
        Err(e) => e.into_response(),
    }
}

/// PUT /counsellor/schedule
pub async fn put_schedule(
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
    Json(update): Json<ScheduleUpdate>,
) -> Response {
    info!("PUT /counsellor/schedule ({actor})");

    match s
        .db
        .update_schedule(actor.id, |current| apply_update(current, update))
    {
        Ok(hours) => (StatusCode::OK, Json(json!({ "schedule": hours }))).into_response(),
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn t(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn update(entries: &[(&str, Option<(&str, &str)>)]) -> ScheduleUpdate {
        ScheduleUpdate {
            days: entries
                .iter()
                .map(|(day, times)| {
                    (
                        day.to_string(),
                        times.map(|(start, end)| DayTimes {
                            start: Some(start.to_string()),
                            end: Some(end.to_string()),
                        }),
                    )
                })
                .collect(),
        }
    }

    fn monday() -> Vec<DayHours> {
        vec![DayHours {
            day: Weekday::Mon,
            start: t(9),
            end: t(17),
        }]
    }

    #[test]
    fn test_adds_and_keeps_days() {
        let hours = apply_update(monday(), update(&[("Friday", Some(("10:00", "12:00")))])).unwrap();
        assert_eq!(hours.len(), 2);
        assert_eq!(hours[0].day, Weekday::Mon);
        assert_eq!(hours[1].end, t(12));
    }

    #[test]
    fn test_null_and_blank_remove_days() {
        assert!(apply_update(monday(), update(&[("Monday", None)]))
            .unwrap()
            .is_empty());
        assert!(apply_update(monday(), update(&[("monday", Some(("", "")))]))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            apply_update(monday(), update(&[("Funday", Some(("09:00", "10:00")))])),
            Err(PortalError::Format(_))
        ));
        assert!(matches!(
            apply_update(monday(), update(&[("Monday", Some(("17:00", "09:00")))])),
            Err(PortalError::InvalidInput { .. })
        ));
        assert!(matches!(
            apply_update(monday(), update(&[("Monday", Some(("9am", "10:00")))])),
            Err(PortalError::Format(_))
        ));
    }
}
