use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::db::NewEvent;
use crate::error::PortalError;
use crate::notify::PortalEvent;
use crate::scheduling::{parse_date, parse_time};
use crate::server::middleware::role_validator::Actor;
use crate::server::util::{optional, required};
use crate::types::PortalState;

#[derive(Debug, Deserialize)]
pub struct EventBody {
    pub title: String,
    pub description: Option<String>,
    pub event_type: String,
    pub event_date: String,
    pub start_time: String,
    pub end_time: String,
    /// Absent for online events
    pub location: Option<String>,
    pub capacity: Option<i64>,
}

/// GET /events
pub async fn get_public_events(State(s): State<Arc<PortalState>>) -> Response {
    info!("GET /events");

    match s.db.upcoming_events() {
        Ok(events) => (StatusCode::OK, Json(events)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /student/events
pub async fn get_student_events(
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
) -> Response {
    info!("GET /student/events ({actor})");

    match s.db.student_events(actor.id) {
        Ok(events) => (StatusCode::OK, Json(events)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /student/events/:id/register
pub async fn post_register(
    Path(event_id): Path<i64>,
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
) -> Response {
    info!("POST /student/events/{event_id}/register ({actor})");

    match s.db.register_for_event(event_id, actor.id) {
        Ok(event) => {
            s.publish(PortalEvent::EventRegistered {
                event: event.clone(),
                student_id: actor.id,
            });
            (StatusCode::CREATED, Json(event)).into_response()
        }
        Err(e) => e.into_response(),
    }
}

fn create(s: &PortalState, body: EventBody) -> Result<Response, PortalError> {
    let event = s.db.insert_event(&NewEvent {
        title: required("Title", &body.title)?,
        description: optional(body.description),
        event_type: required("Event type", &body.event_type)?,
        event_date: parse_date(&body.event_date)?,
        start_time: parse_time(&body.start_time)?,
        end_time: parse_time(&body.end_time)?,
        location: optional(body.location),
        capacity: body.capacity,
    })?;
    info!("Created event {} on {}", event.event_id, event.event_date);
    Ok((StatusCode::CREATED, Json(event)).into_response())
}

/// POST /admin/events
pub async fn post_event(
    State(s): State<Arc<PortalState>>,
    Json(body): Json<EventBody>,
) -> Response {
    info!("POST /admin/events");
    create(&s, body).into_response()
}

/// DELETE /admin/events/:id
pub async fn delete_event(
    Path(event_id): Path<i64>,
    State(s): State<Arc<PortalState>>,
) -> Response {
    info!("DELETE /admin/events/{event_id}");

    match s.db.delete_event(event_id) {
        Ok((event, student_ids)) => {
            let registrations = student_ids.len();
            s.publish(PortalEvent::EventCancelled {
                event: event.clone(),
                student_ids,
            });
            (
                StatusCode::OK,
                Json(json!({ "event": event, "registrations_removed": registrations })),
            )
                .into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// DELETE /admin/events/:id/registrations/:student_id
pub async fn delete_registration(
    Path((event_id, student_id)): Path<(i64, i64)>,
    State(s): State<Arc<PortalState>>,
) -> Response {
    info!("DELETE /admin/events/{event_id}/registrations/{student_id}");

    match s.db.unregister_from_event(event_id, student_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}
