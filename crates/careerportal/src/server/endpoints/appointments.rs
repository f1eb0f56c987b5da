use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::db::{AppointmentMode, MeetingPlacement, NewAppointment, NewAppointmentRequest};
use crate::error::PortalError;
use crate::notify::PortalEvent;
use crate::scheduling::parse_slot;
use crate::server::middleware::role_validator::Actor;
use crate::server::types::ApiErrorType;
use crate::server::util::{optional, required};
use crate::types::PortalState;

#[derive(Debug, Deserialize)]
pub struct RequestBody {
    pub appointment_type: String,
    pub preferred_date: String,
    pub preferred_time: String,
    pub mode: AppointmentMode,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RescheduleBody {
    pub date: String,
    pub time: String,
}

#[derive(Debug, Deserialize)]
pub struct SlotQuery {
    pub date: String,
    pub time: String,
}

#[derive(Debug, Deserialize)]
pub struct BookingBody {
    pub student_id: i64,
    pub appointment_type: String,
    pub date: String,
    pub start_time: String,
    pub mode: AppointmentMode,
    pub location: Option<String>,
    pub meeting_link: Option<String>,
    pub notes: Option<String>,
}

/// Emits `SlotRejected` for slot rule failures before handing the error back.
fn report_rejection(
    s: &PortalState,
    err: PortalError,
    counsellor_id: i64,
    student_id: i64,
    date: NaiveDate,
    start: NaiveTime,
) -> PortalError {
    if let PortalError::Slot(rejection) = &err {
        s.publish(PortalEvent::SlotRejected {
            counsellor_id,
            student_id,
            date,
            start,
            rejection: rejection.clone(),
        });
    }
    err
}

fn placement(s: &PortalState) -> MeetingPlacement {
    MeetingPlacement {
        meeting_link: s.config.new_meeting_link(),
        office_location: s.config.office_location.clone(),
    }
}

/// GET /student/appointments
pub async fn get_student_appointments(
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
) -> Response {
    info!("GET /student/appointments ({actor})");

    match s.db.student_appointments(actor.id) {
        Ok(appointments) => (StatusCode::OK, Json(appointments)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /student/appointment_requests
pub async fn get_student_requests(
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
) -> Response {
    info!("GET /student/appointment_requests ({actor})");

    match s.db.student_requests(actor.id) {
        Ok(requests) => (StatusCode::OK, Json(requests)).into_response(),
        Err(e) => e.into_response(),
    }
}

fn check_slot(s: &PortalState, actor: Actor, query: SlotQuery) -> Result<Response, PortalError> {
    let counsellor_id = s
        .db
        .get_student(actor.id)?
        .counsellor_id
        .ok_or_else(|| PortalError::conflict("You have not been assigned a counsellor yet"))?;
    let (date, time) = parse_slot(&query.date, &query.time)?;
    let slot = s.db.validate_slot(counsellor_id, date, time, None)?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "available": true,
            "counsellor_id": counsellor_id,
            "date": slot.date,
            "start_time": slot.start.format("%H:%M").to_string(),
            "end_time": slot.end.format("%H:%M").to_string(),
        })),
    )
        .into_response())
}

/// GET /student/slot_check
pub async fn get_slot_check(
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<SlotQuery>,
) -> Response {
    info!("GET /student/slot_check ({actor})");
    check_slot(&s, actor, query).into_response()
}

fn create_request(s: &PortalState, actor: Actor, body: RequestBody) -> Result<Response, PortalError> {
    let student = s.db.get_student(actor.id)?;
    let counsellor_id = student
        .counsellor_id
        .ok_or_else(|| PortalError::conflict("You have not been assigned a counsellor yet"))?;
    let appointment_type = required("Appointment type", &body.appointment_type)?;
    let (date, time) = parse_slot(&body.preferred_date, &body.preferred_time)?;

    let request = s
        .db
        .insert_request(&NewAppointmentRequest {
            student_id: actor.id,
            counsellor_id,
            appointment_type,
            preferred_date: date,
            preferred_time: time,
            mode: body.mode,
            notes: optional(body.notes),
        })
        .map_err(|e| report_rejection(s, e, counsellor_id, actor.id, date, time))?;

    s.publish(PortalEvent::AppointmentRequested {
        request: request.clone(),
        student_name: student.full_name(),
    });
    Ok((StatusCode::CREATED, Json(request)).into_response())
}

/// POST /student/appointment_requests
pub async fn post_request(
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<RequestBody>,
) -> Response {
    info!("POST /student/appointment_requests ({actor})");
    create_request(&s, actor, body).into_response()
}

/// POST /student/appointment_requests/:id/cancel
pub async fn post_cancel_request(
    Path(request_id): Path<i64>,
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
) -> Response {
    info!("POST /student/appointment_requests/{request_id}/cancel ({actor})");

    match s.db.cancel_request(request_id, actor.id) {
        Ok(request) => {
            s.publish(PortalEvent::RequestCancelled {
                request: request.clone(),
            });
            (StatusCode::OK, Json(request)).into_response()
        }
        Err(e) => e.into_response(),
    }
}

fn reschedule(
    s: &PortalState,
    actor: Actor,
    appointment_id: i64,
    body: RescheduleBody,
) -> Result<Response, PortalError> {
    let (date, time) = parse_slot(&body.date, &body.time)?;
    let current = s.db.get_appointment(appointment_id)?;
    let appointment = s
        .db
        .reschedule_appointment(appointment_id, actor.id, date, time)
        .map_err(|e| report_rejection(s, e, current.counsellor_id, actor.id, date, time))?;

    let student = s.db.get_student(actor.id)?;
    s.publish(PortalEvent::AppointmentRescheduled {
        appointment: appointment.clone(),
        student_name: student.full_name(),
    });
    Ok((StatusCode::OK, Json(appointment)).into_response())
}

/// POST /student/appointments/:id/reschedule
pub async fn post_reschedule(
    Path(appointment_id): Path<i64>,
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<RescheduleBody>,
) -> Response {
    info!("POST /student/appointments/{appointment_id}/reschedule ({actor})");
    reschedule(&s, actor, appointment_id, body).into_response()
}

/// GET /counsellor/appointments
pub async fn get_counsellor_appointments(
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
) -> Response {
    info!("GET /counsellor/appointments ({actor})");

    match s.db.counsellor_appointments(actor.id) {
        Ok(appointments) => (StatusCode::OK, Json(appointments)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /counsellor/appointment_requests
pub async fn get_pending_requests(
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
) -> Response {
    info!("GET /counsellor/appointment_requests ({actor})");

    match s.db.pending_requests(actor.id) {
        Ok(requests) => (StatusCode::OK, Json(requests)).into_response(),
        Err(e) => e.into_response(),
    }
}

fn book(s: &PortalState, actor: Actor, body: BookingBody) -> Result<Response, PortalError> {
    if !s.db.is_assigned(actor.id, body.student_id)? {
        return Err(PortalError::forbidden(
            "You can only schedule appointments with your assigned students",
        ));
    }
    let appointment_type = required("Appointment type", &body.appointment_type)?;
    let (date, time) = parse_slot(&body.date, &body.start_time)?;

    let (location, meeting_link) = match body.mode {
        AppointmentMode::Online => (
            None,
            Some(optional(body.meeting_link).unwrap_or_else(|| s.config.new_meeting_link())),
        ),
        AppointmentMode::Offline => (
            Some(optional(body.location).unwrap_or_else(|| s.config.office_location.clone())),
            None,
        ),
    };

    let appointment = s
        .db
        .book_appointment(&NewAppointment {
            student_id: body.student_id,
            counsellor_id: actor.id,
            appointment_type,
            date,
            start_time: time,
            mode: body.mode,
            location,
            meeting_link,
            notes: optional(body.notes),
        })
        .map_err(|e| report_rejection(s, e, actor.id, body.student_id, date, time))?;

    s.publish(PortalEvent::AppointmentScheduled {
        appointment: appointment.clone(),
    });
    Ok((StatusCode::CREATED, Json(appointment)).into_response())
}

/// POST /counsellor/appointments
pub async fn post_book_appointment(
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<BookingBody>,
) -> Response {
    info!("POST /counsellor/appointments ({actor})");
    book(&s, actor, body).into_response()
}

/// POST /counsellor/appointments/:id/complete
pub async fn post_complete_appointment(
    Path(appointment_id): Path<i64>,
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
) -> Response {
    info!("POST /counsellor/appointments/{appointment_id}/complete ({actor})");

    match s.db.complete_appointment(appointment_id, actor.id) {
        Ok(appointment) => {
            s.publish(PortalEvent::AppointmentCompleted {
                appointment: appointment.clone(),
            });
            (StatusCode::OK, Json(appointment)).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Approves a request. `counsellor_id` is `None` when an admin acts.
fn approve(
    s: &PortalState,
    request_id: i64,
    counsellor_id: Option<i64>,
) -> Result<Response, PortalError> {
    let pending = s.db.get_request(request_id)?;
    let (request, appointment) = s
        .db
        .approve_request(request_id, counsellor_id, &placement(s))
        .map_err(|e| {
            report_rejection(
                s,
                e,
                pending.counsellor_id,
                pending.student_id,
                pending.preferred_date,
                pending.preferred_time,
            )
        })?;

    s.publish(PortalEvent::RequestApproved {
        request: request.clone(),
        appointment: appointment.clone(),
    });
    Ok((
        StatusCode::OK,
        Json(json!({ "request": request, "appointment": appointment })),
    )
        .into_response())
}

fn reject(
    s: &PortalState,
    request_id: i64,
    counsellor_id: Option<i64>,
) -> Result<Response, PortalError> {
    let request = s.db.reject_request(request_id, counsellor_id)?;
    s.publish(PortalEvent::RequestRejected {
        request: request.clone(),
    });
    Ok((StatusCode::OK, Json(request)).into_response())
}

/// POST /counsellor/appointment_requests/:id/approve
pub async fn post_approve_request(
    Path(request_id): Path<i64>,
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
) -> Response {
    info!("POST /counsellor/appointment_requests/{request_id}/approve ({actor})");
    approve(&s, request_id, Some(actor.id)).into_response()
}

/// POST /counsellor/appointment_requests/:id/reject
pub async fn post_reject_request(
    Path(request_id): Path<i64>,
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
) -> Response {
    info!("POST /counsellor/appointment_requests/{request_id}/reject ({actor})");
    reject(&s, request_id, Some(actor.id)).into_response()
}

/// POST /admin/appointment_requests/:id/:action
pub async fn post_admin_request_action(
    Path((request_id, action)): Path<(i64, String)>,
    State(s): State<Arc<PortalState>>,
) -> Response {
    info!("POST /admin/appointment_requests/{request_id}/{action}");

    match action.as_str() {
        "approve" => approve(&s, request_id, None).into_response(),
        "reject" => reject(&s, request_id, None).into_response(),
        _ => ApiErrorType::from((
            StatusCode::BAD_REQUEST,
            "Action must be 'approve' or 'reject'",
            Some(action),
        ))
        .into_response(),
    }
}
