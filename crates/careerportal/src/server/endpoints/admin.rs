//! Account administration: listing, reassignment and (de)activation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::error::PortalError;
use crate::notify::PortalEvent;
use crate::types::PortalState;

#[derive(Debug, Deserialize)]
pub struct ReassignBody {
    pub counsellor_id: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct CounsellorToggleBody {
    pub replacement_id: Option<i64>,
}

/// GET /admin/students
pub async fn get_students(State(s): State<Arc<PortalState>>) -> Response {
    info!("GET /admin/students");

    match s.db.list_students() {
        Ok(students) => (StatusCode::OK, Json(students)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /admin/counsellors
pub async fn get_counsellors(State(s): State<Arc<PortalState>>) -> Response {
    info!("GET /admin/counsellors");

    match s.db.list_counsellors() {
        Ok(counsellors) => (StatusCode::OK, Json(counsellors)).into_response(),
        Err(e) => e.into_response(),
    }
}

fn reassign(s: &PortalState, student_id: i64, counsellor_id: i64) -> Result<Response, PortalError> {
    let student = s.db.get_student(student_id)?;
    if !s.db.is_counsellor_available(counsellor_id)? {
        return Err(PortalError::invalid("Counsellor is not available"));
    }
    let counsellor = s.db.get_counsellor(counsellor_id)?;
    if student.counsellor_id == Some(counsellor_id) {
        return Err(PortalError::conflict(
            "Student is already assigned to this counsellor",
        ));
    }

    s.db.set_student_counsellor(student_id, counsellor_id)?;
    info!(
        "Student {student_id} reassigned from {:?} to counsellor {counsellor_id}",
        student.counsellor_id
    );
    s.publish(PortalEvent::CounsellorAssigned {
        student_id,
        student_name: student.full_name(),
        counsellor_id,
        counsellor_name: counsellor.full_name(),
        previous_counsellor_id: student.counsellor_id,
        by_matching: false,
    });

    Ok((
        StatusCode::OK,
        Json(json!({ "student_id": student_id, "counsellor_id": counsellor_id })),
    )
        .into_response())
}

/// POST /admin/students/:id/reassign
pub async fn post_reassign_student(
    Path(student_id): Path<i64>,
    State(s): State<Arc<PortalState>>,
    Json(body): Json<ReassignBody>,
) -> Response {
    info!("POST /admin/students/{student_id}/reassign");
    reassign(&s, student_id, body.counsellor_id).into_response()
}

/// POST /admin/students/:id/toggle_status
pub async fn post_toggle_student(
    Path(student_id): Path<i64>,
    State(s): State<Arc<PortalState>>,
) -> Response {
    info!("POST /admin/students/{student_id}/toggle_status");

    match s.db.toggle_student_status(student_id) {
        Ok((is_active, purged)) => (
            StatusCode::OK,
            Json(json!({ "student_id": student_id, "is_active": is_active, "purged": purged })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// DELETE /admin/students/:id
pub async fn delete_student(
    Path(student_id): Path<i64>,
    State(s): State<Arc<PortalState>>,
) -> Response {
    info!("DELETE /admin/students/{student_id}");

    match s.db.delete_student(student_id) {
        Ok(purged) => (
            StatusCode::OK,
            Json(json!({ "student_id": student_id, "purged": purged })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

fn toggle_counsellor(
    s: &PortalState,
    counsellor_id: i64,
    replacement_id: Option<i64>,
) -> Result<Response, PortalError> {
    let (available, transfer) = s.db.toggle_counsellor_status(counsellor_id, replacement_id)?;

    if let Some(transfer) = &transfer {
        let from_name = s.db.get_counsellor(transfer.from_counsellor_id)?.full_name();
        let to_name = s.db.get_counsellor(transfer.to_counsellor_id)?.full_name();
        s.publish(PortalEvent::CaseloadTransferred {
            transfer: transfer.clone(),
            from_name,
            to_name,
        });
    }

    Ok((
        StatusCode::OK,
        Json(json!({
            "counsellor_id": counsellor_id,
            "availability_status": available,
            "transfer": transfer,
        })),
    )
        .into_response())
}

/// POST /admin/counsellors/:id/toggle_status
pub async fn post_toggle_counsellor(
    Path(counsellor_id): Path<i64>,
    State(s): State<Arc<PortalState>>,
    body: Option<Json<CounsellorToggleBody>>,
) -> Response {
    info!("POST /admin/counsellors/{counsellor_id}/toggle_status");
    let Json(body) = body.unwrap_or_default();
    toggle_counsellor(&s, counsellor_id, body.replacement_id).into_response()
}
