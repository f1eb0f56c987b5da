use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::error::PortalError;
use crate::server::middleware::role_validator::Actor;
use crate::types::PortalState;

fn student_profile(s: &PortalState, actor: Actor) -> Result<Response, PortalError> {
    let student = s.db.get_student(actor.id)?;
    let counsellor = student
        .counsellor_id
        .map(|id| s.db.get_counsellor(id))
        .transpose()?;

    Ok((
        StatusCode::OK,
        Json(json!({ "student": student, "counsellor": counsellor })),
    )
        .into_response())
}

/// GET /student/profile
pub async fn get_student_profile(
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
) -> Response {
    info!("GET /student/profile ({actor})");
    student_profile(&s, actor).into_response()
}

/// GET /counsellor/students
pub async fn get_assigned_students(
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
) -> Response {
    info!("GET /counsellor/students ({actor})");

    match s.db.list_assigned_students(actor.id) {
        Ok(students) => (StatusCode::OK, Json(students)).into_response(),
        Err(e) => e.into_response(),
    }
}
