use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::db::GrievanceStatus;
use crate::error::PortalError;
use crate::notify::PortalEvent;
use crate::server::middleware::role_validator::Actor;
use crate::server::util::{optional, required};
use crate::types::PortalState;

#[derive(Debug, Deserialize)]
pub struct GrievanceBody {
    pub subject: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: GrievanceStatus,
    pub response: Option<String>,
}

/// GET /student/grievances
pub async fn get_own_grievances(
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
) -> Response {
    info!("GET /student/grievances ({actor})");

    match s.db.list_grievances(Some(actor.id)) {
        Ok(grievances) => (StatusCode::OK, Json(grievances)).into_response(),
        Err(e) => e.into_response(),
    }
}

fn submit(s: &PortalState, actor: Actor, body: GrievanceBody) -> Result<Response, PortalError> {
    let subject = required("Subject", &body.subject)?;
    let description = required("Description", &body.description)?;
    let grievance = s.db.insert_grievance(actor.id, &subject, &description)?;
    s.publish(PortalEvent::GrievanceSubmitted {
        grievance: grievance.clone(),
    });
    Ok((StatusCode::CREATED, Json(grievance)).into_response())
}

/// POST /student/grievances
pub async fn post_grievance(
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<GrievanceBody>,
) -> Response {
    info!("POST /student/grievances ({actor})");
    submit(&s, actor, body).into_response()
}

/// GET /admin/grievances
pub async fn get_all_grievances(State(s): State<Arc<PortalState>>) -> Response {
    info!("GET /admin/grievances");

    match s.db.list_grievances(None) {
        Ok(grievances) => (StatusCode::OK, Json(grievances)).into_response(),
        Err(e) => e.into_response(),
    }
}

fn set_status(s: &PortalState, grievance_id: i64, body: StatusBody) -> Result<Response, PortalError> {
    if body.status == GrievanceStatus::Pending {
        return Err(PortalError::invalid(
            "Status must be 'In Progress' or 'Resolved'",
        ));
    }
    let response = optional(body.response);
    let grievance = s
        .db
        .update_grievance_status(grievance_id, body.status, response.as_deref())?;
    info!("Grievance {grievance_id} set to {}", grievance.status);
    s.publish(PortalEvent::GrievanceStatusChanged {
        grievance: grievance.clone(),
    });
    Ok((StatusCode::OK, Json(grievance)).into_response())
}

/// POST /admin/grievances/:id/status
pub async fn post_grievance_status(
    Path(grievance_id): Path<i64>,
    State(s): State<Arc<PortalState>>,
    Json(body): Json<StatusBody>,
) -> Response {
    info!("POST /admin/grievances/{grievance_id}/status");
    set_status(&s, grievance_id, body).into_response()
}
