use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::error::PortalError;
use crate::notify::PortalEvent;
use crate::server::middleware::role_validator::Actor;
use crate::types::PortalState;

#[derive(Debug, Deserialize)]
pub struct FeedbackBody {
    pub rating: i64,
    pub comments: String,
}

fn overview(s: &PortalState, actor: Actor) -> Result<Response, PortalError> {
    let due = s.db.feedback_due(actor.id)?;
    let history = s.db.student_feedback(actor.id)?;
    Ok((
        StatusCode::OK,
        Json(json!({ "feedback_due": due, "history": history })),
    )
        .into_response())
}

/// GET /student/feedback
pub async fn get_feedback(
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
) -> Response {
    info!("GET /student/feedback ({actor})");
    overview(&s, actor).into_response()
}

fn submit(s: &PortalState, actor: Actor, body: FeedbackBody) -> Result<Response, PortalError> {
    let student = s.db.get_student(actor.id)?;
    let counsellor_id = student
        .counsellor_id
        .ok_or_else(|| PortalError::conflict("You have not been assigned a counsellor yet"))?;

    let (feedback, rating) = s
        .db
        .submit_feedback(actor.id, counsellor_id, body.rating, body.comments.trim())?;
    info!("Counsellor {counsellor_id} rating is now {rating:.2}");

    s.publish(PortalEvent::FeedbackReceived {
        feedback: feedback.clone(),
        student_name: student.full_name(),
    });
    Ok((
        StatusCode::CREATED,
        Json(json!({ "feedback": feedback, "counsellor_rating": rating })),
    )
        .into_response())
}

/// POST /student/feedback
pub async fn post_feedback(
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<FeedbackBody>,
) -> Response {
    info!("POST /student/feedback ({actor})");
    submit(&s, actor, body).into_response()
}
