//! Career goals and their milestones, scoped to the calling student.

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

use crate::db::{GoalStatus, GoalUpdate, MilestoneStatus, MilestoneUpdate, NewGoal, NewMilestone};
use crate::error::PortalError;
use crate::server::middleware::role_validator::Actor;
use crate::server::util::{optional, optional_date, required};
use crate::types::PortalState;

#[derive(Debug, Deserialize)]
pub struct GoalBody {
    pub title: String,
    pub description: Option<String>,
    /// `YYYY-MM-DD`
    pub start_date: Option<String>,
    /// `YYYY-MM-DD`
    pub target_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GoalUpdateBody {
    pub title: Option<String>,
    pub description: Option<String>,
    pub target_date: Option<String>,
    pub status: Option<GoalStatus>,
}

#[derive(Debug, Deserialize)]
pub struct MilestoneBody {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MilestoneUpdateBody {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub status: Option<MilestoneStatus>,
}

fn new_goal(student_id: i64, body: GoalBody) -> Result<NewGoal, PortalError> {
    Ok(NewGoal {
        student_id,
        title: required("Title", &body.title)?,
        description: optional(body.description),
        start_date: optional_date(body.start_date)?,
        target_date: optional_date(body.target_date)?,
    })
}

fn title_update(title: Option<String>) -> Result<Option<String>, PortalError> {
    title.map(|t| required("Title", &t)).transpose()
}

/// GET /student/goals
pub async fn get_goals(
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
) -> Response {
    info!("GET /student/goals ({actor})");

    match s.db.list_goals(actor.id) {
        Ok(goals) => (StatusCode::OK, Json(json!({ "goals": goals }))).into_response(),
        Err(e) => e.into_response(),
    }
}

fn create_goal(s: &PortalState, actor: Actor, body: GoalBody) -> Result<Response, PortalError> {
    let goal = s.db.insert_goal(&new_goal(actor.id, body)?)?;
    info!("Goal {} created by {actor}", goal.goal_id);
    Ok((StatusCode::CREATED, Json(goal)).into_response())
}

/// POST /student/goals
pub async fn post_goal(
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<GoalBody>,
) -> Response {
    info!("POST /student/goals ({actor})");
    create_goal(&s, actor, body).into_response()
}

fn update_goal(
    s: &PortalState,
    actor: Actor,
    goal_id: i64,
    body: GoalUpdateBody,
) -> Result<Response, PortalError> {
    let changes = GoalUpdate {
        title: title_update(body.title)?,
        description: optional(body.description),
        target_date: optional_date(body.target_date)?,
        status: body.status,
    };
    let goal = s.db.update_goal(goal_id, actor.id, &changes)?;
    Ok((StatusCode::OK, Json(goal)).into_response())
}

/// PUT /student/goals/:id
pub async fn put_goal(
    Path(goal_id): Path<i64>,
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<GoalUpdateBody>,
) -> Response {
    info!("PUT /student/goals/{goal_id} ({actor})");
    update_goal(&s, actor, goal_id, body).into_response()
}

/// DELETE /student/goals/:id
pub async fn delete_goal(
    Path(goal_id): Path<i64>,
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
) -> Response {
    info!("DELETE /student/goals/{goal_id} ({actor})");

    match s.db.delete_goal(goal_id, actor.id) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /student/goals/:id/milestones
pub async fn get_milestones(
    Path(goal_id): Path<i64>,
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
) -> Response {
    info!("GET /student/goals/{goal_id}/milestones ({actor})");

    match s.db.list_milestones(goal_id, actor.id) {
        Ok(milestones) => (StatusCode::OK, Json(milestones)).into_response(),
        Err(e) => e.into_response(),
    }
}

fn create_milestone(
    s: &PortalState,
    actor: Actor,
    goal_id: i64,
    body: MilestoneBody,
) -> Result<Response, PortalError> {
    let milestone = NewMilestone {
        goal_id,
        title: required("Title", &body.title)?,
        description: optional(body.description),
        due_date: optional_date(body.due_date)?,
    };
    let milestone = s.db.insert_milestone(actor.id, &milestone)?;
    Ok((StatusCode::CREATED, Json(milestone)).into_response())
}

/// POST /student/goals/:id/milestones
pub async fn post_milestone(
    Path(goal_id): Path<i64>,
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<MilestoneBody>,
) -> Response {
    info!("POST /student/goals/{goal_id}/milestones ({actor})");
    create_milestone(&s, actor, goal_id, body).into_response()
}

fn update_milestone(
    s: &PortalState,
    actor: Actor,
    milestone_id: i64,
    body: MilestoneUpdateBody,
) -> Result<Response, PortalError> {
    let changes = MilestoneUpdate {
        title: title_update(body.title)?,
        description: optional(body.description),
        due_date: optional_date(body.due_date)?,
        status: body.status,
    };
    let milestone = s.db.update_milestone(milestone_id, actor.id, &changes)?;
    Ok((StatusCode::OK, Json(milestone)).into_response())
}

/// PUT /student/milestones/:id
pub async fn put_milestone(
    Path(milestone_id): Path<i64>,
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<MilestoneUpdateBody>,
) -> Response {
    info!("PUT /student/milestones/{milestone_id} ({actor})");
    update_milestone(&s, actor, milestone_id, body).into_response()
}

/// DELETE /student/milestones/:id
pub async fn delete_milestone(
    Path(milestone_id): Path<i64>,
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
) -> Response {
    info!("DELETE /student/milestones/{milestone_id} ({actor})");

    match s.db.delete_milestone(milestone_id, actor.id) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}
