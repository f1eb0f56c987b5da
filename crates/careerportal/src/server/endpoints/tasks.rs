use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::db::{DbTask, NewTask, TaskFilter, TaskPriority, TaskSort, TaskStatus, TaskUpdate};
use crate::error::PortalError;
use crate::notify::PortalEvent;
use crate::server::middleware::role_validator::Actor;
use crate::server::util::{optional, optional_date, required};
use crate::types::PortalState;

#[derive(Debug, Default, Deserialize)]
pub struct TaskQuery {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub category: Option<String>,
    pub sort_by: Option<String>,
}

impl TaskQuery {
    fn into_filter(self) -> Result<TaskFilter, PortalError> {
        let sort = match self.sort_by.as_deref() {
            None | Some("due_date") => TaskSort::DueDate,
            Some("priority") => TaskSort::Priority,
            Some("created_at") => TaskSort::CreatedAt,
            Some(other) => {
                return Err(PortalError::invalid(format!(
                    "Unknown sort '{other}', expected due_date, priority or created_at"
                )))
            }
        };
        Ok(TaskFilter {
            status: self.status,
            priority: self.priority,
            category: optional(self.category),
            sort,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct TaskBody {
    pub title: String,
    pub description: Option<String>,
    /// `YYYY-MM-DD`
    pub due_date: Option<String>,
    pub priority: Option<TaskPriority>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignTaskBody {
    pub student_id: i64,
    #[serde(flatten)]
    pub task: TaskBody,
}

#[derive(Debug, Deserialize)]
pub struct TaskUpdateBody {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub priority: Option<TaskPriority>,
    pub category: Option<String>,
    pub status: Option<TaskStatus>,
}

fn new_task(student_id: i64, body: TaskBody, assigned_by: Option<i64>) -> Result<NewTask, PortalError> {
    Ok(NewTask {
        student_id,
        title: required("Title", &body.title)?,
        description: optional(body.description),
        due_date: optional_date(body.due_date)?,
        priority: body.priority.unwrap_or(TaskPriority::Medium),
        category: optional(body.category),
        assigned_by,
    })
}

fn list(s: &PortalState, actor: Actor, query: TaskQuery) -> Result<Response, PortalError> {
    let filter = query.into_filter()?;
    let tasks = s.db.list_tasks(actor.id, &filter)?;
    let stats = s.db.task_stats(actor.id)?;
    Ok((StatusCode::OK, Json(json!({ "tasks": tasks, "stats": stats }))).into_response())
}

/// GET /student/tasks
pub async fn get_tasks(
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<TaskQuery>,
) -> Response {
    info!("GET /student/tasks ({actor})");
    list(&s, actor, query).into_response()
}

fn create(s: &PortalState, actor: Actor, body: TaskBody) -> Result<Response, PortalError> {
    let task = s.db.insert_task(&new_task(actor.id, body, None)?)?;
    Ok((StatusCode::CREATED, Json(task)).into_response())
}

/// POST /student/tasks
pub async fn post_task(
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<TaskBody>,
) -> Response {
    info!("POST /student/tasks ({actor})");
    create(&s, actor, body).into_response()
}

fn update(
    s: &PortalState,
    actor: Actor,
    task_id: i64,
    body: TaskUpdateBody,
) -> Result<Response, PortalError> {
    let title = body
        .title
        .map(|t| required("Title", &t))
        .transpose()?;
    let changes = TaskUpdate {
        title,
        description: optional(body.description),
        due_date: optional_date(body.due_date)?,
        priority: body.priority,
        category: optional(body.category),
        status: body.status,
    };

    let before = s.db.get_task(task_id)?;
    let task = s.db.update_task(task_id, actor.id, &changes)?;
    if before.status == TaskStatus::Pending && task.status == TaskStatus::Completed {
        notify_completed(s, &task)?;
    }
    Ok((StatusCode::OK, Json(task)).into_response())
}

/// PUT /student/tasks/:id
pub async fn put_task(
    Path(task_id): Path<i64>,
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<TaskUpdateBody>,
) -> Response {
    info!("PUT /student/tasks/{task_id} ({actor})");
    update(&s, actor, task_id, body).into_response()
}

fn notify_completed(s: &PortalState, task: &DbTask) -> Result<(), PortalError> {
    let student = s.db.get_student(task.student_id)?;
    s.publish(PortalEvent::TaskCompleted {
        task: task.clone(),
        student_name: student.full_name(),
    });
    Ok(())
}

fn complete(s: &PortalState, actor: Actor, task_id: i64) -> Result<Response, PortalError> {
    let before = s.db.get_task(task_id)?;
    let task = s.db.complete_task(task_id, actor.id)?;
    if before.status == TaskStatus::Pending {
        notify_completed(s, &task)?;
    }
    Ok((StatusCode::OK, Json(task)).into_response())
}

/// POST /student/tasks/:id/complete
pub async fn post_complete_task(
    Path(task_id): Path<i64>,
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
) -> Response {
    info!("POST /student/tasks/{task_id}/complete ({actor})");
    complete(&s, actor, task_id).into_response()
}

fn remove_own(s: &PortalState, actor: Actor, task_id: i64) -> Result<Response, PortalError> {
    if s.db.get_task(task_id)?.student_id != actor.id {
        return Err(PortalError::not_found("Task"));
    }
    let task = s.db.delete_task(task_id)?;
    Ok((StatusCode::OK, Json(task)).into_response())
}

/// DELETE /student/tasks/:id
pub async fn delete_task(
    Path(task_id): Path<i64>,
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
) -> Response {
    info!("DELETE /student/tasks/{task_id} ({actor})");
    remove_own(&s, actor, task_id).into_response()
}

fn assign(s: &PortalState, actor: Actor, body: AssignTaskBody) -> Result<Response, PortalError> {
    if !s.db.is_assigned(actor.id, body.student_id)? {
        return Err(PortalError::forbidden(
            "You can only assign tasks to your assigned students",
        ));
    }
    let task = s
        .db
        .insert_task(&new_task(body.student_id, body.task, Some(actor.id))?)?;
    s.publish(PortalEvent::TaskAssigned { task: task.clone() });
    Ok((StatusCode::CREATED, Json(task)).into_response())
}

/// POST /counsellor/tasks
pub async fn post_assign_task(
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<AssignTaskBody>,
) -> Response {
    info!("POST /counsellor/tasks ({actor})");
    assign(&s, actor, body).into_response()
}

fn remove_assigned(s: &PortalState, actor: Actor, task_id: i64) -> Result<Response, PortalError> {
    let task = s.db.get_task(task_id)?;
    if !s.db.is_assigned(actor.id, task.student_id)? {
        return Err(PortalError::forbidden(
            "You can only delete tasks of your assigned students",
        ));
    }
    let task = s.db.delete_task(task_id)?;
    s.publish(PortalEvent::TaskDeleted { task: task.clone() });
    Ok((StatusCode::OK, Json(task)).into_response())
}

/// DELETE /counsellor/tasks/:id
pub async fn delete_assigned_task(
    Path(task_id): Path<i64>,
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
) -> Response {
    info!("DELETE /counsellor/tasks/{task_id} ({actor})");
    remove_assigned(&s, actor, task_id).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_parsing() {
        let sort = |s: Option<&str>| {
            TaskQuery {
                sort_by: s.map(String::from),
                ..Default::default()
            }
            .into_filter()
            .map(|f| f.sort)
        };
        assert_eq!(sort(None).unwrap(), TaskSort::DueDate);
        assert_eq!(sort(Some("priority")).unwrap(), TaskSort::Priority);
        assert_eq!(sort(Some("created_at")).unwrap(), TaskSort::CreatedAt);
        assert!(sort(Some("title")).is_err());
    }

    #[test]
    fn test_new_task_defaults() {
        let task = new_task(
            4,
            TaskBody {
                title: "  Update CV ".into(),
                description: Some("   ".into()),
                due_date: Some("2026-11-02".into()),
                priority: None,
                category: None,
            },
            None,
        )
        .unwrap();
        assert_eq!(task.title, "Update CV");
        assert_eq!(task.description, None);
        assert_eq!(task.priority, TaskPriority::Medium);
        assert_eq!(task.due_date.unwrap().to_string(), "2026-11-02");
    }
}
