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

use crate::error::PortalError;
use crate::server::middleware::role_validator::Actor;
use crate::types::PortalState;

const DEFAULT_LIMIT: u32 = 20;
const MAX_LIMIT: u32 = 200;

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<u32>,
}

fn list(s: &PortalState, actor: Actor, query: NotificationQuery) -> Result<Response, PortalError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let notifications = s
        .db
        .list_notifications(actor.role, actor.id, query.unread_only, limit)?;
    let unread = s.db.unread_notification_count(actor.role, actor.id)?;
    Ok((
        StatusCode::OK,
        Json(json!({ "notifications": notifications, "unread_count": unread })),
    )
        .into_response())
}

/// GET /notifications
pub async fn get_notifications(
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<NotificationQuery>,
) -> Response {
    info!("GET /notifications ({actor})");
    list(&s, actor, query).into_response()
}

/// POST /notifications/:id/read
pub async fn post_mark_read(
    Path(notification_id): Path<i64>,
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
) -> Response {
    info!("POST /notifications/{notification_id}/read ({actor})");

    match s
        .db
        .mark_notification_read(notification_id, actor.role, actor.id)
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /notifications/read_all
pub async fn post_mark_all_read(
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
) -> Response {
    info!("POST /notifications/read_all ({actor})");

    match s.db.mark_all_notifications_read(actor.role, actor.id) {
        Ok(marked) => (StatusCode::OK, Json(json!({ "marked_read": marked }))).into_response(),
        Err(e) => e.into_response(),
    }
}
