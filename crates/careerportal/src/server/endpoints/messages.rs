//! Direct messages between a student and their counsellor.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::db::Role;
use crate::error::PortalError;
use crate::server::middleware::role_validator::Actor;
use crate::types::PortalState;

#[derive(Debug, Deserialize)]
pub struct SendBody {
    pub recipient_id: i64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ConversationQuery {
    pub after: Option<i64>,
}

/// The role on the other side of a conversation.
fn partner_role(actor: Actor) -> Result<Role, PortalError> {
    match actor.role {
        Role::Student => Ok(Role::Counsellor),
        Role::Counsellor => Ok(Role::Student),
        Role::Admin => Err(PortalError::forbidden("Admins do not take part in messaging")),
    }
}

fn send(s: &PortalState, actor: Actor, body: SendBody) -> Result<Response, PortalError> {
    let text = body.message.trim();
    if text.is_empty() {
        return Err(PortalError::invalid("Message cannot be empty"));
    }

    let allowed = match actor.role {
        Role::Student => s.db.get_student(actor.id)?.counsellor_id == Some(body.recipient_id),
        _ => s.db.is_assigned(actor.id, body.recipient_id)?,
    };
    if !allowed {
        return Err(PortalError::forbidden(match actor.role {
            Role::Student => "You can only message your assigned counsellor",
            _ => "You can only message your assigned students",
        }));
    }

    let recipient = (partner_role(actor)?, body.recipient_id);
    let message = s.db.send_message(actor.as_pair(), recipient, text)?;
    Ok((StatusCode::CREATED, Json(message)).into_response())
}

/// POST /messages/send
pub async fn post_send(
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<SendBody>,
) -> Response {
    info!("POST /messages/send ({actor})");
    send(&s, actor, body).into_response()
}

fn conversation(
    s: &PortalState,
    actor: Actor,
    partner_id: i64,
    after: Option<i64>,
) -> Result<Response, PortalError> {
    let partner = (partner_role(actor)?, partner_id);
    let messages = s.db.conversation(actor.as_pair(), partner, after)?;
    Ok((StatusCode::OK, Json(messages)).into_response())
}

/// GET /messages/conversation/:partner_id
pub async fn get_conversation(
    Path(partner_id): Path<i64>,
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<ConversationQuery>,
) -> Response {
    info!("GET /messages/conversation/{partner_id} ({actor})");
    conversation(&s, actor, partner_id, query.after).into_response()
}

/// GET /messages/conversations
pub async fn get_conversations(
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
) -> Response {
    info!("GET /messages/conversations ({actor})");

    match s.db.conversations(actor.as_pair()) {
        Ok(summaries) => (StatusCode::OK, Json(summaries)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /messages/unread
pub async fn get_unread(
    State(s): State<Arc<PortalState>>,
    Extension(actor): Extension<Actor>,
) -> Response {
    info!("GET /messages/unread ({actor})");

    match s.db.unread_messages(actor.as_pair()) {
        Ok(messages) => (StatusCode::OK, Json(messages)).into_response(),
        Err(e) => e.into_response(),
    }
}
