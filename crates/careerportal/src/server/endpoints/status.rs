use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::types::PortalState;

/// GET /health
pub async fn get_health(State(s): State<Arc<PortalState>>) -> Response {
    info!("GET /health");

    match s.db.list_available_profiles() {
        Ok(available) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "available_counsellors": available.len(),
            })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}
