use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::error::PortalError;
use crate::scheduling::SlotRejection;

/// The JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ApiErrorType {
    #[serde(skip)]
    status: StatusCode,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl From<(StatusCode, &str, Option<String>)> for ApiErrorType {
    fn from((status, error, details): (StatusCode, &str, Option<String>)) -> Self {
        Self {
            status,
            error: error.to_string(),
            details: details.map(serde_json::Value::String),
        }
    }
}

impl From<PortalError> for ApiErrorType {
    fn from(err: PortalError) -> Self {
        let status = match &err {
            PortalError::Format(_) | PortalError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            PortalError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            PortalError::Forbidden { .. } => StatusCode::FORBIDDEN,
            PortalError::NotFound { .. } => StatusCode::NOT_FOUND,
            PortalError::Conflict { .. } | PortalError::Slot(SlotRejection::SlotAlreadyBooked) => {
                StatusCode::CONFLICT
            }
            PortalError::Slot(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PortalError::Database(_) | PortalError::LockPoisoned => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        match err {
            PortalError::Slot(rejection) => Self {
                status,
                error: rejection.user_message(),
                details: serde_json::to_value(&rejection).ok(),
            },
            PortalError::Database(_) | PortalError::LockPoisoned => {
                error!("Internal error: {err}");
                Self::from((status, "Internal server error", Some(err.to_string())))
            }
            other => Self::from((status, other.to_string().as_str(), None)),
        }
    }
}

impl IntoResponse for ApiErrorType {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        ApiErrorType::from(self).into_response()
    }
}
