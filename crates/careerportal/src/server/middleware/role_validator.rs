use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

use crate::db::Role;
use crate::server::types::ApiErrorType;
use crate::types::PortalState;

/// Header carrying the authenticated caller, formatted `<role>-<id>`.
pub const ACTOR_HEADER: &str = "x-portal-user";

/// The authenticated caller of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub role: Role,
    pub id: i64,
}

impl Actor {
    pub fn as_pair(&self) -> (Role, i64) {
        (self.role, self.id)
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.role, self.id)
    }
}

impl FromStr for Actor {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (role, id) = s.trim().rsplit_once('-').ok_or(())?;
        let role = role.parse::<Role>().map_err(|_| ())?;
        let id = id.parse::<i64>().map_err(|_| ())?;
        if id <= 0 {
            return Err(());
        }
        Ok(Actor { role, id })
    }
}

async fn require(s: &PortalState, allowed: &[Role], mut req: Request, next: Next) -> Response {
    let actor = req
        .headers()
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<Actor>().ok());

    let Some(actor) = actor else {
        return ApiErrorType::from((
            StatusCode::UNAUTHORIZED,
            "Missing or malformed X-Portal-User header",
            None,
        ))
        .into_response();
    };

    if !allowed.contains(&actor.role) {
        warn!("{actor} denied access to {}", req.uri().path());
        return ApiErrorType::from((
            StatusCode::FORBIDDEN,
            "You do not have access to this resource",
            None,
        ))
        .into_response();
    }

    match s.db.is_active_account(actor.role, actor.id) {
        Ok(true) => {}
        Ok(false) => {
            warn!("{actor} is inactive or unknown, refused {}", req.uri().path());
            return ApiErrorType::from((
                StatusCode::UNAUTHORIZED,
                "Account is inactive or does not exist",
                None,
            ))
            .into_response();
        }
        Err(e) => return e.into_response(),
    }

    req.extensions_mut().insert(actor);
    next.run(req).await
}

/// Only students may continue.
pub async fn require_student(
    State(s): State<Arc<PortalState>>,
    req: Request,
    next: Next,
) -> Response {
    require(&s, &[Role::Student], req, next).await
}

/// Only counsellors may continue.
pub async fn require_counsellor(
    State(s): State<Arc<PortalState>>,
    req: Request,
    next: Next,
) -> Response {
    require(&s, &[Role::Counsellor], req, next).await
}

/// Only admins may continue.
pub async fn require_admin(
    State(s): State<Arc<PortalState>>,
    req: Request,
    next: Next,
) -> Response {
    require(&s, &[Role::Admin], req, next).await
}

/// Students and counsellors may continue.
pub async fn require_participant(
    State(s): State<Arc<PortalState>>,
    req: Request,
    next: Next,
) -> Response {
    require(&s, &[Role::Student, Role::Counsellor], req, next).await
}

/// Any authenticated caller may continue.
pub async fn require_any(
    State(s): State<Arc<PortalState>>,
    req: Request,
    next: Next,
) -> Response {
    require(&s, &[Role::Student, Role::Counsellor, Role::Admin], req, next).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_actor() {
        assert_eq!(
            "student-4".parse::<Actor>(),
            Ok(Actor {
                role: Role::Student,
                id: 4
            })
        );
        assert_eq!(
            "counsellor-12".parse::<Actor>().map(|a| a.to_string()),
            Ok("counsellor-12".to_string())
        );
        for bad in ["", "student", "student-", "mentor-1", "admin-x", "admin-0", "admin--1"] {
            assert!(bad.parse::<Actor>().is_err(), "{bad}");
        }
    }
}
