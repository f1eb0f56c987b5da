//! Registration and login.
//!
//! Registration is public. A new student is matched to a counsellor from
//! their interests; a new counsellor declares the weekdays they work, each
//! getting the default 09:00-17:00 hours.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{NaiveTime, Weekday};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::credentials::{hash_password, verify_password};
use crate::db::{NewCounsellor, NewStudent, Role};
use crate::error::PortalError;
use crate::matching;
use crate::notify::PortalEvent;
use crate::scheduling::{parse_date, parse_weekday, DayHours};
use crate::server::middleware::role_validator::Actor;
use crate::server::util::{check_password, normalize_email, optional, required, split_full_name};
use crate::types::PortalState;

#[derive(Debug, Deserialize)]
pub struct StudentRegistration {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    /// `YYYY-MM-DD`
    pub dob: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub education_level: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CounsellorRegistration {
    pub full_name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub specializations: Vec<String>,
    pub qualification: Option<String>,
    pub experience_years: Option<i64>,
    pub bio: Option<String>,
    pub phone: Option<String>,
    /// Weekday names
    #[serde(default)]
    pub availability: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

fn default_day_hours(day: Weekday) -> Option<DayHours> {
    Some(DayHours {
        day,
        start: NaiveTime::from_hms_opt(9, 0, 0)?,
        end: NaiveTime::from_hms_opt(17, 0, 0)?,
    })
}

fn ensure_email_free(s: &PortalState, email: &str) -> Result<(), PortalError> {
    if s.db.email_in_use(email)? {
        return Err(PortalError::conflict("Email already registered"));
    }
    Ok(())
}

/// Maps a unique-email race on insert to the same conflict as the pre-check.
fn email_taken(e: PortalError) -> PortalError {
    if e.is_constraint_violation() {
        PortalError::conflict("Email already registered")
    } else {
        e
    }
}

fn register_student(s: &PortalState, body: StudentRegistration) -> Result<Response, PortalError> {
    let first_name = required("First name", &body.first_name)?;
    let last_name = required("Last name", &body.last_name)?;
    let email = normalize_email(&body.email)?;
    check_password(&body.password)?;
    let dob = parse_date(&body.dob)?;
    ensure_email_free(s, &email)?;

    let interests = body
        .interests
        .iter()
        .map(|i| i.trim().to_lowercase())
        .filter(|i| !i.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    let available = s.db.list_available_profiles()?;
    let matched = matching::best_match(&interests, &available);

    let student_id = s
        .db
        .insert_student(&NewStudent {
            first_name: first_name.clone(),
            last_name: last_name.clone(),
            email,
            phone: optional(body.phone),
            dob,
            address: optional(body.address),
            education_level: optional(body.education_level),
            interests,
            counsellor_id: matched.map(|m| m.counsellor_id),
            password_hash: hash_password(&body.password),
        })
        .map_err(email_taken)?;

    match matched {
        Some(m) => {
            let counsellor = s.db.get_counsellor(m.counsellor_id)?;
            info!(
                "Student {student_id} assigned to counsellor {} (score {}, by rating: {})",
                m.counsellor_id, m.score, m.by_rating
            );
            s.publish(PortalEvent::CounsellorAssigned {
                student_id,
                student_name: format!("{first_name} {last_name}"),
                counsellor_id: m.counsellor_id,
                counsellor_name: counsellor.full_name(),
                previous_counsellor_id: None,
                by_matching: !m.by_rating,
            });
        }
        None => warn!("No available counsellor for student {student_id}"),
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "student_id": student_id,
            "counsellor_id": matched.map(|m| m.counsellor_id),
            "match": matched,
        })),
    )
        .into_response())
}

/// POST /students/register
pub async fn post_register_student(
    State(s): State<Arc<PortalState>>,
    Json(body): Json<StudentRegistration>,
) -> Response {
    info!("POST /students/register");
    register_student(&s, body).into_response()
}

fn register_counsellor(
    s: &PortalState,
    body: CounsellorRegistration,
) -> Result<Response, PortalError> {
    let (first_name, last_name) = split_full_name(&body.full_name)?;
    let email = normalize_email(&body.email)?;
    check_password(&body.password)?;

    let specialization = body
        .specializations
        .iter()
        .map(|sp| sp.trim())
        .filter(|sp| !sp.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    if specialization.is_empty() {
        return Err(PortalError::invalid("At least one specialization is required"));
    }
    if body.experience_years.is_some_and(|y| y < 0) {
        return Err(PortalError::invalid("Experience years cannot be negative"));
    }

    let mut days = body
        .availability
        .iter()
        .map(|d| parse_weekday(d))
        .collect::<Result<Vec<_>, _>>()?;
    days.sort_by_key(|d| d.num_days_from_monday());
    days.dedup();
    let hours: Vec<DayHours> = days.into_iter().filter_map(default_day_hours).collect();

    ensure_email_free(s, &email)?;
    let counsellor_id = s
        .db
        .insert_counsellor(&NewCounsellor {
            first_name,
            last_name,
            email,
            phone: optional(body.phone),
            specialization,
            qualification: optional(body.qualification),
            experience_years: body.experience_years,
            bio: optional(body.bio),
            password_hash: hash_password(&body.password),
        })
        .map_err(email_taken)?;
    s.db.replace_schedule(counsellor_id, &hours)?;

    info!(
        "Counsellor {counsellor_id} registered with {} working day(s)",
        hours.len()
    );
    Ok((
        StatusCode::CREATED,
        Json(json!({ "counsellor_id": counsellor_id, "schedule": hours })),
    )
        .into_response())
}

/// POST /counsellors/register
pub async fn post_register_counsellor(
    State(s): State<Arc<PortalState>>,
    Json(body): Json<CounsellorRegistration>,
) -> Response {
    info!("POST /counsellors/register");
    register_counsellor(&s, body).into_response()
}

fn login(s: &PortalState, body: LoginBody) -> Result<Response, PortalError> {
    let email = body.email.trim().to_lowercase();
    let invalid = || PortalError::unauthorized("Invalid email or password");

    let creds = s.db.find_credentials(&email)?.ok_or_else(invalid)?;
    if !verify_password(&body.password, &creds.password_hash) {
        return Err(invalid());
    }
    if creds.role == Role::Student && !creds.is_active {
        return Err(PortalError::unauthorized(
            "Your account has been deactivated. Please contact an administrator.",
        ));
    }

    let actor = Actor {
        role: creds.role,
        id: creds.id,
    };
    info!("{actor} logged in");
    Ok((
        StatusCode::OK,
        Json(json!({
            "actor": actor.to_string(),
            "role": actor.role,
            "id": actor.id,
        })),
    )
        .into_response())
}

/// POST /login
pub async fn post_login(
    State(s): State<Arc<PortalState>>,
    Json(body): Json<LoginBody>,
) -> Response {
    info!("POST /login");
    login(&s, body).into_response()
}
