use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::{middleware as mw, Router};

use crate::server::endpoints::{
    accounts, admin, appointments, events, feedback, goals, grievances, messages,
    notifications, schedule, status, students, tasks,
};
use crate::server::middleware::role_validator;
use crate::types::PortalState;

mod endpoints;
mod middleware;
mod types;
mod util;

/// Creates a router that can be used by `axum`.
///
/// # Parameters
/// - `app_state`: The app server state.
///
/// # Returns
/// The router.
pub fn create_router(app_state: Arc<PortalState>) -> Router {
    let student_router = Router::new()
        .route("/profile", get(students::get_student_profile))
        .route("/appointments", get(appointments::get_student_appointments))
        .route(
            "/appointments/:id/reschedule",
            post(appointments::post_reschedule),
        )
        .route(
            "/appointment_requests",
            get(appointments::get_student_requests).post(appointments::post_request),
        )
        .route("/slot_check", get(appointments::get_slot_check))
        .route(
            "/appointment_requests/:id/cancel",
            post(appointments::post_cancel_request),
        )
        .route("/tasks", get(tasks::get_tasks).post(tasks::post_task))
        .route("/tasks/:id", delete(tasks::delete_task).put(tasks::put_task))
        .route("/tasks/:id/complete", post(tasks::post_complete_task))
        .route("/goals", get(goals::get_goals).post(goals::post_goal))
        .route("/goals/:id", delete(goals::delete_goal).put(goals::put_goal))
        .route(
            "/goals/:id/milestones",
            get(goals::get_milestones).post(goals::post_milestone),
        )
        .route(
            "/milestones/:id",
            delete(goals::delete_milestone).put(goals::put_milestone),
        )
        .route(
            "/grievances",
            get(grievances::get_own_grievances).post(grievances::post_grievance),
        )
        .route("/events", get(events::get_student_events))
        .route("/events/:id/register", post(events::post_register))
        .route(
            "/feedback",
            get(feedback::get_feedback).post(feedback::post_feedback),
        )
        .layer(mw::from_fn_with_state(
            app_state.clone(),
            role_validator::require_student,
        ));

    let counsellor_router = Router::new()
        .route("/students", get(students::get_assigned_students))
        .route(
            "/appointments",
            get(appointments::get_counsellor_appointments)
                .post(appointments::post_book_appointment),
        )
        .route(
            "/appointments/:id/complete",
            post(appointments::post_complete_appointment),
        )
        .route(
            "/appointment_requests",
            get(appointments::get_pending_requests),
        )
        .route(
            "/appointment_requests/:id/approve",
            post(appointments::post_approve_request),
        )
        .route(
            "/appointment_requests/:id/reject",
            post(appointments::post_reject_request),
        )
        .route(
            "/schedule",
            get(schedule::get_schedule).put(schedule::put_schedule),
        )
        .route("/tasks", post(tasks::post_assign_task))
        .route("/tasks/:id", delete(tasks::delete_assigned_task))
        .layer(mw::from_fn_with_state(
            app_state.clone(),
            role_validator::require_counsellor,
        ));

    let admin_router = Router::new()
        .route("/students", get(admin::get_students))
        .route("/students/:id", delete(admin::delete_student))
        .route("/students/:id/reassign", post(admin::post_reassign_student))
        .route(
            "/students/:id/toggle_status",
            post(admin::post_toggle_student),
        )
        .route("/counsellors", get(admin::get_counsellors))
        .route(
            "/counsellors/:id/toggle_status",
            post(admin::post_toggle_counsellor),
        )
        .route(
            "/appointment_requests/:id/:action",
            post(appointments::post_admin_request_action),
        )
        .route("/grievances", get(grievances::get_all_grievances))
        .route(
            "/grievances/:id/status",
            post(grievances::post_grievance_status),
        )
        .route("/events", post(events::post_event))
        .route("/events/:id", delete(events::delete_event))
        .route(
            "/events/:id/registrations/:student_id",
            delete(events::delete_registration),
        )
        .layer(mw::from_fn_with_state(
            app_state.clone(),
            role_validator::require_admin,
        ));

    let message_router = Router::new()
        .route("/send", post(messages::post_send))
        .route(
            "/conversation/:partner_id",
            get(messages::get_conversation),
        )
        .route("/conversations", get(messages::get_conversations))
        .route("/unread", get(messages::get_unread))
        .layer(mw::from_fn_with_state(
            app_state.clone(),
            role_validator::require_participant,
        ));

    let notification_router = Router::new()
        .route("/", get(notifications::get_notifications))
        .route("/:id/read", post(notifications::post_mark_read))
        .route("/read_all", post(notifications::post_mark_all_read))
        .layer(mw::from_fn_with_state(
            app_state.clone(),
            role_validator::require_any,
        ));

    Router::new()
        .route("/health", get(status::get_health))
        .route("/students/register", post(accounts::post_register_student))
        .route(
            "/counsellors/register",
            post(accounts::post_register_counsellor),
        )
        .route("/login", post(accounts::post_login))
        .route("/events", get(events::get_public_events))
        .nest("/student", student_router)
        .nest("/counsellor", counsellor_router)
        .nest("/admin", admin_router)
        .nest("/messages", message_router)
        .nest("/notifications", notification_router)
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PortalConfig;
    use crate::credentials::hash_password;
    use crate::db::test_support::next;
    use crate::db::PortalDbManager;
    use crate::server::middleware::role_validator::ACTOR_HEADER;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Weekday;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> (Router, Arc<PortalDbManager>) {
        let db = Arc::new(PortalDbManager::open_in_memory().unwrap());
        let state = Arc::new(PortalState::new(Arc::clone(&db), PortalConfig::default()));
        (create_router(state), db)
    }

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        actor: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(actor) = actor {
            req = req.header(ACTOR_HEADER, actor);
        }
        let req = match body {
            Some(body) => req
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap())),
            None => req.body(Body::empty()),
        }
        .unwrap();

        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn register_counsellor(app: &Router, email: &str) -> i64 {
        let (status, body) = call(
            app,
            "POST",
            "/counsellors/register",
            None,
            Some(json!({
                "full_name": "Ada Lovelace",
                "email": email,
                "password": "analytical",
                "specializations": ["Software Engineering", "Data Science"],
                "availability": ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["counsellor_id"].as_i64().unwrap()
    }

    async fn register_student(app: &Router, email: &str) -> (i64, Option<i64>) {
        let (status, body) = call(
            app,
            "POST",
            "/students/register",
            None,
            Some(json!({
                "first_name": "Sam",
                "last_name": "Student",
                "email": email,
                "password": "password1",
                "dob": "2004-05-17",
                "interests": ["software", "data"],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        (
            body["student_id"].as_i64().unwrap(),
            body["counsellor_id"].as_i64(),
        )
    }

    #[tokio::test]
    async fn test_registration_assigns_counsellor() {
        let (app, _) = app();
        let counsellor_id = register_counsellor(&app, "ada@portal.io").await;
        let (student_id, assigned) = register_student(&app, "sam@portal.io").await;
        assert_eq!(assigned, Some(counsellor_id));

        let student = format!("student-{student_id}");
        let (status, body) = call(&app, "GET", "/notifications", Some(&student), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["unread_count"], 1);

        let counsellor = format!("counsellor-{counsellor_id}");
        let (_, students) = call(&app, "GET", "/counsellor/students", Some(&counsellor), None).await;
        assert_eq!(students[0]["student_id"], student_id);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_refused() {
        let (app, _) = app();
        register_counsellor(&app, "ada@portal.io").await;
        let (status, _) = call(
            &app,
            "POST",
            "/students/register",
            None,
            Some(json!({
                "first_name": "Sam",
                "last_name": "Student",
                "email": "ADA@portal.io",
                "password": "password1",
                "dob": "2004-05-17",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_login() {
        let (app, db) = app();
        let (student_id, _) = register_student(&app, "sam@portal.io").await;
        db.upsert_admin("root@portal.io", "Root", &hash_password("rootroot"))
            .unwrap();

        let (status, body) = call(
            &app,
            "POST",
            "/login",
            None,
            Some(json!({ "email": "sam@portal.io", "password": "password1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["actor"], format!("student-{student_id}"));

        let (status, body) = call(
            &app,
            "POST",
            "/login",
            None,
            Some(json!({ "email": "root@portal.io", "password": "rootroot" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["role"], "admin");

        let (status, _) = call(
            &app,
            "POST",
            "/login",
            None,
            Some(json!({ "email": "sam@portal.io", "password": "wrong-password" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_role_guards() {
        let (app, _) = app();
        let (status, _) = call(&app, "GET", "/student/profile", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(&app, "GET", "/student/profile", Some("student"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(&app, "GET", "/student/profile", Some("counsellor-1"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = call(&app, "GET", "/admin/students", Some("student-1"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = call(&app, "GET", "/messages/unread", Some("admin-1"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_deactivated_student_is_locked_out() {
        let (app, db) = app();
        let counsellor_id = register_counsellor(&app, "ada@portal.io").await;
        let (student_id, _) = register_student(&app, "sam@portal.io").await;
        let student = format!("student-{student_id}");
        db.toggle_student_status(student_id).unwrap();

        let (status, _) = call(
            &app,
            "POST",
            "/student/appointment_requests",
            Some(&student),
            Some(json!({
                "appointment_type": "Career planning",
                "preferred_date": next(Weekday::Mon).format("%Y-%m-%d").to_string(),
                "preferred_time": "10:00",
                "mode": "online",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(
            &app,
            "POST",
            "/messages/send",
            Some(&student),
            Some(json!({ "recipient_id": counsellor_id, "message": "still here?" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(&app, "GET", "/notifications", Some("counsellor-99"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        db.toggle_student_status(student_id).unwrap();
        let (status, _) = call(&app, "GET", "/student/profile", Some(&student), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_goals_and_milestones() {
        let (app, _) = app();
        let (student_id, _) = register_student(&app, "sam@portal.io").await;
        let (other_id, _) = register_student(&app, "tia@portal.io").await;
        let student = format!("student-{student_id}");
        let other = format!("student-{other_id}");

        let (status, goal) = call(
            &app,
            "POST",
            "/student/goals",
            Some(&student),
            Some(json!({
                "title": "Land a data internship",
                "start_date": "2026-09-01",
                "target_date": "2027-06-01",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{goal}");
        assert_eq!(goal["status"], "in_progress");
        let goal_id = goal["goal_id"].as_i64().unwrap();

        let uri = format!("/student/goals/{goal_id}/milestones");
        let (status, milestone) = call(
            &app,
            "POST",
            &uri,
            Some(&student),
            Some(json!({ "title": "Polish CV", "due_date": "2026-10-01" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{milestone}");
        assert_eq!(milestone["status"], "pending");

        let (status, _) = call(
            &app,
            "POST",
            &uri,
            Some(&other),
            Some(json!({ "title": "Hijack" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, updated) = call(
            &app,
            "PUT",
            &format!("/student/goals/{goal_id}"),
            Some(&student),
            Some(json!({ "status": "completed" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{updated}");
        assert_eq!(updated["status"], "completed");

        let (_, body) = call(&app, "GET", "/student/goals", Some(&student), None).await;
        assert_eq!(body["goals"][0]["milestones"][0]["title"], "Polish CV");

        let (status, _) = call(
            &app,
            "DELETE",
            &format!("/student/goals/{goal_id}"),
            Some(&student),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, body) = call(&app, "GET", "/student/goals", Some(&student), None).await;
        assert!(body["goals"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_request_approval_flow() {
        let (app, _) = app();
        let counsellor_id = register_counsellor(&app, "ada@portal.io").await;
        let (student_id, _) = register_student(&app, "sam@portal.io").await;
        let student = format!("student-{student_id}");
        let counsellor = format!("counsellor-{counsellor_id}");
        let monday = next(Weekday::Mon).format("%Y-%m-%d").to_string();

        let request = json!({
            "appointment_type": "Career planning",
            "preferred_date": monday,
            "preferred_time": "10:00",
            "mode": "online",
        });
        let (status, created) = call(
            &app,
            "POST",
            "/student/appointment_requests",
            Some(&student),
            Some(request.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{created}");
        assert_eq!(created["status"], "pending");
        let request_id = created["request_id"].as_i64().unwrap();

        let (_, pending) = call(
            &app,
            "GET",
            "/counsellor/appointment_requests",
            Some(&counsellor),
            None,
        )
        .await;
        assert_eq!(pending.as_array().unwrap().len(), 1);

        let (status, approved) = call(
            &app,
            "POST",
            &format!("/counsellor/appointment_requests/{request_id}/approve"),
            Some(&counsellor),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{approved}");
        assert_eq!(approved["request"]["status"], "approved");
        assert_eq!(approved["appointment"]["status"], "scheduled");
        assert_eq!(approved["appointment"]["end_time"], "11:00");
        assert!(approved["appointment"]["meeting_link"]
            .as_str()
            .unwrap()
            .starts_with("https://meet.careerportal.local/"));

        // the slot is now taken
        let (status, body) = call(
            &app,
            "POST",
            "/student/appointment_requests",
            Some(&student),
            Some(request),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["details"]["reason"], "slot_already_booked");

        let (_, appointments) =
            call(&app, "GET", "/student/appointments", Some(&student), None).await;
        assert_eq!(appointments.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_slot_rejections() {
        let (app, _) = app();
        register_counsellor(&app, "ada@portal.io").await;
        let (student_id, _) = register_student(&app, "sam@portal.io").await;
        let student = format!("student-{student_id}");
        let request = |date: String, time: &str| {
            json!({
                "appointment_type": "Career planning",
                "preferred_date": date,
                "preferred_time": time,
                "mode": "offline",
            })
        };

        let sunday = next(Weekday::Sun).format("%Y-%m-%d").to_string();
        let (status, body) = call(
            &app,
            "POST",
            "/student/appointment_requests",
            Some(&student),
            Some(request(sunday, "10:00")),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["details"]["reason"], "not_available_that_day");
        assert_eq!(body["error"], "Counsellor is not available on Sunday");

        let monday = next(Weekday::Mon).format("%Y-%m-%d").to_string();
        let (status, body) = call(
            &app,
            "POST",
            "/student/appointment_requests",
            Some(&student),
            Some(request(monday.clone(), "16:30")),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["details"]["reason"], "outside_working_hours");

        let (status, _) = call(
            &app,
            "POST",
            "/student/appointment_requests",
            Some(&student),
            Some(request(monday, "ten")),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(
            &app,
            "POST",
            "/student/appointment_requests",
            Some(&student),
            Some(request("2001-01-01".to_string(), "10:00")),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["details"]["reason"], "past_date");
    }

    #[tokio::test]
    async fn test_slot_check() {
        let (app, _) = app();
        register_counsellor(&app, "ada@portal.io").await;
        let (student_id, _) = register_student(&app, "sam@portal.io").await;
        let student = format!("student-{student_id}");
        let monday = next(Weekday::Mon).format("%Y-%m-%d");

        let uri = format!("/student/slot_check?date={monday}&time=16:00");
        let (status, body) = call(&app, "GET", &uri, Some(&student), None).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["end_time"], "17:00");

        let uri = format!("/student/slot_check?date={monday}&time=08:00");
        let (status, body) = call(&app, "GET", &uri, Some(&student), None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["details"]["reason"], "outside_working_hours");
    }

    #[tokio::test]
    async fn test_schedule_update() {
        let (app, _) = app();
        let counsellor_id = register_counsellor(&app, "ada@portal.io").await;
        let counsellor = format!("counsellor-{counsellor_id}");

        let (status, body) = call(
            &app,
            "PUT",
            "/counsellor/schedule",
            Some(&counsellor),
            Some(json!({
                "days": {
                    "Monday": null,
                    "Saturday": { "start": "10:00", "end": "12:00" },
                }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let days: Vec<&str> = body["schedule"]
            .as_array()
            .unwrap()
            .iter()
            .map(|h| h["day"].as_str().unwrap())
            .collect();
        assert_eq!(
            days,
            ["Tuesday", "Wednesday", "Thursday", "Friday", "Saturday"]
        );

        let (status, _) = call(
            &app,
            "PUT",
            "/counsellor/schedule",
            Some(&counsellor),
            Some(json!({ "days": { "Tuesday": { "start": "12:00", "end": "09:00" } } })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = call(&app, "GET", "/counsellor/schedule", Some(&counsellor), None).await;
        assert_eq!(body["schedule"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_messaging_requires_assignment() {
        let (app, _) = app();
        let counsellor_id = register_counsellor(&app, "ada@portal.io").await;
        let (student_id, _) = register_student(&app, "sam@portal.io").await;
        let student = format!("student-{student_id}");
        let counsellor = format!("counsellor-{counsellor_id}");

        let (status, _) = call(
            &app,
            "POST",
            "/messages/send",
            Some(&student),
            Some(json!({ "recipient_id": counsellor_id + 1, "message": "hello" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = call(
            &app,
            "POST",
            "/messages/send",
            Some(&student),
            Some(json!({ "recipient_id": counsellor_id, "message": "   " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(
            &app,
            "POST",
            "/messages/send",
            Some(&student),
            Some(json!({ "recipient_id": counsellor_id, "message": "Can we talk about internships?" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, unread) = call(&app, "GET", "/messages/unread", Some(&counsellor), None).await;
        assert_eq!(unread.as_array().unwrap().len(), 1);

        let uri = format!("/messages/conversation/{student_id}");
        let (_, thread) = call(&app, "GET", &uri, Some(&counsellor), None).await;
        assert_eq!(thread[0]["body"], "Can we talk about internships?");

        let (_, unread) = call(&app, "GET", "/messages/unread", Some(&counsellor), None).await;
        assert!(unread.as_array().unwrap().is_empty());
    }
}
