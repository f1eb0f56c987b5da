/// Database types for portal accounts, scheduling and messaging
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::Row;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// A text value that does not name any variant of the target enum.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown value '{0}'")]
pub struct UnknownVariant(pub String);

/// Declares an enum stored as text, with the same spelling in SQLite and JSON.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant(other.to_string())),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                s.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(d)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

text_enum!(
    /// Which kind of account an id refers to.
    Role {
        Student => "student",
        Counsellor => "counsellor",
        Admin => "admin",
    }
);

text_enum!(
    AppointmentStatus {
        Scheduled => "scheduled",
        Completed => "completed",
        Rescheduled => "rescheduled",
        Cancelled => "cancelled",
    }
);

impl AppointmentStatus {
    /// Active appointments occupy their slot.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Scheduled | AppointmentStatus::Rescheduled
        )
    }
}

text_enum!(
    RequestStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
        Cancelled => "cancelled",
    }
);

text_enum!(
    AppointmentMode {
        Online => "online",
        Offline => "offline",
    }
);

text_enum!(
    TaskStatus {
        Pending => "Pending",
        Completed => "Completed",
    }
);

text_enum!(
    TaskPriority {
        High => "High",
        Medium => "Medium",
        Low => "Low",
    }
);

text_enum!(
    GoalStatus {
        InProgress => "in_progress",
        Completed => "completed",
    }
);

text_enum!(
    MilestoneStatus {
        Pending => "pending",
        Completed => "completed",
    }
);

text_enum!(
    GrievanceStatus {
        Pending => "Pending",
        InProgress => "In Progress",
        Resolved => "Resolved",
    }
);

text_enum!(
    NotificationKind {
        Assignment => "assignment",
        Appointment => "appointment",
        Task => "task",
        Grievance => "grievance",
        Event => "event",
        Feedback => "feedback",
        General => "general",
    }
);

/// Serde helpers for `HH:MM` times.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&time.format("%H:%M").to_string())
    }
}

pub const STUDENT_COLUMNS: &str = "student_id, first_name, last_name, email, phone, dob, address,
     education_level, interests, counsellor_id, is_active, created_at";

#[derive(Debug, Clone, Serialize)]
pub struct DbStudent {
    pub student_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub dob: NaiveDate,
    pub address: Option<String>,
    pub education_level: Option<String>,
    pub interests: String,
    pub counsellor_id: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl DbStudent {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(DbStudent {
            student_id: row.get(0)?,
            first_name: row.get(1)?,
            last_name: row.get(2)?,
            email: row.get(3)?,
            phone: row.get(4)?,
            dob: row.get(5)?,
            address: row.get(6)?,
            education_level: row.get(7)?,
            interests: row.get(8)?,
            counsellor_id: row.get(9)?,
            is_active: row.get(10)?,
            created_at: row.get(11)?,
        })
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone)]
pub struct NewStudent {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub dob: NaiveDate,
    pub address: Option<String>,
    pub education_level: Option<String>,
    pub interests: String,
    pub counsellor_id: Option<i64>,
    pub password_hash: String,
}

pub const COUNSELLOR_COLUMNS: &str = "counsellor_id, first_name, last_name, email, phone,
     specialization, qualification, experience_years, bio, rating, availability_status, created_at";

#[derive(Debug, Clone, Serialize)]
pub struct DbCounsellor {
    pub counsellor_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub specialization: String,
    pub qualification: Option<String>,
    pub experience_years: Option<i64>,
    pub bio: Option<String>,
    pub rating: f64,
    pub availability_status: bool,
    pub created_at: DateTime<Utc>,
}

impl DbCounsellor {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(DbCounsellor {
            counsellor_id: row.get(0)?,
            first_name: row.get(1)?,
            last_name: row.get(2)?,
            email: row.get(3)?,
            phone: row.get(4)?,
            specialization: row.get(5)?,
            qualification: row.get(6)?,
            experience_years: row.get(7)?,
            bio: row.get(8)?,
            rating: row.get(9)?,
            availability_status: row.get(10)?,
            created_at: row.get(11)?,
        })
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone)]
pub struct NewCounsellor {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub specialization: String,
    pub qualification: Option<String>,
    pub experience_years: Option<i64>,
    pub bio: Option<String>,
    pub password_hash: String,
}

pub const APPOINTMENT_COLUMNS: &str = "appointment_id, student_id, counsellor_id, appointment_type,
     appointment_date, start_time, end_time, mode, location, meeting_link, notes, status,
     created_at, updated_at";

#[derive(Debug, Clone, Serialize)]
pub struct DbAppointment {
    pub appointment_id: i64,
    pub student_id: i64,
    pub counsellor_id: i64,
    pub appointment_type: String,
    pub appointment_date: NaiveDate,
    #[serde(serialize_with = "hhmm::serialize")]
    pub start_time: NaiveTime,
    #[serde(serialize_with = "hhmm::serialize")]
    pub end_time: NaiveTime,
    pub mode: AppointmentMode,
    pub location: Option<String>,
    pub meeting_link: Option<String>,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbAppointment {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(DbAppointment {
            appointment_id: row.get(0)?,
            student_id: row.get(1)?,
            counsellor_id: row.get(2)?,
            appointment_type: row.get(3)?,
            appointment_date: row.get(4)?,
            start_time: row.get(5)?,
            end_time: row.get(6)?,
            mode: row.get(7)?,
            location: row.get(8)?,
            meeting_link: row.get(9)?,
            notes: row.get(10)?,
            status: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }
}

/// A booking to validate and insert as a `scheduled` appointment.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub student_id: i64,
    pub counsellor_id: i64,
    pub appointment_type: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub mode: AppointmentMode,
    pub location: Option<String>,
    pub meeting_link: Option<String>,
    pub notes: Option<String>,
}

pub const REQUEST_COLUMNS: &str = "request_id, student_id, counsellor_id, appointment_type,
     preferred_date, preferred_time, mode, notes, status, created_at, updated_at";

#[derive(Debug, Clone, Serialize)]
pub struct DbAppointmentRequest {
    pub request_id: i64,
    pub student_id: i64,
    pub counsellor_id: i64,
    pub appointment_type: String,
    pub preferred_date: NaiveDate,
    #[serde(serialize_with = "hhmm::serialize")]
    pub preferred_time: NaiveTime,
    pub mode: AppointmentMode,
    pub notes: Option<String>,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbAppointmentRequest {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(DbAppointmentRequest {
            request_id: row.get(0)?,
            student_id: row.get(1)?,
            counsellor_id: row.get(2)?,
            appointment_type: row.get(3)?,
            preferred_date: row.get(4)?,
            preferred_time: row.get(5)?,
            mode: row.get(6)?,
            notes: row.get(7)?,
            status: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewAppointmentRequest {
    pub student_id: i64,
    pub counsellor_id: i64,
    pub appointment_type: String,
    pub preferred_date: NaiveDate,
    pub preferred_time: NaiveTime,
    pub mode: AppointmentMode,
    pub notes: Option<String>,
}

/// Where an approved request takes place.
#[derive(Debug, Clone)]
pub struct MeetingPlacement {
    pub meeting_link: String,
    pub office_location: String,
}

pub const NOTIFICATION_COLUMNS: &str = "notification_id, recipient_role, recipient_id, message,
     kind, related_entity_id, is_read, created_at";

#[derive(Debug, Clone, Serialize)]
pub struct DbNotification {
    pub notification_id: i64,
    pub recipient_role: Role,
    pub recipient_id: i64,
    pub message: String,
    pub kind: NotificationKind,
    pub related_entity_id: Option<i64>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl DbNotification {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(DbNotification {
            notification_id: row.get(0)?,
            recipient_role: row.get(1)?,
            recipient_id: row.get(2)?,
            message: row.get(3)?,
            kind: row.get(4)?,
            related_entity_id: row.get(5)?,
            is_read: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub recipient_role: Role,
    pub recipient_id: i64,
    pub message: String,
    pub kind: NotificationKind,
    pub related_entity_id: Option<i64>,
}

pub const MESSAGE_COLUMNS: &str =
    "message_id, sender_role, sender_id, recipient_role, recipient_id, body, sent_at, is_read";

#[derive(Debug, Clone, Serialize)]
pub struct DbMessage {
    pub message_id: i64,
    pub sender_role: Role,
    pub sender_id: i64,
    pub recipient_role: Role,
    pub recipient_id: i64,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub is_read: bool,
}

impl DbMessage {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(DbMessage {
            message_id: row.get(0)?,
            sender_role: row.get(1)?,
            sender_id: row.get(2)?,
            recipient_role: row.get(3)?,
            recipient_id: row.get(4)?,
            body: row.get(5)?,
            sent_at: row.get(6)?,
            is_read: row.get(7)?,
        })
    }
}

/// One conversation partner as seen from the caller.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub partner_id: i64,
    pub partner_role: Role,
    pub name: String,
    pub last_message: DbMessage,
    pub unread_count: i64,
}

pub const TASK_COLUMNS: &str = "task_id, student_id, title, description, due_date, priority,
     category, status, assigned_by, completed_at, created_at";

#[derive(Debug, Clone, Serialize)]
pub struct DbTask {
    pub task_id: i64,
    pub student_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub priority: TaskPriority,
    pub category: Option<String>,
    pub status: TaskStatus,
    pub assigned_by: Option<i64>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl DbTask {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(DbTask {
            task_id: row.get(0)?,
            student_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            due_date: row.get(4)?,
            priority: row.get(5)?,
            category: row.get(6)?,
            status: row.get(7)?,
            assigned_by: row.get(8)?,
            completed_at: row.get(9)?,
            created_at: row.get(10)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub student_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub priority: TaskPriority,
    pub category: Option<String>,
    pub assigned_by: Option<i64>,
}

/// Partial update of a student's own task. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub priority: Option<TaskPriority>,
    pub category: Option<String>,
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskSort {
    #[default]
    DueDate,
    Priority,
    CreatedAt,
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub category: Option<String>,
    pub sort: TaskSort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    pub total: usize,
    pub pending: usize,
    pub completed: usize,
    pub due_soon: usize,
}

pub const GOAL_COLUMNS: &str =
    "goal_id, student_id, title, description, start_date, target_date, status, created_at";

#[derive(Debug, Clone, Serialize)]
pub struct DbGoal {
    pub goal_id: i64,
    pub student_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub target_date: Option<NaiveDate>,
    pub status: GoalStatus,
    pub created_at: DateTime<Utc>,
}

impl DbGoal {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(DbGoal {
            goal_id: row.get(0)?,
            student_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            start_date: row.get(4)?,
            target_date: row.get(5)?,
            status: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewGoal {
    pub student_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub target_date: Option<NaiveDate>,
}

/// Partial update of a goal. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct GoalUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub target_date: Option<NaiveDate>,
    pub status: Option<GoalStatus>,
}

/// A goal as listed for its student.
#[derive(Debug, Clone, Serialize)]
pub struct GoalView {
    #[serde(flatten)]
    pub goal: DbGoal,
    pub milestones: Vec<DbMilestone>,
}

pub const MILESTONE_COLUMNS: &str =
    "milestone_id, goal_id, title, description, due_date, status, created_at";

#[derive(Debug, Clone, Serialize)]
pub struct DbMilestone {
    pub milestone_id: i64,
    pub goal_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub status: MilestoneStatus,
    pub created_at: DateTime<Utc>,
}

impl DbMilestone {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(DbMilestone {
            milestone_id: row.get(0)?,
            goal_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            due_date: row.get(4)?,
            status: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewMilestone {
    pub goal_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct MilestoneUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub status: Option<MilestoneStatus>,
}

pub const GRIEVANCE_COLUMNS: &str =
    "grievance_id, student_id, subject, description, status, response, created_at, updated_at";

#[derive(Debug, Clone, Serialize)]
pub struct DbGrievance {
    pub grievance_id: i64,
    pub student_id: i64,
    pub subject: String,
    pub description: String,
    pub status: GrievanceStatus,
    pub response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbGrievance {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(DbGrievance {
            grievance_id: row.get(0)?,
            student_id: row.get(1)?,
            subject: row.get(2)?,
            description: row.get(3)?,
            status: row.get(4)?,
            response: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}

pub const EVENT_COLUMNS: &str = "event_id, title, description, event_type, event_date,
     start_time, end_time, location, capacity, created_at";

#[derive(Debug, Clone, Serialize)]
pub struct DbEvent {
    pub event_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub event_type: String,
    pub event_date: NaiveDate,
    #[serde(serialize_with = "hhmm::serialize")]
    pub start_time: NaiveTime,
    #[serde(serialize_with = "hhmm::serialize")]
    pub end_time: NaiveTime,
    pub location: Option<String>,
    pub is_online: bool,
    pub capacity: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl DbEvent {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let location: Option<String> = row.get(7)?;
        Ok(DbEvent {
            event_id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            event_type: row.get(3)?,
            event_date: row.get(4)?,
            start_time: row.get(5)?,
            end_time: row.get(6)?,
            is_online: location.is_none(),
            location,
            capacity: row.get(8)?,
            created_at: row.get(9)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub event_type: String,
    pub event_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub location: Option<String>,
    pub capacity: Option<i64>,
}

pub const FEEDBACK_COLUMNS: &str = "feedback_id, student_id, counsellor_id, rating, comments, created_at";

#[derive(Debug, Clone, Serialize)]
pub struct DbFeedback {
    pub feedback_id: i64,
    pub student_id: i64,
    pub counsellor_id: i64,
    pub rating: i64,
    pub comments: String,
    pub created_at: DateTime<Utc>,
}

impl DbFeedback {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(DbFeedback {
            feedback_id: row.get(0)?,
            student_id: row.get(1)?,
            counsellor_id: row.get(2)?,
            rating: row.get(3)?,
            comments: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

/// Stored credentials for a login lookup.
#[derive(Debug, Clone)]
pub struct AccountCredentials {
    pub role: Role,
    pub id: i64,
    pub password_hash: String,
    pub is_active: bool,
}

/// Row counts removed when purging a student's records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeCounts {
    pub messages: usize,
    pub notifications: usize,
    pub feedback: usize,
    pub appointment_requests: usize,
    pub appointments: usize,
    pub grievances: usize,
    pub event_registrations: usize,
    pub tasks: usize,
    pub goal_milestones: usize,
    pub goals: usize,
}

/// What moved when a counsellor was deactivated.
#[derive(Debug, Clone, Serialize)]
pub struct CaseloadTransfer {
    pub from_counsellor_id: i64,
    pub to_counsellor_id: i64,
    pub student_ids: Vec<i64>,
    pub appointments: Vec<DbAppointment>,
    pub pending_requests: usize,
}

/// An event as listed for a student.
#[derive(Debug, Clone, Serialize)]
pub struct StudentEventView {
    #[serde(flatten)]
    pub event: DbEvent,
    pub registered_count: i64,
    pub is_registered: bool,
}
