//! Domain events emitted by portal flows and the sinks that consume them.
//!
//! Handlers publish a [`PortalEvent`] after a state change commits. The core
//! procedures (matching and slot validation) never write notifications
//! themselves.

mod render;

use render::notifications_for;

use crate::db::{
    CaseloadTransfer, DbAppointment, DbAppointmentRequest, DbEvent, DbFeedback, DbGrievance,
    DbTask, PortalDbManager,
};
use crate::scheduling::SlotRejection;
use chrono::{NaiveDate, NaiveTime};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Something that happened in the portal that people may need to hear about.
#[derive(Debug, Clone)]
pub enum PortalEvent {
    CounsellorAssigned {
        student_id: i64,
        student_name: String,
        counsellor_id: i64,
        counsellor_name: String,
        /// Counsellor the student was moved away from, if any
        previous_counsellor_id: Option<i64>,
        by_matching: bool,
    },
    AppointmentRequested {
        request: DbAppointmentRequest,
        student_name: String,
    },
    RequestApproved {
        request: DbAppointmentRequest,
        appointment: DbAppointment,
    },
    RequestRejected {
        request: DbAppointmentRequest,
    },
    RequestCancelled {
        request: DbAppointmentRequest,
    },
    AppointmentScheduled {
        appointment: DbAppointment,
    },
    AppointmentRescheduled {
        appointment: DbAppointment,
        student_name: String,
    },
    AppointmentCompleted {
        appointment: DbAppointment,
    },
    CaseloadTransferred {
        transfer: CaseloadTransfer,
        from_name: String,
        to_name: String,
    },
    SlotRejected {
        counsellor_id: i64,
        student_id: i64,
        date: NaiveDate,
        start: NaiveTime,
        rejection: SlotRejection,
    },
    TaskAssigned {
        task: DbTask,
    },
    TaskDeleted {
        task: DbTask,
    },
    TaskCompleted {
        task: DbTask,
        student_name: String,
    },
    GrievanceSubmitted {
        grievance: DbGrievance,
    },
    GrievanceStatusChanged {
        grievance: DbGrievance,
    },
    EventRegistered {
        event: DbEvent,
        student_id: i64,
    },
    EventCancelled {
        event: DbEvent,
        student_ids: Vec<i64>,
    },
    FeedbackReceived {
        feedback: DbFeedback,
        student_name: String,
    },
}

/// Consumer of portal events. Publishing never fails the caller.
pub trait NotificationSink: Send + Sync {
    fn publish(&self, event: &PortalEvent);
}

/// Stores rendered notifications in the portal database.
pub struct DbNotifier {
    db: Arc<PortalDbManager>,
}

impl DbNotifier {
    pub fn new(db: Arc<PortalDbManager>) -> Self {
        Self { db }
    }
}

impl NotificationSink for DbNotifier {
    fn publish(&self, event: &PortalEvent) {
        if let PortalEvent::SlotRejected {
            counsellor_id,
            student_id,
            date,
            start,
            rejection,
        } = event
        {
            warn!(
                "Slot {date} {} with counsellor {counsellor_id} rejected for student {student_id}: {rejection}",
                start.format("%H:%M")
            );
        }

        let rows = notifications_for(event);
        if rows.is_empty() {
            return;
        }

        match self.db.insert_notifications(&rows) {
            Ok(n) => info!("Stored {n} notification(s)"),
            Err(e) => error!("Failed to store notifications: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Role;

    #[test]
    fn test_db_notifier_stores_rows() {
        let db = Arc::new(PortalDbManager::open_in_memory().unwrap());
        let notifier = DbNotifier::new(Arc::clone(&db));

        notifier.publish(&PortalEvent::CounsellorAssigned {
            student_id: 3,
            student_name: "Sam Student".into(),
            counsellor_id: 7,
            counsellor_name: "Ada Counsellor".into(),
            previous_counsellor_id: None,
            by_matching: true,
        });

        let student = db.list_notifications(Role::Student, 3, false, 20).unwrap();
        let counsellor = db.list_notifications(Role::Counsellor, 7, false, 20).unwrap();
        assert_eq!(student.len(), 1);
        assert_eq!(counsellor.len(), 1);
        assert!(counsellor[0].message.contains("Sam Student"));
    }

    #[test]
    fn test_slot_rejection_stores_nothing() {
        let db = Arc::new(PortalDbManager::open_in_memory().unwrap());
        let notifier = DbNotifier::new(Arc::clone(&db));
        notifier.publish(&PortalEvent::SlotRejected {
            counsellor_id: 1,
            student_id: 2,
            date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            rejection: SlotRejection::PastDate,
        });
        assert!(db.list_notifications(Role::Student, 2, false, 20).unwrap().is_empty());
    }

    #[test]
    fn test_event_cancellation_notifies_each_registrant() {
        let db = Arc::new(PortalDbManager::open_in_memory().unwrap());
        let notifier = DbNotifier::new(Arc::clone(&db));
        notifier.publish(&PortalEvent::EventCancelled {
            event: crate::db::DbEvent {
                event_id: 1,
                title: "Fair".into(),
                description: None,
                event_type: "Fair".into(),
                event_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
                start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                location: None,
                is_online: true,
                capacity: None,
                created_at: chrono::Utc::now(),
            },
            student_ids: vec![1, 2],
        });
        for student in [1, 2] {
            let rows = db.list_notifications(Role::Student, student, false, 20).unwrap();
            assert_eq!(rows.len(), 1);
            assert!(rows[0].message.contains("January 01, 2030"));
        }
    }
}
