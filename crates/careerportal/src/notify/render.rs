use super::PortalEvent;
use crate::db::{NewNotification, NotificationKind, Role};
use chrono::{NaiveDate, NaiveTime};

/// `March 04, 2030`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%B %d, %Y").to_string()
}

/// `02:30 PM`
pub fn format_time(time: NaiveTime) -> String {
    time.format("%I:%M %p").to_string()
}

fn at(date: NaiveDate, time: NaiveTime) -> String {
    format!("{} at {}", format_date(date), format_time(time))
}

fn to(
    role: Role,
    id: i64,
    kind: NotificationKind,
    related: Option<i64>,
    message: String,
) -> NewNotification {
    NewNotification {
        recipient_role: role,
        recipient_id: id,
        message,
        kind,
        related_entity_id: related,
    }
}

/// Renders an event into the notification rows it produces.
pub fn notifications_for(event: &PortalEvent) -> Vec<NewNotification> {
    use NotificationKind as K;
    use Role::{Counsellor, Student};

    match event {
        PortalEvent::CounsellorAssigned {
            student_id,
            student_name,
            counsellor_id,
            counsellor_name,
            previous_counsellor_id,
            by_matching,
        } => {
            let mut rows = vec![
                to(
                    Counsellor,
                    *counsellor_id,
                    K::Assignment,
                    Some(*student_id),
                    if *by_matching {
                        format!("New student {student_name} has been assigned to you based on matching interests.")
                    } else {
                        format!("New student {student_name} has been assigned to you.")
                    },
                ),
                to(
                    Student,
                    *student_id,
                    K::Assignment,
                    Some(*counsellor_id),
                    format!("You have been assigned to a counsellor: {counsellor_name}."),
                ),
            ];
            if let Some(previous) = previous_counsellor_id.filter(|p| p != counsellor_id) {
                rows.push(to(
                    Counsellor,
                    previous,
                    K::Assignment,
                    Some(*student_id),
                    format!("Student {student_name} has been reassigned to another counsellor."),
                ));
            }
            rows
        }

        PortalEvent::AppointmentRequested {
            request,
            student_name,
        } => {
            let when = at(request.preferred_date, request.preferred_time);
            vec![
                to(
                    Counsellor,
                    request.counsellor_id,
                    K::Appointment,
                    Some(request.request_id),
                    format!("New appointment request from {student_name} for {when}"),
                ),
                to(
                    Student,
                    request.student_id,
                    K::Appointment,
                    Some(request.request_id),
                    format!("Your appointment request for {when} has been submitted."),
                ),
            ]
        }

        PortalEvent::RequestApproved {
            request,
            appointment,
        } => {
            let when = at(appointment.appointment_date, appointment.start_time);
            vec![
                to(
                    Student,
                    request.student_id,
                    K::Appointment,
                    Some(appointment.appointment_id),
                    format!("Your appointment request for {when} has been approved."),
                ),
                to(
                    Counsellor,
                    request.counsellor_id,
                    K::Appointment,
                    Some(appointment.appointment_id),
                    format!("New appointment scheduled for {when}"),
                ),
            ]
        }

        PortalEvent::RequestRejected { request } => vec![to(
            Student,
            request.student_id,
            K::Appointment,
            Some(request.request_id),
            format!(
                "Your appointment request for {} has been rejected.",
                at(request.preferred_date, request.preferred_time)
            ),
        )],

        PortalEvent::RequestCancelled { request } => {
            let when = at(request.preferred_date, request.preferred_time);
            vec![
                to(
                    Counsellor,
                    request.counsellor_id,
                    K::Appointment,
                    Some(request.request_id),
                    format!("Appointment request for {when} has been cancelled by the student."),
                ),
                to(
                    Student,
                    request.student_id,
                    K::Appointment,
                    Some(request.request_id),
                    format!("You have cancelled your appointment request for {when}."),
                ),
            ]
        }

        PortalEvent::AppointmentScheduled { appointment } => vec![to(
            Student,
            appointment.student_id,
            K::Appointment,
            Some(appointment.appointment_id),
            format!(
                "New appointment scheduled with your counsellor for {}",
                at(appointment.appointment_date, appointment.start_time)
            ),
        )],

        PortalEvent::AppointmentRescheduled {
            appointment,
            student_name,
        } => {
            let when = at(appointment.appointment_date, appointment.start_time);
            vec![
                to(
                    Student,
                    appointment.student_id,
                    K::Appointment,
                    Some(appointment.appointment_id),
                    format!("Your appointment has been rescheduled to {when}"),
                ),
                to(
                    Counsellor,
                    appointment.counsellor_id,
                    K::Appointment,
                    Some(appointment.appointment_id),
                    format!("Appointment with {student_name} has been rescheduled to {when}"),
                ),
            ]
        }

        PortalEvent::AppointmentCompleted { appointment } => vec![to(
            Student,
            appointment.student_id,
            K::Appointment,
            Some(appointment.appointment_id),
            format!(
                "Your appointment on {} has been marked as completed.",
                at(appointment.appointment_date, appointment.start_time)
            ),
        )],

        PortalEvent::CaseloadTransferred {
            transfer,
            from_name,
            to_name,
        } => {
            let mut rows = vec![to(
                Counsellor,
                transfer.to_counsellor_id,
                K::Assignment,
                Some(transfer.from_counsellor_id),
                format!(
                    "You have been assigned {} student(s) and {} appointment(s) from {from_name} who is now unavailable.",
                    transfer.student_ids.len(),
                    transfer.appointments.len()
                ),
            )];
            rows.extend(transfer.student_ids.iter().map(|&student_id| {
                to(
                    Student,
                    student_id,
                    K::Assignment,
                    Some(transfer.to_counsellor_id),
                    format!("Your counsellor has been changed to {to_name} as your previous counsellor is no longer available."),
                )
            }));
            rows.extend(transfer.appointments.iter().map(|appt| {
                to(
                    Student,
                    appt.student_id,
                    K::Appointment,
                    Some(appt.appointment_id),
                    format!(
                        "Your appointment on {} has been reassigned to {to_name}.",
                        at(appt.appointment_date, appt.start_time)
                    ),
                )
            }));
            rows
        }

        PortalEvent::SlotRejected { .. } => Vec::new(),

        PortalEvent::TaskAssigned { task } => vec![to(
            Student,
            task.student_id,
            K::Task,
            Some(task.task_id),
            format!("New task assigned: {}", task.title),
        )],

        PortalEvent::TaskDeleted { task } => vec![to(
            Student,
            task.student_id,
            K::Task,
            Some(task.task_id),
            format!("Task deleted: {}", task.title),
        )],

        PortalEvent::TaskCompleted { task, student_name } => match task.assigned_by {
            Some(counsellor_id) => vec![to(
                Counsellor,
                counsellor_id,
                K::Task,
                Some(task.task_id),
                format!("Student {student_name} completed task: {}", task.title),
            )],
            None => Vec::new(),
        },

        PortalEvent::GrievanceSubmitted { grievance } => vec![to(
            Student,
            grievance.student_id,
            K::Grievance,
            Some(grievance.grievance_id),
            format!(
                "Your grievance \"{}\" has been submitted successfully.",
                grievance.subject
            ),
        )],

        PortalEvent::GrievanceStatusChanged { grievance } => vec![to(
            Student,
            grievance.student_id,
            K::Grievance,
            Some(grievance.grievance_id),
            format!("Your grievance has been marked as {}.", grievance.status),
        )],

        PortalEvent::EventRegistered { event, student_id } => vec![to(
            Student,
            *student_id,
            K::Event,
            Some(event.event_id),
            format!(
                "You have successfully registered for {} on {}.",
                event.title,
                format_date(event.event_date)
            ),
        )],

        PortalEvent::EventCancelled { event, student_ids } => student_ids
            .iter()
            .map(|&student_id| {
                to(
                    Student,
                    student_id,
                    K::Event,
                    Some(event.event_id),
                    format!(
                        "Event \"{}\" scheduled for {} has been cancelled.",
                        event.title,
                        format_date(event.event_date)
                    ),
                )
            })
            .collect(),

        PortalEvent::FeedbackReceived {
            feedback,
            student_name,
        } => vec![to(
            Counsellor,
            feedback.counsellor_id,
            K::Feedback,
            Some(feedback.feedback_id),
            format!("New weekly feedback received from {student_name}"),
        )],
    }
}
