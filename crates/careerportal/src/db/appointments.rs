use super::counsellors::check_slot;
use super::{
    not_found_as, now, AppointmentStatus, DbAppointment, DbResult, NewAppointment,
    PortalDbManager, APPOINTMENT_COLUMNS,
};
use crate::error::PortalError;
use crate::scheduling::{Slot, SlotRejection};
use chrono::{NaiveDate, NaiveTime};
use rusqlite::{params, Connection};
use tracing::{info, warn};

impl PortalDbManager {
    /// Validates a slot against the counsellor's schedule and current bookings
    ///
    /// `excluding` leaves one appointment out of the conflict check, so an
    /// appointment being rescheduled does not collide with itself.
    pub fn validate_slot(
        &self,
        counsellor_id: i64,
        date: NaiveDate,
        start: NaiveTime,
        excluding: Option<i64>,
    ) -> DbResult<Slot> {
        let db = self.conn()?;
        check_slot(&db, counsellor_id, date, start, excluding)
    }

    /// Validates and inserts a `scheduled` appointment in one transaction
    pub fn book_appointment(&self, booking: &NewAppointment) -> DbResult<DbAppointment> {
        let mut db = self.conn()?;
        let tx = db.transaction()?;
        let appointment = insert_booking(&tx, booking)?;
        tx.commit()?;

        info!(
            "Booked appointment {} for student {} with counsellor {} on {} at {}",
            appointment.appointment_id,
            booking.student_id,
            booking.counsellor_id,
            booking.date,
            booking.start_time.format("%H:%M")
        );
        Ok(appointment)
    }

    pub fn get_appointment(&self, appointment_id: i64) -> DbResult<DbAppointment> {
        let db = self.conn()?;
        fetch_appointment(&db, appointment_id)
    }

    /// A student's appointments in date order
    pub fn student_appointments(&self, student_id: i64) -> DbResult<Vec<DbAppointment>> {
        self.appointments_where("student_id", student_id)
    }

    /// A counsellor's appointments in date order
    pub fn counsellor_appointments(&self, counsellor_id: i64) -> DbResult<Vec<DbAppointment>> {
        self.appointments_where("counsellor_id", counsellor_id)
    }

    fn appointments_where(&self, column: &str, id: i64) -> DbResult<Vec<DbAppointment>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE {column} = ?
             ORDER BY appointment_date, start_time, appointment_id"
        ))?;
        let rows = stmt.query_map([id], DbAppointment::from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Moves a student's active appointment to a new slot
    pub fn reschedule_appointment(
        &self,
        appointment_id: i64,
        student_id: i64,
        date: NaiveDate,
        start: NaiveTime,
    ) -> DbResult<DbAppointment> {
        let mut db = self.conn()?;
        let tx = db.transaction()?;

        let current = fetch_appointment(&tx, appointment_id)?;
        if current.student_id != student_id {
            return Err(PortalError::not_found("Appointment"));
        }
        if !current.status.is_active() {
            return Err(PortalError::conflict(format!(
                "Cannot reschedule a {} appointment",
                current.status
            )));
        }

        let slot = check_slot(&tx, current.counsellor_id, date, start, Some(appointment_id))?;
        tx.execute(
            "UPDATE appointments
             SET appointment_date = ?1, start_time = ?2, end_time = ?3, status = ?4, updated_at = ?5
             WHERE appointment_id = ?6",
            params![
                slot.date,
                slot.start,
                slot.end,
                AppointmentStatus::Rescheduled,
                now(),
                appointment_id
            ],
        )
        .map_err(slot_taken)?;
        let updated = fetch_appointment(&tx, appointment_id)?;
        tx.commit()?;

        info!("Appointment {appointment_id} rescheduled to {date} {}", start.format("%H:%M"));
        Ok(updated)
    }

    /// Marks a counsellor's active appointment completed
    pub fn complete_appointment(
        &self,
        appointment_id: i64,
        counsellor_id: i64,
    ) -> DbResult<DbAppointment> {
        let mut db = self.conn()?;
        let tx = db.transaction()?;

        let current = fetch_appointment(&tx, appointment_id)?;
        if current.counsellor_id != counsellor_id {
            return Err(PortalError::not_found("Appointment"));
        }
        if !current.status.is_active() {
            return Err(PortalError::conflict(format!(
                "Cannot complete a {} appointment",
                current.status
            )));
        }

        tx.execute(
            "UPDATE appointments SET status = ?1, updated_at = ?2 WHERE appointment_id = ?3",
            params![AppointmentStatus::Completed, now(), appointment_id],
        )?;
        let updated = fetch_appointment(&tx, appointment_id)?;
        tx.commit()?;

        info!("Appointment {appointment_id} completed");
        Ok(updated)
    }
}

/// Validates the slot and inserts the appointment on an open transaction
pub(super) fn insert_booking(conn: &Connection, booking: &NewAppointment) -> DbResult<DbAppointment> {
    let slot = check_slot(
        conn,
        booking.counsellor_id,
        booking.date,
        booking.start_time,
        None,
    )?;

    let stamp = now();
    conn.execute(
        "INSERT INTO appointments (student_id, counsellor_id, appointment_type, appointment_date,
                                   start_time, end_time, mode, location, meeting_link, notes,
                                   status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
        params![
            booking.student_id,
            booking.counsellor_id,
            booking.appointment_type,
            slot.date,
            slot.start,
            slot.end,
            booking.mode,
            booking.location,
            booking.meeting_link,
            booking.notes,
            AppointmentStatus::Scheduled,
            stamp,
        ],
    )
    .map_err(slot_taken)?;

    fetch_appointment(conn, conn.last_insert_rowid())
}

fn fetch_appointment(conn: &Connection, appointment_id: i64) -> DbResult<DbAppointment> {
    not_found_as(
        "Appointment",
        conn.query_row(
            &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE appointment_id = ?"),
            [appointment_id],
            DbAppointment::from_row,
        ),
    )
}

/// The active-slot index is the only unique constraint on appointments
fn slot_taken(e: rusqlite::Error) -> PortalError {
    let err = PortalError::from(e);
    if err.is_constraint_violation() {
        warn!("Active slot index rejected a booking: {err}");
        SlotRejection::SlotAlreadyBooked.into()
    } else {
        err
    }
}
