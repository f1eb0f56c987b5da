use super::appointments::insert_booking;
use super::counsellors::check_slot;
use super::{
    not_found_as, now, AppointmentMode, DbAppointment, DbAppointmentRequest, DbResult,
    MeetingPlacement, NewAppointment, NewAppointmentRequest, PortalDbManager, RequestStatus,
    REQUEST_COLUMNS,
};
use crate::error::PortalError;
use rusqlite::{params, Connection};
use tracing::info;

impl PortalDbManager {
    /// Validates the preferred slot and stores a `pending` request
    pub fn insert_request(&self, request: &NewAppointmentRequest) -> DbResult<DbAppointmentRequest> {
        let db = self.conn()?;
        check_slot(
            &db,
            request.counsellor_id,
            request.preferred_date,
            request.preferred_time,
            None,
        )?;

        let stamp = now();
        db.execute(
            "INSERT INTO appointment_requests (student_id, counsellor_id, appointment_type,
                                               preferred_date, preferred_time, mode, notes,
                                               status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                request.student_id,
                request.counsellor_id,
                request.appointment_type,
                request.preferred_date,
                request.preferred_time,
                request.mode,
                request.notes,
                RequestStatus::Pending,
                stamp,
            ],
        )?;
        let created = fetch_request(&db, db.last_insert_rowid())?;

        info!(
            "Request {} from student {} to counsellor {}",
            created.request_id, created.student_id, created.counsellor_id
        );
        Ok(created)
    }

    pub fn get_request(&self, request_id: i64) -> DbResult<DbAppointmentRequest> {
        let db = self.conn()?;
        fetch_request(&db, request_id)
    }

    /// A student's requests, newest first
    pub fn student_requests(&self, student_id: i64) -> DbResult<Vec<DbAppointmentRequest>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(&format!(
            "SELECT {REQUEST_COLUMNS} FROM appointment_requests WHERE student_id = ?
             ORDER BY created_at DESC, request_id DESC"
        ))?;
        let rows = stmt.query_map([student_id], DbAppointmentRequest::from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Pending requests addressed to a counsellor, by preferred slot
    pub fn pending_requests(&self, counsellor_id: i64) -> DbResult<Vec<DbAppointmentRequest>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(&format!(
            "SELECT {REQUEST_COLUMNS} FROM appointment_requests
             WHERE counsellor_id = ? AND status = 'pending'
             ORDER BY preferred_date, preferred_time, request_id"
        ))?;
        let rows = stmt.query_map([counsellor_id], DbAppointmentRequest::from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Cancels one of the student's own pending requests
    pub fn cancel_request(&self, request_id: i64, student_id: i64) -> DbResult<DbAppointmentRequest> {
        let db = self.conn()?;
        let request = fetch_request(&db, request_id)?;
        if request.student_id != student_id {
            return Err(PortalError::not_found("Appointment request"));
        }
        resolve(&db, &request, RequestStatus::Cancelled)
    }

    /// Rejects a pending request. `counsellor_id` restricts it to that counsellor's requests.
    pub fn reject_request(
        &self,
        request_id: i64,
        counsellor_id: Option<i64>,
    ) -> DbResult<DbAppointmentRequest> {
        let db = self.conn()?;
        let request = fetch_owned(&db, request_id, counsellor_id)?;
        resolve(&db, &request, RequestStatus::Rejected)
    }

    /// Approves a pending request and creates its appointment in one transaction.
    ///
    /// The slot is validated again at approval time. If it no longer passes,
    /// nothing changes and the request stays pending.
    pub fn approve_request(
        &self,
        request_id: i64,
        counsellor_id: Option<i64>,
        placement: &MeetingPlacement,
    ) -> DbResult<(DbAppointmentRequest, DbAppointment)> {
        let mut db = self.conn()?;
        let tx = db.transaction()?;

        let request = fetch_owned(&tx, request_id, counsellor_id)?;
        ensure_pending(&request)?;

        let (location, meeting_link) = match request.mode {
            AppointmentMode::Online => (None, Some(placement.meeting_link.clone())),
            AppointmentMode::Offline => (Some(placement.office_location.clone()), None),
        };
        let appointment = insert_booking(
            &tx,
            &NewAppointment {
                student_id: request.student_id,
                counsellor_id: request.counsellor_id,
                appointment_type: request.appointment_type.clone(),
                date: request.preferred_date,
                start_time: request.preferred_time,
                mode: request.mode,
                location,
                meeting_link,
                notes: request.notes.clone(),
            },
        )?;
        let approved = resolve(&tx, &request, RequestStatus::Approved)?;
        tx.commit()?;

        Ok((approved, appointment))
    }
}

fn fetch_request(conn: &Connection, request_id: i64) -> DbResult<DbAppointmentRequest> {
    not_found_as(
        "Appointment request",
        conn.query_row(
            &format!("SELECT {REQUEST_COLUMNS} FROM appointment_requests WHERE request_id = ?"),
            [request_id],
            DbAppointmentRequest::from_row,
        ),
    )
}

fn fetch_owned(
    conn: &Connection,
    request_id: i64,
    counsellor_id: Option<i64>,
) -> DbResult<DbAppointmentRequest> {
    let request = fetch_request(conn, request_id)?;
    match counsellor_id {
        Some(id) if id != request.counsellor_id => Err(PortalError::not_found("Appointment request")),
        _ => Ok(request),
    }
}

fn ensure_pending(request: &DbAppointmentRequest) -> DbResult<()> {
    if request.status != RequestStatus::Pending {
        return Err(PortalError::conflict(format!(
            "Request is already {}",
            request.status
        )));
    }
    Ok(())
}

/// Moves a pending request to a terminal status
fn resolve(
    conn: &Connection,
    request: &DbAppointmentRequest,
    status: RequestStatus,
) -> DbResult<DbAppointmentRequest> {
    ensure_pending(request)?;
    conn.execute(
        "UPDATE appointment_requests SET status = ?1, updated_at = ?2
         WHERE request_id = ?3 AND status = 'pending'",
        params![status, now(), request.request_id],
    )?;
    info!("Request {} is now {status}", request.request_id);
    fetch_request(conn, request.request_id)
}
