use super::{
    not_found_as, now, today, DbEvent, DbResult, NewEvent, PortalDbManager, StudentEventView,
    EVENT_COLUMNS,
};
use crate::error::PortalError;
use rusqlite::{params, Connection};
use tracing::info;

impl PortalDbManager {
    pub fn insert_event(&self, event: &NewEvent) -> DbResult<DbEvent> {
        if event.start_time >= event.end_time {
            return Err(PortalError::invalid("Event must start before it ends"));
        }
        if event.capacity.is_some_and(|c| c < 1) {
            return Err(PortalError::invalid("Capacity must be at least 1"));
        }

        let db = self.conn()?;
        db.execute(
            "INSERT INTO events (title, description, event_type, event_date, start_time,
                                 end_time, location, capacity, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                event.title,
                event.description,
                event.event_type,
                event.event_date,
                event.start_time,
                event.end_time,
                event.location,
                event.capacity,
                now(),
            ],
        )?;
        fetch_event(&db, db.last_insert_rowid())
    }

    /// Events today or later, soonest first
    pub fn upcoming_events(&self) -> DbResult<Vec<DbEvent>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE event_date >= ?
             ORDER BY event_date, start_time, event_id"
        ))?;
        let rows = stmt.query_map([today()], DbEvent::from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Upcoming events with the student's registration flag
    pub fn student_events(&self, student_id: i64) -> DbResult<Vec<StudentEventView>> {
        let events = self.upcoming_events()?;
        let db = self.conn()?;
        events
            .into_iter()
            .map(|event| {
                let registered_count = registration_count(&db, event.event_id)?;
                let is_registered = is_registered(&db, event.event_id, student_id)?;
                Ok(StudentEventView {
                    event,
                    registered_count,
                    is_registered,
                })
            })
            .collect()
    }

    /// Registers a student for an upcoming event with free capacity
    pub fn register_for_event(&self, event_id: i64, student_id: i64) -> DbResult<DbEvent> {
        let mut db = self.conn()?;
        let tx = db.transaction()?;
        let event = fetch_event(&tx, event_id)?;

        if event.event_date < today() {
            return Err(PortalError::invalid("Cannot register for past events"));
        }
        if is_registered(&tx, event_id, student_id)? {
            return Err(PortalError::conflict("You are already registered for this event"));
        }
        if let Some(capacity) = event.capacity {
            if registration_count(&tx, event_id)? >= capacity {
                return Err(PortalError::conflict("Event is full"));
            }
        }

        tx.execute(
            "INSERT INTO event_registrations (event_id, student_id, registered_at, attendance_status)
             VALUES (?1, ?2, ?3, 'Registered')",
            params![event_id, student_id, now()],
        )?;
        tx.commit()?;

        info!("Student {student_id} registered for event {event_id}");
        Ok(event)
    }

    /// Removes one registration
    pub fn unregister_from_event(&self, event_id: i64, student_id: i64) -> DbResult<()> {
        let db = self.conn()?;
        let removed = db.execute(
            "DELETE FROM event_registrations WHERE event_id = ? AND student_id = ?",
            [event_id, student_id],
        )?;
        if removed == 0 {
            return Err(PortalError::not_found("Registration"));
        }
        Ok(())
    }

    /// Deletes an event together with its registrations
    ///
    /// # Returns
    /// The deleted event and the students that were registered for it.
    pub fn delete_event(&self, event_id: i64) -> DbResult<(DbEvent, Vec<i64>)> {
        let mut db = self.conn()?;
        let tx = db.transaction()?;
        let event = fetch_event(&tx, event_id)?;
        let registrants = {
            let mut stmt = tx.prepare(
                "SELECT student_id FROM event_registrations WHERE event_id = ? ORDER BY student_id",
            )?;
            let rows = stmt.query_map([event_id], |row| row.get(0))?;
            rows.collect::<Result<Vec<i64>, _>>()?
        };
        tx.execute("DELETE FROM events WHERE event_id = ?", [event_id])?;
        tx.commit()?;

        info!("Deleted event {event_id} with {} registration(s)", registrants.len());
        Ok((event, registrants))
    }
}

fn fetch_event(conn: &Connection, event_id: i64) -> DbResult<DbEvent> {
    not_found_as(
        "Event",
        conn.query_row(
            &format!("SELECT {EVENT_COLUMNS} FROM events WHERE event_id = ?"),
            [event_id],
            DbEvent::from_row,
        ),
    )
}

fn registration_count(conn: &Connection, event_id: i64) -> DbResult<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM event_registrations WHERE event_id = ?",
        [event_id],
        |row| row.get(0),
    )?)
}

fn is_registered(conn: &Connection, event_id: i64, student_id: i64) -> DbResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM event_registrations WHERE event_id = ? AND student_id = ?",
        [event_id, student_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
