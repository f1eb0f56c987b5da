use super::{
    not_found_as, now, today, CaseloadTransfer, DbAppointment, DbCounsellor, DbResult,
    NewCounsellor, PortalDbManager, APPOINTMENT_COLUMNS, COUNSELLOR_COLUMNS,
};
use crate::error::PortalError;
use crate::matching::CounsellorProfile;
use crate::scheduling::{self, overlaps, parse_weekday, weekday_name, DayHours};
use chrono::NaiveTime;
use rusqlite::types::Type;
use rusqlite::{params, Connection};
use tracing::{info, warn};

impl PortalDbManager {
    pub fn insert_counsellor(&self, counsellor: &NewCounsellor) -> DbResult<i64> {
        let db = self.conn()?;
        db.execute(
            "INSERT INTO counsellors (first_name, last_name, email, phone, specialization,
                                      qualification, experience_years, bio, rating,
                                      availability_status, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, 1, ?9, ?10)",
            params![
                counsellor.first_name,
                counsellor.last_name,
                counsellor.email,
                counsellor.phone,
                counsellor.specialization,
                counsellor.qualification,
                counsellor.experience_years,
                counsellor.bio,
                counsellor.password_hash,
                now(),
            ],
        )?;
        Ok(db.last_insert_rowid())
    }

    pub fn get_counsellor(&self, counsellor_id: i64) -> DbResult<DbCounsellor> {
        let db = self.conn()?;
        not_found_as(
            "Counsellor",
            db.query_row(
                &format!("SELECT {COUNSELLOR_COLUMNS} FROM counsellors WHERE counsellor_id = ?"),
                [counsellor_id],
                DbCounsellor::from_row,
            ),
        )
    }

    pub fn list_counsellors(&self) -> DbResult<Vec<DbCounsellor>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(&format!(
            "SELECT {COUNSELLOR_COLUMNS} FROM counsellors ORDER BY counsellor_id"
        ))?;
        let rows = stmt.query_map([], DbCounsellor::from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Available counsellors in id order, as input to matching
    pub fn list_available_profiles(&self) -> DbResult<Vec<CounsellorProfile>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(
            "SELECT counsellor_id, specialization, rating FROM counsellors
             WHERE availability_status = 1
             ORDER BY counsellor_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(CounsellorProfile {
                id: row.get(0)?,
                specialization: row.get(1)?,
                rating: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn is_counsellor_available(&self, counsellor_id: i64) -> DbResult<bool> {
        let db = self.conn()?;
        is_available(&db, counsellor_id)
    }

    /// The counsellor's weekly schedule, Monday first
    pub fn get_schedule(&self, counsellor_id: i64) -> DbResult<Vec<DayHours>> {
        let db = self.conn()?;
        load_schedule(&db, counsellor_id)
    }

    /// Replaces the whole weekly schedule in one transaction
    pub fn replace_schedule(&self, counsellor_id: i64, hours: &[DayHours]) -> DbResult<()> {
        self.update_schedule(counsellor_id, |_| Ok(hours.to_vec()))?;
        Ok(())
    }

    /// Reads the schedule, applies `merge` and writes the result, all in one transaction
    pub fn update_schedule<F>(&self, counsellor_id: i64, merge: F) -> DbResult<Vec<DayHours>>
    where
        F: FnOnce(Vec<DayHours>) -> DbResult<Vec<DayHours>>,
    {
        let mut db = self.conn()?;
        let tx = db.transaction()?;
        let hours = merge(load_schedule(&tx, counsellor_id)?)?;
        if let Some(bad) = hours.iter().find(|h| h.start >= h.end) {
            return Err(PortalError::invalid(format!(
                "Start time must be before end time for {}",
                weekday_name(bad.day)
            )));
        }

        tx.execute(
            "DELETE FROM counsellor_schedules WHERE counsellor_id = ?",
            [counsellor_id],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO counsellor_schedules (counsellor_id, day_of_week, start_time, end_time)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for h in &hours {
                stmt.execute(params![counsellor_id, weekday_name(h.day), h.start, h.end])?;
            }
        }
        tx.commit()?;

        info!(
            "Counsellor {counsellor_id} schedule replaced with {} day(s)",
            hours.len()
        );
        Ok(hours)
    }

    /// Flips a counsellor's availability.
    ///
    /// Deactivation requires an available `replacement_id` other than the
    /// counsellor itself. Assigned students, future active appointments and
    /// pending requests move to the replacement in the same transaction. If a
    /// moved appointment would overlap one of the replacement's bookings the
    /// whole deactivation is refused.
    ///
    /// # Returns
    /// The new availability flag and, on deactivation, what was transferred.
    pub fn toggle_counsellor_status(
        &self,
        counsellor_id: i64,
        replacement_id: Option<i64>,
    ) -> DbResult<(bool, Option<CaseloadTransfer>)> {
        let mut db = self.conn()?;
        let tx = db.transaction()?;

        let available: bool = not_found_as(
            "Counsellor",
            tx.query_row(
                "SELECT availability_status FROM counsellors WHERE counsellor_id = ?",
                [counsellor_id],
                |row| row.get(0),
            ),
        )?;

        if !available {
            tx.execute(
                "UPDATE counsellors SET availability_status = 1 WHERE counsellor_id = ?",
                [counsellor_id],
            )?;
            tx.commit()?;
            info!("Counsellor {counsellor_id} reactivated");
            return Ok((true, None));
        }

        let replacement_id = replacement_id.ok_or_else(|| {
            PortalError::invalid("A replacement counsellor is required to deactivate")
        })?;
        if replacement_id == counsellor_id {
            return Err(PortalError::invalid(
                "Replacement must be a different counsellor",
            ));
        }
        if !is_available(&tx, replacement_id)? {
            return Err(PortalError::invalid(
                "Replacement counsellor is not available",
            ));
        }

        let student_ids = {
            let mut stmt =
                tx.prepare("SELECT student_id FROM students WHERE counsellor_id = ? ORDER BY student_id")?;
            let rows = stmt.query_map([counsellor_id], |row| row.get(0))?;
            rows.collect::<Result<Vec<i64>, _>>()?
        };

        let moving = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {APPOINTMENT_COLUMNS} FROM appointments
                 WHERE counsellor_id = ? AND appointment_date >= ?
                   AND status IN ('scheduled', 'rescheduled')
                 ORDER BY appointment_date, start_time"
            ))?;
            let rows = stmt.query_map(params![counsellor_id, today()], DbAppointment::from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let mut claimed: Vec<(chrono::NaiveDate, NaiveTime)> = Vec::new();
        for appt in &moving {
            let mut booked = active_starts(&tx, replacement_id, appt.appointment_date, None)?;
            booked.extend(
                claimed
                    .iter()
                    .filter(|(d, _)| *d == appt.appointment_date)
                    .map(|(_, s)| *s),
            );
            if booked.iter().any(|&b| overlaps(appt.start_time, b)) {
                warn!(
                    "Refusing to deactivate counsellor {counsellor_id}: appointment {} clashes with counsellor {replacement_id}",
                    appt.appointment_id
                );
                return Err(PortalError::conflict(format!(
                    "Appointment on {} at {} overlaps an existing booking of the replacement counsellor",
                    appt.appointment_date,
                    appt.start_time.format("%H:%M")
                )));
            }
            claimed.push((appt.appointment_date, appt.start_time));
        }

        tx.execute(
            "UPDATE students SET counsellor_id = ?1 WHERE counsellor_id = ?2",
            [replacement_id, counsellor_id],
        )?;
        for appt in &moving {
            tx.execute(
                "UPDATE appointments SET counsellor_id = ?1, updated_at = ?2 WHERE appointment_id = ?3",
                params![replacement_id, now(), appt.appointment_id],
            )?;
        }
        let pending_requests = tx.execute(
            "UPDATE appointment_requests SET counsellor_id = ?1, updated_at = ?2
             WHERE counsellor_id = ?3 AND status = 'pending'",
            params![replacement_id, now(), counsellor_id],
        )?;
        tx.execute(
            "UPDATE counsellors SET availability_status = 0 WHERE counsellor_id = ?",
            [counsellor_id],
        )?;
        tx.commit()?;

        info!(
            "Counsellor {counsellor_id} deactivated: {} student(s), {} appointment(s), {pending_requests} request(s) moved to {replacement_id}",
            student_ids.len(),
            moving.len()
        );

        Ok((
            false,
            Some(CaseloadTransfer {
                from_counsellor_id: counsellor_id,
                to_counsellor_id: replacement_id,
                student_ids,
                appointments: moving,
                pending_requests,
            }),
        ))
    }
}

fn is_available(conn: &Connection, counsellor_id: i64) -> DbResult<bool> {
    not_found_as(
        "Counsellor",
        conn.query_row(
            "SELECT availability_status FROM counsellors WHERE counsellor_id = ?",
            [counsellor_id],
            |row| row.get(0),
        ),
    )
}

pub(super) fn load_schedule(conn: &Connection, counsellor_id: i64) -> DbResult<Vec<DayHours>> {
    let mut stmt = conn.prepare(
        "SELECT day_of_week, start_time, end_time FROM counsellor_schedules WHERE counsellor_id = ?",
    )?;
    let rows = stmt.query_map([counsellor_id], |row| {
        let day: String = row.get(0)?;
        let day = parse_weekday(&day)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
        Ok(DayHours {
            day,
            start: row.get(1)?,
            end: row.get(2)?,
        })
    })?;
    let mut hours = rows.collect::<Result<Vec<_>, _>>()?;
    hours.sort_by_key(|h| h.day.num_days_from_monday());
    Ok(hours)
}

/// Start times of the counsellor's active appointments on `date`
pub(super) fn active_starts(
    conn: &Connection,
    counsellor_id: i64,
    date: chrono::NaiveDate,
    excluding: Option<i64>,
) -> DbResult<Vec<NaiveTime>> {
    let mut stmt = conn.prepare(
        "SELECT start_time FROM appointments
         WHERE counsellor_id = ?1 AND appointment_date = ?2
           AND status IN ('scheduled', 'rescheduled')
           AND appointment_id != ?3",
    )?;
    let rows = stmt.query_map(
        params![counsellor_id, date, excluding.unwrap_or(-1)],
        |row| row.get(0),
    )?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Loads schedule and bookings and runs slot validation on `conn`
pub(super) fn check_slot(
    conn: &Connection,
    counsellor_id: i64,
    date: chrono::NaiveDate,
    start: NaiveTime,
    excluding: Option<i64>,
) -> DbResult<scheduling::Slot> {
    let schedule = load_schedule(conn, counsellor_id)?;
    let booked = active_starts(conn, counsellor_id, date, excluding)?;
    Ok(scheduling::validate_slot(
        today(),
        date,
        start,
        &schedule,
        &booked,
    )?)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use chrono::Weekday;

    #[test]
    fn test_schedule_round_trip_sorted_by_day() {
        let db = db();
        let c = add_counsellor(&db, "Ada", "Technology");
        db.replace_schedule(
            c,
            &[
                DayHours {
                    day: Weekday::Fri,
                    start: t(10, 0),
                    end: t(14, 0),
                },
                DayHours {
                    day: Weekday::Mon,
                    start: t(9, 0),
                    end: t(17, 0),
                },
            ],
        )
        .unwrap();
        let hours = db.get_schedule(c).unwrap();
        assert_eq!(hours.len(), 2);
        assert_eq!(hours[0].day, Weekday::Mon);
        assert_eq!(hours[1].start, t(10, 0));

        db.replace_schedule(c, &[]).unwrap();
        assert!(db.get_schedule(c).unwrap().is_empty());
    }

    #[test]
    fn test_schedule_rejects_inverted_hours() {
        let db = db();
        let c = add_weekday_counsellor(&db, "Ada");
        let err = db
            .replace_schedule(
                c,
                &[DayHours {
                    day: Weekday::Mon,
                    start: t(17, 0),
                    end: t(9, 0),
                }],
            )
            .unwrap_err();
        assert!(matches!(err, PortalError::InvalidInput { .. }));
        assert_eq!(db.get_schedule(c).unwrap().len(), 5);
    }

    #[test]
    fn test_update_schedule_merges_and_rolls_back() {
        let db = db();
        let c = add_weekday_counsellor(&db, "Ada");

        let hours = db
            .update_schedule(c, |mut current| {
                current.retain(|h| h.day != Weekday::Fri);
                Ok(current)
            })
            .unwrap();
        assert_eq!(hours.len(), 4);
        assert_eq!(db.get_schedule(c).unwrap(), hours);

        let failed = db.update_schedule(c, |_| Err(PortalError::invalid("nope")));
        assert!(failed.is_err());
        assert_eq!(db.get_schedule(c).unwrap().len(), 4);
    }

    #[test]
    fn test_available_profiles_in_id_order() {
        let db = db();
        let a = add_counsellor(&db, "Ada", "Technology");
        let b = add_counsellor(&db, "Bea", "Healthcare");
        let c = add_counsellor(&db, "Cal", "Law");
        db.toggle_counsellor_status(b, Some(a)).unwrap();
        let ids: Vec<_> = db
            .list_available_profiles()
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![a, c]);
    }

    #[test]
    fn test_deactivation_transfers_caseload() {
        let db = db();
        let old = add_weekday_counsellor(&db, "Ada");
        let new = add_weekday_counsellor(&db, "Bea");
        let s = add_student(&db, "Sam", Some(old));
        let monday = next(Weekday::Mon);
        db.book_appointment(&booking(s, old, monday, t(10, 0))).unwrap();

        let (active, transfer) = db.toggle_counsellor_status(old, Some(new)).unwrap();
        let transfer = transfer.unwrap();
        assert!(!active);
        assert_eq!(transfer.student_ids, vec![s]);
        assert_eq!(transfer.appointments.len(), 1);
        assert_eq!(db.get_student(s).unwrap().counsellor_id, Some(new));
        assert_eq!(db.counsellor_appointments(new).unwrap().len(), 1);

        let (active, transfer) = db.toggle_counsellor_status(old, None).unwrap();
        assert!(active);
        assert!(transfer.is_none());
    }

    #[test]
    fn test_deactivation_refused_on_overlap() {
        let db = db();
        let old = add_weekday_counsellor(&db, "Ada");
        let new = add_weekday_counsellor(&db, "Bea");
        let s1 = add_student(&db, "Sam", Some(old));
        let s2 = add_student(&db, "Tia", Some(new));
        let monday = next(Weekday::Mon);
        db.book_appointment(&booking(s1, old, monday, t(10, 0))).unwrap();
        db.book_appointment(&booking(s2, new, monday, t(10, 30))).unwrap();

        let err = db.toggle_counsellor_status(old, Some(new)).unwrap_err();
        assert!(matches!(err, PortalError::Conflict { .. }));
        assert!(db.is_counsellor_available(old).unwrap());
        assert_eq!(db.get_student(s1).unwrap().counsellor_id, Some(old));
    }

    #[test]
    fn test_deactivation_needs_valid_replacement() {
        let db = db();
        let old = add_counsellor(&db, "Ada", "Technology");
        assert!(db.toggle_counsellor_status(old, None).is_err());
        assert!(db.toggle_counsellor_status(old, Some(old)).is_err());
        assert!(matches!(
            db.toggle_counsellor_status(old, Some(42)),
            Err(PortalError::NotFound { .. })
        ));
    }
}
