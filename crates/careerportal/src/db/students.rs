use super::{
    not_found_as, now, DbResult, DbStudent, NewStudent, PortalDbManager, PurgeCounts,
    STUDENT_COLUMNS,
};
use rusqlite::{params, Transaction};
use tracing::info;

impl PortalDbManager {
    pub fn insert_student(&self, student: &NewStudent) -> DbResult<i64> {
        let db = self.conn()?;
        db.execute(
            "INSERT INTO students (first_name, last_name, email, phone, dob, address,
                                   education_level, interests, counsellor_id, is_active,
                                   password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, ?10, ?11)",
            params![
                student.first_name,
                student.last_name,
                student.email,
                student.phone,
                student.dob,
                student.address,
                student.education_level,
                student.interests,
                student.counsellor_id,
                student.password_hash,
                now(),
            ],
        )?;
        Ok(db.last_insert_rowid())
    }

    pub fn get_student(&self, student_id: i64) -> DbResult<DbStudent> {
        let db = self.conn()?;
        not_found_as(
            "Student",
            db.query_row(
                &format!("SELECT {STUDENT_COLUMNS} FROM students WHERE student_id = ?"),
                [student_id],
                DbStudent::from_row,
            ),
        )
    }

    /// All students, newest first
    pub fn list_students(&self) -> DbResult<Vec<DbStudent>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(&format!(
            "SELECT {STUDENT_COLUMNS} FROM students ORDER BY created_at DESC, student_id DESC"
        ))?;
        let rows = stmt.query_map([], DbStudent::from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Active students assigned to a counsellor, by name
    pub fn list_assigned_students(&self, counsellor_id: i64) -> DbResult<Vec<DbStudent>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(&format!(
            "SELECT {STUDENT_COLUMNS} FROM students
             WHERE counsellor_id = ? AND is_active = 1
             ORDER BY first_name, last_name, student_id"
        ))?;
        let rows = stmt.query_map([counsellor_id], DbStudent::from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Whether `student_id` is an active student assigned to `counsellor_id`
    pub fn is_assigned(&self, counsellor_id: i64, student_id: i64) -> DbResult<bool> {
        let db = self.conn()?;
        let count: i64 = db.query_row(
            "SELECT COUNT(*) FROM students
             WHERE student_id = ? AND counsellor_id = ? AND is_active = 1",
            [student_id, counsellor_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn set_student_counsellor(&self, student_id: i64, counsellor_id: i64) -> DbResult<()> {
        let db = self.conn()?;
        let changed = db.execute(
            "UPDATE students SET counsellor_id = ? WHERE student_id = ?",
            [counsellor_id, student_id],
        )?;
        if changed == 0 {
            return Err(crate::error::PortalError::not_found("Student"));
        }
        Ok(())
    }

    /// Flips the active flag. Deactivation purges the student's records.
    ///
    /// # Returns
    /// The new active flag and what was purged (all zero on activation).
    pub fn toggle_student_status(&self, student_id: i64) -> DbResult<(bool, PurgeCounts)> {
        let mut db = self.conn()?;
        let tx = db.transaction()?;

        let active: bool = not_found_as(
            "Student",
            tx.query_row(
                "SELECT is_active FROM students WHERE student_id = ?",
                [student_id],
                |row| row.get(0),
            ),
        )?;

        let now_active = !active;
        tx.execute(
            "UPDATE students SET is_active = ? WHERE student_id = ?",
            params![now_active, student_id],
        )?;

        let purged = if now_active {
            PurgeCounts::default()
        } else {
            purge_student_records(&tx, student_id)?
        };
        tx.commit()?;

        info!("Student {student_id} active={now_active}, purged {purged:?}");
        Ok((now_active, purged))
    }

    /// Purges every record owned by the student, then the student itself
    pub fn delete_student(&self, student_id: i64) -> DbResult<PurgeCounts> {
        let mut db = self.conn()?;
        let tx = db.transaction()?;
        let purged = purge_student_records(&tx, student_id)?;
        let deleted = tx.execute("DELETE FROM students WHERE student_id = ?", [student_id])?;
        if deleted == 0 {
            return Err(crate::error::PortalError::not_found("Student"));
        }
        tx.commit()?;

        info!("Deleted student {student_id}, purged {purged:?}");
        Ok(purged)
    }
}

fn purge_student_records(tx: &Transaction<'_>, student_id: i64) -> rusqlite::Result<PurgeCounts> {
    Ok(PurgeCounts {
        messages: tx.execute(
            "DELETE FROM messages
             WHERE (sender_role = 'student' AND sender_id = ?1)
                OR (recipient_role = 'student' AND recipient_id = ?1)",
            [student_id],
        )?,
        notifications: tx.execute(
            "DELETE FROM notifications WHERE recipient_role = 'student' AND recipient_id = ?",
            [student_id],
        )?,
        feedback: tx.execute("DELETE FROM feedback WHERE student_id = ?", [student_id])?,
        appointment_requests: tx.execute(
            "DELETE FROM appointment_requests WHERE student_id = ?",
            [student_id],
        )?,
        appointments: tx.execute("DELETE FROM appointments WHERE student_id = ?", [student_id])?,
        grievances: tx.execute("DELETE FROM grievances WHERE student_id = ?", [student_id])?,
        event_registrations: tx.execute(
            "DELETE FROM event_registrations WHERE student_id = ?",
            [student_id],
        )?,
        tasks: tx.execute("DELETE FROM tasks WHERE student_id = ?", [student_id])?,
        goal_milestones: tx.execute(
            "DELETE FROM goal_milestones
             WHERE goal_id IN (SELECT goal_id FROM goals WHERE student_id = ?)",
            [student_id],
        )?,
        goals: tx.execute("DELETE FROM goals WHERE student_id = ?", [student_id])?,
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::{NewNotification, NotificationKind, Role};
    use crate::error::PortalError;
    use chrono::Weekday;

    #[test]
    fn test_insert_and_get() {
        let db = db();
        let c = add_counsellor(&db, "Ada", "Technology");
        let s = add_student(&db, "Sam", Some(c));
        let student = db.get_student(s).unwrap();
        assert_eq!(student.full_name(), "Sam Student");
        assert_eq!(student.counsellor_id, Some(c));
        assert!(student.is_active);
        assert!(matches!(
            db.get_student(999),
            Err(PortalError::NotFound { entity: "Student" })
        ));
    }

    #[test]
    fn test_duplicate_email_is_constraint_violation() {
        let db = db();
        add_student(&db, "Sam", None);
        let err = db
            .insert_student(&super::super::NewStudent {
                first_name: "Other".into(),
                last_name: "Sam".into(),
                email: "sam@student.test".into(),
                phone: None,
                dob: chrono::NaiveDate::from_ymd_opt(2003, 1, 1).unwrap(),
                address: None,
                education_level: None,
                interests: String::new(),
                counsellor_id: None,
                password_hash: "x".into(),
            })
            .unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[test]
    fn test_assigned_students_excludes_inactive() {
        let db = db();
        let c = add_counsellor(&db, "Ada", "Technology");
        let a = add_student(&db, "Amy", Some(c));
        let b = add_student(&db, "Bob", Some(c));
        db.toggle_student_status(b).unwrap();

        let ids: Vec<_> = db
            .list_assigned_students(c)
            .unwrap()
            .into_iter()
            .map(|s| s.student_id)
            .collect();
        assert_eq!(ids, vec![a]);
        assert!(db.is_assigned(c, a).unwrap());
        assert!(!db.is_assigned(c, b).unwrap());
    }

    #[test]
    fn test_deactivation_purges_records() {
        let db = db();
        let c = add_weekday_counsellor(&db, "Ada");
        let s = add_student(&db, "Sam", Some(c));
        db.book_appointment(&booking(s, c, next(Weekday::Mon), t(10, 0)))
            .unwrap();
        db.insert_notifications(&[NewNotification {
            recipient_role: Role::Student,
            recipient_id: s,
            message: "hi".into(),
            kind: NotificationKind::General,
            related_entity_id: None,
        }])
        .unwrap();

        let (active, purged) = db.toggle_student_status(s).unwrap();
        assert!(!active);
        assert_eq!(purged.appointments, 1);
        assert_eq!(purged.notifications, 1);
        assert!(db.student_appointments(s).unwrap().is_empty());

        let (active, purged) = db.toggle_student_status(s).unwrap();
        assert!(active);
        assert_eq!(purged, Default::default());
    }

    #[test]
    fn test_delete_student() {
        let db = db();
        let s = add_student(&db, "Sam", None);
        db.delete_student(s).unwrap();
        assert!(db.get_student(s).is_err());
        assert!(matches!(
            db.delete_student(s),
            Err(PortalError::NotFound { .. })
        ));
    }
}
