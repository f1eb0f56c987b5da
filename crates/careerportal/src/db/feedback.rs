use super::{not_found_as, now, DbFeedback, DbResult, PortalDbManager, FEEDBACK_COLUMNS};
use crate::error::PortalError;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection};
use tracing::info;

/// A student may leave feedback once per this many days.
const FEEDBACK_INTERVAL_DAYS: i64 = 7;

impl PortalDbManager {
    /// Whether the student has not left feedback within the interval
    pub fn feedback_due(&self, student_id: i64) -> DbResult<bool> {
        let db = self.conn()?;
        Ok(is_due(last_feedback_at(&db, student_id)?))
    }

    pub fn student_feedback(&self, student_id: i64) -> DbResult<Vec<DbFeedback>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(&format!(
            "SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE student_id = ?
             ORDER BY created_at DESC, feedback_id DESC"
        ))?;
        let rows = stmt.query_map([student_id], DbFeedback::from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Stores feedback and recomputes the counsellor's rating as the mean of all feedback
    ///
    /// # Returns
    /// The stored feedback and the counsellor's new rating.
    pub fn submit_feedback(
        &self,
        student_id: i64,
        counsellor_id: i64,
        rating: i64,
        comments: &str,
    ) -> DbResult<(DbFeedback, f64)> {
        if !(1..=5).contains(&rating) {
            return Err(PortalError::invalid("Rating must be between 1 and 5"));
        }
        if comments.trim().is_empty() {
            return Err(PortalError::invalid("Comments are required"));
        }

        let mut db = self.conn()?;
        let tx = db.transaction()?;
        if !is_due(last_feedback_at(&tx, student_id)?) {
            return Err(PortalError::conflict(format!(
                "Feedback can only be submitted once every {FEEDBACK_INTERVAL_DAYS} days"
            )));
        }

        tx.execute(
            "INSERT INTO feedback (student_id, counsellor_id, rating, comments, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![student_id, counsellor_id, rating, comments.trim(), now()],
        )?;
        let feedback_id = tx.last_insert_rowid();

        let mean: f64 = tx.query_row(
            "SELECT AVG(rating) FROM feedback WHERE counsellor_id = ?",
            [counsellor_id],
            |row| row.get(0),
        )?;
        tx.execute(
            "UPDATE counsellors SET rating = ?1 WHERE counsellor_id = ?2",
            params![mean, counsellor_id],
        )?;
        let feedback = not_found_as(
            "Feedback",
            tx.query_row(
                &format!("SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE feedback_id = ?"),
                [feedback_id],
                DbFeedback::from_row,
            ),
        )?;
        tx.commit()?;

        info!("Counsellor {counsellor_id} rating is now {mean:.2}");
        Ok((feedback, mean))
    }
}

fn last_feedback_at(conn: &Connection, student_id: i64) -> DbResult<Option<DateTime<Utc>>> {
    Ok(conn.query_row(
        "SELECT MAX(created_at) FROM feedback WHERE student_id = ?",
        [student_id],
        |row| row.get(0),
    )?)
}

fn is_due(last: Option<DateTime<Utc>>) -> bool {
    last.map_or(true, |at| now() - at >= Duration::days(FEEDBACK_INTERVAL_DAYS))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn test_feedback_updates_rating_and_rate_limits() {
        let db = db();
        let c = add_counsellor(&db, "Ada", "Technology");
        let a = add_student(&db, "Amy", Some(c));
        let b = add_student(&db, "Bob", Some(c));

        assert!(db.feedback_due(a).unwrap());
        let (_, rating) = db.submit_feedback(a, c, 5, "Very helpful").unwrap();
        assert_eq!(rating, 5.0);
        let (_, rating) = db.submit_feedback(b, c, 2, "Too short").unwrap();
        assert_eq!(rating, 3.5);
        assert_eq!(db.get_counsellor(c).unwrap().rating, 3.5);

        assert!(!db.feedback_due(a).unwrap());
        assert!(matches!(
            db.submit_feedback(a, c, 4, "Again"),
            Err(PortalError::Conflict { .. })
        ));
        assert_eq!(db.student_feedback(a).unwrap().len(), 1);
    }

    #[test]
    fn test_feedback_validation() {
        let db = db();
        let c = add_counsellor(&db, "Ada", "Technology");
        let s = add_student(&db, "Sam", Some(c));
        assert!(db.submit_feedback(s, c, 0, "x").is_err());
        assert!(db.submit_feedback(s, c, 6, "x").is_err());
        assert!(db.submit_feedback(s, c, 3, "   ").is_err());
        assert!(db.feedback_due(s).unwrap());
    }

    #[test]
    fn test_is_due() {
        assert!(is_due(None));
        assert!(!is_due(Some(now() - Duration::days(2))));
        assert!(is_due(Some(now() - Duration::days(8))));
    }
}
