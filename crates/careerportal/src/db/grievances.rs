use super::{
    not_found_as, now, DbGrievance, DbResult, GrievanceStatus, PortalDbManager, GRIEVANCE_COLUMNS,
};
use rusqlite::{params, Connection};

impl PortalDbManager {
    pub fn insert_grievance(
        &self,
        student_id: i64,
        subject: &str,
        description: &str,
    ) -> DbResult<DbGrievance> {
        let db = self.conn()?;
        let stamp = now();
        db.execute(
            "INSERT INTO grievances (student_id, subject, description, status, response,
                                     created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?5)",
            params![student_id, subject, description, GrievanceStatus::Pending, stamp],
        )?;
        fetch_grievance(&db, db.last_insert_rowid())
    }

    /// Grievances newest first, optionally for one student only
    pub fn list_grievances(&self, student_id: Option<i64>) -> DbResult<Vec<DbGrievance>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(&format!(
            "SELECT {GRIEVANCE_COLUMNS} FROM grievances
             WHERE (?1 IS NULL OR student_id = ?1)
             ORDER BY created_at DESC, grievance_id DESC"
        ))?;
        let rows = stmt.query_map([student_id], DbGrievance::from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Sets the status, keeping the previous response when `response` is `None`
    pub fn update_grievance_status(
        &self,
        grievance_id: i64,
        status: GrievanceStatus,
        response: Option<&str>,
    ) -> DbResult<DbGrievance> {
        let db = self.conn()?;
        let current = fetch_grievance(&db, grievance_id)?;
        db.execute(
            "UPDATE grievances SET status = ?1, response = ?2, updated_at = ?3
             WHERE grievance_id = ?4",
            params![
                status,
                response.or(current.response.as_deref()),
                now(),
                grievance_id
            ],
        )?;
        fetch_grievance(&db, grievance_id)
    }
}

fn fetch_grievance(conn: &Connection, grievance_id: i64) -> DbResult<DbGrievance> {
    not_found_as(
        "Grievance",
        conn.query_row(
            &format!("SELECT {GRIEVANCE_COLUMNS} FROM grievances WHERE grievance_id = ?"),
            [grievance_id],
            DbGrievance::from_row,
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn test_grievance_lifecycle() {
        let db = db();
        let s = add_student(&db, "Sam", None);
        let other = add_student(&db, "Tia", None);
        let g = db.insert_grievance(s, "Portal", "Cannot upload CV").unwrap();
        db.insert_grievance(other, "Events", "Room too small").unwrap();
        assert_eq!(g.status, GrievanceStatus::Pending);
        assert_eq!(db.list_grievances(Some(s)).unwrap().len(), 1);
        assert_eq!(db.list_grievances(None).unwrap().len(), 2);

        let g = db
            .update_grievance_status(g.grievance_id, GrievanceStatus::InProgress, Some("Looking"))
            .unwrap();
        let g = db
            .update_grievance_status(g.grievance_id, GrievanceStatus::Resolved, None)
            .unwrap();
        assert_eq!(g.status, GrievanceStatus::Resolved);
        assert_eq!(g.response.as_deref(), Some("Looking"));
    }
}
