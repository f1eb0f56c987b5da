use super::{now, AccountCredentials, DbResult, PortalDbManager, Role};
use rusqlite::{params, Connection, OptionalExtension};

impl PortalDbManager {
    /// Checks whether an email is registered to any account kind
    pub fn email_in_use(&self, email: &str) -> DbResult<bool> {
        let db = self.conn()?;
        let count: i64 = db.query_row(
            "SELECT (SELECT COUNT(*) FROM admins WHERE email = ?1)
                  + (SELECT COUNT(*) FROM students WHERE email = ?1)
                  + (SELECT COUNT(*) FROM counsellors WHERE email = ?1)",
            [email],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Looks up login credentials, trying admins, then students, then counsellors
    pub fn find_credentials(&self, email: &str) -> DbResult<Option<AccountCredentials>> {
        let db = self.conn()?;

        let lookups: [(Role, &str); 3] = [
            (
                Role::Admin,
                "SELECT admin_id, password_hash, 1 FROM admins WHERE email = ?",
            ),
            (
                Role::Student,
                "SELECT student_id, password_hash, is_active FROM students WHERE email = ?",
            ),
            (
                Role::Counsellor,
                "SELECT counsellor_id, password_hash, 1 FROM counsellors WHERE email = ?",
            ),
        ];

        for (role, sql) in lookups {
            let found = db
                .query_row(sql, [email], |row| {
                    Ok(AccountCredentials {
                        role,
                        id: row.get(0)?,
                        password_hash: row.get(1)?,
                        is_active: row.get(2)?,
                    })
                })
                .optional()?;
            if found.is_some() {
                return Ok(found);
            }
        }

        Ok(None)
    }

    /// Whether the account still exists and, for a student, is active
    pub fn is_active_account(&self, role: Role, id: i64) -> DbResult<bool> {
        let sql = match role {
            Role::Admin => "SELECT COUNT(*) FROM admins WHERE admin_id = ?",
            Role::Student => {
                "SELECT COUNT(*) FROM students WHERE student_id = ? AND is_active = 1"
            }
            Role::Counsellor => "SELECT COUNT(*) FROM counsellors WHERE counsellor_id = ?",
        };
        let db = self.conn()?;
        let count: i64 = db.query_row(sql, [id], |row| row.get(0))?;
        Ok(count > 0)
    }

    /// Creates the admin account, or updates its name and password if it exists
    pub fn upsert_admin(&self, email: &str, name: &str, password_hash: &str) -> DbResult<i64> {
        let db = self.conn()?;
        db.execute(
            "INSERT INTO admins (email, name, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(email) DO UPDATE SET name = excluded.name,
                                              password_hash = excluded.password_hash",
            params![email, name, password_hash, now()],
        )?;
        let id = db.query_row(
            "SELECT admin_id FROM admins WHERE email = ?",
            [email],
            |row| row.get(0),
        )?;
        Ok(id)
    }
}

pub(super) fn lookup_name(conn: &Connection, role: Role, id: i64) -> DbResult<Option<String>> {
    let sql = match role {
        Role::Admin => "SELECT name FROM admins WHERE admin_id = ?",
        Role::Student => "SELECT first_name || ' ' || last_name FROM students WHERE student_id = ?",
        Role::Counsellor => {
            "SELECT first_name || ' ' || last_name FROM counsellors WHERE counsellor_id = ?"
        }
    };
    Ok(conn.query_row(sql, [id], |row| row.get(0)).optional()?)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn test_email_in_use_across_tables() {
        let db = db();
        assert!(!db.email_in_use("ada@portal.test").unwrap());
        add_counsellor(&db, "Ada", "Technology");
        assert!(db.email_in_use("ada@portal.test").unwrap());
        db.upsert_admin("root@portal.test", "Root", "h").unwrap();
        assert!(db.email_in_use("root@portal.test").unwrap());
    }

    #[test]
    fn test_find_credentials_by_role() {
        let db = db();
        let c = add_counsellor(&db, "Ada", "Technology");
        let s = add_student(&db, "Sam", Some(c));

        let found = db.find_credentials("sam@student.test").unwrap().unwrap();
        assert_eq!((found.role, found.id, found.is_active), (Role::Student, s, true));

        let found = db.find_credentials("ada@portal.test").unwrap().unwrap();
        assert_eq!((found.role, found.id), (Role::Counsellor, c));

        assert!(db.find_credentials("nobody@x.test").unwrap().is_none());
    }

    #[test]
    fn test_active_account_lookup() {
        let db = db();
        let c = add_counsellor(&db, "Ada", "Technology");
        let s = add_student(&db, "Sam", Some(c));
        assert!(db.is_active_account(Role::Counsellor, c).unwrap());
        assert!(db.is_active_account(Role::Student, s).unwrap());
        assert!(!db.is_active_account(Role::Admin, 1).unwrap());

        db.toggle_student_status(s).unwrap();
        assert!(!db.is_active_account(Role::Student, s).unwrap());
    }

    #[test]
    fn test_upsert_admin_keeps_id() {
        let db = db();
        let first = db.upsert_admin("root@portal.test", "Root", "a").unwrap();
        let second = db.upsert_admin("root@portal.test", "Admin", "b").unwrap();
        assert_eq!(first, second);
        let creds = db.find_credentials("root@portal.test").unwrap().unwrap();
        assert_eq!(creds.password_hash, "b");
        let name = lookup_name(&db.conn().unwrap(), Role::Admin, first).unwrap();
        assert_eq!(name.as_deref(), Some("Admin"));
    }
}
