use super::{
    now, DbNotification, DbResult, NewNotification, PortalDbManager, Role, NOTIFICATION_COLUMNS,
};
use crate::error::PortalError;
use rusqlite::params;

impl PortalDbManager {
    pub fn insert_notifications(&self, notifications: &[NewNotification]) -> DbResult<usize> {
        let mut db = self.conn()?;
        let tx = db.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO notifications (recipient_role, recipient_id, message, kind,
                                            related_entity_id, is_read, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
            )?;
            for n in notifications {
                stmt.execute(params![
                    n.recipient_role,
                    n.recipient_id,
                    n.message,
                    n.kind,
                    n.related_entity_id,
                    now()
                ])?;
            }
        }
        tx.commit()?;
        Ok(notifications.len())
    }

    /// Newest first
    pub fn list_notifications(
        &self,
        role: Role,
        id: i64,
        unread_only: bool,
        limit: u32,
    ) -> DbResult<Vec<DbNotification>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE recipient_role = ?1 AND recipient_id = ?2 AND (?3 = 0 OR is_read = 0)
             ORDER BY created_at DESC, notification_id DESC
             LIMIT ?4"
        ))?;
        let rows = stmt.query_map(
            params![role, id, unread_only, limit],
            DbNotification::from_row,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn unread_notification_count(&self, role: Role, id: i64) -> DbResult<i64> {
        let db = self.conn()?;
        Ok(db.query_row(
            "SELECT COUNT(*) FROM notifications
             WHERE recipient_role = ? AND recipient_id = ? AND is_read = 0",
            params![role, id],
            |row| row.get(0),
        )?)
    }

    /// Marks one of the recipient's notifications read
    pub fn mark_notification_read(&self, notification_id: i64, role: Role, id: i64) -> DbResult<()> {
        let db = self.conn()?;
        let changed = db.execute(
            "UPDATE notifications SET is_read = 1
             WHERE notification_id = ? AND recipient_role = ? AND recipient_id = ?",
            params![notification_id, role, id],
        )?;
        if changed == 0 {
            return Err(PortalError::not_found("Notification"));
        }
        Ok(())
    }

    pub fn mark_all_notifications_read(&self, role: Role, id: i64) -> DbResult<usize> {
        let db = self.conn()?;
        Ok(db.execute(
            "UPDATE notifications SET is_read = 1
             WHERE recipient_role = ? AND recipient_id = ? AND is_read = 0",
            params![role, id],
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::db;
    use super::super::NotificationKind;
    use super::*;

    fn note(role: Role, id: i64, message: &str) -> NewNotification {
        NewNotification {
            recipient_role: role,
            recipient_id: id,
            message: message.into(),
            kind: NotificationKind::General,
            related_entity_id: None,
        }
    }

    #[test]
    fn test_recipient_scoping_and_read_flags() {
        let db = db();
        db.insert_notifications(&[
            note(Role::Student, 1, "first"),
            note(Role::Student, 1, "second"),
            note(Role::Counsellor, 1, "not yours"),
        ])
        .unwrap();

        let mine = db.list_notifications(Role::Student, 1, false, 20).unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].message, "second");

        db.mark_notification_read(mine[0].notification_id, Role::Student, 1)
            .unwrap();
        assert_eq!(db.unread_notification_count(Role::Student, 1).unwrap(), 1);
        assert_eq!(db.list_notifications(Role::Student, 1, true, 20).unwrap().len(), 1);

        let theirs = db.list_notifications(Role::Counsellor, 1, false, 20).unwrap();
        assert!(db
            .mark_notification_read(theirs[0].notification_id, Role::Student, 1)
            .is_err());

        assert_eq!(db.mark_all_notifications_read(Role::Student, 1).unwrap(), 1);
        assert_eq!(db.unread_notification_count(Role::Student, 1).unwrap(), 0);
    }

    #[test]
    fn test_limit() {
        let db = db();
        let batch: Vec<_> = (0..5).map(|i| note(Role::Admin, 1, &i.to_string())).collect();
        db.insert_notifications(&batch).unwrap();
        assert_eq!(db.list_notifications(Role::Admin, 1, false, 3).unwrap().len(), 3);
    }
}
