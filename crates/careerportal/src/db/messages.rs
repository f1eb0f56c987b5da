use super::accounts::lookup_name;
use super::{
    not_found_as, now, ConversationSummary, DbMessage, DbResult, PortalDbManager, Role,
    MESSAGE_COLUMNS,
};
use rusqlite::params;
use std::collections::hash_map::{Entry, HashMap};

impl PortalDbManager {
    pub fn send_message(
        &self,
        sender: (Role, i64),
        recipient: (Role, i64),
        body: &str,
    ) -> DbResult<DbMessage> {
        let db = self.conn()?;
        db.execute(
            "INSERT INTO messages (sender_role, sender_id, recipient_role, recipient_id, body,
                                   sent_at, is_read)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
            params![sender.0, sender.1, recipient.0, recipient.1, body, now()],
        )?;
        not_found_as(
            "Message",
            db.query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE message_id = ?"),
                [db.last_insert_rowid()],
                DbMessage::from_row,
            ),
        )
    }

    /// Messages between `me` and `partner`, oldest first.
    ///
    /// Messages `me` received in the returned range are marked read. With
    /// `after`, only messages with a larger id are returned.
    pub fn conversation(
        &self,
        me: (Role, i64),
        partner: (Role, i64),
        after: Option<i64>,
    ) -> DbResult<Vec<DbMessage>> {
        let db = self.conn()?;
        let after = after.unwrap_or(0);

        let messages = {
            let mut stmt = db.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE message_id > ?5
                   AND ((sender_role = ?1 AND sender_id = ?2 AND recipient_role = ?3 AND recipient_id = ?4)
                     OR (sender_role = ?3 AND sender_id = ?4 AND recipient_role = ?1 AND recipient_id = ?2))
                 ORDER BY sent_at, message_id"
            ))?;
            let rows = stmt.query_map(
                params![me.0, me.1, partner.0, partner.1, after],
                DbMessage::from_row,
            )?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        db.execute(
            "UPDATE messages SET is_read = 1
             WHERE message_id > ?5 AND sender_role = ?3 AND sender_id = ?4
               AND recipient_role = ?1 AND recipient_id = ?2 AND is_read = 0",
            params![me.0, me.1, partner.0, partner.1, after],
        )?;

        Ok(messages)
    }

    /// One entry per conversation partner, most recent conversation first
    pub fn conversations(&self, me: (Role, i64)) -> DbResult<Vec<ConversationSummary>> {
        let db = self.conn()?;
        let messages = {
            let mut stmt = db.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE (sender_role = ?1 AND sender_id = ?2)
                    OR (recipient_role = ?1 AND recipient_id = ?2)
                 ORDER BY sent_at, message_id"
            ))?;
            let rows = stmt.query_map(params![me.0, me.1], DbMessage::from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let mut by_partner: HashMap<(Role, i64), (DbMessage, i64)> = HashMap::new();
        for message in messages {
            let received = (message.recipient_role, message.recipient_id) == me;
            let partner = if received {
                (message.sender_role, message.sender_id)
            } else {
                (message.recipient_role, message.recipient_id)
            };
            let unread = i64::from(received && !message.is_read);
            match by_partner.entry(partner) {
                Entry::Occupied(mut e) => {
                    let (last, count) = e.get_mut();
                    *last = message;
                    *count += unread;
                }
                Entry::Vacant(e) => {
                    e.insert((message, unread));
                }
            }
        }

        let mut summaries = by_partner
            .into_iter()
            .map(|((role, id), (last_message, unread_count))| {
                Ok(ConversationSummary {
                    partner_id: id,
                    partner_role: role,
                    name: lookup_name(&db, role, id)?.unwrap_or_else(|| "Unknown".to_string()),
                    last_message,
                    unread_count,
                })
            })
            .collect::<DbResult<Vec<_>>>()?;
        summaries.sort_by(|a, b| b.last_message.message_id.cmp(&a.last_message.message_id));
        Ok(summaries)
    }

    /// Unread messages received by `me`, oldest first
    pub fn unread_messages(&self, me: (Role, i64)) -> DbResult<Vec<DbMessage>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE recipient_role = ? AND recipient_id = ? AND is_read = 0
             ORDER BY sent_at, message_id"
        ))?;
        let rows = stmt.query_map(params![me.0, me.1], DbMessage::from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
