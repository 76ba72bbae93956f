//! Message records and their dirty flags.
//!
//! `read-dirty` is `unread = 0 AND unread_origin = 1`; `delete-dirty` is
//! `deleted = 1`.  Multi-row operations run inside one transaction so
//! concurrent readers never observe half of a batch.

use std::collections::HashSet;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension};

use postbox_shared::types::MessageId;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{InboxMessage, MessagePayload};

const SELECT_COLUMNS: &str =
    "message_id, title, sent_at, expires_at, raw_json, unread, unread_origin, deleted";

impl Database {
    // ------------------------------------------------------------------
    // Server-driven writes
    // ------------------------------------------------------------------

    /// Refresh an existing record from a server payload.
    ///
    /// Returns the number of rows touched (0 when the message is new).  A
    /// read is adopted only when the server's own read state flips from
    /// unread to read, so local reads and local unreads both survive.
    pub fn update_message(&self, payload: &MessagePayload) -> Result<usize> {
        let affected = self.conn().execute(
            "UPDATE messages
             SET title = ?2, sent_at = ?3, expires_at = ?4, raw_json = ?5,
                 unread = CASE WHEN unread_origin = 1 AND ?6 = 0 THEN 0 ELSE unread END,
                 unread_origin = ?6
             WHERE message_id = ?1",
            params![
                payload.id.as_str(),
                payload.title,
                payload.sent_at.map(format_ts),
                payload.expires_at.map(format_ts),
                serde_json::to_string(&payload.raw)?,
                payload.unread,
            ],
        )?;
        Ok(affected)
    }

    /// Insert new records in a single transaction.
    ///
    /// Records whose id already exists are left untouched.
    pub fn insert_messages(&self, payloads: &[MessagePayload]) -> Result<usize> {
        if payloads.is_empty() {
            return Ok(0);
        }

        let tx = self.conn().unchecked_transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO messages
                 (message_id, title, sent_at, expires_at, raw_json, unread, unread_origin, deleted)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, 0)",
            )?;
            for payload in payloads {
                inserted += stmt.execute(params![
                    payload.id.as_str(),
                    payload.title,
                    payload.sent_at.map(format_ts),
                    payload.expires_at.map(format_ts),
                    serde_json::to_string(&payload.raw)?,
                    payload.unread,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Physically remove records in a single transaction.
    pub fn delete_messages(&self, ids: &HashSet<MessageId>) -> Result<usize> {
        self.for_each_id("DELETE FROM messages WHERE message_id = ?1", ids)
    }

    // ------------------------------------------------------------------
    // Local mutations (UI side)
    // ------------------------------------------------------------------

    /// Mark messages read locally.  They become read-dirty until pushed.
    pub fn mark_messages_read(&self, ids: &HashSet<MessageId>) -> Result<usize> {
        self.for_each_id(
            "UPDATE messages SET unread = 0 WHERE message_id = ?1",
            ids,
        )
    }

    /// Mark messages unread locally.  There is no server push for this.
    pub fn mark_messages_unread(&self, ids: &HashSet<MessageId>) -> Result<usize> {
        self.for_each_id(
            "UPDATE messages SET unread = 1 WHERE message_id = ?1",
            ids,
        )
    }

    /// Tombstone messages locally.  They stay in the table until the delete
    /// push succeeds or the server stops listing them.
    pub fn mark_messages_deleted(&self, ids: &HashSet<MessageId>) -> Result<usize> {
        self.for_each_id(
            "UPDATE messages SET deleted = 1 WHERE message_id = ?1",
            ids,
        )
    }

    /// Record that the server has accepted the read state of `ids`.
    pub fn mark_messages_read_origin(&self, ids: &HashSet<MessageId>) -> Result<usize> {
        self.for_each_id(
            "UPDATE messages SET unread_origin = 0 WHERE message_id = ?1",
            ids,
        )
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Every id in the store, tombstoned ones included.
    pub fn message_ids(&self) -> Result<HashSet<MessageId>> {
        self.collect_ids("SELECT message_id FROM messages")
    }

    /// Ids read locally whose read state has not reached the server.
    pub fn read_dirty_message_ids(&self) -> Result<HashSet<MessageId>> {
        self.collect_ids(
            "SELECT message_id FROM messages WHERE unread = 0 AND unread_origin = 1",
        )
    }

    /// Ids deleted locally whose deletion has not reached the server.
    pub fn deleted_message_ids(&self) -> Result<HashSet<MessageId>> {
        self.collect_ids("SELECT message_id FROM messages WHERE deleted = 1")
    }

    /// Visible messages: not deleted and not expired at `now`, newest first.
    pub fn list_messages(&self, now: DateTime<Utc>) -> Result<Vec<InboxMessage>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM messages
             WHERE deleted = 0 AND (expires_at IS NULL OR expires_at > ?1)
             ORDER BY sent_at DESC, message_id ASC"
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params![format_ts(now)], row_to_message)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    pub fn get_message(&self, id: &MessageId) -> Result<InboxMessage> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM messages WHERE message_id = ?1");
        self.conn()
            .query_row(&sql, params![id.as_str()], row_to_message)
            .optional()?
            .ok_or(StoreError::NotFound)
    }

    /// Number of visible unread messages at `now`.
    pub fn count_unread(&self, now: DateTime<Utc>) -> Result<usize> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM messages
             WHERE deleted = 0 AND unread = 1
               AND (expires_at IS NULL OR expires_at > ?1)",
            params![format_ts(now)],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn for_each_id(&self, sql: &str, ids: &HashSet<MessageId>) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let tx = self.conn().unchecked_transaction()?;
        let mut affected = 0;
        {
            let mut stmt = tx.prepare(sql)?;
            for id in ids {
                affected += stmt.execute(params![id.as_str()])?;
            }
        }
        tx.commit()?;
        Ok(affected)
    }

    fn collect_ids(&self, sql: &str) -> Result<HashSet<MessageId>> {
        let mut stmt = self.conn().prepare(sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut ids = HashSet::new();
        for row in rows {
            ids.insert(MessageId(row?));
        }
        Ok(ids)
    }
}

pub(crate) fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_ts(idx: usize, value: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        idx,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })
        })
        .transpose()
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<InboxMessage> {
    let id: String = row.get(0)?;
    let title: Option<String> = row.get(1)?;
    let sent_at = parse_ts(2, row.get(2)?)?;
    let expires_at = parse_ts(3, row.get(3)?)?;
    let raw_str: String = row.get(4)?;

    let raw = serde_json::from_str(&raw_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(InboxMessage {
        id: MessageId(id),
        title,
        sent_at,
        expires_at,
        raw,
        unread: row.get(5)?,
        unread_origin: row.get(6)?,
        deleted: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn payload(id: &str, unread: bool) -> MessagePayload {
        MessagePayload::parse(&json!({
            "message_id": id,
            "title": format!("title {id}"),
            "message_sent": "2024-05-01T10:00:00Z",
            "unread": unread,
        }))
        .unwrap()
    }

    fn ids(list: &[&str]) -> HashSet<MessageId> {
        list.iter().map(|id| MessageId::from(*id)).collect()
    }

    #[test]
    fn update_reports_zero_rows_for_unknown_message() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.update_message(&payload("a", true)).unwrap(), 0);

        db.insert_messages(&[payload("a", true)]).unwrap();
        assert_eq!(db.update_message(&payload("a", true)).unwrap(), 1);
    }

    #[test]
    fn insert_ignores_existing_ids() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.insert_messages(&[payload("a", true), payload("b", true)]).unwrap(), 2);
        db.mark_messages_read(&ids(&["a"])).unwrap();

        assert_eq!(db.insert_messages(&[payload("a", true)]).unwrap(), 0);
        assert!(db.get_message(&MessageId::from("a")).unwrap().is_read());
    }

    #[test]
    fn read_dirty_tracks_unpushed_reads() {
        let db = Database::open_in_memory().unwrap();
        db.insert_messages(&[payload("a", true), payload("b", true), payload("c", false)])
            .unwrap();

        db.mark_messages_read(&ids(&["a", "c"])).unwrap();
        // "c" was already read on the server, so it is not dirty.
        assert_eq!(db.read_dirty_message_ids().unwrap(), ids(&["a"]));

        db.mark_messages_read_origin(&ids(&["a"])).unwrap();
        assert!(db.read_dirty_message_ids().unwrap().is_empty());
        assert!(db.get_message(&MessageId::from("a")).unwrap().is_read());
    }

    #[test]
    fn server_update_keeps_local_read() {
        let db = Database::open_in_memory().unwrap();
        db.insert_messages(&[payload("a", true)]).unwrap();
        db.mark_messages_read(&ids(&["a"])).unwrap();

        db.update_message(&payload("a", true)).unwrap();
        let message = db.get_message(&MessageId::from("a")).unwrap();
        assert!(message.is_read());
        assert!(message.is_read_dirty());
    }

    #[test]
    fn server_update_adopts_remote_read() {
        let db = Database::open_in_memory().unwrap();
        db.insert_messages(&[payload("a", true)]).unwrap();

        db.update_message(&payload("a", false)).unwrap();
        let message = db.get_message(&MessageId::from("a")).unwrap();
        assert!(message.is_read());
        assert!(!message.is_read_dirty());
    }

    #[test]
    fn server_update_keeps_local_unread() {
        let db = Database::open_in_memory().unwrap();
        db.insert_messages(&[payload("a", false)]).unwrap();
        db.mark_messages_unread(&ids(&["a"])).unwrap();

        db.update_message(&payload("a", false)).unwrap();
        let message = db.get_message(&MessageId::from("a")).unwrap();
        assert!(message.unread);
        assert!(!message.unread_origin);
    }

    #[test]
    fn deleted_messages_are_hidden_but_kept() {
        let db = Database::open_in_memory().unwrap();
        db.insert_messages(&[payload("a", true), payload("b", true)]).unwrap();
        db.mark_messages_deleted(&ids(&["a"])).unwrap();

        let now = Utc::now();
        let visible: Vec<_> = db.list_messages(now).unwrap().into_iter().map(|m| m.id).collect();
        assert_eq!(visible, vec![MessageId::from("b")]);
        assert_eq!(db.deleted_message_ids().unwrap(), ids(&["a"]));
        assert_eq!(db.message_ids().unwrap(), ids(&["a", "b"]));
        assert_eq!(db.count_unread(now).unwrap(), 1);
    }

    #[test]
    fn expired_messages_are_hidden() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let expired = MessagePayload::parse(&json!({
            "message_id": "old",
            "message_expiry": format_ts(now - Duration::hours(1)),
        }))
        .unwrap();
        db.insert_messages(&[expired, payload("fresh", true)]).unwrap();

        let visible: Vec<_> = db.list_messages(now).unwrap().into_iter().map(|m| m.id).collect();
        assert_eq!(visible, vec![MessageId::from("fresh")]);
    }

    #[test]
    fn delete_is_terminal_and_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.insert_messages(&[payload("a", true), payload("b", true)]).unwrap();

        assert_eq!(db.delete_messages(&ids(&["a"])).unwrap(), 1);
        assert_eq!(db.delete_messages(&ids(&["a"])).unwrap(), 0);
        assert_eq!(db.message_ids().unwrap(), ids(&["b"]));
        assert!(matches!(
            db.get_message(&MessageId::from("a")),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn raw_payload_survives_storage() {
        let db = Database::open_in_memory().unwrap();
        let value = json!({"message_id": "a", "extra": {"deep": [1, 2, 3]}});
        db.insert_messages(&[MessagePayload::parse(&value).unwrap()]).unwrap();
        assert_eq!(db.get_message(&MessageId::from("a")).unwrap().raw, value);
    }
}
